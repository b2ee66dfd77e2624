//! Property tests for liveness marker invariants
//!
//! A marker either yields a pid that is safe to signal or nothing at all.

use devnet_supervisor::process::marker::parse_pid;
use devnet_supervisor::LivenessMarker;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_written_pid_reads_back(pid in 1u32..=i32::MAX as u32) {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = LivenessMarker::new(temp_dir.path().join("node.pid"));

        marker.write(pid).unwrap();
        prop_assert_eq!(marker.read(), Some(pid));

        // Overwrite leaves no trace of the previous value
        marker.write(pid / 2 + 1).unwrap();
        prop_assert_eq!(marker.read(), Some(pid / 2 + 1));
    }

    #[test]
    fn test_parsed_pid_is_always_signalable(content in "\\PC{0,24}") {
        // Invariant: never 0 (own group) and never negative as pid_t
        if let Some(pid) = parse_pid(&content) {
            prop_assert!(pid >= 1);
            prop_assert!(pid <= i32::MAX as u32);
        }
    }

    #[test]
    fn test_out_of_range_pids_rejected(pid in (i32::MAX as u64 + 1)..=u64::from(u32::MAX) * 4) {
        prop_assert_eq!(parse_pid(&pid.to_string()), None);
    }

    #[test]
    fn test_garbage_marker_is_removed(content in "[a-z ]{1,16}") {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("node.pid");
        std::fs::write(&path, &content).unwrap();

        let marker = LivenessMarker::new(&path);
        prop_assert_eq!(marker.read(), None);
        prop_assert!(!marker.exists());
    }
}

#[test]
fn test_whitespace_around_pid_accepted() {
    assert_eq!(parse_pid("  1234\n"), Some(1234));
    assert_eq!(parse_pid("0"), None);
    assert_eq!(parse_pid("-5"), None);
    assert_eq!(parse_pid(""), None);
}
