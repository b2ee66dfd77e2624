//! Log sink helpers

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// How far back from the end of the log to look for the last lines
const TAIL_WINDOW_BYTES: u64 = 64 * 1024;

/// Read the last `lines` lines of the log at `path`
///
/// A missing log yields an empty tail. Only the final 64 KiB are read, so very
/// long lines may be truncated at the front.
pub fn read_tail(path: &Path, lines: usize) -> std::io::Result<Vec<String>> {
    if lines == 0 {
        return Ok(Vec::new());
    }

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL_WINDOW_BYTES);
    // One byte before the window tells whether it opens on a line boundary
    let read_from = start.saturating_sub(1);
    file.seek(SeekFrom::Start(read_from))?;

    let mut buf = Vec::with_capacity((len - read_from) as usize);
    file.read_to_end(&mut buf)?;

    let window: &[u8] = if start == 0 {
        &buf
    } else {
        match buf.iter().position(|b| *b == b'\n') {
            Some(newline) => &buf[newline + 1..],
            None => &[],
        }
    };
    let text = String::from_utf8_lossy(window);
    let all: Vec<&str> = text.lines().collect();

    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|l| l.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_returns_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proof-server.log");
        let content: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
        std::fs::write(&path, content).unwrap();

        assert_eq!(read_tail(&path, 3).unwrap(), vec!["line 8", "line 9", "line 10"]);
        assert_eq!(read_tail(&path, 100).unwrap().len(), 10);
        assert!(read_tail(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_tail(&dir.path().join("absent.log"), 5).unwrap().is_empty());
    }

    #[test]
    fn test_large_log_drops_partial_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        let mut content = "x".repeat(TAIL_WINDOW_BYTES as usize);
        content.push_str("\nlast\n");
        std::fs::write(&path, content).unwrap();

        assert_eq!(read_tail(&path, 5).unwrap(), vec!["last"]);
    }

    #[test]
    fn test_window_on_line_boundary_keeps_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.log");
        // Ten 8 KiB lines: the 64 KiB window starts exactly at line 3
        let content: String = (0..10)
            .map(|i| format!("{}{}\n", i, "x".repeat(8190)))
            .collect();
        std::fs::write(&path, content).unwrap();

        let tail = read_tail(&path, 100).unwrap();
        assert_eq!(tail.len(), 8);
        assert!(tail[0].starts_with('2'));
        assert!(tail[7].starts_with('9'));
    }
}
