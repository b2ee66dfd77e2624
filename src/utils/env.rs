//! Environment variable utilities

/// Get environment variable or compute default
///
/// # Example
/// ```rust
/// use devnet_supervisor::utils::env_or_else;
///
/// let run_dir = env_or_else("SUPERVISOR_RUN_DIR", || "/tmp/devnet-supervisor".to_string());
/// ```
pub fn env_or_else<F>(key: &str, f: F) -> String
where
    F: FnOnce() -> String,
{
    env_opt(key).unwrap_or_else(f)
}

/// Get environment variable as Option
///
/// Unset and empty variables both yield `None`.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
