//! Small helpers shared across the pipeline.
//!
//! - String capitalization for display names
//! - Log-safe truncation and panic payload text
//! - Output directory validation

use std::any::Any;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Capitalize the first character of a string.
///
/// Used for channel titles (e.g., "panama" -> "Panama").
///
/// # Examples
///
/// ```ignore
/// assert_eq!(upcase("venezuela"), "Venezuela");
/// assert_eq!(upcase(""), "");
/// ```
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Truncate a string for logging, on a character boundary.
///
/// Long strings keep their first `max` characters with `"…(+N chars)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}

/// Text of a caught panic payload (`panic!` with a literal or a format string).
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upcase() {
        assert_eq!(upcase("dominicana"), "Dominicana");
        assert_eq!(upcase("ñandú"), "Ñandú");
        assert_eq!(upcase(""), "");
        assert_eq!(upcase("a"), "A");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hola, mundo", 100), "Hola, mundo");
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "á".repeat(50);
        let result = truncate_for_log(&s, 10);
        assert!(result.starts_with(&"á".repeat(10)));
        assert!(result.ends_with("…(+40 chars)"));
    }

    #[test]
    fn test_panic_message_payloads() {
        let from_str = std::panic::catch_unwind(|| -> u8 { panic!("boom") }).unwrap_err();
        assert_eq!(panic_message(&*from_str), "boom");

        let from_string = std::panic::catch_unwind(|| -> u8 { panic!("{} failed", "panama") }).unwrap_err();
        assert_eq!(panic_message(&*from_string), "panama failed");

        let other = std::panic::catch_unwind(|| -> u8 { std::panic::panic_any(7u8) }).unwrap_err();
        assert_eq!(panic_message(&*other), "unknown panic");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let dir = std::env::temp_dir().join(format!("headline_feeds_probe_{}", std::process::id()));
        ensure_writable_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join("..__probe_write__").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
