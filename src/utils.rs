//! Small helpers for log previews and pacing.
//!
//! - Char-safe truncation of titles and bodies for log lines
//! - Fixed and randomized pauses between requests and messages
//! - An early writability check for the JSON archive directory

use rand::{Rng, rng};
use std::error::Error;
use std::fs as stdfs;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::info;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped characters appended. Never splits a code point.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}

/// Sleep for `ms` milliseconds; a zero pause returns immediately.
pub async fn pause(ms: u64) {
    if ms > 0 {
        sleep(Duration::from_millis(ms)).await;
    }
}

/// Sleep for a random duration in `[min, max]` milliseconds.
pub async fn random_pause((min, max): (u64, u64)) {
    // Pick before awaiting: the thread-local RNG must not live across the await.
    let ms = if max > min {
        rng().random_range(min..=max)
    } else {
        min
    };
    pause(ms).await;
}

/// Create `path` if needed and prove a file can be written in it.
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!(path, "Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 chars)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let result = truncate_for_log("Café en León", 4);
        assert_eq!(result, "Café…(+8 chars)");
    }

    #[tokio::test]
    async fn test_zero_pauses_return_immediately() {
        let started = std::time::Instant::now();
        pause(0).await;
        random_pause((0, 0)).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let root = std::env::temp_dir()
            .join(format!("local_news_bot_writable_{}", std::process::id()));
        let nested = root.join("a/b");
        ensure_writable_dir(&nested.to_string_lossy()).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
        std::fs::remove_dir_all(&root).unwrap();
    }
}
