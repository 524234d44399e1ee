//! Progress indicators for long-running downloads
//!
//! Thin wrappers over indicatif so the fetcher does not deal with templates.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Style presets for acquisition progress indicators
pub struct ProgressStyles;

impl ProgressStyles {
    /// Style for download operations
    pub fn download() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) ETA: {eta} {msg}",
        )
        .unwrap()
        .progress_chars("█▓▒░  ")
    }

    /// Style for indeterminate operations (spinner only)
    pub fn spinner() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }
}

/// Create a byte-based download bar
pub fn download_bar(total_bytes: u64) -> ProgressBar {
    let bar = ProgressBar::new(total_bytes);
    bar.set_style(ProgressStyles::download());
    bar
}

/// Create a spinner with a message
pub fn spinner(msg: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyles::spinner());
    bar.set_message(msg.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_bar_length() {
        let bar = download_bar(1024);
        assert_eq!(bar.length(), Some(1024));
    }
}
