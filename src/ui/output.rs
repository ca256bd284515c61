use crate::session::VideoMetadata;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Indeterminate spinner for waits with no progress signal (connecting, preview)
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

pub fn spinner_success(bar: &ProgressBar, message: &str) {
    bar.finish_with_message(format!("{} {}", style("✔").green(), message));
}

pub fn spinner_error(bar: &ProgressBar, message: &str) {
    bar.finish_with_message(format!("{} {}", style("✖").red(), message));
}

/// `h:mm:ss` above an hour, `m:ss` otherwise
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// `YYYYMMDD` to `YYYY-MM-DD`; anything else is not shown
fn format_upload_date(raw: &str) -> Option<String> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8]))
}

/// Multi-line preview block for `tubedrop info`
pub fn describe_metadata(metadata: &VideoMetadata) -> String {
    let mut lines = vec![style(&metadata.title).bold().to_string()];

    let mut facts = Vec::new();
    if !metadata.uploader.is_empty() {
        facts.push(metadata.uploader.clone());
    }
    if let Some(duration) = metadata.duration {
        facts.push(format_duration(duration));
    }
    if let Some(views) = metadata.view_count {
        facts.push(format!("{} views", views));
    }
    if let Some(date) = format_upload_date(&metadata.upload_date) {
        facts.push(date);
    }
    if !facts.is_empty() {
        lines.push(style(facts.join(" · ")).dim().to_string());
    }

    for format in &metadata.formats {
        let label = match format.height {
            Some(height) => format!("{}p", height),
            None => format.format_note.clone(),
        };
        let size = format
            .filesize
            .map(|bytes| format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0)))
            .unwrap_or_else(|| "size unknown".to_string());
        lines.push(format!("  {:<18} {:<5} {}", label, format.ext, size));
    }

    lines.join("\n")
}
