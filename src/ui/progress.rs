use crate::session::{ProgressSnapshot, Session, SessionStatus};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

const BAR_SCALE: u64 = 1000;

/// Live bar for one session, fed from registry snapshots
pub struct SessionProgressView {
    bar: ProgressBar,
}

impl SessionProgressView {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(BAR_SCALE);
        bar.set_style(
            ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(label.to_string());
        bar.set_message("starting");
        Self { bar }
    }

    pub fn update(&self, session: &Session) {
        match session.status() {
            SessionStatus::Starting => self.bar.set_message("starting"),
            SessionStatus::Downloading => {
                if let Some(progress) = session.progress() {
                    self.bar
                        .set_position((progress.percentage * 10.0).round() as u64);
                    self.bar.set_message(progress_line(progress));
                }
            }
            SessionStatus::Completed => {
                self.bar.set_position(BAR_SCALE);
                let name = session.result_filename().unwrap_or_default();
                self.bar
                    .finish_with_message(format!("{} {}", style("done").green(), name));
            }
            SessionStatus::Error => {
                let message = session.error_message().unwrap_or_default();
                self.bar
                    .abandon_with_message(format!("{} {}", style("failed").red(), message));
            }
        }
    }

    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }
}

/// `42.5% · 4.2 MB / 10.0 MB · 9.1 Mbps · ETA 0m 6s`, skipping empty fields
pub fn progress_line(progress: &ProgressSnapshot) -> String {
    let mut parts = vec![format!("{:.1}%", progress.percentage)];
    if !progress.downloaded.is_empty() || !progress.total.is_empty() {
        parts.push(format!("{} / {}", progress.downloaded, progress.total));
    }
    if !progress.speed.is_empty() {
        parts.push(progress.speed.clone());
    }
    if !progress.eta.is_empty() {
        parts.push(format!("ETA {}", progress.eta));
    }
    parts.join(" · ")
}
