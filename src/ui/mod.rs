mod output;
mod progress;

pub use output::{describe_metadata, format_duration, spinner, spinner_error, spinner_success};
pub use progress::{progress_line, SessionProgressView};
