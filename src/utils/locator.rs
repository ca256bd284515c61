use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("Locator is empty")]
    Empty,

    #[error("Not a supported video link: {0}")]
    Unsupported(String),
}

lazy_static! {
    // youtube.com/watch?v=ID, /embed/ID, /v/ID or youtu.be/ID, optional query
    static ref LOCATOR_RE: Regex = Regex::new(
        r"^(?:https?://)?(?:www\.)?(?:youtube\.com/(?:watch\?(?:[^#\s]*&)?v=|embed/|v/)|youtu\.be/)[A-Za-z0-9_-]+(?:[?&#]\S*)?$"
    )
    .unwrap();
}

/// Syntactic check only, never touches the network.
/// Surrounding whitespace is ignored.
pub fn validate_locator(locator: &str) -> Result<(), LocatorError> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(LocatorError::Empty);
    }

    if !LOCATOR_RE.is_match(trimmed) {
        return Err(LocatorError::Unsupported(trimmed.to_string()));
    }

    Ok(())
}

pub fn is_valid_locator(locator: &str) -> bool {
    validate_locator(locator).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_canonical_shapes() {
        assert!(is_valid_locator("https://www.youtube.com/watch?v=abc123"));
        assert!(is_valid_locator("https://youtu.be/abc123"));
        assert!(is_valid_locator("http://youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_valid_locator("youtube.com/embed/dQw4w9WgXcQ"));
        assert!(is_valid_locator("www.youtube.com/v/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_accepts_query_strings() {
        assert!(is_valid_locator("https://www.youtube.com/watch?v=abc123&t=42s"));
        assert!(is_valid_locator("https://www.youtube.com/watch?list=PL1&v=abc123"));
        assert!(is_valid_locator("https://youtu.be/abc123?si=share"));
    }

    #[test]
    fn test_trims_whitespace() {
        assert!(is_valid_locator("  https://youtu.be/abc123\n"));
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate_locator(""), Err(LocatorError::Empty));
        assert_eq!(validate_locator("   "), Err(LocatorError::Empty));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            validate_locator("ftp://youtube.com/watch?v=abc"),
            Err(LocatorError::Unsupported(_))
        ));
        assert!(!is_valid_locator("file:///youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_rejects_other_hosts_and_paths() {
        assert!(!is_valid_locator("https://vimeo.com/12345"));
        assert!(!is_valid_locator("https://notyoutube.com/watch?v=abc"));
        assert!(!is_valid_locator("https://www.youtube.com/"));
        assert!(!is_valid_locator("https://www.youtube.com/watch?list=PL1"));
        assert!(!is_valid_locator("https://youtu.be/"));
    }
}
