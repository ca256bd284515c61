use std::path::{Component, Path};
use thiserror::Error;

/// Reasons an engine-supplied artifact name is refused before touching disk
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Artifact name is empty")]
    Empty,

    #[error("Artifact name contains null byte")]
    NullByte,

    #[error("Artifact name contains directory separator")]
    ContainsDirectorySeparator,

    #[error("Artifact name refers to a parent or current directory")]
    RelativeComponent,
}

/// Artifact names must be a single plain path component
pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    // \0 would truncate the name at the OS boundary
    if filename.contains('\0') {
        return Err(ValidationError::NullByte);
    }

    if filename.contains('/') || filename.contains('\\') {
        return Err(ValidationError::ContainsDirectorySeparator);
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ValidationError::RelativeComponent),
    }
}
