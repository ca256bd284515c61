pub mod locator;
pub mod security;

pub use locator::{is_valid_locator, validate_locator, LocatorError};
pub use security::{validate_filename, ValidationError};
