//! Frame identification.
//! Frames are plain case-sensitive names, stored inline to avoid allocating on every
//! lookup.

use crate::error::{TransformError, TransformResult};
use arrayvec::ArrayString;

pub const MAX_FRAME_ID_LEN: usize = 64;

/// Frame identifier strings
pub type FrameIdString = ArrayString<MAX_FRAME_ID_LEN>;

/// Checks a user supplied frame name and converts it to its inline form.
///
/// `argument` names the parameter in the error message (`target_frame`, ...).
/// Empty names, names starting with `/`, names containing whitespace or control
/// characters and names longer than [`MAX_FRAME_ID_LEN`] bytes are rejected.
pub fn validate_frame_id(name: &str, argument: &str) -> TransformResult<FrameIdString> {
    if name.is_empty() {
        return Err(TransformError::InvalidArgument(format!(
            "{argument} must not be empty"
        )));
    }
    if name.starts_with('/') {
        return Err(TransformError::InvalidArgument(format!(
            "{argument} '{name}' must not start with a '/'"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(TransformError::InvalidArgument(format!(
            "{argument} '{name}' must not contain whitespace"
        )));
    }
    FrameIdString::from(name).map_err(|_| {
        TransformError::InvalidArgument(format!(
            "{argument} '{name}' is longer than {MAX_FRAME_ID_LEN} bytes"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(validate_frame_id("map", "target_frame").unwrap().as_str(), "map");
        assert_eq!(
            validate_frame_id("base_link/imu", "source_frame").unwrap().as_str(),
            "base_link/imu"
        );
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "/map", "base link", "tab\tframe"] {
            let err = validate_frame_id(name, "target_frame").unwrap_err();
            assert!(err.is_invalid_argument(), "{name:?} should be rejected");
        }
        let long = "x".repeat(MAX_FRAME_ID_LEN + 1);
        assert!(validate_frame_id(&long, "fixed_frame")
            .unwrap_err()
            .is_invalid_argument());
        let exact = "y".repeat(MAX_FRAME_ID_LEN);
        assert!(validate_frame_id(&exact, "fixed_frame").is_ok());
    }

    #[test]
    fn test_error_names_the_argument() {
        let err = validate_frame_id("", "fixed_frame").unwrap_err();
        assert!(err.message().contains("fixed_frame"));
    }
}
