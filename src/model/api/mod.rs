//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Field names are camelCase.

pub mod candidate;
pub mod election;
pub mod id;
pub mod image;
pub mod voter;

/// Trim a submitted text field, treating blank input as missing.
pub fn required_text(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_missing() {
        assert_eq!(required_text(None), None);
        assert_eq!(required_text(Some("   ".to_string())), None);
        assert_eq!(
            required_text(Some("  Board election ".to_string())),
            Some("Board election".to_string())
        );
    }
}
