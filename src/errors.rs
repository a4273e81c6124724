//! Error types for score translation
//!
//! Defines the error hierarchy for translation failures: fatal input errors
//! (ParseError), fatal structural errors detected while building or projecting
//! the score model (Internal), and printer failures (Render).
//!
//! Non-fatal problems are not errors; they are recorded in
//! [`crate::diagnostics::Diagnostics`] and logged through `log::warn!`.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TranslationError>;

/// Top-level translation error type
#[derive(Debug, Clone, Error)]
pub enum TranslationError {
    /// Fatal XML parsing error
    #[error("XML parsing failed: {0}")]
    Parse(#[from] ParseError),

    /// Traversal invariant violated (chord member outside a chord, unmatched
    /// tuplet end, missing uplink, ...). Carries the input line and the
    /// location of the code that detected it.
    #[error("internal error detected at {location}, input line {line}: {message}")]
    Internal {
        line: u32,
        location: &'static str,
        message: String,
    },

    /// Output printer failure
    #[error("rendering failed: {0}")]
    Render(String),
}

impl TranslationError {
    /// Input line of the offending element, if known
    pub fn line(&self) -> Option<u32> {
        match self {
            TranslationError::Internal { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// True for structural errors raised by a translator
    pub fn is_internal(&self) -> bool {
        matches!(self, TranslationError::Internal { .. })
    }
}

impl From<mustache::Error> for TranslationError {
    fn from(err: mustache::Error) -> Self {
        TranslationError::Render(err.to_string())
    }
}

/// Fatal XML parsing errors
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// XML is malformed (not well-formed)
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// MusicXML format not supported (e.g., timewise instead of partwise)
    #[error("Unsupported MusicXML format: {0}")]
    UnsupportedFormat(String),

    /// Required structural element is missing
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),

    /// Settings document could not be read
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Build a [`TranslationError::Internal`] for the given input line,
/// logging it at error level.
///
/// ```ignore
/// return Err(internal_error!(note.line, "note {} found outside of a chord", note.ordinal));
/// ```
#[macro_export]
macro_rules! internal_error {
    ($line:expr, $($arg:tt)+) => {{
        let message = format!($($arg)+);
        let location = concat!(file!(), ":", line!());
        log::error!("{} (input line {}, detected at {})", message, $line, location);
        $crate::errors::TranslationError::Internal {
            line: $line,
            location,
            message,
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_carries_line_and_location() {
        let err = internal_error!(42, "chord member {} outside of a chord", "c4");
        assert_eq!(err.line(), Some(42));
        assert!(err.is_internal());
        match &err {
            TranslationError::Internal { location, message, .. } => {
                assert!(location.contains("errors.rs"), "location should name this file: {}", location);
                assert_eq!(message, "chord member c4 outside of a chord");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("input line 42"));
    }

    #[test]
    fn test_parse_error_converts() {
        let err: TranslationError = ParseError::InvalidXml("eof".to_string()).into();
        assert!(!err.is_internal());
        assert_eq!(err.line(), None);
        assert!(err.to_string().contains("Invalid XML: eof"));
    }
}
