//! Diagnostics collected during translation
//!
//! Warnings never unwind the traversal: the offending construct is omitted
//! from the output and a mark is recorded here (and logged through `log`).
//! Consistency corrections, such as reusing a movement title as a missing
//! work title, are recorded with `Info` severity.

use serde::{Deserialize, Serialize};

/// Severity level for diagnostic marks
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Warning,
    Info,
}

/// A non-fatal issue found at a specific input location
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiagnosticMark {
    /// Input line number of the element (0 when unknown)
    pub line: u32,
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// Kind identifier (e.g., "unknown_clef_sign", "title_correction")
    pub kind: String,
    /// Element the mark is about (e.g., "clef")
    pub element: String,
    /// Measure number where the element appears (if in measure context)
    pub measure_number: Option<String>,
    /// Part ID where the element appears (if in part context)
    pub part_id: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl DiagnosticMark {
    /// Create a new warning mark
    pub fn warning(
        line: u32,
        kind: impl Into<String>,
        element: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            severity: DiagnosticSeverity::Warning,
            kind: kind.into(),
            element: element.into(),
            measure_number: None,
            part_id: None,
            message: message.into(),
        }
    }

    /// Create a new informational mark
    pub fn info(
        line: u32,
        kind: impl Into<String>,
        element: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: DiagnosticSeverity::Info,
            ..Self::warning(line, kind, element, message)
        }
    }

    /// Attach measure/part context
    pub fn in_context(mut self, part_id: Option<&str>, measure_number: Option<&str>) -> Self {
        self.part_id = part_id.map(str::to_string);
        self.measure_number = measure_number.map(str::to_string);
        self
    }
}

/// Collection of diagnostic marks for one translation pass
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Diagnostics {
    /// All diagnostic marks, in detection order
    pub marks: Vec<DiagnosticMark>,
}

impl Diagnostics {
    /// Create empty diagnostics
    pub fn new() -> Self {
        Self { marks: Vec::new() }
    }

    /// Record a mark, logging it at the matching level
    pub fn add(&mut self, mark: DiagnosticMark) {
        match mark.severity {
            DiagnosticSeverity::Warning => {
                log::warn!("{}, line {}: {}", mark.element, mark.line, mark.message)
            }
            DiagnosticSeverity::Info => {
                log::info!("{}, line {}: {}", mark.element, mark.line, mark.message)
            }
        }
        self.marks.push(mark);
    }

    /// Shorthand for recording a warning
    pub fn warn(&mut self, line: u32, kind: &str, element: &str, message: impl Into<String>) {
        self.add(DiagnosticMark::warning(line, kind, element, message));
    }

    /// Merge another pass's diagnostics into this one
    pub fn extend(&mut self, other: Diagnostics) {
        self.marks.extend(other.marks);
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticMark> {
        self.marks
            .iter()
            .filter(|m| m.severity == DiagnosticSeverity::Warning)
    }

    /// Whether any mark of the given kind was recorded
    pub fn has_kind(&self, kind: &str) -> bool {
        self.marks.iter().any(|m| m.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_and_info_are_separated() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(12, "unknown_clef_sign", "clef", "unknown clef sign \"X\"");
        diagnostics.add(DiagnosticMark::info(1, "title_correction", "work-title", "moved"));

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.warnings().count(), 1, "only one warning expected");
        assert!(diagnostics.has_kind("title_correction"));
        assert!(!diagnostics.has_kind("missing"));
    }

    #[test]
    fn test_mark_context() {
        let mark = DiagnosticMark::warning(3, "k", "note", "m").in_context(Some("P1"), Some("4"));
        assert_eq!(mark.part_id.as_deref(), Some("P1"));
        assert_eq!(mark.measure_number.as_deref(), Some("4"));
    }
}
