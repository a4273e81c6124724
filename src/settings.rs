//! Translation settings
//!
//! The options layer proper (command line parsing, help, option groups) lives
//! outside this crate. What reaches the translators is this small set of
//! already-resolved values, passed explicitly into each translator.

use crate::errors::ParseError;
use crate::msr::Rational;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// TOP-LEVEL SETTINGS
// ============================================================================

/// Settings for every target pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub guido: GuidoSettings,
    pub lpsr: LpsrSettings,
}

impl TranslationSettings {
    /// Load settings from a JSON document; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(|e| ParseError::InvalidSettings(e.to_string()))
    }

    /// Load settings from a YAML document; missing keys keep their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self, ParseError> {
        serde_yaml::from_str(yaml).map_err(|e| ParseError::InvalidSettings(e.to_string()))
    }

    /// Load settings from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ParseError::InvalidSettings(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(ParseError::InvalidSettings(format!(
                "unsupported settings file extension {:?}",
                other
            ))),
        }
    }
}

// ============================================================================
// GUIDO
// ============================================================================

/// Options for the Guido pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidoSettings {
    /// Emit `(* meas. N *)` comments at measure starts
    pub generate_comments: bool,

    /// Emit explicit stem direction tags
    pub generate_stem: bool,

    /// Emit explicit `\bar` tags (and switch automatic bar lines off)
    pub generate_bars: bool,

    /// Emit dx/dy position hints
    pub generate_positions: bool,

    /// Restrict output to part `P{N}`
    pub part_filter: Option<u32>,

    /// First measure to emit (1-based, 0 or 1 = from the start)
    pub begin_measure: u32,

    /// Offset into the begin measure, in quarter-note beats
    pub begin_measure_beat_offset: Rational,

    /// Last measure to emit (0 = until the end)
    pub end_measure: u32,

    /// Offset into the end measure after which events are dropped, in
    /// quarter-note beats (0 = whole measure)
    pub end_measure_beat_offset: Rational,
}

impl Default for GuidoSettings {
    fn default() -> Self {
        Self {
            generate_comments: false,
            generate_stem: false,
            generate_bars: false,
            generate_positions: true,
            part_filter: None,
            begin_measure: 0,
            begin_measure_beat_offset: Rational::from_integer(0),
            end_measure: 0,
            end_measure_beat_offset: Rational::from_integer(0),
        }
    }
}

// ============================================================================
// LPSR
// ============================================================================

/// Options for the LPSR pass and its printer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LpsrSettings {
    /// Value of the `\version` assoc
    pub lilypond_version: String,

    /// Note name language
    pub language: PitchLanguage,

    /// Default global staff size; a score whose scaling yields this value
    /// gets the assoc commented out
    pub global_staff_size: f32,

    /// Add a skip grace notes group ahead of sibling voices when a voice
    /// starts with grace notes
    pub skip_grace_notes_workaround: bool,

    /// Duplicate note-attached lyrics as words above the note
    pub add_words_from_lyrics: bool,

    /// Emit bar checks at measure ends
    pub generate_bar_checks: bool,

    pub rights: Option<String>,
    pub composer: Option<String>,
    pub arranger: Option<String>,
    pub poet: Option<String>,
    pub lyricist: Option<String>,
    pub software: Option<String>,
}

impl Default for LpsrSettings {
    fn default() -> Self {
        Self {
            lilypond_version: "2.19".to_string(),
            language: PitchLanguage::Nederlands,
            global_staff_size: 20.0,
            skip_grace_notes_workaround: true,
            add_words_from_lyrics: false,
            generate_bar_checks: true,
            rights: None,
            composer: None,
            arranger: None,
            poet: None,
            lyricist: None,
            software: None,
        }
    }
}

/// Note naming language for LilyPond output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchLanguage {
    /// Dutch: c d e f g a b (cis/ees for sharps/flats) - LilyPond default
    Nederlands,

    /// English: c d e f g a b (cs/ef for sharps/flats)
    English,

    /// German: c d e f g a h (cis/es for sharps/flats)
    Deutsch,

    /// Italian: do re mi fa sol la si (dod/mib for sharps/flats)
    Italiano,
}

impl PitchLanguage {
    /// Name used in the `\language` command
    pub fn lilypond_name(&self) -> &'static str {
        match self {
            PitchLanguage::Nederlands => "nederlands",
            PitchLanguage::English => "english",
            PitchLanguage::Deutsch => "deutsch",
            PitchLanguage::Italiano => "italiano",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = TranslationSettings::default();
        assert!(settings.guido.generate_positions);
        assert!(!settings.guido.generate_bars);
        assert_eq!(settings.guido.part_filter, None);
        assert_eq!(settings.lpsr.lilypond_version, "2.19");
        assert!(settings.lpsr.skip_grace_notes_workaround);
    }

    #[test]
    fn test_from_json_partial() {
        let settings = TranslationSettings::from_json(
            r#"{ "guido": { "generate_bars": true, "part_filter": 2 }, "lpsr": { "language": "english" } }"#,
        )
        .unwrap();

        assert!(settings.guido.generate_bars);
        assert_eq!(settings.guido.part_filter, Some(2));
        assert!(settings.guido.generate_positions, "unspecified keys keep defaults");
        assert_eq!(settings.lpsr.language, PitchLanguage::English);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = TranslationSettings::from_json("{ guido: ").unwrap_err();
        assert!(matches!(err, ParseError::InvalidSettings(_)));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "guido:\n  generate_comments: true\nlpsr:\n  composer: Someone").unwrap();

        let settings = TranslationSettings::from_file(file.path()).unwrap();
        assert!(settings.guido.generate_comments);
        assert_eq!(settings.lpsr.composer.as_deref(), Some("Someone"));
    }
}
