//! Lyrics: stanzas and syllables
//!
//! A syllable is stored twice: in the stanza of its voice (with skips filling
//! the gaps so that stanzas stay aligned with the notes) and on the note it is
//! sung on.

use crate::msr::basics::{identifier_from, zero, Rational};
use crate::msr::uplinks::VoiceKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyllableKind {
    Single,
    Begin,
    Middle,
    End,
    /// Placeholder for a note without a syllable in this stanza
    Skip,
    /// Marks a measure boundary inside a stanza
    MeasureEnd,
}

impl SyllableKind {
    pub fn from_syllabic(syllabic: &str) -> Option<Self> {
        match syllabic.trim() {
            "" | "single" => Some(SyllableKind::Single),
            "begin" => Some(SyllableKind::Begin),
            "middle" => Some(SyllableKind::Middle),
            "end" => Some(SyllableKind::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendKind {
    #[default]
    None,
    /// `<extend/>` without a type
    Standalone,
    Start,
    Continue,
    Stop,
}

impl ExtendKind {
    pub fn from_type(extend_type: Option<&str>) -> Self {
        match extend_type {
            None | Some("") => ExtendKind::Standalone,
            Some("start") => ExtendKind::Start,
            Some("continue") => ExtendKind::Continue,
            Some("stop") => ExtendKind::Stop,
            Some(_) => ExtendKind::Standalone,
        }
    }

    /// Whether the syllable opens or continues a melisma line
    pub fn is_ongoing(&self) -> bool {
        matches!(
            self,
            ExtendKind::Standalone | ExtendKind::Start | ExtendKind::Continue
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syllable {
    pub kind: SyllableKind,
    pub texts: Vec<String>,
    pub extend: ExtendKind,
    /// Duration of the note the syllable is sung on
    pub duration: Rational,
    /// Ordinal of that note, if any
    pub note_ordinal: Option<u32>,
    pub stanza_number: String,
    pub input_line: u32,
}

impl Syllable {
    pub fn skip(stanza_number: &str, duration: Rational, input_line: u32) -> Self {
        Self {
            kind: SyllableKind::Skip,
            texts: Vec::new(),
            extend: ExtendKind::None,
            duration,
            note_ordinal: None,
            stanza_number: stanza_number.to_string(),
            input_line,
        }
    }

    pub fn measure_end(stanza_number: &str, input_line: u32) -> Self {
        Self {
            kind: SyllableKind::MeasureEnd,
            ..Self::skip(stanza_number, zero(), input_line)
        }
    }

    /// Texts joined as they are sung (elisions become spaces)
    pub fn text(&self) -> String {
        self.texts.join(" ")
    }

    pub fn newborn_clone(&self) -> Syllable {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stanza {
    pub number: String,
    pub syllables: Vec<Syllable>,
    /// True once a syllable with text has been appended
    pub has_text: bool,
    pub uplink: Option<VoiceKey>,
    pub input_line: u32,
}

impl Stanza {
    pub fn new(number: &str, input_line: u32) -> Self {
        Self {
            number: number.to_string(),
            syllables: Vec::new(),
            has_text: false,
            uplink: None,
            input_line,
        }
    }

    /// LilyPond variable name, derived from the owning voice name
    pub fn name(&self, voice_name: &str) -> String {
        format!("{}_Stanza_{}", voice_name, identifier_from(&self.number))
    }

    pub fn append_syllable(&mut self, syllable: Syllable) {
        if !syllable.texts.is_empty() {
            self.has_text = true;
        }
        self.syllables.push(syllable);
    }

    /// Total duration covered by the stanza's syllables
    pub fn covered_duration(&self) -> Rational {
        self.syllables
            .iter()
            .fold(zero(), |total, s| total + s.duration)
    }

    pub fn newborn_clone(&self, owner: &VoiceKey) -> Stanza {
        Stanza {
            syllables: Vec::new(),
            has_text: false,
            uplink: Some(owner.clone()),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self, owner: &VoiceKey) -> Stanza {
        Stanza {
            uplink: Some(owner.clone()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::uplinks::PartKey;

    #[test]
    fn test_stanza_text_tracking() {
        let mut stanza = Stanza::new("1", 5);
        stanza.append_syllable(Syllable::skip("1", Rational::new(1, 4), 5));
        assert!(!stanza.has_text);

        stanza.append_syllable(Syllable {
            kind: SyllableKind::Begin,
            texts: vec!["Hal".to_string()],
            extend: ExtendKind::None,
            duration: Rational::new(1, 4),
            note_ordinal: Some(2),
            stanza_number: "1".to_string(),
            input_line: 9,
        });
        assert!(stanza.has_text);
        assert_eq!(stanza.covered_duration(), Rational::new(1, 2));
    }

    #[test]
    fn test_stanza_clone_uplink_and_name() {
        let owner = PartKey::new("P1").staff(1).voice(1);
        let mut stanza = Stanza::new("2", 5);
        stanza.append_syllable(Syllable::measure_end("2", 6));

        let newborn = stanza.newborn_clone(&owner);
        assert!(newborn.syllables.is_empty());
        assert_eq!(newborn.uplink.as_ref(), Some(&owner));
        assert_eq!(stanza.deep_copy(&owner).syllables.len(), 1);
        assert_eq!(stanza.name("Voice_One"), "Voice_One_Stanza_Two");
    }

    #[test]
    fn test_extend_kinds() {
        assert_eq!(ExtendKind::from_type(None), ExtendKind::Standalone);
        assert!(ExtendKind::from_type(Some("start")).is_ongoing());
        assert!(!ExtendKind::Stop.is_ongoing());
    }
}
