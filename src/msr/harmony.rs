//! Chord symbols and figured bass

use crate::msr::basics::Rational;
use serde::{Deserialize, Serialize};

// ============================================================================
// HARMONY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmonyKind {
    Major,
    Minor,
    Augmented,
    Diminished,
    Dominant,
    MajorSeventh,
    MinorSeventh,
    DiminishedSeventh,
    AugmentedSeventh,
    HalfDiminished,
    MajorMinor,
    MajorSixth,
    MinorSixth,
    DominantNinth,
    MajorNinth,
    MinorNinth,
    DominantEleventh,
    MajorEleventh,
    MinorEleventh,
    DominantThirteenth,
    MajorThirteenth,
    MinorThirteenth,
    SuspendedSecond,
    SuspendedFourth,
    Neapolitan,
    Italian,
    French,
    German,
    Pedal,
    Power,
    Tristan,
    Other,
    None,
}

impl HarmonyKind {
    pub fn from_name(name: &str) -> Option<Self> {
        use HarmonyKind::*;

        Some(match name.trim() {
            "major" => Major,
            "minor" => Minor,
            "augmented" => Augmented,
            "diminished" => Diminished,
            "dominant" => Dominant,
            "major-seventh" => MajorSeventh,
            "minor-seventh" => MinorSeventh,
            "diminished-seventh" => DiminishedSeventh,
            "augmented-seventh" => AugmentedSeventh,
            "half-diminished" => HalfDiminished,
            "major-minor" => MajorMinor,
            "major-sixth" => MajorSixth,
            "minor-sixth" => MinorSixth,
            "dominant-ninth" => DominantNinth,
            "major-ninth" => MajorNinth,
            "minor-ninth" => MinorNinth,
            "dominant-11th" => DominantEleventh,
            "major-11th" => MajorEleventh,
            "minor-11th" => MinorEleventh,
            "dominant-13th" => DominantThirteenth,
            "major-13th" => MajorThirteenth,
            "minor-13th" => MinorThirteenth,
            "suspended-second" => SuspendedSecond,
            "suspended-fourth" => SuspendedFourth,
            "Neapolitan" => Neapolitan,
            "Italian" => Italian,
            "French" => French,
            "German" => German,
            "pedal" => Pedal,
            "power" => Power,
            "Tristan" => Tristan,
            "other" => Other,
            "none" => None,
            _ => return Option::None,
        })
    }

    /// LilyPond chord-mode modifier (without the leading `:`)
    pub fn chord_mode_suffix(&self) -> &'static str {
        use HarmonyKind::*;

        match self {
            Major | Other | None => "",
            Minor => "m",
            Augmented => "aug",
            Diminished => "dim",
            Dominant => "7",
            MajorSeventh => "maj7",
            MinorSeventh => "m7",
            DiminishedSeventh => "dim7",
            AugmentedSeventh => "aug7",
            HalfDiminished => "m7.5-",
            MajorMinor => "m7+",
            MajorSixth => "6",
            MinorSixth => "m6",
            DominantNinth => "9",
            MajorNinth => "maj9",
            MinorNinth => "m9",
            DominantEleventh => "11",
            MajorEleventh => "maj11",
            MinorEleventh => "m11",
            DominantThirteenth => "13",
            MajorThirteenth => "maj13",
            MinorThirteenth => "m13",
            SuspendedSecond => "sus2",
            SuspendedFourth => "sus4",
            Neapolitan | Italian | French | German | Tristan => "",
            Pedal => "",
            Power => "5",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegreeType {
    Add,
    Alter,
    Subtract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonyDegree {
    pub value: i32,
    pub alteration: i8,
    pub degree_type: DegreeType,
    pub input_line: u32,
}

/// Chord symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harmony {
    /// Root as (step, alteration), step 0 = C
    pub root: (u8, i8),
    pub kind: HarmonyKind,
    /// Text to display instead of the kind, as written
    pub kind_text: String,
    pub inversion: i32,
    pub bass: Option<(u8, i8)>,
    pub degrees: Vec<HarmonyDegree>,
    /// Sounding duration, taken from the note it is attached to
    pub duration: Rational,
    pub staff_number: i32,
    pub input_line: u32,
}

impl Harmony {
    /// Same chord symbol without its degrees
    pub fn newborn_clone(&self) -> Harmony {
        Harmony {
            degrees: Vec::new(),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> Harmony {
        self.clone()
    }

    pub fn append_degree(&mut self, degree: HarmonyDegree) {
        self.degrees.push(degree);
    }
}

// ============================================================================
// FIGURED BASS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    /// `sharp`, `flat`, `natural`, `slash`, ...
    pub prefix: Option<String>,
    pub number: Option<i32>,
    pub suffix: Option<String>,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiguredBass {
    pub figures: Vec<Figure>,
    pub parenthesized: bool,
    pub duration: Rational,
    pub input_line: u32,
}

impl FiguredBass {
    pub fn newborn_clone(&self) -> FiguredBass {
        FiguredBass {
            figures: Vec::new(),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> FiguredBass {
        self.clone()
    }

    pub fn append_figure(&mut self, figure: Figure) {
        self.figures.push(figure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seventh_with_ninth() -> Harmony {
        Harmony {
            root: (4, 0),
            kind: HarmonyKind::Dominant,
            kind_text: String::new(),
            inversion: 0,
            bass: None,
            degrees: vec![HarmonyDegree {
                value: 9,
                alteration: -1,
                degree_type: DegreeType::Add,
                input_line: 12,
            }],
            duration: Rational::new(1, 2),
            staff_number: 1,
            input_line: 10,
        }
    }

    #[test]
    fn test_newborn_clone_drops_degrees() {
        let harmony = seventh_with_ninth();
        let newborn = harmony.newborn_clone();
        assert!(newborn.degrees.is_empty());
        assert_eq!(newborn.kind, HarmonyKind::Dominant);
        assert_eq!(newborn.duration, Rational::new(1, 2));
        assert_eq!(harmony.deep_copy().degrees.len(), 1, "deep copy keeps degrees");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(HarmonyKind::from_name("dominant-11th"), Some(HarmonyKind::DominantEleventh));
        assert_eq!(HarmonyKind::from_name("bogus"), None);
        assert_eq!(HarmonyKind::MinorSeventh.chord_mode_suffix(), "m7");
    }
}
