//! Measure-level attributes and markers
//!
//! Clefs, keys, times and transpositions, barlines and bar checks, tempo and
//! rehearsal marks, and system/page breaks. None of them has a duration.

use crate::msr::basics::{rational, zero, NoteType, Placement, Position, Rational};
use serde::{Deserialize, Serialize};

// ============================================================================
// CLEF
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clef {
    /// `G`, `F`, `C`, `percussion`, `TAB`, `jianpu`, `none`
    pub sign: String,
    /// Staff line of the clef, 0 when not specified
    pub line: i32,
    pub octave_change: i32,
    pub staff_number: i32,
    pub input_line: u32,
}

impl Clef {
    pub fn treble(input_line: u32) -> Self {
        Self {
            sign: "G".to_string(),
            line: 2,
            octave_change: 0,
            staff_number: 1,
            input_line,
        }
    }
}

// ============================================================================
// KEY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMode {
    #[default]
    Major,
    Minor,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
    None,
}

impl KeyMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "" | "major" => Some(KeyMode::Major),
            "minor" => Some(KeyMode::Minor),
            "ionian" => Some(KeyMode::Ionian),
            "dorian" => Some(KeyMode::Dorian),
            "phrygian" => Some(KeyMode::Phrygian),
            "lydian" => Some(KeyMode::Lydian),
            "mixolydian" => Some(KeyMode::Mixolydian),
            "aeolian" => Some(KeyMode::Aeolian),
            "locrian" => Some(KeyMode::Locrian),
            "none" => Some(KeyMode::None),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
            KeyMode::Ionian => "ionian",
            KeyMode::Dorian => "dorian",
            KeyMode::Phrygian => "phrygian",
            KeyMode::Lydian => "lydian",
            KeyMode::Mixolydian => "mixolydian",
            KeyMode::Aeolian => "aeolian",
            KeyMode::Locrian => "locrian",
            KeyMode::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// Circle-of-fifths position, -7..=7
    pub fifths: i32,
    pub mode: KeyMode,
    pub cancel: Option<i32>,
    pub staff_number: Option<i32>,
    pub input_line: u32,
}

impl Key {
    /// Tonic of the key as (step, alteration), step 0 = C
    pub fn tonic(&self) -> (u8, i8) {
        // major tonics around the circle of fifths, from 11 flats to 12 sharps
        const TONICS: [(u8, i8); 24] = [
            (5, -2), (2, -2), (6, -2), (3, -1),
            (0, -1), (4, -1), (1, -1), (5, -1), (2, -1), (6, -1), (3, 0),
            (0, 0),
            (4, 0), (1, 0), (5, 0), (2, 0), (6, 0), (3, 1), (0, 1),
            (4, 1), (1, 1), (5, 1), (2, 1), (6, 1),
        ];
        // distance from the relative major on the circle of fifths
        let offset = match self.mode {
            KeyMode::Major | KeyMode::Ionian | KeyMode::None => 0,
            KeyMode::Lydian => -1,
            KeyMode::Mixolydian => 1,
            KeyMode::Dorian => 2,
            KeyMode::Minor | KeyMode::Aeolian => 3,
            KeyMode::Phrygian => 4,
            KeyMode::Locrian => 5,
        };
        let index = (self.fifths.clamp(-7, 7) + offset + 11) as usize;
        TONICS[index.min(TONICS.len() - 1)]
    }
}

// ============================================================================
// TIME
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSymbol {
    #[default]
    Normal,
    Common,
    Cut,
    SingleNumber,
    Note,
    DottedNote,
}

impl TimeSymbol {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "common" => TimeSymbol::Common,
            "cut" => TimeSymbol::Cut,
            "single-number" => TimeSymbol::SingleNumber,
            "note" => TimeSymbol::Note,
            "dotted-note" => TimeSymbol::DottedNote,
            _ => TimeSymbol::Normal,
        }
    }
}

/// One `<beats>`/`<beat-type>` pair; beats may be additive (`3+2`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeItem {
    pub beats: String,
    pub beat_type: String,
}

impl TimeItem {
    pub fn new(beats: &str, beat_type: &str) -> Self {
        Self {
            beats: beats.trim().to_string(),
            beat_type: beat_type.trim().to_string(),
        }
    }

    /// Length of this item in whole notes, `None` if not numeric
    pub fn whole_notes(&self) -> Option<Rational> {
        let mut beats = 0;
        for term in self.beats.split('+') {
            beats += term.trim().parse::<i32>().ok()?;
        }
        let beat_type = self.beat_type.parse::<i32>().ok()?;
        rational(beats, beat_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Time {
    pub items: Vec<TimeItem>,
    pub symbol: TimeSymbol,
    pub senza_misura: bool,
    pub print_object: bool,
    pub staff_number: Option<i32>,
    pub input_line: u32,
}

impl Time {
    pub fn new(beats: &str, beat_type: &str, input_line: u32) -> Self {
        Self {
            items: vec![TimeItem::new(beats, beat_type)],
            symbol: TimeSymbol::Normal,
            senza_misura: false,
            print_object: true,
            staff_number: None,
            input_line,
        }
    }

    /// Full measure length: the sum of all items, 4/4 for a bare common
    /// symbol and 2/2 for a bare cut symbol
    pub fn whole_notes(&self) -> Option<Rational> {
        if self.items.is_empty() {
            return match self.symbol {
                TimeSymbol::Common | TimeSymbol::Cut => Some(Rational::from_integer(1)),
                _ => None,
            };
        }
        let mut total = zero();
        for item in &self.items {
            total += item.whole_notes()?;
        }
        Some(total)
    }

    pub fn is_common(&self) -> bool {
        self.symbol == TimeSymbol::Common && self.single_item_is("4", "4")
    }

    pub fn is_cut(&self) -> bool {
        self.symbol == TimeSymbol::Cut && self.single_item_is("2", "2")
    }

    fn single_item_is(&self, beats: &str, beat_type: &str) -> bool {
        match self.items.as_slice() {
            [] => true,
            [item] => item.beats == beats && item.beat_type == beat_type,
            _ => false,
        }
    }
}

// ============================================================================
// TRANSPOSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transpose {
    pub diatonic: i32,
    pub chromatic: i32,
    pub octave_change: i32,
    pub double: bool,
    pub input_line: u32,
}

// ============================================================================
// BARLINES
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarlineLocation {
    Left,
    #[default]
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarlineStyle {
    None,
    #[default]
    Regular,
    Dotted,
    Dashed,
    Heavy,
    LightLight,
    LightHeavy,
    HeavyLight,
    HeavyHeavy,
    Tick,
    Short,
}

impl BarlineStyle {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "none" => Some(BarlineStyle::None),
            "regular" => Some(BarlineStyle::Regular),
            "dotted" => Some(BarlineStyle::Dotted),
            "dashed" => Some(BarlineStyle::Dashed),
            "heavy" => Some(BarlineStyle::Heavy),
            "light-light" => Some(BarlineStyle::LightLight),
            "light-heavy" => Some(BarlineStyle::LightHeavy),
            "heavy-light" => Some(BarlineStyle::HeavyLight),
            "heavy-heavy" => Some(BarlineStyle::HeavyHeavy),
            "tick" => Some(BarlineStyle::Tick),
            "short" => Some(BarlineStyle::Short),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatDirection {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarlineRepeat {
    pub direction: RepeatDirection,
    pub times: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndingType {
    Start,
    Stop,
    Discontinue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarlineEnding {
    /// Ending numbers as written, e.g. `1` or `1, 2`
    pub number: String,
    pub ending_type: EndingType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barline {
    pub location: BarlineLocation,
    pub style: BarlineStyle,
    pub repeat: Option<BarlineRepeat>,
    pub ending: Option<BarlineEnding>,
    pub segno: bool,
    pub coda: bool,
    pub input_line: u32,
}

impl Barline {
    pub fn is_repeat_start(&self) -> bool {
        matches!(&self.repeat, Some(r) if r.direction == RepeatDirection::Forward)
    }

    pub fn is_repeat_end(&self) -> bool {
        matches!(&self.repeat, Some(r) if r.direction == RepeatDirection::Backward)
    }

    /// Barline that only exists to carry repeat or ending information
    pub fn is_structural_only(&self) -> bool {
        (self.repeat.is_some() || self.ending.is_some())
            && matches!(
                self.style,
                BarlineStyle::Regular | BarlineStyle::LightHeavy | BarlineStyle::HeavyLight
            )
    }
}

// ============================================================================
// CHECKS, BREAKS AND MARKERS
// ============================================================================

/// Bar check at the end of a measure; the next measure number is only known
/// once that measure starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarCheck {
    pub next_bar_number: Option<String>,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarNumberCheck {
    pub number: String,
    pub input_line: u32,
}

/// The following notes of this voice are written on another staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceStaffChange {
    pub staff_number: i32,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub beat_unit: Option<NoteType>,
    pub dots: u8,
    pub per_minute: Option<String>,
    pub words: Option<String>,
    pub placement: Placement,
    pub position: Position,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rehearsal {
    pub text: String,
    pub placement: Placement,
    pub position: Position,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segno {
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coda {
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineBreak {
    pub next_bar_number: String,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBreak {
    pub input_line: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_whole_notes() {
        let three_four = Time::new("3", "4", 1);
        assert_eq!(three_four.whole_notes(), Some(Rational::new(3, 4)));

        let composite = Time {
            items: vec![TimeItem::new("3", "8"), TimeItem::new("2", "8")],
            ..Time::new("3", "8", 1)
        };
        assert_eq!(composite.whole_notes(), Some(Rational::new(5, 8)));

        let additive = Time::new("3+2", "8", 1);
        assert_eq!(additive.whole_notes(), Some(Rational::new(5, 8)));

        let bad = Time::new("3", "0", 1);
        assert_eq!(bad.whole_notes(), None, "zero beat type must not panic");
    }

    #[test]
    fn test_common_and_cut() {
        let common = Time {
            symbol: TimeSymbol::Common,
            ..Time::new("4", "4", 1)
        };
        assert!(common.is_common());
        assert!(!common.is_cut());

        let bare_cut = Time {
            items: vec![],
            symbol: TimeSymbol::Cut,
            ..Time::new("2", "2", 1)
        };
        assert!(bare_cut.is_cut());
        assert_eq!(bare_cut.whole_notes(), Some(Rational::from_integer(1)));
    }

    #[test]
    fn test_key_tonic() {
        let key = Key {
            fifths: -3,
            mode: KeyMode::Minor,
            cancel: None,
            staff_number: None,
            input_line: 1,
        };
        assert_eq!(key.tonic(), (0, 0), "three flats minor is c minor");
        let d_major = Key { fifths: 2, mode: KeyMode::Major, ..key };
        assert_eq!(d_major.tonic(), (1, 0));
    }
}
