//! Basic value types shared by the score model
//!
//! Durations and positions are exact fractions of a whole note
//! ([`Rational`]); pitches are diatonic step + semitone alteration + octave.

use crate::xml::XmlElement;
use num_rational::Rational32;
use serde::{Deserialize, Serialize};

/// Re-export Rational for duration calculations
pub type Rational = Rational32;

pub fn zero() -> Rational {
    Rational::from_integer(0)
}

pub fn is_zero(value: &Rational) -> bool {
    *value.numer() == 0
}

/// Fraction from a numerator/denominator pair; `None` for a zero denominator
pub fn rational(numer: i32, denom: i32) -> Option<Rational> {
    if denom == 0 {
        None
    } else {
        Some(Rational::new(numer, denom))
    }
}

/// `a + b`, or `None` when adding the fractions would overflow on the way,
/// even if the reduced sum fits
pub fn checked_sum(a: Rational, b: Rational) -> Option<Rational> {
    let (an, ad) = (i64::from(*a.numer()), i64::from(*a.denom()));
    let (bn, bd) = (i64::from(*b.numer()), i64::from(*b.denom()));
    let (numer, denom) = if ad == bd {
        (an + bn, ad)
    } else {
        let lcm = ad / gcd(ad, bd) * bd;
        let lhs = i32::try_from(an * (lcm / ad)).ok()?;
        let rhs = i32::try_from(bn * (lcm / bd)).ok()?;
        (i64::from(lhs) + i64::from(rhs), lcm)
    };
    Some(Rational::new(
        i32::try_from(numer).ok()?,
        i32::try_from(denom).ok()?,
    ))
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

/// Dotted length: base * (2 - 1/2^dots)
pub fn dotted(base: Rational, dots: u8) -> Rational {
    let mut total = base;
    let mut increment = base;
    for _ in 0..dots {
        increment /= 2;
        total += increment;
    }
    total
}

// ============================================================================
// PITCH
// ============================================================================

/// Musical pitch representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    /// Scale degree (0=C, 1=D, 2=E, 3=F, 4=G, 5=A, 6=B)
    pub step: u8,

    /// Accidental in semitones (-2=double flat ... +2=double sharp)
    pub alteration: i8,

    /// Octave number (4 = middle C octave)
    pub octave: i8,
}

impl Pitch {
    /// Create a new pitch with validation
    pub fn new(step: u8, alteration: i8, octave: i8) -> Result<Self, String> {
        if step > 6 {
            return Err(format!("Invalid step: {} (must be 0-6)", step));
        }
        if !(-2..=2).contains(&alteration) {
            return Err(format!(
                "Invalid alteration: {} (must be -2 to +2)",
                alteration
            ));
        }
        if !(-1..=9).contains(&octave) {
            return Err(format!("Invalid octave: {} (must be -1 to 9)", octave));
        }
        Ok(Self {
            step,
            alteration,
            octave,
        })
    }

    /// Parse a MusicXML step letter
    pub fn step_from_letter(letter: &str) -> Option<u8> {
        match letter.trim() {
            "C" => Some(0),
            "D" => Some(1),
            "E" => Some(2),
            "F" => Some(3),
            "G" => Some(4),
            "A" => Some(5),
            "B" => Some(6),
            _ => None,
        }
    }

    /// Lowercase step letter
    pub fn letter(&self) -> char {
        ['c', 'd', 'e', 'f', 'g', 'a', 'b'][self.step as usize % 7]
    }
}

// ============================================================================
// GRAPHIC NOTE TYPES
// ============================================================================

/// Graphic note type (`<type>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteType {
    Maxima,
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    N16th,
    N32nd,
    N64th,
    N128th,
    N256th,
}

impl NoteType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "maxima" => Some(NoteType::Maxima),
            "long" => Some(NoteType::Long),
            "breve" => Some(NoteType::Breve),
            "whole" => Some(NoteType::Whole),
            "half" => Some(NoteType::Half),
            "quarter" => Some(NoteType::Quarter),
            "eighth" => Some(NoteType::Eighth),
            "16th" => Some(NoteType::N16th),
            "32nd" => Some(NoteType::N32nd),
            "64th" => Some(NoteType::N64th),
            "128th" => Some(NoteType::N128th),
            "256th" => Some(NoteType::N256th),
            _ => None,
        }
    }

    /// Undotted length in whole notes
    pub fn whole_notes(&self) -> Rational {
        match self {
            NoteType::Maxima => Rational::from_integer(8),
            NoteType::Long => Rational::from_integer(4),
            NoteType::Breve => Rational::from_integer(2),
            NoteType::Whole => Rational::from_integer(1),
            NoteType::Half => Rational::new(1, 2),
            NoteType::Quarter => Rational::new(1, 4),
            NoteType::Eighth => Rational::new(1, 8),
            NoteType::N16th => Rational::new(1, 16),
            NoteType::N32nd => Rational::new(1, 32),
            NoteType::N64th => Rational::new(1, 64),
            NoteType::N128th => Rational::new(1, 128),
            NoteType::N256th => Rational::new(1, 256),
        }
    }

    /// Find the type (and dots) matching a length, if any
    pub fn from_whole_notes(length: Rational) -> Option<(NoteType, u8)> {
        const ALL: [NoteType; 12] = [
            NoteType::Maxima,
            NoteType::Long,
            NoteType::Breve,
            NoteType::Whole,
            NoteType::Half,
            NoteType::Quarter,
            NoteType::Eighth,
            NoteType::N16th,
            NoteType::N32nd,
            NoteType::N64th,
            NoteType::N128th,
            NoteType::N256th,
        ];
        for dots in 0..3u8 {
            for note_type in ALL {
                if dotted(note_type.whole_notes(), dots) == length {
                    return Some((note_type, dots));
                }
            }
        }
        None
    }
}

// ============================================================================
// PLACEMENT AND POSITION
// ============================================================================

/// `placement` attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    #[default]
    None,
    Above,
    Below,
}

impl Placement {
    pub fn from_element(elt: &XmlElement) -> Self {
        match elt.attribute_value("placement") {
            "above" => Placement::Above,
            "below" => Placement::Below,
            _ => Placement::None,
        }
    }
}

/// Layout offsets in tenths, as found in the source (0 when absent)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub default_x: f32,
    pub default_y: f32,
    pub relative_x: f32,
    pub relative_y: f32,
}

impl Position {
    pub fn from_element(elt: &XmlElement) -> Self {
        Self {
            default_x: elt.attribute_float("default-x", 0.0),
            default_y: elt.attribute_float("default-y", 0.0),
            relative_x: elt.attribute_float("relative-x", 0.0),
            relative_y: elt.attribute_float("relative-y", 0.0),
        }
    }

    pub fn x(&self) -> f32 {
        self.default_x + self.relative_x
    }

    pub fn y(&self) -> f32 {
        self.default_y + self.relative_y
    }
}

// ============================================================================
// NAMES
// ============================================================================

/// English word for a small integer, capitalized ("One", "Twelve", ...)
pub fn int_to_english_word(n: i64) -> String {
    const UNITS: [&str; 20] = [
        "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
        "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen",
        "Eighteen", "Nineteen",
    ];
    const TENS: [&str; 10] = [
        "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
    ];

    if n < 0 {
        return format!("Minus{}", int_to_english_word(-n));
    }
    let n = n as usize;
    match n {
        0..=19 => UNITS[n].to_string(),
        20..=99 => {
            let rest = if n % 10 == 0 {
                String::new()
            } else {
                UNITS[n % 10].to_string()
            };
            format!("{}{}", TENS[n / 10], rest)
        }
        100..=999 => {
            let rest = if n % 100 == 0 {
                String::new()
            } else {
                int_to_english_word((n % 100) as i64)
            };
            format!("{}Hundred{}", UNITS[n / 100], rest)
        }
        _ => {
            let rest = if n % 1000 == 0 {
                String::new()
            } else {
                int_to_english_word((n % 1000) as i64)
            };
            format!("{}Thousand{}", int_to_english_word((n / 1000) as i64), rest)
        }
    }
}

/// Make a LilyPond-safe identifier: digit runs become English words,
/// anything that is not an ASCII letter is dropped.
pub fn identifier_from(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut digits = String::new();

    let flush = |digits: &mut String, result: &mut String| {
        if !digits.is_empty() {
            let value: i64 = digits.parse().unwrap_or(0);
            result.push_str(&int_to_english_word(value));
            digits.clear();
        }
    };

    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        flush(&mut digits, &mut result);
        if c.is_ascii_alphabetic() || c == '_' {
            result.push(c);
        }
    }
    flush(&mut digits, &mut result);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_sum_detects_overflow() {
        assert_eq!(
            checked_sum(Rational::new(1, 4), Rational::new(1, 6)),
            Some(Rational::new(5, 12))
        );
        let huge = Rational::new(i32::MAX, 28);
        assert_eq!(checked_sum(huge, huge), None, "the unreduced numerator does not fit");
        assert_eq!(checked_sum(huge, -huge), Some(zero()));
        assert_eq!(
            checked_sum(Rational::new(i32::MAX, 3), Rational::new(1, 2)),
            None,
            "scaling to the common denominator does not fit"
        );
    }

    #[test]
    fn test_dotted_lengths() {
        let quarter = Rational::new(1, 4);
        assert_eq!(dotted(quarter, 0), quarter);
        assert_eq!(dotted(quarter, 1), Rational::new(3, 8));
        assert_eq!(dotted(quarter, 2), Rational::new(7, 16));
    }

    #[test]
    fn test_note_type_round_trip_with_dots() {
        assert_eq!(
            NoteType::from_whole_notes(Rational::new(3, 4)),
            Some((NoteType::Half, 1))
        );
        assert_eq!(NoteType::from_whole_notes(Rational::new(1, 12)), None);
    }

    #[test]
    fn test_pitch_validation() {
        assert!(Pitch::new(7, 0, 4).is_err());
        assert!(Pitch::new(0, 3, 4).is_err());
        assert_eq!(Pitch::new(4, 1, 4).unwrap().letter(), 'g');
    }

    #[test]
    fn test_identifier_from() {
        assert_eq!(identifier_from("P1"), "POne");
        assert_eq!(identifier_from("Part_P12_Staff_1"), "Part_PTwelve_Staff_One");
        assert_eq!(identifier_from("a-b 3"), "abThree");
        assert_eq!(int_to_english_word(105), "OneHundredFive");
    }
}
