//! Notes
//!
//! A note is the atomic timed event. Its [`NoteKind`] tells which container
//! owns it (a measure, a chord, a tuplet, a grace notes group or a double
//! tremolo); the container is what gets browsed, so a note found somewhere
//! its kind does not allow is a structural error for the translators.

use crate::msr::basics::{zero, NoteType, Pitch, Position, Rational};
use crate::msr::grace::GraceNotesGroup;
use crate::msr::harmony::{FiguredBass, Harmony};
use crate::msr::lyrics::Syllable;
use crate::msr::marks::{Beam, NoteMark, StemKind, TieKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    Standalone,
    Rest,
    Skip,
    Unpitched,
    ChordMember,
    Grace,
    GraceChordMember,
    TupletMember,
    GraceTupletMember,
    TupletMemberUnpitched,
    DoubleTremoloMember,
}

/// What sounds (or does not)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteContent {
    Pitched(Pitch),
    /// Rest, optionally placed at a display step/octave
    Rest { display: Option<(u8, i8)> },
    /// Percussion note drawn at a display step/octave
    Unpitched { display: Option<(u8, i8)> },
    /// Invisible filler
    Skip,
}

/// Which half of a double tremolo a member is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TremoloPosition {
    First,
    Second,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique within a score, in creation order
    pub ordinal: u32,
    pub kind: NoteKind,
    pub content: NoteContent,

    /// Time actually taken, already scaled by any time modification
    pub sounding_duration: Rational,
    /// Length as written (type + dots)
    pub displayed_duration: Rational,
    pub graphic_type: Option<NoteType>,
    pub dots: u8,

    pub voice_number: i32,
    pub staff_number: i32,

    /// (actual, normal) from `<time-modification>`
    pub time_modification: Option<(u32, u32)>,
    pub print_object: bool,
    pub cue: bool,
    /// Whole-measure rest (`<rest measure="yes"/>` or a lone rest filling the measure)
    pub measure_full_rest: bool,

    pub accidental: Option<String>,
    pub editorial_accidental: bool,
    pub cautionary_accidental: bool,

    pub tie: Option<TieKind>,
    pub stem: Option<StemKind>,
    pub beams: Vec<Beam>,
    pub position: Position,
    pub double_tremolo_position: Option<TremoloPosition>,

    // browsed children, dropped by newborn clones
    pub marks: Vec<NoteMark>,
    pub harmony: Option<Harmony>,
    pub figured_bass: Option<FiguredBass>,
    pub syllables: Vec<Syllable>,
    pub grace_before: Option<GraceNotesGroup>,
    pub grace_after: Option<GraceNotesGroup>,

    pub input_line: u32,
}

impl Note {
    pub fn new(ordinal: u32, content: NoteContent, duration: Rational, input_line: u32) -> Self {
        let kind = match content {
            NoteContent::Pitched(_) => NoteKind::Standalone,
            NoteContent::Rest { .. } => NoteKind::Rest,
            NoteContent::Unpitched { .. } => NoteKind::Unpitched,
            NoteContent::Skip => NoteKind::Skip,
        };
        Self {
            ordinal,
            kind,
            content,
            sounding_duration: duration,
            displayed_duration: duration,
            graphic_type: None,
            dots: 0,
            voice_number: 1,
            staff_number: 1,
            time_modification: None,
            print_object: true,
            cue: false,
            measure_full_rest: false,
            accidental: None,
            editorial_accidental: false,
            cautionary_accidental: false,
            tie: None,
            stem: None,
            beams: Vec::new(),
            position: Position::default(),
            double_tremolo_position: None,
            marks: Vec::new(),
            harmony: None,
            figured_bass: None,
            syllables: Vec::new(),
            grace_before: None,
            grace_after: None,
            input_line,
        }
    }

    /// Invisible note used to pad a voice
    pub fn skip(ordinal: u32, duration: Rational, voice_number: i32, staff_number: i32, input_line: u32) -> Self {
        Self {
            voice_number,
            staff_number,
            ..Self::new(ordinal, NoteContent::Skip, duration, input_line)
        }
    }

    pub fn pitch(&self) -> Option<&Pitch> {
        match &self.content {
            NoteContent::Pitched(pitch) => Some(pitch),
            _ => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.content, NoteContent::Rest { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.content, NoteContent::Skip)
    }

    pub fn is_unpitched(&self) -> bool {
        matches!(self.content, NoteContent::Unpitched { .. })
    }

    pub fn is_grace(&self) -> bool {
        matches!(
            self.kind,
            NoteKind::Grace | NoteKind::GraceChordMember | NoteKind::GraceTupletMember
        )
    }

    pub fn is_chord_member(&self) -> bool {
        matches!(self.kind, NoteKind::ChordMember | NoteKind::GraceChordMember)
    }

    pub fn is_tuplet_member(&self) -> bool {
        matches!(
            self.kind,
            NoteKind::TupletMember | NoteKind::GraceTupletMember | NoteKind::TupletMemberUnpitched
        )
    }

    /// Whether this note can carry a syllable
    pub fn is_lyric_eligible(&self) -> bool {
        !self.is_rest() && !self.is_skip() && !self.is_grace() && !self.is_chord_member()
    }

    /// Time this note advances its voice by, if it stands on its own
    pub fn measure_duration(&self) -> Rational {
        if self.is_grace() || self.is_chord_member() {
            zero()
        } else {
            self.sounding_duration
        }
    }

    pub fn has_slur_start(&self) -> bool {
        self.marks.iter().any(NoteMark::is_slur_start)
    }

    /// Same attributes, no attached children
    pub fn newborn_clone(&self) -> Note {
        Note {
            marks: Vec::new(),
            harmony: None,
            figured_bass: None,
            syllables: Vec::new(),
            grace_before: None,
            grace_after: None,
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> Note {
        self.clone()
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            NoteContent::Pitched(pitch) => {
                write!(f, "note {}{}", pitch.letter(), pitch.octave)?;
            }
            NoteContent::Rest { .. } => write!(f, "rest")?,
            NoteContent::Unpitched { .. } => write!(f, "unpitched note")?,
            NoteContent::Skip => write!(f, "skip")?,
        }
        write!(
            f,
            " {} #{} (line {})",
            self.sounding_duration, self.ordinal, self.input_line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::marks::{Slur, SlurKind};
    use crate::msr::basics::Placement;

    fn g4(ordinal: u32) -> Note {
        Note::new(
            ordinal,
            NoteContent::Pitched(Pitch::new(4, 0, 4).unwrap()),
            Rational::new(1, 4),
            20,
        )
    }

    #[test]
    fn test_kind_follows_content() {
        assert_eq!(g4(1).kind, NoteKind::Standalone);
        let rest = Note::new(2, NoteContent::Rest { display: None }, Rational::new(1, 2), 3);
        assert_eq!(rest.kind, NoteKind::Rest);
        assert!(!rest.is_lyric_eligible());
        let skip = Note::skip(3, Rational::new(1, 4), 2, 1, 4);
        assert!(skip.is_skip());
        assert_eq!(skip.voice_number, 2);
    }

    #[test]
    fn test_measure_duration_of_members() {
        let mut note = g4(1);
        assert_eq!(note.measure_duration(), Rational::new(1, 4));
        note.kind = NoteKind::ChordMember;
        assert_eq!(note.measure_duration(), zero(), "chord members do not advance time");
        note.kind = NoteKind::Grace;
        assert_eq!(note.measure_duration(), zero());
    }

    #[test]
    fn test_newborn_clone_drops_children() {
        let mut note = g4(7);
        note.marks.push(NoteMark::Slur(Slur {
            number: 1,
            kind: SlurKind::Start,
            placement: Placement::None,
            input_line: 21,
        }));
        note.syllables.push(Syllable::skip("1", Rational::new(1, 4), 22));

        let newborn = note.newborn_clone();
        assert!(newborn.marks.is_empty());
        assert!(newborn.syllables.is_empty());
        assert_eq!(newborn.ordinal, 7);
        assert!(note.has_slur_start(), "original is untouched");
        assert_eq!(note.deep_copy(), note);
    }
}
