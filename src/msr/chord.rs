//! Chords: simultaneous notes sharing one duration

use crate::msr::basics::{zero, NoteType, Rational};
use crate::msr::harmony::{FiguredBass, Harmony};
use crate::msr::marks::{Beam, NoteMark, StemKind};
use crate::msr::note::{Note, NoteKind, TremoloPosition};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub notes: Vec<Note>,
    pub sounding_duration: Rational,
    pub displayed_duration: Rational,
    pub graphic_type: Option<NoteType>,
    pub dots: u8,
    pub is_grace: bool,
    pub stem: Option<StemKind>,
    pub beams: Vec<Beam>,
    pub double_tremolo_position: Option<TremoloPosition>,

    /// Marks attached to the chord as a whole (filled by target passes)
    pub marks: Vec<NoteMark>,
    pub harmony: Option<Harmony>,
    pub figured_bass: Option<FiguredBass>,

    pub input_line: u32,
}

impl Chord {
    /// Empty chord taking its durations from `note`
    pub fn shaped_like(note: &Note) -> Self {
        Self {
            notes: Vec::new(),
            sounding_duration: note.sounding_duration,
            displayed_duration: note.displayed_duration,
            graphic_type: note.graphic_type,
            dots: note.dots,
            is_grace: note.is_grace(),
            stem: note.stem,
            beams: note.beams.clone(),
            double_tremolo_position: note.double_tremolo_position,
            marks: Vec::new(),
            harmony: None,
            figured_bass: None,
            input_line: note.input_line,
        }
    }

    /// Append a member note. Only the first member keeps slur starts.
    pub fn add_note(&mut self, mut note: Note) {
        note.kind = if self.is_grace {
            NoteKind::GraceChordMember
        } else {
            NoteKind::ChordMember
        };
        if !self.notes.is_empty() {
            note.marks.retain(|mark| !mark.is_slur_start());
        }
        self.notes.push(note);
    }

    pub fn first_note(&self) -> Option<&Note> {
        self.notes.first()
    }

    pub fn first_note_ordinal(&self) -> Option<u32> {
        self.notes.first().map(|n| n.ordinal)
    }

    /// Time this chord advances its voice by
    pub fn measure_duration(&self) -> Rational {
        if self.is_grace {
            zero()
        } else {
            self.sounding_duration
        }
    }

    /// Same attributes, no members or attachments
    pub fn newborn_clone(&self) -> Chord {
        Chord {
            notes: Vec::new(),
            marks: Vec::new(),
            harmony: None,
            figured_bass: None,
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> Chord {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::basics::{Pitch, Placement};
    use crate::msr::marks::{Slur, SlurKind};
    use crate::msr::note::NoteContent;

    fn slurred(step: u8, ordinal: u32) -> Note {
        let mut note = Note::new(
            ordinal,
            NoteContent::Pitched(Pitch::new(step, 0, 4).unwrap()),
            Rational::new(1, 2),
            30 + ordinal,
        );
        note.marks.push(NoteMark::Slur(Slur {
            number: 1,
            kind: SlurKind::Start,
            placement: Placement::None,
            input_line: 30 + ordinal,
        }));
        note
    }

    #[test]
    fn test_only_first_member_keeps_slur_start() {
        let first = slurred(0, 1);
        let mut chord = Chord::shaped_like(&first);
        chord.add_note(first);
        chord.add_note(slurred(2, 2));
        chord.add_note(slurred(4, 3));

        assert_eq!(chord.notes.len(), 3);
        assert!(chord.notes[0].has_slur_start());
        assert!(!chord.notes[1].has_slur_start());
        assert!(!chord.notes[2].has_slur_start());
        assert!(chord.notes.iter().all(|n| n.kind == NoteKind::ChordMember));
        assert_eq!(chord.measure_duration(), Rational::new(1, 2));
    }

    #[test]
    fn test_newborn_clone_is_empty() {
        let first = slurred(0, 1);
        let mut chord = Chord::shaped_like(&first);
        chord.add_note(first);

        let newborn = chord.newborn_clone();
        assert!(newborn.notes.is_empty());
        assert_eq!(newborn.sounding_duration, chord.sounding_duration);
        assert_eq!(chord.deep_copy().notes.len(), 1);
    }
}
