//! Grace notes groups and double tremolos

use crate::msr::basics::{zero, Placement, Rational};
use crate::msr::chord::Chord;
use crate::msr::note::{Note, NoteContent, NoteKind, TremoloPosition};
use serde::{Deserialize, Serialize};

// ============================================================================
// GRACE NOTES
// ============================================================================

/// Whether the group is played before or after its note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraceKind {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraceElement {
    Note(Note),
    Chord(Chord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraceNotesGroup {
    pub kind: GraceKind,
    pub slashed: bool,
    pub beamed: bool,
    pub elements: Vec<GraceElement>,
    /// Invisible copy kept in sync with another voice's grace notes
    pub is_skip: bool,
    pub input_line: u32,
}

impl GraceNotesGroup {
    pub fn new(kind: GraceKind, slashed: bool, input_line: u32) -> Self {
        Self {
            kind,
            slashed,
            beamed: false,
            elements: Vec::new(),
            is_skip: false,
            input_line,
        }
    }

    pub fn add_note(&mut self, mut note: Note) {
        note.kind = NoteKind::Grace;
        self.elements.push(GraceElement::Note(note));
    }

    pub fn add_chord(&mut self, chord: Chord) {
        self.elements.push(GraceElement::Chord(chord));
    }

    /// Last element, if it is a note (used to turn it into a chord)
    pub fn take_last_note(&mut self) -> Option<Note> {
        match self.elements.last() {
            Some(GraceElement::Note(_)) => match self.elements.pop() {
                Some(GraceElement::Note(note)) => Some(note),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Displayed length of the whole group
    pub fn displayed_duration(&self) -> Rational {
        self.elements.iter().fold(zero(), |total, element| {
            total
                + match element {
                    GraceElement::Note(note) => note.displayed_duration,
                    GraceElement::Chord(chord) => chord.displayed_duration,
                }
        })
    }

    pub fn newborn_clone(&self) -> GraceNotesGroup {
        GraceNotesGroup {
            elements: Vec::new(),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> GraceNotesGroup {
        self.clone()
    }

    /// Group of invisible grace skips with the same rhythm, one per note
    /// or chord of this group
    pub fn skip_clone(&self) -> GraceNotesGroup {
        let elements = self
            .elements
            .iter()
            .filter_map(|element| {
                let model = match element {
                    GraceElement::Note(note) => note,
                    GraceElement::Chord(chord) => chord.first_note()?,
                };
                let mut skip = model.newborn_clone();
                skip.content = NoteContent::Skip;
                skip.kind = NoteKind::Grace;
                skip.tie = None;
                skip.beams.clear();
                skip.accidental = None;
                Some(GraceElement::Note(skip))
            })
            .collect();

        GraceNotesGroup {
            elements,
            is_skip: true,
            slashed: false,
            ..self.newborn_clone()
        }
    }
}

// ============================================================================
// DOUBLE TREMOLO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TremoloElement {
    Note(Note),
    Chord(Chord),
}

impl TremoloElement {
    pub fn sounding_duration(&self) -> Rational {
        match self {
            TremoloElement::Note(note) => note.sounding_duration,
            TremoloElement::Chord(chord) => chord.sounding_duration,
        }
    }
}

/// Alternation between two notes or chords
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleTremolo {
    /// Number of beams between the two elements
    pub marks: u8,
    pub placement: Placement,
    pub first: Option<TremoloElement>,
    pub second: Option<TremoloElement>,
    pub input_line: u32,
}

impl DoubleTremolo {
    pub fn new(marks: u8, placement: Placement, input_line: u32) -> Self {
        Self {
            marks,
            placement,
            first: None,
            second: None,
            input_line,
        }
    }

    /// Store `element` in the slot named by `position`
    pub fn set_element(&mut self, position: TremoloPosition, element: TremoloElement) {
        match position {
            TremoloPosition::First => self.first = Some(element),
            TremoloPosition::Second => self.second = Some(element),
        }
    }

    pub fn duration(&self) -> Rational {
        self.first
            .iter()
            .chain(self.second.iter())
            .fold(zero(), |total, element| total + element.sounding_duration())
    }

    pub fn newborn_clone(&self) -> DoubleTremolo {
        DoubleTremolo {
            first: None,
            second: None,
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> DoubleTremolo {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::basics::Pitch;

    fn grace(ordinal: u32) -> Note {
        let mut note = Note::new(
            ordinal,
            NoteContent::Pitched(Pitch::new(1, 1, 5).unwrap()),
            zero(),
            50 + ordinal,
        );
        note.displayed_duration = Rational::new(1, 16);
        note.kind = NoteKind::Grace;
        note.accidental = Some("sharp".to_string());
        note
    }

    #[test]
    fn test_skip_clone_keeps_rhythm() {
        let mut group = GraceNotesGroup::new(GraceKind::Before, true, 50);
        group.add_note(grace(1));
        group.add_note(grace(2));

        let skips = group.skip_clone();
        assert!(skips.is_skip);
        assert!(!skips.slashed);
        assert_eq!(skips.elements.len(), 2);
        assert_eq!(skips.displayed_duration(), Rational::new(1, 8));
        for element in &skips.elements {
            match element {
                GraceElement::Note(note) => {
                    assert!(note.is_skip());
                    assert_eq!(note.accidental, None);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(!group.is_skip, "original group is untouched");
    }

    #[test]
    fn test_double_tremolo_slots() {
        let mut tremolo = DoubleTremolo::new(3, Placement::None, 60);
        let mut half = grace(1);
        half.sounding_duration = Rational::new(1, 2);
        tremolo.set_element(TremoloPosition::First, TremoloElement::Note(half.clone()));
        tremolo.set_element(TremoloPosition::Second, TremoloElement::Note(half));
        assert_eq!(tremolo.duration(), Rational::from_integer(1));
        assert!(tremolo.newborn_clone().first.is_none());
    }
}
