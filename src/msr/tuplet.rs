//! Tuplets
//!
//! A tuplet owns notes, chords and nested tuplets in order. Member durations
//! are stored already scaled, so a tuplet's duration is the plain sum of its
//! members.

use crate::msr::basics::{rational, zero, Placement, Rational};
use crate::msr::chord::Chord;
use crate::msr::note::{Note, NoteKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TupletLineShape {
    #[default]
    Straight,
    Curved,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TupletShowNumber {
    #[default]
    Actual,
    Both,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TupletElement {
    Note(Note),
    Chord(Chord),
    Tuplet(Tuplet),
}

impl TupletElement {
    pub fn duration(&self) -> Rational {
        match self {
            TupletElement::Note(note) => note.measure_duration(),
            TupletElement::Chord(chord) => chord.measure_duration(),
            TupletElement::Tuplet(tuplet) => tuplet.duration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuplet {
    pub number: i32,
    /// Notes played...
    pub actual: u32,
    /// ...in the time of
    pub normal: u32,
    pub bracket: bool,
    pub line_shape: TupletLineShape,
    pub show_number: TupletShowNumber,
    pub placement: Placement,
    pub elements: Vec<TupletElement>,
    pub input_line: u32,
}

impl Tuplet {
    pub fn new(number: i32, actual: u32, normal: u32, input_line: u32) -> Self {
        Self {
            number,
            actual,
            normal,
            bracket: true,
            line_shape: TupletLineShape::Straight,
            show_number: TupletShowNumber::Actual,
            placement: Placement::None,
            elements: Vec::new(),
            input_line,
        }
    }

    /// `actual/normal` as a fraction; `None` if normal is 0
    pub fn factor(&self) -> Option<Rational> {
        rational(self.actual as i32, self.normal as i32)
    }

    pub fn add_note(&mut self, mut note: Note) {
        note.kind = if note.is_grace() {
            NoteKind::GraceTupletMember
        } else if note.is_unpitched() {
            NoteKind::TupletMemberUnpitched
        } else if note.is_rest() {
            // rests keep their own kind so printers can tell them apart
            NoteKind::Rest
        } else {
            NoteKind::TupletMember
        };
        self.elements.push(TupletElement::Note(note));
    }

    pub fn add_chord(&mut self, chord: Chord) {
        self.elements.push(TupletElement::Chord(chord));
    }

    pub fn add_tuplet(&mut self, tuplet: Tuplet) {
        self.elements.push(TupletElement::Tuplet(tuplet));
    }

    /// Last element, if it is a note (used to turn it into a chord)
    pub fn take_last_note(&mut self) -> Option<Note> {
        match self.elements.last() {
            Some(TupletElement::Note(_)) => match self.elements.pop() {
                Some(TupletElement::Note(note)) => Some(note),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn last_chord_mut(&mut self) -> Option<&mut Chord> {
        match self.elements.last_mut() {
            Some(TupletElement::Chord(chord)) => Some(chord),
            _ => None,
        }
    }

    pub fn duration(&self) -> Rational {
        self.elements
            .iter()
            .fold(zero(), |total, element| total + element.duration())
    }

    pub fn newborn_clone(&self) -> Tuplet {
        Tuplet {
            elements: Vec::new(),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> Tuplet {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::basics::Pitch;
    use crate::msr::note::NoteContent;

    fn triplet_eighth(ordinal: u32) -> Note {
        Note::new(
            ordinal,
            NoteContent::Pitched(Pitch::new(0, 0, 5).unwrap()),
            Rational::new(1, 12),
            40 + ordinal,
        )
    }

    #[test]
    fn test_nested_duration() {
        let mut outer = Tuplet::new(1, 3, 2, 40);
        outer.add_note(triplet_eighth(1));

        let mut inner = Tuplet::new(2, 3, 2, 42);
        for ordinal in 2..5 {
            inner.add_note(Note {
                sounding_duration: Rational::new(1, 36),
                ..triplet_eighth(ordinal)
            });
        }
        outer.add_tuplet(inner);
        outer.add_note(triplet_eighth(5));

        assert_eq!(outer.duration(), Rational::new(1, 4));
        assert_eq!(outer.factor(), Some(Rational::new(3, 2)));
        assert!(matches!(&outer.elements[0], TupletElement::Note(n) if n.kind == NoteKind::TupletMember));
    }

    #[test]
    fn test_take_last_note_for_chord() {
        let mut tuplet = Tuplet::new(1, 3, 2, 1);
        tuplet.add_note(triplet_eighth(1));
        let note = tuplet.take_last_note().unwrap();
        assert_eq!(note.ordinal, 1);
        assert!(tuplet.elements.is_empty());
        assert!(tuplet.take_last_note().is_none());
        assert!(Tuplet::new(1, 3, 0, 1).factor().is_none());
    }
}
