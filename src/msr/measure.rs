//! Measures
//!
//! A measure belongs to one voice. It accumulates its elements' durations as
//! they are appended and computes its [`MeasureKind`] when finalized, from
//! that accumulated length and the prevailing time signature.

use crate::errors::Result;
use crate::msr::attributes::{
    BarCheck, BarNumberCheck, Barline, Clef, Coda, Key, LineBreak, PageBreak, Rehearsal, Segno,
    Tempo, Time, Transpose, VoiceStaffChange,
};
use crate::msr::basics::{is_zero, zero, Rational};
use crate::msr::chord::Chord;
use crate::msr::grace::DoubleTremolo;
use crate::msr::harmony::{FiguredBass, Harmony};
use crate::msr::note::Note;
use crate::msr::tuplet::Tuplet;
use crate::msr::uplinks::{require, VoiceKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureKind {
    #[default]
    Unknown,
    Regular,
    Anacrusis,
    Incomplete,
    Overcomplete,
    Cadenza,
    Empty,
}

/// `<measure-style>` marks carried by the measure that starts or ends them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureRepeatMark {
    Start { measures: u32, slashes: u32 },
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureElement {
    Note(Note),
    Chord(Chord),
    Tuplet(Tuplet),
    DoubleTremolo(DoubleTremolo),
    Clef(Clef),
    Key(Key),
    Time(Time),
    Transpose(Transpose),
    Barline(Barline),
    BarCheck(BarCheck),
    BarNumberCheck(BarNumberCheck),
    VoiceStaffChange(VoiceStaffChange),
    Tempo(Tempo),
    Rehearsal(Rehearsal),
    Segno(Segno),
    Coda(Coda),
    LineBreak(LineBreak),
    PageBreak(PageBreak),
    /// Chord symbol in a harmony voice
    Harmony(Harmony),
    /// Figures in a figured bass voice
    FiguredBass(FiguredBass),
}

impl MeasureElement {
    /// Time the element advances its voice by
    pub fn duration(&self) -> Rational {
        match self {
            MeasureElement::Note(note) => note.measure_duration(),
            MeasureElement::Chord(chord) => chord.measure_duration(),
            MeasureElement::Tuplet(tuplet) => tuplet.duration(),
            MeasureElement::DoubleTremolo(tremolo) => tremolo.duration(),
            MeasureElement::Harmony(harmony) => harmony.duration,
            MeasureElement::FiguredBass(figured_bass) => figured_bass.duration,
            _ => zero(),
        }
    }

    /// Notes, chords, tuplets, double tremolos and voice-level annotations
    pub fn is_music(&self) -> bool {
        matches!(
            self,
            MeasureElement::Note(_)
                | MeasureElement::Chord(_)
                | MeasureElement::Tuplet(_)
                | MeasureElement::DoubleTremolo(_)
                | MeasureElement::Harmony(_)
                | MeasureElement::FiguredBass(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// As written in the source, not necessarily numeric
    pub number: String,
    /// Position of the measure in its voice, from 1
    pub ordinal: u32,
    pub kind: MeasureKind,
    pub elements: Vec<MeasureElement>,
    /// `implicit="yes"`: not counted in measure numbering
    pub implicit: bool,
    /// Length of a full measure under the prevailing time signature
    pub full_length: Rational,
    pub senza_misura: bool,
    pub multiple_rest: Option<u32>,
    pub measure_repeat: Option<MeasureRepeatMark>,
    pub uplink: Option<VoiceKey>,
    pub input_line: u32,

    accumulated: Rational,
}

impl Measure {
    pub fn new(number: &str, ordinal: u32, full_length: Rational, input_line: u32) -> Self {
        Self {
            number: number.to_string(),
            ordinal,
            kind: MeasureKind::Unknown,
            elements: Vec::new(),
            implicit: false,
            full_length,
            senza_misura: false,
            multiple_rest: None,
            measure_repeat: None,
            uplink: None,
            input_line,
            accumulated: zero(),
        }
    }

    pub fn voice_uplink(&self) -> Result<&VoiceKey> {
        require(&self.uplink, self.input_line, &format!("measure {}", self.number))
    }

    pub fn append(&mut self, element: MeasureElement) {
        self.accumulated += element.duration();
        self.elements.push(element);
    }

    /// Insert an element at the front, e.g. a clef inherited by a new voice
    pub fn prepend(&mut self, element: MeasureElement) {
        self.accumulated += element.duration();
        self.elements.insert(0, element);
    }

    /// Sum of the durations appended so far
    pub fn accumulated_duration(&self) -> Rational {
        self.accumulated
    }

    /// Gap between the accumulated duration and a full measure
    pub fn missing_duration(&self) -> Rational {
        if self.accumulated < self.full_length {
            self.full_length - self.accumulated
        } else {
            zero()
        }
    }

    pub fn has_music(&self) -> bool {
        self.elements.iter().any(MeasureElement::is_music)
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.elements.iter().filter_map(|element| match element {
            MeasureElement::Note(note) => Some(note),
            _ => None,
        })
    }

    pub fn last_note_mut(&mut self) -> Option<&mut Note> {
        self.elements.iter_mut().rev().find_map(|element| match element {
            MeasureElement::Note(note) => Some(note),
            _ => None,
        })
    }

    /// Compute the measure kind from its accumulated duration
    pub fn finalize(&mut self, first_in_voice: bool) -> MeasureKind {
        self.kind = if is_zero(&self.accumulated) {
            MeasureKind::Empty
        } else if self.senza_misura {
            MeasureKind::Cadenza
        } else if self.accumulated == self.full_length {
            MeasureKind::Regular
        } else if self.accumulated < self.full_length {
            if first_in_voice || self.implicit {
                MeasureKind::Anacrusis
            } else {
                MeasureKind::Incomplete
            }
        } else {
            MeasureKind::Overcomplete
        };

        log::debug!(
            "finalized measure {} (ordinal {}): {:?}, {} of {}",
            self.number,
            self.ordinal,
            self.kind,
            self.accumulated,
            self.full_length
        );
        self.kind
    }

    /// Same attributes, no elements, owned by `owner`
    pub fn newborn_clone(&self, owner: &VoiceKey) -> Measure {
        Measure {
            elements: Vec::new(),
            accumulated: zero(),
            uplink: Some(owner.clone()),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self, owner: &VoiceKey) -> Measure {
        Measure {
            uplink: Some(owner.clone()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::basics::Pitch;
    use crate::msr::note::NoteContent;
    use crate::msr::uplinks::PartKey;

    fn quarter(ordinal: u32) -> MeasureElement {
        MeasureElement::Note(Note::new(
            ordinal,
            NoteContent::Pitched(Pitch::new(0, 0, 4).unwrap()),
            Rational::new(1, 4),
            ordinal,
        ))
    }

    fn measure_with(quarters: u32) -> Measure {
        let mut measure = Measure::new("1", 1, Rational::new(3, 4), 1);
        for ordinal in 0..quarters {
            measure.append(quarter(ordinal));
        }
        measure
    }

    #[test]
    fn test_finalize_kinds() {
        assert_eq!(measure_with(3).finalize(false), MeasureKind::Regular);
        assert_eq!(measure_with(1).finalize(true), MeasureKind::Anacrusis);
        assert_eq!(measure_with(1).finalize(false), MeasureKind::Incomplete);
        assert_eq!(measure_with(4).finalize(false), MeasureKind::Overcomplete);
        assert_eq!(measure_with(0).finalize(false), MeasureKind::Empty);

        let mut implicit = measure_with(2);
        implicit.implicit = true;
        assert_eq!(implicit.finalize(false), MeasureKind::Anacrusis);

        let mut cadenza = measure_with(5);
        cadenza.senza_misura = true;
        assert_eq!(cadenza.finalize(false), MeasureKind::Cadenza);
    }

    #[test]
    fn test_attributes_do_not_take_time() {
        let mut measure = measure_with(2);
        measure.prepend(MeasureElement::Clef(Clef::treble(1)));
        assert_eq!(measure.accumulated_duration(), Rational::new(1, 2));
        assert_eq!(measure.missing_duration(), Rational::new(1, 4));
        assert!(matches!(measure.elements[0], MeasureElement::Clef(_)));
    }

    #[test]
    fn test_clones_and_uplink() {
        let owner = PartKey::new("P1").staff(1).voice(1);
        let measure = measure_with(3);
        assert!(measure.voice_uplink().is_err(), "fresh measure has no owner");

        let newborn = measure.newborn_clone(&owner);
        assert!(newborn.elements.is_empty());
        assert_eq!(newborn.accumulated_duration(), zero());
        assert_eq!(newborn.voice_uplink().unwrap(), &owner);

        let copy = measure.deep_copy(&owner);
        assert_eq!(copy.elements.len(), 3);
        assert_eq!(copy.accumulated_duration(), Rational::new(3, 4));
    }
}
