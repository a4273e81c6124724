//! What a part contains, gathered before any of it is written
//!
//! Guido output is voice-major with global staff numbers, so the writer must
//! know a part's voices, the staff each one mostly lives on and how many
//! staves the part spans before emitting its first voice.

use crate::browser::browse;
use crate::errors::Result;
use crate::msr::attributes::{Clef, Key, Time};
use crate::msr::note::Note;
use crate::msr::part::Part;
use crate::msr::staff::Staff;
use crate::msr::visitor::{MsrNode, MsrVisitor};
use crate::msr::voice::{Voice, VoiceKind};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct PartSummary {
    voices: BTreeSet<i32>,
    /// Notes per (voice, staff), grace notes and skips excluded
    note_counts: BTreeMap<(i32, i32), usize>,
    /// Staff owning each voice in the score model
    homes: BTreeMap<i32, i32>,
    staff_count: i32,
    clefs: BTreeMap<i32, Vec<Clef>>,
    keys: Vec<Key>,
    first_time: Option<Time>,

    current_staff: i32,
    current_voice: Option<i32>,
}

impl PartSummary {
    pub fn of(part: &Part) -> Result<Self> {
        let mut summary = PartSummary::default();
        browse(&mut summary, MsrNode::Part(part))?;
        log::debug!(
            "part {}: voices {:?}, {} staves",
            part.id,
            summary.voices,
            summary.staff_count
        );
        Ok(summary)
    }

    /// Regular voices with notes, ascending
    pub fn voices(&self) -> Vec<i32> {
        self.voices.iter().copied().collect()
    }

    /// Staff holding most of the voice's notes, the lowest on a tie
    pub fn main_staff(&self, voice: i32) -> i32 {
        let mut best: Option<(i32, usize)> = None;
        for (&(counted_voice, staff), &count) in &self.note_counts {
            if counted_voice != voice {
                continue;
            }
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((staff, count));
            }
        }
        match best {
            Some((staff, _)) => staff,
            None => self.homes.get(&voice).copied().unwrap_or(1),
        }
    }

    /// Declared staves or used staves, whichever is more
    pub fn staff_count(&self) -> i32 {
        self.staff_count.max(1)
    }

    pub fn clefs_of(&self, staff: i32) -> &[Clef] {
        self.clefs.get(&staff).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_clefs(&self) -> impl Iterator<Item = &Clef> {
        self.clefs.values().flatten()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn first_time(&self) -> Option<&Time> {
        self.first_time.as_ref()
    }

    fn in_regular_voice(&self) -> bool {
        self.current_voice.is_some()
    }
}

impl MsrVisitor for PartSummary {
    fn visit_start_part(&mut self, elt: &Part) -> Result<()> {
        self.staff_count = self.staff_count.max(elt.declared_staff_count);
        Ok(())
    }

    fn visit_start_staff(&mut self, elt: &Staff) -> Result<()> {
        self.current_staff = elt.number;
        if elt.kind.has_staff_block() {
            self.staff_count = self.staff_count.max(elt.number);
        }
        Ok(())
    }

    fn visit_start_voice(&mut self, elt: &Voice) -> Result<()> {
        if elt.kind == VoiceKind::Regular {
            self.current_voice = Some(elt.number);
            self.homes.entry(elt.number).or_insert(self.current_staff);
        }
        Ok(())
    }

    fn visit_end_voice(&mut self, _elt: &Voice) -> Result<()> {
        self.current_voice = None;
        Ok(())
    }

    fn visit_start_note(&mut self, elt: &Note) -> Result<()> {
        let Some(voice) = self.current_voice else {
            return Ok(());
        };
        if elt.is_grace() || elt.is_skip() {
            return Ok(());
        }
        self.voices.insert(voice);
        *self.note_counts.entry((voice, elt.staff_number)).or_insert(0) += 1;
        self.staff_count = self.staff_count.max(elt.staff_number);
        Ok(())
    }

    fn visit_start_clef(&mut self, elt: &Clef) -> Result<()> {
        if !self.in_regular_voice() {
            return Ok(());
        }
        let clefs = self.clefs.entry(elt.staff_number).or_default();
        let known = clefs.iter().any(|clef| {
            clef.sign == elt.sign
                && clef.line == elt.line
                && clef.octave_change == elt.octave_change
        });
        if !known {
            clefs.push(elt.clone());
        }
        Ok(())
    }

    fn visit_start_key(&mut self, elt: &Key) -> Result<()> {
        if self.in_regular_voice() && !self.keys.iter().any(|key| key.fifths == elt.fifths) {
            self.keys.push(elt.clone());
        }
        Ok(())
    }

    fn visit_start_time(&mut self, elt: &Time) -> Result<()> {
        if self.in_regular_voice() && self.first_time.is_none() {
            self.first_time = Some(elt.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::attributes::Clef;
    use crate::msr::basics::{Pitch, Rational};
    use crate::msr::measure::{Measure, MeasureElement};
    use crate::msr::note::NoteContent;
    use crate::msr::staff::StaffKind;

    fn quarter(ordinal: u32, staff: i32) -> Note {
        let pitch = Pitch::new(0, 0, 4).unwrap();
        let mut note = Note::new(ordinal, NoteContent::Pitched(pitch), Rational::new(1, 4), 10);
        note.staff_number = staff;
        note
    }

    fn piano_part() -> Part {
        let mut part = Part::new("P1", 1);
        part.declared_staff_count = 2;
        for number in [1, 2] {
            part.add_staff(Staff::new(number, StaffKind::Regular, 2)).unwrap();
        }

        // voice 1 lives on staff 1 but crosses to staff 2 for most notes
        let staff = part.staff_mut(1).unwrap();
        let mut voice = Voice::new(1, VoiceKind::Regular, 3);
        voice.uplink = Some(staff.key().unwrap());
        let mut measure = Measure::new("1", 1, Rational::new(1, 1), 4);
        measure.append(MeasureElement::Clef(Clef::treble(4)));
        measure.append(MeasureElement::Note(quarter(1, 1)));
        measure.append(MeasureElement::Note(quarter(2, 2)));
        measure.append(MeasureElement::Note(quarter(3, 2)));
        voice.append_measure(measure).unwrap();
        staff.register_voice(voice).unwrap();
        part
    }

    #[test]
    fn test_main_staff_is_the_busiest() {
        let summary = PartSummary::of(&piano_part()).unwrap();
        assert_eq!(summary.voices(), vec![1]);
        assert_eq!(summary.main_staff(1), 2);
        assert_eq!(summary.staff_count(), 2);
        assert_eq!(summary.clefs_of(1).len(), 1);
        assert!(summary.clefs_of(2).is_empty());
        assert_eq!(summary.all_clefs().count(), 1);
    }

    #[test]
    fn test_empty_part_counts_one_staff() {
        let summary = PartSummary::of(&Part::new("P9", 1)).unwrap();
        assert!(summary.voices().is_empty());
        assert_eq!(summary.staff_count(), 1);
        assert_eq!(summary.main_staff(3), 1, "unknown voice falls back to the first staff");
    }
}
