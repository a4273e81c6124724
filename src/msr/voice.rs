//! Voices and their repeat structure
//!
//! A voice owns a flat sequence of [`VoiceElement`]s: plain measures, or
//! wrappers grouping a run of measures with repeat semantics.

use crate::errors::Result;
use crate::msr::basics::{identifier_from, zero, Rational};
use crate::msr::lyrics::Stanza;
use crate::msr::measure::Measure;
use crate::msr::uplinks::{require, StaffKey, VoiceKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceKind {
    Regular,
    Harmony,
    FiguredBass,
}

// ============================================================================
// REPEATS AND OTHER WRAPPERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatEndingKind {
    /// Ending bracket closed with a hook
    Hooked,
    /// Open ending bracket (`discontinue`)
    Hookless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatEnding {
    /// Ending numbers as written, e.g. `1` or `1, 2`
    pub number: String,
    pub kind: RepeatEndingKind,
    pub elements: Vec<VoiceElement>,
    pub input_line: u32,
}

impl RepeatEnding {
    pub fn new(number: &str, kind: RepeatEndingKind, input_line: u32) -> Self {
        Self {
            number: number.to_string(),
            kind,
            elements: Vec::new(),
            input_line,
        }
    }

    pub fn newborn_clone(&self) -> RepeatEnding {
        RepeatEnding {
            elements: Vec::new(),
            ..self.clone()
        }
    }
}

/// Repeated section: a common part followed by zero or more endings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repeat {
    pub common_part: Vec<VoiceElement>,
    pub endings: Vec<RepeatEnding>,
    pub times: u32,
    pub input_line: u32,
}

impl Repeat {
    pub fn new(times: u32, input_line: u32) -> Self {
        Self {
            common_part: Vec::new(),
            endings: Vec::new(),
            times,
            input_line,
        }
    }

    pub fn newborn_clone(&self) -> Repeat {
        Repeat {
            common_part: Vec::new(),
            endings: Vec::new(),
            ..self.clone()
        }
    }
}

/// Run of measures rests, printed as one multi-measure rest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestMeasures {
    pub count: u32,
    pub measures: Vec<Measure>,
    pub input_line: u32,
}

impl RestMeasures {
    pub fn newborn_clone(&self) -> RestMeasures {
        RestMeasures {
            measures: Vec::new(),
            ..self.clone()
        }
    }
}

/// A pattern of measures followed by its slashed replicas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuresRepeat {
    pub measures_per_pattern: u32,
    pub slashes: u32,
    pub pattern: Vec<Measure>,
    pub replicas: Vec<Measure>,
    pub input_line: u32,
}

impl MeasuresRepeat {
    /// Number of times the pattern is replayed
    pub fn replicas_count(&self) -> usize {
        if self.measures_per_pattern == 0 {
            0
        } else {
            self.replicas.len() / self.measures_per_pattern as usize
        }
    }

    pub fn newborn_clone(&self) -> MeasuresRepeat {
        MeasuresRepeat {
            pattern: Vec::new(),
            replicas: Vec::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VoiceElement {
    Measure(Measure),
    Repeat(Repeat),
    RestMeasures(RestMeasures),
    MeasuresRepeat(MeasuresRepeat),
}

impl VoiceElement {
    /// Measures of this element, depth-first in order
    pub fn collect_measures<'a>(&'a self, out: &mut Vec<&'a Measure>) {
        match self {
            VoiceElement::Measure(measure) => out.push(measure),
            VoiceElement::Repeat(repeat) => {
                for element in &repeat.common_part {
                    element.collect_measures(out);
                }
                for ending in &repeat.endings {
                    for element in &ending.elements {
                        element.collect_measures(out);
                    }
                }
            }
            VoiceElement::RestMeasures(rests) => out.extend(rests.measures.iter()),
            VoiceElement::MeasuresRepeat(repeat) => {
                out.extend(repeat.pattern.iter());
                out.extend(repeat.replicas.iter());
            }
        }
    }

    pub fn last_measure_mut(&mut self) -> Option<&mut Measure> {
        match self {
            VoiceElement::Measure(measure) => Some(measure),
            VoiceElement::Repeat(repeat) => {
                if let Some(ending) = repeat.endings.last_mut() {
                    if let Some(element) = ending.elements.last_mut() {
                        return element.last_measure_mut();
                    }
                }
                repeat
                    .common_part
                    .last_mut()
                    .and_then(VoiceElement::last_measure_mut)
            }
            VoiceElement::RestMeasures(rests) => rests.measures.last_mut(),
            VoiceElement::MeasuresRepeat(repeat) => {
                if repeat.replicas.is_empty() {
                    repeat.pattern.last_mut()
                } else {
                    repeat.replicas.last_mut()
                }
            }
        }
    }

    fn measure_count(&self) -> usize {
        let mut measures = Vec::new();
        self.collect_measures(&mut measures);
        measures.len()
    }

    /// Re-point measure uplinks at `owner`
    fn set_owner(&mut self, owner: &VoiceKey) {
        match self {
            VoiceElement::Measure(measure) => measure.uplink = Some(owner.clone()),
            VoiceElement::Repeat(repeat) => {
                for element in repeat.common_part.iter_mut() {
                    element.set_owner(owner);
                }
                for ending in repeat.endings.iter_mut() {
                    for element in ending.elements.iter_mut() {
                        element.set_owner(owner);
                    }
                }
            }
            VoiceElement::RestMeasures(rests) => {
                for measure in rests.measures.iter_mut() {
                    measure.uplink = Some(owner.clone());
                }
            }
            VoiceElement::MeasuresRepeat(repeat) => {
                for measure in repeat.pattern.iter_mut().chain(repeat.replicas.iter_mut()) {
                    measure.uplink = Some(owner.clone());
                }
            }
        }
    }
}

// ============================================================================
// VOICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub number: i32,
    pub kind: VoiceKind,
    pub elements: Vec<VoiceElement>,
    pub stanzas: Vec<Stanza>,
    /// Regular voice a harmony or figured bass voice was created for
    pub regular_voice_number: Option<i32>,
    pub uplink: Option<StaffKey>,
    pub input_line: u32,

    measure_count: usize,
}

impl Voice {
    pub fn new(number: i32, kind: VoiceKind, input_line: u32) -> Self {
        Self {
            number,
            kind,
            elements: Vec::new(),
            stanzas: Vec::new(),
            regular_voice_number: None,
            uplink: None,
            input_line,
            measure_count: 0,
        }
    }

    pub fn staff_uplink(&self) -> Result<&StaffKey> {
        require(&self.uplink, self.input_line, &format!("voice {}", self.number))
    }

    pub fn key(&self) -> Result<VoiceKey> {
        Ok(self.staff_uplink()?.voice(self.number))
    }

    /// LilyPond-safe name, e.g. `Part_POne_Staff_One_Voice_One`
    pub fn name(&self) -> String {
        let prefix = match &self.uplink {
            Some(staff) => format!(
                "Part_{}_Staff_{}_",
                identifier_from(&staff.part_id),
                identifier_from(&staff.staff_number.to_string())
            ),
            None => String::new(),
        };
        let infix = match self.kind {
            VoiceKind::Regular => "Voice",
            VoiceKind::Harmony => "HarmonyVoice",
            VoiceKind::FiguredBass => "FiguredBassVoice",
        };
        format!(
            "{}{}_{}",
            prefix,
            infix,
            identifier_from(&self.number.to_string())
        )
    }

    /// Append a measure, making this voice its owner
    pub fn append_measure(&mut self, mut measure: Measure) -> Result<()> {
        measure.uplink = Some(self.key()?);
        self.measure_count += 1;
        self.elements.push(VoiceElement::Measure(measure));
        Ok(())
    }

    /// Append a wrapper or a measure, re-pointing the uplinks of its measures
    pub fn append_element(&mut self, mut element: VoiceElement) -> Result<()> {
        let owner = self.key()?;
        element.set_owner(&owner);
        self.measure_count += element.measure_count();
        self.elements.push(element);
        Ok(())
    }

    /// Number of measures, maintained as they are appended
    pub fn measure_count(&self) -> usize {
        self.measure_count
    }

    /// All measures in order, wrappers flattened
    pub fn measures(&self) -> Vec<&Measure> {
        let mut measures = Vec::with_capacity(self.measure_count);
        for element in &self.elements {
            element.collect_measures(&mut measures);
        }
        measures
    }

    pub fn last_measure_mut(&mut self) -> Option<&mut Measure> {
        self.elements
            .last_mut()
            .and_then(VoiceElement::last_measure_mut)
    }

    /// Remove the trailing plain measures, e.g. to fold them into a wrapper
    pub fn take_trailing_measures(&mut self, count: usize) -> Vec<Measure> {
        let mut taken = Vec::new();
        while taken.len() < count {
            match self.elements.last() {
                Some(VoiceElement::Measure(_)) => {}
                _ => break,
            }
            if let Some(VoiceElement::Measure(measure)) = self.elements.pop() {
                taken.push(measure);
            }
        }
        self.measure_count -= taken.len();
        taken.reverse();
        taken
    }

    pub fn has_music(&self) -> bool {
        self.measures().iter().any(|m| m.has_music())
    }

    pub fn total_duration(&self) -> Rational {
        self.measures()
            .iter()
            .fold(zero(), |total, m| total + m.accumulated_duration())
    }

    pub fn stanza_mut(&mut self, number: &str) -> Option<&mut Stanza> {
        self.stanzas.iter_mut().find(|s| s.number == number)
    }

    /// Stanza `number`, created on first use
    pub fn get_or_create_stanza(&mut self, number: &str, input_line: u32) -> Result<&mut Stanza> {
        let owner = self.key()?;
        let index = match self.stanzas.iter().position(|s| s.number == number) {
            Some(index) => index,
            None => {
                let mut stanza = Stanza::new(number, input_line);
                stanza.uplink = Some(owner);
                self.stanzas.push(stanza);
                self.stanzas.len() - 1
            }
        };
        Ok(&mut self.stanzas[index])
    }

    /// Same attributes, no measures or stanzas, owned by `owner`
    pub fn newborn_clone(&self, owner: &StaffKey) -> Voice {
        Voice {
            elements: Vec::new(),
            stanzas: Vec::new(),
            measure_count: 0,
            uplink: Some(owner.clone()),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self, owner: &StaffKey) -> Voice {
        let key = owner.voice(self.number);
        let mut copy = Voice {
            uplink: Some(owner.clone()),
            ..self.clone()
        };
        for element in copy.elements.iter_mut() {
            element.set_owner(&key);
        }
        for stanza in copy.stanzas.iter_mut() {
            stanza.uplink = Some(key.clone());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::uplinks::PartKey;

    fn owned_voice() -> Voice {
        let mut voice = Voice::new(1, VoiceKind::Regular, 10);
        voice.uplink = Some(PartKey::new("P1").staff(1));
        voice
    }

    #[test]
    fn test_name() {
        assert_eq!(owned_voice().name(), "Part_POne_Staff_One_Voice_One");
        let mut harmony = Voice::new(11, VoiceKind::Harmony, 1);
        harmony.uplink = Some(PartKey::new("P2").staff(10));
        assert_eq!(harmony.name(), "Part_PTwo_Staff_Ten_HarmonyVoice_Eleven");
    }

    #[test]
    fn test_append_requires_uplink() {
        let mut orphan = Voice::new(1, VoiceKind::Regular, 10);
        let err = orphan
            .append_measure(Measure::new("1", 1, Rational::new(1, 1), 11))
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_measure_count_and_wrappers() {
        let mut voice = owned_voice();
        for ordinal in 1..=4 {
            voice
                .append_measure(Measure::new(&ordinal.to_string(), ordinal, Rational::new(1, 1), 10))
                .unwrap();
        }
        assert_eq!(voice.measure_count(), 4);

        let folded = voice.take_trailing_measures(2);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].number, "3");
        assert_eq!(voice.measure_count(), 2);

        let mut repeat = Repeat::new(2, 30);
        repeat.common_part = folded.into_iter().map(VoiceElement::Measure).collect();
        voice.append_element(VoiceElement::Repeat(repeat)).unwrap();

        assert_eq!(voice.measure_count(), 4);
        let numbers: Vec<_> = voice.measures().iter().map(|m| m.number.clone()).collect();
        assert_eq!(numbers, vec!["1", "2", "3", "4"]);
        assert_eq!(voice.last_measure_mut().unwrap().number, "4");
    }

    #[test]
    fn test_stanza_created_once() {
        let mut voice = owned_voice();
        voice.get_or_create_stanza("1", 3).unwrap();
        voice.get_or_create_stanza("1", 4).unwrap();
        voice.get_or_create_stanza("2", 5).unwrap();
        assert_eq!(voice.stanzas.len(), 2);
        assert_eq!(voice.stanzas[0].uplink, Some(voice.key().unwrap()));
    }

    #[test]
    fn test_deep_copy_repoints_uplinks() {
        let mut voice = owned_voice();
        voice
            .append_measure(Measure::new("1", 1, Rational::new(1, 1), 10))
            .unwrap();
        let other_staff = PartKey::new("P1").staff(2);
        let copy = voice.deep_copy(&other_staff);
        assert_eq!(copy.measures()[0].uplink, Some(other_staff.voice(1)));
        assert_eq!(voice.measures()[0].uplink, Some(voice.key().unwrap()));
        assert!(voice.newborn_clone(&other_staff).elements.is_empty());
    }
}
