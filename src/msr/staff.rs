//! Staves

use crate::errors::Result;
use crate::msr::uplinks::{require, PartKey, StaffKey};
use crate::msr::voice::{Voice, VoiceKind};
use serde::{Deserialize, Serialize};

/// Staff number reserved for a part's chord symbols
pub const HARMONY_STAFF_NUMBER: i32 = 10;
/// Voice number of the harmony voice, within the harmony staff
pub const HARMONY_VOICE_NUMBER: i32 = 11;
/// Staff number reserved for a part's figured bass
pub const FIGURED_BASS_STAFF_NUMBER: i32 = 20;
/// Voice number of the figured bass voice, within its staff
pub const FIGURED_BASS_VOICE_NUMBER: i32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffKind {
    Regular,
    Tablature,
    Drum,
    Harmony,
    FiguredBass,
    Rhythmic,
}

impl StaffKind {
    /// Staves that are printed as a staff of their own
    pub fn has_staff_block(&self) -> bool {
        matches!(
            self,
            StaffKind::Regular | StaffKind::Tablature | StaffKind::Drum | StaffKind::Rhythmic
        )
    }
}

/// Tuning of one line of a tablature staff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffTuning {
    pub line: i32,
    pub step: u8,
    pub alteration: i8,
    pub octave: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub number: i32,
    pub kind: StaffKind,
    pub lines: u32,
    pub tunings: Vec<StaffTuning>,
    pub uplink: Option<PartKey>,
    pub input_line: u32,

    voices: Vec<Voice>,
}

impl Staff {
    pub fn new(number: i32, kind: StaffKind, input_line: u32) -> Self {
        Self {
            number,
            kind,
            lines: 5,
            tunings: Vec::new(),
            uplink: None,
            input_line,
            voices: Vec::new(),
        }
    }

    pub fn part_uplink(&self) -> Result<&PartKey> {
        require(&self.uplink, self.input_line, &format!("staff {}", self.number))
    }

    pub fn key(&self) -> Result<StaffKey> {
        Ok(self.part_uplink()?.staff(self.number))
    }

    /// Voices in creation order
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    pub fn voice(&self, number: i32) -> Option<&Voice> {
        self.voices.iter().find(|v| v.number == number)
    }

    pub fn voice_mut(&mut self, number: i32) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|v| v.number == number)
    }

    /// Add a voice, making this staff its owner; voice numbers are unique
    pub fn register_voice(&mut self, mut voice: Voice) -> Result<&mut Voice> {
        if self.voice(voice.number).is_some() {
            return Err(internal_error!(
                voice.input_line,
                "voice {} already exists in staff {}",
                voice.number,
                self.number
            ));
        }
        let owner = self.key()?;
        if voice.uplink.as_ref() != Some(&owner) {
            voice = voice.deep_copy(&owner);
        }
        self.voices.push(voice);
        let index = self.voices.len() - 1;
        Ok(&mut self.voices[index])
    }

    /// Regular voices, in creation order
    pub fn regular_voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(|v| v.kind == VoiceKind::Regular)
    }

    /// Same attributes, no voices, owned by `owner`
    pub fn newborn_clone(&self, owner: &PartKey) -> Staff {
        Staff {
            voices: Vec::new(),
            uplink: Some(owner.clone()),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self, owner: &PartKey) -> Staff {
        let key = owner.staff(self.number);
        Staff {
            voices: self.voices.iter().map(|v| v.deep_copy(&key)).collect(),
            uplink: Some(owner.clone()),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned_staff(number: i32) -> Staff {
        let mut staff = Staff::new(number, StaffKind::Regular, 5);
        staff.uplink = Some(PartKey::new("P1"));
        staff
    }

    #[test]
    fn test_register_voice_sets_uplink() {
        let mut staff = owned_staff(2);
        let voice = staff
            .register_voice(Voice::new(3, VoiceKind::Regular, 6))
            .unwrap();
        assert_eq!(voice.key().unwrap(), PartKey::new("P1").staff(2).voice(3));
    }

    #[test]
    fn test_duplicate_voice_is_internal_error() {
        let mut staff = owned_staff(1);
        staff.register_voice(Voice::new(1, VoiceKind::Regular, 6)).unwrap();
        let err = staff
            .register_voice(Voice::new(1, VoiceKind::Regular, 9))
            .unwrap_err();
        assert_eq!(err.line(), Some(9));
    }

    #[test]
    fn test_orphan_staff_cannot_own_voices() {
        let mut staff = Staff::new(1, StaffKind::Regular, 5);
        assert!(staff.register_voice(Voice::new(1, VoiceKind::Regular, 6)).is_err());
    }

    #[test]
    fn test_clones() {
        let mut staff = owned_staff(1);
        staff.register_voice(Voice::new(1, VoiceKind::Regular, 6)).unwrap();
        let owner = PartKey::new("P9");
        assert!(staff.newborn_clone(&owner).voices().is_empty());
        let copy = staff.deep_copy(&owner);
        assert_eq!(copy.voices()[0].uplink, Some(owner.staff(1)));
        assert!(StaffKind::Drum.has_staff_block());
        assert!(!StaffKind::Harmony.has_staff_block());
    }
}
