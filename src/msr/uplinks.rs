//! Non-owning back references
//!
//! Containers own their children. A child refers back to its owner through a
//! small value key that can be resolved against the owning [`Score`]; keys
//! never keep anything alive and cannot form ownership cycles.
//!
//! [`Score`]: crate::msr::Score

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Refers to a part group by its absolute number (0 is the implicit outer group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartGroupKey {
    pub absolute_number: u32,
}

/// Refers to a part by its id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartKey {
    pub part_id: String,
}

/// Refers to a staff within a part
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffKey {
    pub part_id: String,
    pub staff_number: i32,
}

/// Refers to a voice within a staff
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceKey {
    pub part_id: String,
    pub staff_number: i32,
    pub voice_number: i32,
}

/// Refers to a measure within a voice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasureKey {
    pub voice: VoiceKey,
    pub measure_number: String,
    pub ordinal: u32,
}

impl PartKey {
    pub fn new(part_id: &str) -> Self {
        Self {
            part_id: part_id.to_string(),
        }
    }

    pub fn staff(&self, staff_number: i32) -> StaffKey {
        StaffKey {
            part_id: self.part_id.clone(),
            staff_number,
        }
    }
}

impl StaffKey {
    pub fn part(&self) -> PartKey {
        PartKey::new(&self.part_id)
    }

    pub fn voice(&self, voice_number: i32) -> VoiceKey {
        VoiceKey {
            part_id: self.part_id.clone(),
            staff_number: self.staff_number,
            voice_number,
        }
    }
}

impl VoiceKey {
    pub fn staff(&self) -> StaffKey {
        StaffKey {
            part_id: self.part_id.clone(),
            staff_number: self.staff_number,
        }
    }

    pub fn part(&self) -> PartKey {
        PartKey::new(&self.part_id)
    }

    pub fn measure(&self, measure_number: &str, ordinal: u32) -> MeasureKey {
        MeasureKey {
            voice: self.clone(),
            measure_number: measure_number.to_string(),
            ordinal,
        }
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part {}", self.part_id)
    }
}

impl fmt::Display for StaffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part {} staff {}", self.part_id, self.staff_number)
    }
}

impl fmt::Display for VoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "part {} staff {} voice {}",
            self.part_id, self.staff_number, self.voice_number
        )
    }
}

/// Resolve an optional uplink, failing with an internal error when unset
pub(crate) fn require<'a, K>(uplink: &'a Option<K>, input_line: u32, what: &str) -> Result<&'a K> {
    uplink
        .as_ref()
        .ok_or_else(|| internal_error!(input_line, "{} has no uplink", what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_navigation() {
        let voice = PartKey::new("P1").staff(2).voice(3);
        assert_eq!(voice.staff().staff_number, 2);
        assert_eq!(voice.part().part_id, "P1");
        assert_eq!(voice.to_string(), "part P1 staff 2 voice 3");

        let measure = voice.measure("7", 6);
        assert_eq!(measure.voice, voice);
    }

    #[test]
    fn test_require_missing_uplink_is_internal() {
        let missing: Option<PartKey> = None;
        let err = require(&missing, 17, "staff 1").unwrap_err();
        assert!(err.is_internal());
        assert_eq!(err.line(), Some(17));
    }
}
