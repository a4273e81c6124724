//! Parts

use crate::errors::Result;
use crate::msr::attributes::Transpose;
use crate::msr::staff::{Staff, StaffKind};
use crate::msr::uplinks::{require, PartGroupKey, PartKey};
use crate::msr::voice::Voice;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub instrument_name: String,
    pub instrument_abbreviation: String,
    pub transpose: Option<Transpose>,
    /// `<staves>` as declared, 0 when absent
    pub declared_staff_count: i32,
    pub uplink: Option<PartGroupKey>,
    pub input_line: u32,

    staves: Vec<Staff>,
    regular_staff_count: usize,
}

impl Part {
    pub fn new(id: &str, input_line: u32) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            abbreviation: String::new(),
            instrument_name: String::new(),
            instrument_abbreviation: String::new(),
            transpose: None,
            declared_staff_count: 0,
            uplink: None,
            input_line,
            staves: Vec::new(),
            regular_staff_count: 0,
        }
    }

    pub fn key(&self) -> PartKey {
        PartKey::new(&self.id)
    }

    pub fn part_group_uplink(&self) -> Result<&PartGroupKey> {
        require(&self.uplink, self.input_line, &format!("part {}", self.id))
    }

    /// `"name" (id)`, for messages
    pub fn combined_name(&self) -> String {
        if self.name.is_empty() {
            self.id.clone()
        } else {
            format!("\"{}\" ({})", self.name, self.id)
        }
    }

    /// Staves in increasing number order, whatever order they were created in
    pub fn staves(&self) -> &[Staff] {
        &self.staves
    }

    pub fn staff(&self, number: i32) -> Option<&Staff> {
        self.staves.iter().find(|s| s.number == number)
    }

    pub fn staff_mut(&mut self, number: i32) -> Option<&mut Staff> {
        self.staves.iter_mut().find(|s| s.number == number)
    }

    /// Add a staff, making this part its owner; staff numbers are unique
    pub fn add_staff(&mut self, staff: Staff) -> Result<&mut Staff> {
        if self.staff(staff.number).is_some() {
            return Err(internal_error!(
                staff.input_line,
                "staff {} already exists in part {}",
                staff.number,
                self.combined_name()
            ));
        }
        let staff = if staff.uplink.as_ref() == Some(&self.key()) {
            staff
        } else {
            staff.deep_copy(&self.key())
        };
        if staff.kind == StaffKind::Regular {
            self.regular_staff_count += 1;
        }
        let index = self.staves.partition_point(|s| s.number < staff.number);
        self.staves.insert(index, staff);
        Ok(&mut self.staves[index])
    }

    /// Staff `number`, created with `kind` on first use
    pub fn get_or_create_staff(
        &mut self,
        number: i32,
        kind: StaffKind,
        input_line: u32,
    ) -> Result<&mut Staff> {
        match self.staves.iter().position(|s| s.number == number) {
            Some(index) => Ok(&mut self.staves[index]),
            None => {
                log::debug!("creating staff {} in part {}", number, self.combined_name());
                let mut staff = Staff::new(number, kind, input_line);
                staff.uplink = Some(self.key());
                self.add_staff(staff)
            }
        }
    }

    /// Change a staff's kind, keeping the regular staff count current
    pub fn set_staff_kind(&mut self, number: i32, kind: StaffKind) {
        let Some(staff) = self.staves.iter_mut().find(|s| s.number == number) else {
            return;
        };
        if staff.kind == StaffKind::Regular && kind != StaffKind::Regular {
            self.regular_staff_count -= 1;
        } else if staff.kind != StaffKind::Regular && kind == StaffKind::Regular {
            self.regular_staff_count += 1;
        }
        staff.kind = kind;
    }

    /// Number of regular staves, maintained as staves are added
    pub fn regular_staff_count(&self) -> usize {
        self.regular_staff_count
    }

    pub fn voice(&self, staff_number: i32, voice_number: i32) -> Option<&Voice> {
        self.staff(staff_number)?.voice(voice_number)
    }

    pub fn voice_mut(&mut self, staff_number: i32, voice_number: i32) -> Option<&mut Voice> {
        self.staff_mut(staff_number)?.voice_mut(voice_number)
    }

    /// Every voice of every staff, staves in number order
    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.staves.iter().flat_map(|s| s.voices().iter())
    }

    /// Same attributes, no staves, owned by `owner`
    pub fn newborn_clone(&self, owner: &PartGroupKey) -> Part {
        Part {
            staves: Vec::new(),
            regular_staff_count: 0,
            uplink: Some(*owner),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self, owner: &PartGroupKey) -> Part {
        let key = self.key();
        Part {
            staves: self.staves.iter().map(|s| s.deep_copy(&key)).collect(),
            uplink: Some(*owner),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staves_kept_in_number_order_and_counted() {
        let mut part = Part::new("P1", 3);
        part.get_or_create_staff(2, StaffKind::Regular, 10).unwrap();
        part.get_or_create_staff(1, StaffKind::Regular, 11).unwrap();
        part.get_or_create_staff(2, StaffKind::Regular, 12).unwrap();
        part.get_or_create_staff(10, StaffKind::Harmony, 13).unwrap();

        let numbers: Vec<i32> = part.staves().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 10], "discovery order does not matter");
        assert_eq!(part.regular_staff_count(), 2, "harmony staves are not regular");

        part.set_staff_kind(1, StaffKind::Tablature);
        assert_eq!(part.regular_staff_count(), 1);
    }

    #[test]
    fn test_duplicate_staff_is_internal_error() {
        let mut part = Part::new("P1", 3);
        let mut staff = Staff::new(1, StaffKind::Regular, 4);
        staff.uplink = Some(part.key());
        part.add_staff(staff.clone()).unwrap();
        assert!(part.add_staff(staff).unwrap_err().is_internal());
    }

    #[test]
    fn test_clone_isolation() {
        let owner = PartGroupKey { absolute_number: 0 };
        let mut canonical = Part::new("P1", 3);
        canonical.get_or_create_staff(1, StaffKind::Regular, 4).unwrap();

        let mut target = canonical.newborn_clone(&owner);
        target.get_or_create_staff(1, StaffKind::Regular, 4).unwrap();
        target.get_or_create_staff(2, StaffKind::Regular, 4).unwrap();

        assert_eq!(canonical.staves().len(), 1);
        assert_eq!(canonical.regular_staff_count(), 1);
        assert_eq!(target.regular_staff_count(), 2);
        assert_eq!(canonical.deep_copy(&owner).staves().len(), 1);
    }
}
