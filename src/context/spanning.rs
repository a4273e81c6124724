//! Staff numbering across parts
//!
//! Staff numbers are per part in the source but global in the Guido output,
//! so the running counters survive from one part to the next. They decide
//! which staff a voice is written to, which intermediate staves must be
//! synthesized for gaps, and which staff ranges are braced.

use std::collections::BTreeSet;

/// Where a voice goes, and what must be emitted before it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePlacement {
    /// Global index of the staff the voice is written to
    pub staff_index: i32,
    /// The voice shares its staff with the previous voice of the part
    pub notes_only: bool,
    /// Empty staves to create first, in increasing order
    pub synthesized: Vec<i32>,
}

/// Brace and system barline format over a staff range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accolade {
    pub id: i32,
    pub first: i32,
    pub last: i32,
}

#[derive(Debug, Clone, Default)]
pub struct StaffSpanning {
    current_staff_index: i32,
    current_accolade_index: i32,
    current_part_staff_offset: i32,
    /// Main staff of the previous voice in the current part
    target_staff: Option<i32>,
    bar_formatted: BTreeSet<i32>,
}

impl StaffSpanning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_staff_index(&self) -> i32 {
        self.current_staff_index
    }

    pub fn current_part_staff_offset(&self) -> i32 {
        self.current_part_staff_offset
    }

    pub fn begin_part(&mut self) {
        self.target_staff = None;
    }

    /// Place the next voice of the part, given its main staff in the part.
    ///
    /// Voices must come in ascending number so main staves never go back.
    pub fn place_voice(&mut self, main_staff: i32) -> VoicePlacement {
        let mut synthesized = Vec::new();
        let notes_only = match self.target_staff {
            Some(target) if target == main_staff => true,
            Some(target) => {
                if main_staff > target {
                    self.current_staff_index += 1;
                }
                false
            }
            None => {
                self.current_staff_index += 1;
                false
            }
        };

        if !notes_only {
            self.target_staff = Some(main_staff);
            while self.current_staff_index < main_staff + self.current_part_staff_offset {
                synthesized.push(self.current_staff_index);
                self.current_staff_index += 1;
            }
        }

        VoicePlacement {
            staff_index: self.current_staff_index,
            notes_only,
            synthesized,
        }
    }

    /// Brace the part's staves if this is the first voice entering them
    pub fn open_accolade(&mut self, part_staff_count: i32) -> Option<Accolade> {
        if part_staff_count <= 1 || self.current_staff_index <= self.current_accolade_index {
            return None;
        }
        let accolade = Accolade {
            id: self.current_accolade_index,
            first: self
                .current_staff_index
                .min(self.current_part_staff_offset + 1),
            last: self.current_part_staff_offset + part_staff_count,
        };
        for index in accolade.first..=accolade.last {
            self.bar_formatted.insert(index);
        }
        self.current_accolade_index = accolade.last;
        Some(accolade)
    }

    /// Whether the current staff still needs a barline format of its own.
    ///
    /// Only relevant with several staves in the score; each staff gets at
    /// most one.
    pub fn needs_lonely_bar_format(&mut self, score_staff_count: i32) -> bool {
        if score_staff_count <= 1 || self.current_staff_index <= self.current_accolade_index {
            return false;
        }
        self.bar_formatted.insert(self.current_staff_index)
    }

    /// Record a barline format emitted for a part group range
    pub fn mark_bar_formatted(&mut self, first: i32, last: i32) {
        for index in first..=last {
            self.bar_formatted.insert(index);
        }
    }

    /// Close the part; returns the declared staves no voice used
    pub fn end_part(&mut self, part_staff_count: i32) -> Vec<i32> {
        let mut implicit = Vec::new();
        while self.current_staff_index < self.current_part_staff_offset + part_staff_count {
            self.current_staff_index += 1;
            implicit.push(self.current_staff_index);
        }
        self.current_part_staff_offset += part_staff_count;
        self.target_staff = None;
        implicit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_staff_part_then_single_staff_part() {
        let mut spanning = StaffSpanning::new();

        spanning.begin_part();
        let first = spanning.place_voice(1);
        assert_eq!(first.staff_index, 1);
        assert!(first.synthesized.is_empty());
        let accolade = spanning.open_accolade(2).unwrap();
        assert_eq!((accolade.first, accolade.last), (1, 2));

        let shared = spanning.place_voice(1);
        assert!(shared.notes_only);
        assert_eq!(shared.staff_index, 1);

        let lower = spanning.place_voice(2);
        assert_eq!(lower.staff_index, 2);
        assert!(spanning.open_accolade(2).is_none(), "already braced");
        assert!(spanning.end_part(2).is_empty());

        spanning.begin_part();
        let flute = spanning.place_voice(1);
        assert_eq!(flute.staff_index, 3);
        assert!(spanning.needs_lonely_bar_format(3));
        assert!(!spanning.needs_lonely_bar_format(3), "one barline format per staff");
        spanning.end_part(1);
        assert_eq!(spanning.current_part_staff_offset(), 3);
    }

    #[test]
    fn test_gaps_are_synthesized() {
        let mut spanning = StaffSpanning::new();
        spanning.begin_part();
        let placement = spanning.place_voice(3);
        assert_eq!(placement.synthesized, vec![1, 2]);
        assert_eq!(placement.staff_index, 3);
        assert_eq!(spanning.end_part(4), vec![4], "unused declared staff is created at part end");
    }
}
