//! Score root: header data, page geometry and the top-level part groups

use crate::msr::part::Part;
use crate::msr::part_group::PartGroup;
use serde::{Deserialize, Serialize};

// ============================================================================
// IDENTIFICATION
// ============================================================================

/// Work, movement and creator information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub work_number: Option<String>,
    pub work_title: Option<String>,
    pub movement_number: Option<String>,
    pub movement_title: Option<String>,
    pub composers: Vec<String>,
    pub arrangers: Vec<String>,
    pub lyricists: Vec<String>,
    pub poets: Vec<String>,
    pub translators: Vec<String>,
    /// Creators of any other type, as (type, name)
    pub other_creators: Vec<(String, String)>,
    pub rights: Vec<String>,
    pub software: Vec<String>,
    pub encoding_date: Option<String>,
}

impl Identification {
    /// Record a `<creator type="...">`
    pub fn add_creator(&mut self, creator_type: &str, name: &str) {
        let name = name.to_string();
        match creator_type {
            "composer" => self.composers.push(name),
            "arranger" => self.arrangers.push(name),
            "lyricist" => self.lyricists.push(name),
            "poet" => self.poets.push(name),
            "translator" => self.translators.push(name),
            other => self.other_creators.push((other.to_string(), name)),
        }
    }

    /// Best title available: work title, else movement title
    pub fn title(&self) -> Option<&str> {
        self.work_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.movement_title.as_deref().filter(|t| !t.is_empty()))
    }
}

// ============================================================================
// PAGE GEOMETRY
// ============================================================================

/// `<defaults>` scaling and page layout, lengths in tenths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub millimeters: Option<f32>,
    pub tenths: Option<f32>,
    pub page_height: Option<f32>,
    pub page_width: Option<f32>,
    pub left_margin: Option<f32>,
    pub right_margin: Option<f32>,
    pub top_margin: Option<f32>,
    pub bottom_margin: Option<f32>,
    pub staff_distance: Option<f32>,
}

impl PageGeometry {
    /// Convert tenths to millimeters using the scaling, if known
    pub fn tenths_to_millimeters(&self, tenths: f32) -> Option<f32> {
        match (self.millimeters, self.tenths) {
            (Some(mm), Some(t)) if t > 0.0 => Some(tenths * mm / t),
            _ => None,
        }
    }

    /// Staff height in points: a staff is 40 tenths high
    pub fn global_staff_size(&self) -> Option<f32> {
        const POINTS_PER_MILLIMETER: f32 = 72.27 / 25.4;
        self.tenths_to_millimeters(40.0)
            .map(|mm| mm * POINTS_PER_MILLIMETER)
    }
}

/// Text placed on the page (`<credit-words>`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub page: i32,
    pub words: Vec<String>,
    pub input_line: u32,
}

// ============================================================================
// SCORE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub identification: Identification,
    pub page_geometry: PageGeometry,
    pub credits: Vec<Credit>,
    pub part_groups: Vec<PartGroup>,
    pub input_line: u32,
}

impl Score {
    pub fn new(input_line: u32) -> Self {
        Self {
            identification: Identification::default(),
            page_geometry: PageGeometry::default(),
            credits: Vec::new(),
            part_groups: Vec::new(),
            input_line,
        }
    }

    /// Add a top-level part group
    pub fn add_part_group(&mut self, mut group: PartGroup) {
        group.uplink = None;
        self.part_groups.push(group);
    }

    /// All parts, depth-first in part list order
    pub fn parts(&self) -> Vec<&Part> {
        self.part_groups.iter().flat_map(|g| g.parts()).collect()
    }

    pub fn part(&self, id: &str) -> Option<&Part> {
        self.part_groups.iter().find_map(|g| g.find_part(id))
    }

    pub fn part_mut(&mut self, id: &str) -> Option<&mut Part> {
        self.part_groups.iter_mut().find_map(|g| g.find_part_mut(id))
    }

    pub fn global_staff_size(&self) -> Option<f32> {
        self.page_geometry.global_staff_size()
    }

    /// Header data and geometry only
    pub fn newborn_clone(&self) -> Score {
        Score {
            part_groups: Vec::new(),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self) -> Score {
        Score {
            part_groups: self.part_groups.iter().map(|g| g.deep_copy(None)).collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creators_by_kind() {
        let mut identification = Identification::default();
        identification.add_creator("composer", "J. S. Bach");
        identification.add_creator("lyricist", "Picander");
        identification.add_creator("engraver", "Someone");
        assert_eq!(identification.composers, vec!["J. S. Bach"]);
        assert_eq!(identification.lyricists, vec!["Picander"]);
        assert_eq!(identification.other_creators.len(), 1);
    }

    #[test]
    fn test_title_fallback() {
        let mut identification = Identification {
            movement_title: Some("Allegro".to_string()),
            ..Default::default()
        };
        assert_eq!(identification.title(), Some("Allegro"));
        identification.work_title = Some("Sonata".to_string());
        assert_eq!(identification.title(), Some("Sonata"));
    }

    #[test]
    fn test_global_staff_size() {
        let geometry = PageGeometry {
            millimeters: Some(7.0292),
            tenths: Some(40.0),
            ..Default::default()
        };
        let size = geometry.global_staff_size().unwrap();
        assert!((size - 20.0).abs() < 0.01, "7.0292mm staves are 20pt, got {}", size);
        assert_eq!(PageGeometry::default().global_staff_size(), None);
    }

    #[test]
    fn test_part_lookup() {
        let mut group = PartGroup::implicit(1);
        group.append_part(Part::new("P1", 2));
        let mut score = Score::new(1);
        score.add_part_group(group);

        assert!(score.part("P1").is_some());
        score.part_mut("P1").unwrap().name = "Flute".to_string();
        assert_eq!(score.parts()[0].name, "Flute");
        assert!(score.newborn_clone().part_groups.is_empty());
        assert_eq!(score.deep_copy().parts().len(), 1);
    }
}
