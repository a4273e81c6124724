//! Visitor interface over the MusicXML element tree
//!
//! Every handler defaults to a no-op returning `Ok(())`, so a translator only
//! overrides the element kinds relevant to it. Kinds without a dedicated
//! handler are still browsed; their children reach the visitor normally.

use crate::browser::Browsable;
use crate::errors::Result;
use crate::xml::element::{ElementKind, XmlElement};

macro_rules! xml_visitor_methods {
    ($($start:ident, $end:ident;)*) => {
        $(
            fn $start(&mut self, _elt: &XmlElement) -> Result<()> {
                Ok(())
            }
            fn $end(&mut self, _elt: &XmlElement) -> Result<()> {
                Ok(())
            }
        )*
    };
}

/// Handlers for MusicXML element kinds
#[allow(unused_variables)]
pub trait XmlVisitor {
    xml_visitor_methods! {
        visit_start_score_partwise, visit_end_score_partwise;
        visit_start_work_number, visit_end_work_number;
        visit_start_work_title, visit_end_work_title;
        visit_start_movement_number, visit_end_movement_number;
        visit_start_movement_title, visit_end_movement_title;
        visit_start_creator, visit_end_creator;
        visit_start_rights, visit_end_rights;
        visit_start_software, visit_end_software;
        visit_start_encoding_date, visit_end_encoding_date;
        visit_start_scaling, visit_end_scaling;
        visit_start_page_layout, visit_end_page_layout;
        visit_start_credit, visit_end_credit;
        visit_start_part_list, visit_end_part_list;
        visit_start_part_group, visit_end_part_group;
        visit_start_score_part, visit_end_score_part;
        visit_start_part, visit_end_part;
        visit_start_measure, visit_end_measure;
        visit_start_print, visit_end_print;
        visit_start_attributes, visit_end_attributes;
        visit_start_divisions, visit_end_divisions;
        visit_start_key, visit_end_key;
        visit_start_time, visit_end_time;
        visit_start_staves, visit_end_staves;
        visit_start_clef, visit_end_clef;
        visit_start_staff_details, visit_end_staff_details;
        visit_start_transpose, visit_end_transpose;
        visit_start_measure_style, visit_end_measure_style;
        visit_start_note, visit_end_note;
        visit_start_backup, visit_end_backup;
        visit_start_forward, visit_end_forward;
        visit_start_direction, visit_end_direction;
        visit_start_harmony, visit_end_harmony;
        visit_start_figured_bass, visit_end_figured_bass;
        visit_start_barline, visit_end_barline;
    }

    /// Called for every element without a dedicated handler
    fn visit_start_other(&mut self, elt: &XmlElement) -> Result<()> {
        Ok(())
    }

    fn visit_end_other(&mut self, elt: &XmlElement) -> Result<()> {
        Ok(())
    }
}

impl<'a, V: XmlVisitor + ?Sized> Browsable<V> for &'a XmlElement {
    fn accept_in(&self, visitor: &mut V) -> Result<()> {
        log::trace!("--> Start visiting {}", self);
        let elt: &XmlElement = self;
        match elt.kind() {
            ElementKind::ScorePartwise => visitor.visit_start_score_partwise(elt),
            ElementKind::WorkNumber => visitor.visit_start_work_number(elt),
            ElementKind::WorkTitle => visitor.visit_start_work_title(elt),
            ElementKind::MovementNumber => visitor.visit_start_movement_number(elt),
            ElementKind::MovementTitle => visitor.visit_start_movement_title(elt),
            ElementKind::Creator => visitor.visit_start_creator(elt),
            ElementKind::Rights => visitor.visit_start_rights(elt),
            ElementKind::Software => visitor.visit_start_software(elt),
            ElementKind::EncodingDate => visitor.visit_start_encoding_date(elt),
            ElementKind::Scaling => visitor.visit_start_scaling(elt),
            ElementKind::PageLayout => visitor.visit_start_page_layout(elt),
            ElementKind::Credit => visitor.visit_start_credit(elt),
            ElementKind::PartList => visitor.visit_start_part_list(elt),
            ElementKind::PartGroup => visitor.visit_start_part_group(elt),
            ElementKind::ScorePart => visitor.visit_start_score_part(elt),
            ElementKind::Part => visitor.visit_start_part(elt),
            ElementKind::Measure => visitor.visit_start_measure(elt),
            ElementKind::Print => visitor.visit_start_print(elt),
            ElementKind::Attributes => visitor.visit_start_attributes(elt),
            ElementKind::Divisions => visitor.visit_start_divisions(elt),
            ElementKind::Key => visitor.visit_start_key(elt),
            ElementKind::Time => visitor.visit_start_time(elt),
            ElementKind::Staves => visitor.visit_start_staves(elt),
            ElementKind::Clef => visitor.visit_start_clef(elt),
            ElementKind::StaffDetails => visitor.visit_start_staff_details(elt),
            ElementKind::Transpose => visitor.visit_start_transpose(elt),
            ElementKind::MeasureStyle => visitor.visit_start_measure_style(elt),
            ElementKind::Note => visitor.visit_start_note(elt),
            ElementKind::Backup => visitor.visit_start_backup(elt),
            ElementKind::Forward => visitor.visit_start_forward(elt),
            ElementKind::Direction => visitor.visit_start_direction(elt),
            ElementKind::Harmony => visitor.visit_start_harmony(elt),
            ElementKind::FiguredBass => visitor.visit_start_figured_bass(elt),
            ElementKind::Barline => visitor.visit_start_barline(elt),
            _ => visitor.visit_start_other(elt),
        }
    }

    fn accept_out(&self, visitor: &mut V) -> Result<()> {
        let elt: &XmlElement = self;
        match elt.kind() {
            ElementKind::ScorePartwise => visitor.visit_end_score_partwise(elt),
            ElementKind::WorkNumber => visitor.visit_end_work_number(elt),
            ElementKind::WorkTitle => visitor.visit_end_work_title(elt),
            ElementKind::MovementNumber => visitor.visit_end_movement_number(elt),
            ElementKind::MovementTitle => visitor.visit_end_movement_title(elt),
            ElementKind::Creator => visitor.visit_end_creator(elt),
            ElementKind::Rights => visitor.visit_end_rights(elt),
            ElementKind::Software => visitor.visit_end_software(elt),
            ElementKind::EncodingDate => visitor.visit_end_encoding_date(elt),
            ElementKind::Scaling => visitor.visit_end_scaling(elt),
            ElementKind::PageLayout => visitor.visit_end_page_layout(elt),
            ElementKind::Credit => visitor.visit_end_credit(elt),
            ElementKind::PartList => visitor.visit_end_part_list(elt),
            ElementKind::PartGroup => visitor.visit_end_part_group(elt),
            ElementKind::ScorePart => visitor.visit_end_score_part(elt),
            ElementKind::Part => visitor.visit_end_part(elt),
            ElementKind::Measure => visitor.visit_end_measure(elt),
            ElementKind::Print => visitor.visit_end_print(elt),
            ElementKind::Attributes => visitor.visit_end_attributes(elt),
            ElementKind::Divisions => visitor.visit_end_divisions(elt),
            ElementKind::Key => visitor.visit_end_key(elt),
            ElementKind::Time => visitor.visit_end_time(elt),
            ElementKind::Staves => visitor.visit_end_staves(elt),
            ElementKind::Clef => visitor.visit_end_clef(elt),
            ElementKind::StaffDetails => visitor.visit_end_staff_details(elt),
            ElementKind::Transpose => visitor.visit_end_transpose(elt),
            ElementKind::MeasureStyle => visitor.visit_end_measure_style(elt),
            ElementKind::Note => visitor.visit_end_note(elt),
            ElementKind::Backup => visitor.visit_end_backup(elt),
            ElementKind::Forward => visitor.visit_end_forward(elt),
            ElementKind::Direction => visitor.visit_end_direction(elt),
            ElementKind::Harmony => visitor.visit_end_harmony(elt),
            ElementKind::FiguredBass => visitor.visit_end_figured_bass(elt),
            ElementKind::Barline => visitor.visit_end_barline(elt),
            _ => visitor.visit_end_other(elt),
        }
    }

    fn children(&self) -> Vec<Self> {
        let elt: &'a XmlElement = self;
        elt.children().iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::browse;

    /// Counts only clefs and notes, ignoring everything else
    #[derive(Default)]
    struct Counter {
        clefs: usize,
        notes_started: usize,
        notes_ended: usize,
        others: usize,
    }

    impl XmlVisitor for Counter {
        fn visit_start_clef(&mut self, _elt: &XmlElement) -> Result<()> {
            self.clefs += 1;
            Ok(())
        }
        fn visit_start_note(&mut self, _elt: &XmlElement) -> Result<()> {
            self.notes_started += 1;
            Ok(())
        }
        fn visit_end_note(&mut self, _elt: &XmlElement) -> Result<()> {
            self.notes_ended += 1;
            Ok(())
        }
        fn visit_start_other(&mut self, _elt: &XmlElement) -> Result<()> {
            self.others += 1;
            Ok(())
        }
    }

    #[test]
    fn test_unhandled_kinds_are_skipped_but_children_browsed() {
        let measure = XmlElement::new("measure", 1)
            .with_child(
                XmlElement::new("attributes", 2)
                    .with_child(XmlElement::new("clef", 3).with_child(XmlElement::new("sign", 4))),
            )
            .with_child(XmlElement::new("note", 5).with_child(XmlElement::new("rest", 6)))
            .with_child(XmlElement::new("note", 7));

        let mut counter = Counter::default();
        browse(&mut counter, &measure).unwrap();

        assert_eq!(counter.clefs, 1, "clef nested in attributes must be reached");
        assert_eq!(counter.notes_started, 2);
        assert_eq!(counter.notes_ended, 2);
        // sign and rest have no dedicated handler
        assert_eq!(counter.others, 2);
    }
}
