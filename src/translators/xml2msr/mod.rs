//! MusicXML element tree to score model
//!
//! [`MsrBuilder`] browses the element tree once. Score level elements fill
//! the identification, geometry and credits; the part list builds the part
//! group hierarchy; each `<part>` is then handed to a
//! [`part::PartBuilder`] that creates staves and voices on demand.

mod attributes;
mod directions;
mod folding;
mod notes;
mod part;

use std::mem;

use crate::browser::browse;
use crate::context::{NestingStack, Slot};
use crate::diagnostics::{DiagnosticMark, Diagnostics};
use crate::errors::{ParseError, Result, TranslationError};
use crate::msr::part::Part;
use crate::msr::part_group::{PartGroup, PartGroupSymbol};
use crate::msr::score::{Credit, Score};
use crate::xml::element::{ElementKind, XmlElement};
use crate::xml::visitor::XmlVisitor;
use part::{PartBuilder, PartState};

/// Build the score model from a parsed `<score-partwise>` element
pub fn build_msr(root: &XmlElement) -> Result<(Score, Diagnostics)> {
    MsrBuilder::new().build(root)
}

pub struct MsrBuilder {
    score: Score,
    diagnostics: Diagnostics,
    part_groups: NestingStack<PartGroup>,
    /// Absolute numbers handed out to part groups in start order
    group_count: u32,
    part: Slot<Part>,
    part_state: PartState,
    note_ordinals: u32,
}

impl Default for MsrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MsrBuilder {
    pub fn new() -> Self {
        Self {
            score: Score::new(0),
            diagnostics: Diagnostics::new(),
            part_groups: NestingStack::new(),
            group_count: 0,
            part: Slot::new("part"),
            part_state: PartState::default(),
            note_ordinals: 0,
        }
    }

    pub fn build(mut self, root: &XmlElement) -> Result<(Score, Diagnostics)> {
        if !root.is(&ElementKind::ScorePartwise) {
            return Err(TranslationError::Parse(ParseError::UnsupportedFormat(format!(
                "root element <{}> is not <score-partwise>",
                root.name()
            ))));
        }
        browse(&mut self, root)?;
        if self.score.parts().is_empty() {
            self.diagnostics.warn(root.line(), "empty_score", "score-partwise", "score has no parts");
        }
        log::info!(
            "score model built: {} part(s), {} diagnostic(s)",
            self.score.parts().len(),
            self.diagnostics.len()
        );
        Ok((self.score, self.diagnostics))
    }

    fn in_part(&mut self, input_line: u32) -> Result<PartBuilder<'_>> {
        let Some(part) = self.part.as_mut() else {
            return Err(internal_error!(input_line, "part content outside of a <part>"));
        };
        Ok(PartBuilder {
            part,
            state: &mut self.part_state,
            diagnostics: &mut self.diagnostics,
            note_ordinals: &mut self.note_ordinals,
        })
    }

    fn current_part_id(&self) -> Option<&str> {
        self.part.as_ref().map(|p| p.id.as_str())
    }

    fn warn(&mut self, line: u32, kind: &str, element: &str, message: impl Into<String>) {
        let part_id = self.current_part_id().map(str::to_string);
        self.diagnostics.add(
            DiagnosticMark::warning(line, kind, element, message).in_context(part_id.as_deref(), None),
        );
    }

    /// Put the finished part back into the group that lists it
    fn store_part(&mut self, part: Part, input_line: u32) -> Result<()> {
        match self.score.part_mut(&part.id) {
            Some(slot) => {
                *slot = part;
                Ok(())
            }
            None => Err(internal_error!(input_line, "part {} vanished from the part list", part.id)),
        }
    }
}

fn optional_text(elt: &XmlElement) -> Option<String> {
    let text = elt.text();
    (!text.is_empty()).then(|| text.to_string())
}

// ============================================================================
// SCORE LEVEL
// ============================================================================

impl XmlVisitor for MsrBuilder {
    fn visit_start_score_partwise(&mut self, elt: &XmlElement) -> Result<()> {
        self.score.input_line = elt.line();
        Ok(())
    }

    fn visit_start_work_number(&mut self, elt: &XmlElement) -> Result<()> {
        self.score.identification.work_number = optional_text(elt);
        Ok(())
    }

    fn visit_start_work_title(&mut self, elt: &XmlElement) -> Result<()> {
        self.score.identification.work_title = optional_text(elt);
        Ok(())
    }

    fn visit_start_movement_number(&mut self, elt: &XmlElement) -> Result<()> {
        self.score.identification.movement_number = optional_text(elt);
        Ok(())
    }

    fn visit_start_movement_title(&mut self, elt: &XmlElement) -> Result<()> {
        self.score.identification.movement_title = optional_text(elt);
        Ok(())
    }

    fn visit_start_creator(&mut self, elt: &XmlElement) -> Result<()> {
        if !elt.text().is_empty() {
            self.score
                .identification
                .add_creator(elt.attribute_value("type"), elt.text());
        }
        Ok(())
    }

    fn visit_start_rights(&mut self, elt: &XmlElement) -> Result<()> {
        if let Some(rights) = optional_text(elt) {
            self.score.identification.rights.push(rights);
        }
        Ok(())
    }

    fn visit_start_software(&mut self, elt: &XmlElement) -> Result<()> {
        if let Some(software) = optional_text(elt) {
            self.score.identification.software.push(software);
        }
        Ok(())
    }

    fn visit_start_encoding_date(&mut self, elt: &XmlElement) -> Result<()> {
        self.score.identification.encoding_date = optional_text(elt);
        Ok(())
    }

    fn visit_start_scaling(&mut self, elt: &XmlElement) -> Result<()> {
        let geometry = &mut self.score.page_geometry;
        geometry.millimeters = elt.child(&ElementKind::Millimeters).map(|e| e.float_value(0.0));
        geometry.tenths = elt.child(&ElementKind::Tenths).map(|e| e.float_value(0.0));
        Ok(())
    }

    fn visit_start_page_layout(&mut self, elt: &XmlElement) -> Result<()> {
        let float = |kind: ElementKind| elt.find(&kind).map(|e| e.float_value(0.0));
        let geometry = &mut self.score.page_geometry;
        geometry.page_height = float(ElementKind::PageHeight);
        geometry.page_width = float(ElementKind::PageWidth);
        geometry.left_margin = float(ElementKind::LeftMargin);
        geometry.right_margin = float(ElementKind::RightMargin);
        geometry.top_margin = float(ElementKind::TopMargin);
        geometry.bottom_margin = float(ElementKind::BottomMargin);
        Ok(())
    }

    fn visit_start_credit(&mut self, elt: &XmlElement) -> Result<()> {
        let words = elt
            .children_of(&ElementKind::CreditWords)
            .filter_map(optional_text)
            .collect();
        self.score.credits.push(Credit {
            page: elt.attribute_int("page", 1),
            words,
            input_line: elt.line(),
        });
        Ok(())
    }

    /// `<staff-layout>` inside `<defaults>` sets the staff distance
    fn visit_start_other(&mut self, elt: &XmlElement) -> Result<()> {
        if elt.is(&ElementKind::StaffLayout) && !self.part.is_set() {
            if let Some(distance) = elt.child(&ElementKind::StaffDistance) {
                self.score.page_geometry.staff_distance = Some(distance.float_value(0.0));
            }
        }
        Ok(())
    }

    // ========================================================================
    // PART LIST
    // ========================================================================

    fn visit_start_part_list(&mut self, elt: &XmlElement) -> Result<()> {
        self.part_groups.push(PartGroup::implicit(elt.line()));
        Ok(())
    }

    fn visit_start_part_group(&mut self, elt: &XmlElement) -> Result<()> {
        let number = elt.attribute_int("number", 1);
        match elt.attribute_value("type") {
            "start" => {
                self.group_count += 1;
                let mut group = PartGroup::new(number, self.group_count, elt.line());
                if let Some(symbol) = elt.child_text(&ElementKind::GroupSymbol) {
                    match PartGroupSymbol::from_name(symbol) {
                        Some(symbol) => group.symbol = symbol,
                        None => self.warn(
                            elt.line(),
                            "unknown_group_symbol",
                            "group-symbol",
                            format!("group symbol \"{}\" is unknown", symbol),
                        ),
                    }
                }
                group.barline = elt.child_value(&ElementKind::GroupBarline) == "yes";
                group.name = elt.child_text(&ElementKind::GroupName).map(str::to_string);
                group.abbreviation = elt
                    .child_text(&ElementKind::GroupAbbreviation)
                    .map(str::to_string);
                self.part_groups.push(group);
            }
            "stop" => {
                let depth = self
                    .part_groups
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| !g.is_implicit() && g.number == number)
                    .map(|(index, _)| index)
                    .last();
                let Some(depth) = depth else {
                    self.warn(
                        elt.line(),
                        "unknown_part_group",
                        "part-group",
                        format!("part group {} stops without having started", number),
                    );
                    return Ok(());
                };
                let inner = self.part_groups.depth() - depth - 1;
                if inner > 0 {
                    self.warn(
                        elt.line(),
                        "overlapping_part_groups",
                        "part-group",
                        format!("part group {} stops while {} inner group(s) are open", number, inner),
                    );
                }
                for _ in 0..=inner {
                    self.part_groups.close(elt.line())?;
                }
            }
            other => self.warn(
                elt.line(),
                "unknown_part_group_type",
                "part-group",
                format!("part group type \"{}\" is unknown", other),
            ),
        }
        Ok(())
    }

    fn visit_start_score_part(&mut self, elt: &XmlElement) -> Result<()> {
        let id = elt.attribute_value("id").trim();
        if id.is_empty() {
            return Err(TranslationError::Parse(ParseError::MissingRequiredElement(format!(
                "<score-part> without an id at line {}",
                elt.line()
            ))));
        }
        let mut part = Part::new(id, elt.line());
        part.name = elt.child_value(&ElementKind::PartName).to_string();
        part.abbreviation = elt.child_value(&ElementKind::PartAbbreviation).to_string();
        if let Some(instrument) = elt.child(&ElementKind::ScoreInstrument) {
            part.instrument_name = instrument.child_value(&ElementKind::InstrumentName).to_string();
            part.instrument_abbreviation = instrument
                .child_value(&ElementKind::InstrumentAbbreviation)
                .to_string();
        }
        self.part_groups.require_top(elt.line())?.append_part(part);
        Ok(())
    }

    fn visit_end_part_list(&mut self, elt: &XmlElement) -> Result<()> {
        let unclosed = self.part_groups.depth().saturating_sub(1);
        if unclosed > 0 {
            self.warn(
                elt.line(),
                "unclosed_part_group",
                "part-group",
                format!("{} part group(s) never stopped", unclosed),
            );
        }
        if let Some(group) = self.part_groups.close_all(elt.line())? {
            self.score.add_part_group(group);
        }
        Ok(())
    }

    // ========================================================================
    // PARTS
    // ========================================================================

    fn visit_start_part(&mut self, elt: &XmlElement) -> Result<()> {
        let id = elt.attribute_value("id").trim().to_string();
        let part = match self.score.part_mut(&id) {
            Some(listed) => {
                let line = listed.input_line;
                mem::replace(listed, Part::new(&id, line))
            }
            None => {
                self.warn(
                    elt.line(),
                    "unlisted_part",
                    "part",
                    format!("part \"{}\" is missing from the part list", id),
                );
                if self.score.part_groups.is_empty() {
                    self.score.add_part_group(PartGroup::implicit(elt.line()));
                }
                if let Some(group) = self.score.part_groups.first_mut() {
                    group.append_part(Part::new(&id, elt.line()));
                }
                Part::new(&id, elt.line())
            }
        };
        log::debug!("reading part {}", part.combined_name());
        self.part.set(part);
        self.part_state = PartState::default();
        Ok(())
    }

    fn visit_end_part(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.end_part(elt.line())?;
        let part = self.part.take(elt.line())?;
        self.store_part(part, elt.line())
    }

    fn visit_start_measure(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.start_measure(elt);
        Ok(())
    }

    fn visit_end_measure(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.end_measure(elt.line())
    }

    fn visit_start_print(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.print(elt)
    }

    fn visit_start_divisions(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.divisions(elt);
        Ok(())
    }

    fn visit_start_key(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.key(elt)
    }

    fn visit_start_time(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.time(elt)
    }

    fn visit_start_staves(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.staves(elt)
    }

    fn visit_start_clef(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.clef(elt)
    }

    fn visit_start_staff_details(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.staff_details(elt)
    }

    fn visit_start_transpose(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.transpose(elt)
    }

    fn visit_start_measure_style(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.measure_style(elt);
        Ok(())
    }

    fn visit_start_note(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.note(elt)
    }

    fn visit_start_forward(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.forward(elt)
    }

    fn visit_start_direction(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.direction(elt);
        Ok(())
    }

    fn visit_start_harmony(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.harmony(elt);
        Ok(())
    }

    fn visit_start_figured_bass(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.figured_bass(elt);
        Ok(())
    }

    fn visit_start_barline(&mut self, elt: &XmlElement) -> Result<()> {
        self.in_part(elt.line())?.barline(elt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::measure::{MeasureElement, MeasureKind};
    use crate::msr::voice::VoiceElement;
    use crate::xml::XmlDocument;

    fn build(xml: &str) -> Result<(Score, Diagnostics)> {
        let root = XmlDocument::parse(xml).unwrap();
        build_msr(&root)
    }

    fn score(parts: &str, list: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<score-partwise version="3.1">
  <work><work-title>Test</work-title></work>
  <part-list>{}</part-list>
  {}
</score-partwise>"#,
            list, parts
        )
    }

    const ONE_PART_LIST: &str = r#"<score-part id="P1"><part-name>Flute</part-name></score-part>"#;

    const PROLOG: &str = r#"<attributes><divisions>1</divisions><key><fifths>0</fifths></key>
        <time><beats>3</beats><beat-type>4</beat-type></time><clef><sign>G</sign><line>2</line></clef></attributes>"#;

    fn quarter(step: &str) -> String {
        format!(
            "<note><pitch><step>{}</step><octave>4</octave></pitch><duration>1</duration><voice>1</voice><type>quarter</type></note>",
            step
        )
    }

    #[test]
    fn test_two_measures_in_three_four() {
        let xml = score(
            &format!(
                r#"<part id="P1"><measure number="1">{}{}{}{}</measure><measure number="2">{}{}{}</measure></part>"#,
                PROLOG,
                quarter("C"),
                quarter("D"),
                quarter("E"),
                quarter("F"),
                quarter("G"),
                quarter("A")
            ),
            ONE_PART_LIST,
        );
        let (score, diagnostics) = build(&xml).unwrap();
        assert!(diagnostics.is_empty(), "unexpected warnings: {:?}", diagnostics);
        assert_eq!(score.identification.work_title.as_deref(), Some("Test"));

        let parts = score.parts();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Flute");
        let voice = parts[0].voice(1, 1).expect("voice 1 of staff 1");
        let measures = voice.measures();
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].kind, MeasureKind::Regular);
        assert_eq!(measures[0].notes().count(), 3);
        assert!(
            matches!(measures[0].elements[0], MeasureElement::Key(_)),
            "attributes come first in the first measure"
        );
    }

    #[test]
    fn test_chord_members_join_the_previous_note() {
        let chord_member = r#"<note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>3</duration><voice>1</voice><type>half</type><dot/></note>"#;
        let xml = score(
            &format!(
                r#"<part id="P1"><measure number="1">{}<note><pitch><step>C</step><octave>4</octave></pitch><duration>3</duration><voice>1</voice><type>half</type><dot/></note>{}</measure></part>"#,
                PROLOG, chord_member
            ),
            ONE_PART_LIST,
        );
        let (score, _) = build(&xml).unwrap();
        let voice = score.parts()[0].voice(1, 1).unwrap();
        let measure = voice.measures()[0];
        let chords: Vec<_> = measure
            .elements
            .iter()
            .filter_map(|e| match e {
                MeasureElement::Chord(chord) => Some(chord),
                _ => None,
            })
            .collect();
        assert_eq!(chords.len(), 1);
        assert_eq!(chords[0].notes.len(), 2);
        assert_eq!(measure.kind, MeasureKind::Regular);
    }

    #[test]
    fn test_chord_member_without_note_is_fatal() {
        let xml = score(
            &format!(
                r#"<part id="P1"><measure number="1">{}<note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration><voice>1</voice></note></measure></part>"#,
                PROLOG
            ),
            ONE_PART_LIST,
        );
        let error = build(&xml).unwrap_err();
        assert!(error.is_internal(), "expected an internal error, got {:?}", error);
    }

    #[test]
    fn test_tuplets_close_inside_their_measure() {
        let triplet_note = |step: &str, notation: &str| {
            format!(
                r#"<note><pitch><step>{}</step><octave>4</octave></pitch><duration>2</duration><voice>1</voice><type>eighth</type>
                   <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>
                   <notations>{}</notations></note>"#,
                step, notation
            )
        };
        let xml = score(
            &format!(
                r#"<part id="P1"><measure number="1"><attributes><divisions>6</divisions><time><beats>1</beats><beat-type>4</beat-type></time></attributes>{}{}{}</measure></part>"#,
                triplet_note("C", r#"<tuplet type="start"/>"#),
                triplet_note("D", ""),
                triplet_note("E", r#"<tuplet type="stop"/>"#)
            ),
            ONE_PART_LIST,
        );
        let (score, diagnostics) = build(&xml).unwrap();
        assert!(!diagnostics.has_kind("unterminated_tuplet"));
        let voice = score.parts()[0].voice(1, 1).unwrap();
        let measure = voice.measures()[0];
        let tuplet = measure
            .elements
            .iter()
            .find_map(|e| match e {
                MeasureElement::Tuplet(t) => Some(t),
                _ => None,
            })
            .expect("a tuplet in the measure");
        assert_eq!(tuplet.elements.len(), 3);
        assert_eq!(measure.kind, MeasureKind::Regular);
    }

    #[test]
    fn test_late_voice_is_back_filled() {
        let voice2 = r#"<note><pitch><step>C</step><octave>3</octave></pitch><duration>3</duration><voice>2</voice><type>half</type><dot/></note>"#;
        let xml = score(
            &format!(
                r#"<part id="P1"><measure number="1">{}<note><rest measure="yes"/><duration>3</duration><voice>1</voice></note></measure>
                   <measure number="2"><note><rest measure="yes"/><duration>3</duration><voice>1</voice></note><backup><duration>3</duration></backup>{}</measure></part>"#,
                PROLOG, voice2
            ),
            ONE_PART_LIST,
        );
        let (score, _) = build(&xml).unwrap();
        let voice = score.parts()[0].voice(1, 2).expect("voice 2");
        let measures = voice.measures();
        assert_eq!(measures.len(), 2);
        assert!(measures[0].notes().all(|n| n.is_skip()));
        assert!(
            measures[0].elements.iter().any(|e| matches!(e, MeasureElement::Clef(_))),
            "the back-filled measure carries the clef in force"
        );
    }

    #[test]
    fn test_part_groups_nest() {
        let list = r#"<part-group number="1" type="start"><group-symbol>bracket</group-symbol></part-group>
            <score-part id="P1"><part-name>A</part-name></score-part>
            <score-part id="P2"><part-name>B</part-name></score-part>
            <part-group number="1" type="stop"/>
            <score-part id="P3"><part-name>C</part-name></score-part>"#;
        let parts = ["P1", "P2", "P3"]
            .iter()
            .map(|id| format!(r#"<part id="{}"><measure number="1">{}{}</measure></part>"#, id, PROLOG, quarter("C")))
            .collect::<String>();
        let (score, _) = build(&score(&parts, list)).unwrap();

        assert_eq!(score.part_groups.len(), 1);
        let implicit = &score.part_groups[0];
        assert!(implicit.is_implicit());
        assert_eq!(implicit.elements.len(), 2, "a bracket group and part P3");
        let ids: Vec<&str> = score.parts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_backward_repeat_folds_the_voice() {
        let xml = score(
            &format!(
                r#"<part id="P1"><measure number="1">{}{}{}{}</measure>
                   <measure number="2">{}{}{}<barline location="right"><bar-style>light-heavy</bar-style><repeat direction="backward"/></barline></measure></part>"#,
                PROLOG,
                quarter("C"),
                quarter("D"),
                quarter("E"),
                quarter("F"),
                quarter("G"),
                quarter("A")
            ),
            ONE_PART_LIST,
        );
        let (score, _) = build(&xml).unwrap();
        let voice = score.parts()[0].voice(1, 1).unwrap();
        assert!(matches!(voice.elements.as_slice(), [VoiceElement::Repeat(_)]));
    }
}
