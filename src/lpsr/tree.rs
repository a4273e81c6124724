//! LPSR tree
//!
//! What the LilyPond printer needs, in the order it prints it: the document
//! level assocs and blocks, one definition per voice and stanza, and the
//! score block that instantiates them. Voices and stanzas are the clones
//! built by the MSR to LPSR pass; the canonical score is never referenced.

use crate::msr::attributes::Transpose;
use crate::msr::basics::identifier_from;
use crate::msr::lyrics::Stanza;
use crate::msr::part_group::PartGroupSymbol;
use crate::msr::score::Score;
use crate::msr::staff::{StaffKind, StaffTuning};
use crate::msr::voice::Voice;
use crate::settings::LpsrSettings;
use serde::Serialize;

/// `name = value` line of a header, paper or layout block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableValueAssoc {
    pub name: String,
    pub value: String,
    /// Print the value between double quotes
    pub quoted: bool,
    /// Print the line behind a `%`
    pub commented_out: bool,
}

impl VariableValueAssoc {
    pub fn quoted(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            quoted: true,
            commented_out: false,
        }
    }

    pub fn bare(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            quoted: false,
            commented_out: false,
        }
    }

    pub fn commented_out(mut self) -> Self {
        self.commented_out = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LpsrHeader {
    assocs: Vec<VariableValueAssoc>,
}

impl LpsrHeader {
    /// Set a quoted field, replacing an earlier value
    pub fn set(&mut self, name: &str, value: &str) {
        match self.assocs.iter_mut().find(|a| a.name == name) {
            Some(assoc) => assoc.value = value.to_string(),
            None => self.assocs.push(VariableValueAssoc::quoted(name, value)),
        }
    }

    /// Informational field, printed commented out
    pub fn note(&mut self, name: &str, value: &str) {
        self.assocs
            .push(VariableValueAssoc::quoted(name, value).commented_out());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.assocs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.assocs.retain(|a| a.name != name);
    }

    pub fn assocs(&self) -> &[VariableValueAssoc] {
        &self.assocs
    }

    pub fn is_empty(&self) -> bool {
        self.assocs.is_empty()
    }
}

/// Page geometry, in millimeters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LpsrPaper {
    pub paper_width: Option<f32>,
    pub paper_height: Option<f32>,
    pub top_margin: Option<f32>,
    pub bottom_margin: Option<f32>,
    pub left_margin: Option<f32>,
    pub right_margin: Option<f32>,
    pub between_system_space: Option<f32>,
    pub indent: Option<f32>,
    pub short_indent: Option<f32>,
}

impl LpsrPaper {
    pub fn is_empty(&self) -> bool {
        *self == LpsrPaper::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LpsrLayout {
    pub assocs: Vec<VariableValueAssoc>,
}

/// Helper definitions the printed music refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchemeFunctions {
    pub tuplets_curved_brackets: bool,
    pub custom_short_barline: bool,
    pub editorial_accidentals: bool,
}

// ============================================================================
// DEFINITIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceDefinition {
    pub name: String,
    pub voice: Voice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StanzaDefinition {
    pub name: String,
    pub voice_name: String,
    pub stanza: Stanza,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScoreElement {
    Voice(VoiceDefinition),
    Stanza(StanzaDefinition),
}

// ============================================================================
// SCORE BLOCK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricsUse {
    pub voice_name: String,
    pub stanza_name: String,
}

/// Staff context with the voices and lyrics it shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffBlock {
    pub context_name: String,
    pub number: i32,
    pub kind: StaffKind,
    pub lines: u32,
    pub tunings: Vec<StaffTuning>,
    pub instrument_name: String,
    pub short_instrument_name: String,
    pub voice_names: Vec<String>,
    pub lyrics: Vec<LyricsUse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextKind {
    ChordNames,
    FiguredBass,
}

/// Non-staff context fed by one voice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextUse {
    pub kind: ContextKind,
    pub voice_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartBlock {
    pub part_id: String,
    pub name: String,
    pub abbreviation: String,
    pub instrument_name: String,
    pub instrument_abbreviation: String,
    pub transpose: Option<Transpose>,
    pub staves: Vec<StaffBlock>,
    pub contexts: Vec<ContextUse>,
}

impl PartBlock {
    pub fn context_name(&self) -> String {
        format!("Part_{}", identifier_from(&self.part_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PartGroupBlockElement {
    Part(PartBlock),
    Group(PartGroupBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartGroupBlock {
    pub absolute_number: u32,
    pub symbol: PartGroupSymbol,
    pub barline: bool,
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub elements: Vec<PartGroupBlockElement>,
}

impl PartGroupBlock {
    pub fn is_implicit(&self) -> bool {
        self.absolute_number == 0
    }

    pub fn part_blocks(&self) -> Vec<&PartBlock> {
        let mut parts = Vec::new();
        for element in &self.elements {
            match element {
                PartGroupBlockElement::Part(part) => parts.push(part),
                PartGroupBlockElement::Group(group) => parts.extend(group.part_blocks()),
            }
        }
        parts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBlock {
    pub part_groups: Vec<PartGroupBlock>,
}

impl ScoreBlock {
    pub fn part_blocks(&self) -> Vec<&PartBlock> {
        self.part_groups
            .iter()
            .flat_map(PartGroupBlock::part_blocks)
            .collect()
    }
}

/// Name of the staff context for a part's staff
pub fn staff_context_name(part_id: &str, staff_number: i32) -> String {
    format!(
        "Part_{}_Staff_{}",
        identifier_from(part_id),
        identifier_from(&staff_number.to_string())
    )
}

// ============================================================================
// SCORE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LpsrScore {
    /// The pass's own skeleton of the score: part groups, parts and staves
    pub msr: Score,
    pub version: String,
    pub comments: Vec<String>,
    /// Printed as `#(set-global-staff-size N)`
    pub global_staff_size: VariableValueAssoc,
    pub header: LpsrHeader,
    pub paper: LpsrPaper,
    pub layout: LpsrLayout,
    pub elements: Vec<ScoreElement>,
    pub score_block: ScoreBlock,
    pub scheme_functions: SchemeFunctions,
}

impl LpsrScore {
    pub fn new(msr: Score, settings: &LpsrSettings) -> Self {
        Self {
            msr,
            version: settings.lilypond_version.clone(),
            comments: Vec::new(),
            global_staff_size: VariableValueAssoc::bare(
                "global-staff-size",
                format_number(settings.global_staff_size),
            ),
            header: LpsrHeader::default(),
            paper: LpsrPaper::default(),
            layout: LpsrLayout::default(),
            elements: Vec::new(),
            score_block: ScoreBlock::default(),
            scheme_functions: SchemeFunctions::default(),
        }
    }

    pub fn voice_definitions(&self) -> impl Iterator<Item = &VoiceDefinition> {
        self.elements.iter().filter_map(|element| match element {
            ScoreElement::Voice(definition) => Some(definition),
            _ => None,
        })
    }

    pub fn voice_definitions_mut(&mut self) -> impl Iterator<Item = &mut VoiceDefinition> {
        self.elements.iter_mut().filter_map(|element| match element {
            ScoreElement::Voice(definition) => Some(definition),
            _ => None,
        })
    }

    pub fn stanza_definitions(&self) -> impl Iterator<Item = &StanzaDefinition> {
        self.elements.iter().filter_map(|element| match element {
            ScoreElement::Stanza(definition) => Some(definition),
            _ => None,
        })
    }

    pub fn voice_definition(&self, name: &str) -> Option<&VoiceDefinition> {
        self.voice_definitions().find(|d| d.name == name)
    }
}

/// Number without a trailing `.0`, two decimals at most
pub fn format_number(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_set_replaces() {
        let mut header = LpsrHeader::default();
        header.set("title", "Sonata");
        header.set("title", "Sonatina");
        header.note("encodingDate", "2020-01-01");
        assert_eq!(header.get("title"), Some("Sonatina"));
        assert_eq!(header.assocs().len(), 2);
        assert!(header.assocs()[1].commented_out);
        header.remove("title");
        assert_eq!(header.get("title"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(20.0), "20");
        assert_eq!(format_number(19.997), "20");
        assert_eq!(format_number(17.5), "17.5");
    }

    #[test]
    fn test_staff_context_name() {
        assert_eq!(staff_context_name("P1", 2), "Part_POne_Staff_Two");
    }
}
