//! Score model to Guido Music Notation
//!
//! Guido is voice-major: the score is a list of sequences, each one voice
//! pinned to a global staff number. [`GuidoBuilder`] walks parts in score
//! order, summarizes each part first (see [`summary`]), then writes its
//! voices one by one with a [`music::VoiceWriter`]. Staves no voice uses
//! still get a sequence of their own so staff numbers stay dense.

mod music;
mod summary;

pub use music::{clef_to_guido, guido_note, meter_text, position_params};

use crate::browser::browse;
use crate::context::StaffSpanning;
use crate::diagnostics::Diagnostics;
use crate::errors::Result;
use crate::guido::{GuidoElement, GuidoTag};
use crate::msr::attributes::Transpose;
use crate::msr::basics::{zero, Rational};
use crate::msr::part::Part;
use crate::msr::part_group::{PartGroup, PartGroupSymbol};
use crate::msr::score::Score;
use crate::msr::visitor::{MsrNode, MsrVisitor};
use crate::msr::voice::VoiceKind;
use crate::settings::GuidoSettings;
use music::{clef_tag, key_tag, meter_tag, VoiceStats, VoiceWriter};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use summary::PartSummary;

/// Counters reported with a Guido translation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidoStats {
    /// Measures written by the longest voice
    pub total_measures: u32,
    /// Length of the longest voice, in whole notes
    pub total_duration: Rational,
    /// Parts in the score, filtered out ones included
    pub parts_available: u32,
    pub total_staves: i32,
    /// Written measure starts, ascending, in whole notes from the score start
    pub measure_positions: Vec<MeasurePosition>,
    /// Meter changes, ascending, written range or not
    pub time_signatures: Vec<MeterChange>,
    /// Score position of the first written event
    pub begin_position: Rational,
    /// Score position after the last written event
    pub end_position: Rational,
    /// Transposition of the first written part that has one
    pub transposition: Option<InstrumentTransposition>,
    pub first_part_staves: i32,
    /// Guido names of the first written part's clefs, sorted
    pub first_part_clefs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurePosition {
    pub position: Rational,
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterChange {
    pub position: Rational,
    /// Guido meter text, `C` and `C/` included
    pub text: String,
    /// Whole notes per measure, `None` for senza misura
    pub measure_length: Option<Rational>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentTransposition {
    /// Key the instrument is named after, `Bb` for a clarinet
    pub instrument_name: String,
    /// Semitones from written to sounding pitch, octaves included
    pub chromatic_steps: i32,
}

impl InstrumentTransposition {
    pub fn of(transpose: &Transpose) -> Self {
        let chromatic_steps = transpose.chromatic + transpose.octave_change * 12;
        let instrument_name = match chromatic_steps {
            -2 => "Bb",
            -3 => "A",
            -5 => "G",
            3 => "Eb",
            2 => "D",
            _ => "C",
        };
        Self {
            instrument_name: instrument_name.to_string(),
            chromatic_steps,
        }
    }
}

impl Default for GuidoStats {
    fn default() -> Self {
        Self {
            total_measures: 0,
            total_duration: zero(),
            parts_available: 0,
            total_staves: 0,
            measure_positions: Vec::new(),
            time_signatures: Vec::new(),
            begin_position: zero(),
            end_position: zero(),
            transposition: None,
            first_part_staves: 0,
            first_part_clefs: Vec::new(),
        }
    }
}

impl GuidoStats {
    pub fn total_quarter_notes(&self) -> f64 {
        let quarters = self.total_duration * Rational::from_integer(4);
        f64::from(*quarters.numer()) / f64::from(*quarters.denom())
    }

    /// Number of the written measure holding `position`
    pub fn measure_at(&self, position: Rational) -> Option<u32> {
        self.measure_positions
            .iter()
            .take_while(|measure| measure.position <= position)
            .last()
            .map(|measure| measure.number)
    }

    /// Meter in effect at `position`
    pub fn meter_at(&self, position: Rational) -> Option<&MeterChange> {
        self.time_signatures
            .iter()
            .take_while(|meter| meter.position <= position)
            .last()
    }
}

/// Build the Guido score for a finished score model
pub fn build_guido(
    score: &Score,
    settings: &GuidoSettings,
) -> Result<(GuidoElement, GuidoStats, Diagnostics)> {
    GuidoBuilder::new(settings).build(score)
}

/// Grouping opened by a part group at its first written voice
#[derive(Debug, Clone)]
struct PendingGroup {
    id: u32,
    staff_count: i32,
    /// Draw an accolade: the group has a brace or bracket
    accolade: bool,
    /// Bar lines cross the whole group
    barline: bool,
}

pub struct GuidoBuilder<'a> {
    settings: &'a GuidoSettings,
    diagnostics: Diagnostics,
    spanning: StaffSpanning,
    summaries: BTreeMap<String, PartSummary>,
    score_staff_count: i32,
    sequences: Vec<GuidoElement>,
    /// Title and composers, written once in the first voice
    header: Option<Vec<GuidoElement>>,
    pending_groups: Vec<PendingGroup>,
    /// Voice maps merged, the first voice to claim a position keeps it
    measure_positions: BTreeMap<Rational, u32>,
    meters: BTreeMap<Rational, (String, Option<Rational>)>,
    written_voices: u32,
    stats: GuidoStats,
}

impl<'a> GuidoBuilder<'a> {
    pub fn new(settings: &'a GuidoSettings) -> Self {
        Self {
            settings,
            diagnostics: Diagnostics::new(),
            spanning: StaffSpanning::new(),
            summaries: BTreeMap::new(),
            score_staff_count: 0,
            sequences: Vec::new(),
            header: None,
            pending_groups: Vec::new(),
            measure_positions: BTreeMap::new(),
            meters: BTreeMap::new(),
            written_voices: 0,
            stats: GuidoStats::default(),
        }
    }

    pub fn build(mut self, score: &Score) -> Result<(GuidoElement, GuidoStats, Diagnostics)> {
        browse(&mut self, MsrNode::Score(score))?;
        self.stats.total_staves = self.spanning.current_staff_index();
        self.stats.measure_positions = self
            .measure_positions
            .iter()
            .map(|(&position, &number)| MeasurePosition { position, number })
            .collect();
        self.stats.time_signatures = self
            .meters
            .iter()
            .map(|(&position, (text, length))| MeterChange {
                position,
                text: text.clone(),
                measure_length: *length,
            })
            .collect();
        log::info!(
            "guido: {} sequences on {} staves, {} measures",
            self.sequences.len(),
            self.stats.total_staves,
            self.stats.total_measures
        );
        Ok((GuidoElement::Score(self.sequences), self.stats, self.diagnostics))
    }

    /// Position of a part among all parts, from its `P<n>` id
    fn part_selected(&self, ordinal: u32) -> bool {
        self.settings.part_filter.map_or(true, |wanted| wanted == ordinal)
    }

    fn selected_staff_count(&self, group: &PartGroup) -> i32 {
        group
            .parts()
            .iter()
            .filter_map(|part| self.summaries.get(&part.id))
            .map(PartSummary::staff_count)
            .sum()
    }

    fn staff_opening(index: i32, lines: u32) -> Vec<GuidoElement> {
        let mut opening = vec![
            GuidoElement::tag(GuidoTag::new("staff").bare(index.to_string())),
            GuidoElement::tag(GuidoTag::new("set").bare("autoHideTiedAccidentals=\"on\"")),
        ];
        if lines != 5 {
            opening.push(GuidoElement::tag(
                GuidoTag::new("staffFormat").bare(format!("style=\"{}-line\"", lines)),
            ));
        }
        opening
    }

    /// Sequence for a staff with no voice: its clefs, the part's keys and
    /// the first meter
    fn synthesize_staff(
        &mut self,
        part: &Part,
        summary: &PartSummary,
        index: i32,
        part_offset: i32,
    ) {
        let part_staff = index - part_offset;
        let lines = part.staff(part_staff).map_or(5, |staff| staff.lines);
        log::debug!("part {}: synthesizing staff {} ({})", part.id, index, part_staff);

        let mut elements = Self::staff_opening(index, lines);
        for clef in summary.clefs_of(part_staff) {
            if let Some(tag) = clef_tag(clef, &mut self.diagnostics) {
                elements.push(GuidoElement::Tag(tag));
            }
        }
        elements.extend(summary.keys().iter().map(|key| GuidoElement::Tag(key_tag(key))));
        if let Some(time) = summary.first_time() {
            elements.push(GuidoElement::Tag(meter_tag(time, self.settings.generate_bars)));
        }
        self.sequences.push(GuidoElement::Sequence(elements));
    }

    fn write_part(&mut self, part: &Part, summary: &PartSummary) -> Result<()> {
        let part_staff_count = summary.staff_count();
        let offset = self.spanning.current_part_staff_offset();
        self.spanning.begin_part();
        let mut part_header_written = false;

        for voice_number in summary.voices() {
            let Some(voice) = part
                .voices()
                .find(|voice| voice.number == voice_number && voice.kind == VoiceKind::Regular)
            else {
                continue;
            };
            let main_staff = summary.main_staff(voice_number);
            let placement = self.spanning.place_voice(main_staff);
            for index in &placement.synthesized {
                self.synthesize_staff(part, summary, *index, offset);
            }
            let staff_index = placement.staff_index;

            let mut elements = if placement.notes_only {
                vec![GuidoElement::tag(GuidoTag::new("staff").bare(staff_index.to_string()))]
            } else {
                let lines = part.staff(main_staff).map_or(5, |staff| staff.lines);
                Self::staff_opening(staff_index, lines)
            };

            if let Some(header) = self.header.take() {
                elements.extend(header);
            }
            if !part_header_written {
                part_header_written = true;
                elements.push(GuidoElement::tag(
                    GuidoTag::new("auto").bare("autoInstrPos=\"on\""),
                ));
                let name = if part.name.is_empty() {
                    &part.instrument_name
                } else {
                    &part.name
                };
                if !name.is_empty() {
                    elements.push(GuidoElement::tag(GuidoTag::new("instr").quoted(name.clone())));
                }
            }
            for group in self.pending_groups.drain(..) {
                let first = staff_index;
                let last = staff_index + group.staff_count - 1;
                let range = format!("range=\"{}-{}\"", first, last);
                if group.accolade {
                    elements.push(GuidoElement::tag(
                        GuidoTag::new("accol")
                            .bare(format!("id={}", group.id))
                            .bare(range.clone()),
                    ));
                }
                if group.barline {
                    elements.push(GuidoElement::tag(
                        GuidoTag::new("barFormat").bare("style=\"system\"").bare(range),
                    ));
                    self.spanning.mark_bar_formatted(first, last);
                }
            }
            if let Some(accolade) = self.spanning.open_accolade(part_staff_count) {
                let range = format!("range=\"{}-{}\"", accolade.first, accolade.last);
                elements.push(GuidoElement::tag(
                    GuidoTag::new("accol")
                        .bare(format!("id={}", accolade.id))
                        .bare(range.clone()),
                ));
                elements.push(GuidoElement::tag(
                    GuidoTag::new("barFormat").bare("style=\"system\"").bare(range),
                ));
            } else if self.spanning.needs_lonely_bar_format(self.score_staff_count) {
                elements.push(GuidoElement::tag(
                    GuidoTag::new("barFormat")
                        .bare("style=\"system\"")
                        .bare(format!("range=\"{}\"", staff_index)),
                ));
            }

            let mut writer = VoiceWriter::new(self.settings, offset, main_staff);
            browse(&mut writer, MsrNode::Voice(voice))?;
            let (music, changed_staff, voice_stats, diagnostics) = writer.finish();
            self.diagnostics.extend(diagnostics);
            elements.extend(music);
            if changed_staff {
                elements.push(GuidoElement::tag(
                    GuidoTag::new("staff").bare(staff_index.to_string()),
                ));
            }
            elements.push(GuidoElement::tag(GuidoTag::new("endBar")));
            self.sequences.push(GuidoElement::Sequence(elements));

            self.record_voice(voice_stats);
        }

        for index in self.spanning.end_part(part_staff_count) {
            self.synthesize_staff(part, summary, index, offset);
        }
        Ok(())
    }

    fn record_voice(&mut self, voice: VoiceStats) {
        if voice.measures_written == 0 {
            return;
        }
        let stats = &mut self.stats;
        stats.total_measures = stats.total_measures.max(voice.measures_written);
        if voice.duration > stats.total_duration {
            stats.total_duration = voice.duration;
        }
        if self.written_voices == 0 || voice.begin_position < stats.begin_position {
            stats.begin_position = voice.begin_position;
        }
        stats.end_position = stats.end_position.max(voice.end_position);
        self.written_voices += 1;
        for (position, number) in voice.measure_positions {
            self.measure_positions.entry(position).or_insert(number);
        }
        for (position, meter) in voice.meters {
            self.meters.entry(position).or_insert(meter);
        }
    }

    /// Staves and clefs of the first written part
    fn record_first_part(&mut self, summary: &PartSummary) {
        if self.stats.first_part_staves > 0 {
            return;
        }
        self.stats.first_part_staves = summary.staff_count();
        let clefs: BTreeSet<String> = summary.all_clefs().filter_map(clef_to_guido).collect();
        self.stats.first_part_clefs = clefs.into_iter().collect();
    }
}

/// Ordinal of a part id of the form `P<n>`
fn part_ordinal(id: &str) -> Option<u32> {
    id.strip_prefix('P').and_then(|rest| rest.parse().ok())
}

impl<'a> MsrVisitor for GuidoBuilder<'a> {
    fn visit_start_score(&mut self, elt: &Score) -> Result<()> {
        let mut available = 0;
        for part in elt.parts() {
            available += 1;
            let ordinal = part_ordinal(&part.id).unwrap_or(available);
            if !self.part_selected(ordinal) {
                continue;
            }
            let summary = PartSummary::of(part)?;
            self.score_staff_count += summary.staff_count();
            self.summaries.insert(part.id.clone(), summary);
        }

        let mut header = Vec::new();
        if let Some(title) = elt.identification.title() {
            header.push(GuidoElement::tag(GuidoTag::new("title").quoted(title.replace('"', "'"))));
        }
        for composer in &elt.identification.composers {
            header.push(GuidoElement::tag(
                GuidoTag::new("composer")
                    .quoted(composer.replace('"', "'"))
                    .bare("dy=4hs"),
            ));
        }
        self.header = Some(header);
        Ok(())
    }

    fn visit_start_part_group(&mut self, elt: &PartGroup) -> Result<()> {
        let accolade = matches!(elt.symbol, PartGroupSymbol::Brace | PartGroupSymbol::Bracket);
        if elt.is_implicit() || !(accolade || elt.barline) {
            return Ok(());
        }
        let staff_count = self.selected_staff_count(elt);
        if staff_count > 1 {
            self.pending_groups.push(PendingGroup {
                id: elt.absolute_number,
                staff_count,
                accolade,
                barline: elt.barline,
            });
        }
        Ok(())
    }

    fn visit_start_part(&mut self, elt: &Part) -> Result<()> {
        self.stats.parts_available += 1;
        let Some(summary) = self.summaries.get(&elt.id).cloned() else {
            log::debug!("part {} filtered out", elt.id);
            return Ok(());
        };
        self.record_first_part(&summary);
        if self.stats.transposition.is_none() {
            self.stats.transposition = elt.transpose.as_ref().map(InstrumentTransposition::of);
        }
        self.write_part(elt, &summary)
    }
}
