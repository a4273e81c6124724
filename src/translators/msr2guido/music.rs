//! Music of one voice, written as the content of a Guido sequence

use crate::diagnostics::Diagnostics;
use crate::errors::Result;
use crate::guido::{GuidoElement, GuidoNote, GuidoParam, GuidoTag};
use crate::msr::attributes::{
    Barline, BarlineStyle, Clef, Coda, Key, LineBreak, PageBreak, Rehearsal, Segno, Tempo, Time,
    TimeSymbol, VoiceStaffChange,
};
use crate::msr::basics::{zero, NoteType, Position, Rational};
use crate::msr::chord::Chord;
use crate::msr::grace::{DoubleTremolo, GraceKind, GraceNotesGroup};
use crate::msr::lyrics::{Syllable, SyllableKind};
use crate::msr::marks::{
    Articulation, ArticulationKind, Dynamics, Fermata, OctaveShift, OctaveShiftKind, Ornament,
    OrnamentKind, SingleTremolo, Slur, SlurKind, Spanner, SpannerKind, SpannerType, StemKind,
    Technical, TechnicalKind, TieKind, Wedge, WedgeKind, Words,
};
use crate::msr::measure::Measure;
use crate::msr::note::{Note, NoteContent};
use crate::msr::tuplet::{Tuplet, TupletShowNumber};
use crate::msr::visitor::MsrVisitor;
use crate::msr::voice::{Repeat, RepeatEnding, RepeatEndingKind};
use crate::settings::GuidoSettings;
use std::collections::BTreeMap;

/// Tenths per staff space in the source
const TENTHS_PER_SPACE: f32 = 10.0;

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Clef parameter, or `None` for a sign Guido cannot show
pub fn clef_to_guido(clef: &Clef) -> Option<String> {
    let known = match (clef.sign.as_str(), clef.line, clef.octave_change) {
        ("G", 2, 0) => Some("g2"),
        ("G", 2, -1) => Some("g-8"),
        ("G", 2, 1) => Some("g+8"),
        ("F", 4, 0) => Some("f4"),
        ("F", 4, -1) => Some("f-8"),
        ("F", 4, 1) => Some("f+8"),
        ("C", 3, 0) => Some("alto"),
        ("C", 4, 0) => Some("tenor"),
        _ => None,
    };
    if let Some(name) = known {
        return Some(name.to_string());
    }

    let mut param = match clef.sign.as_str() {
        "G" => "g",
        "F" => "f",
        "C" => "c",
        "percussion" => "perc",
        "TAB" => "TAB",
        "none" => "none",
        _ => return None,
    }
    .to_string();
    if clef.line != 0 {
        param.push_str(&clef.line.to_string());
    }
    match clef.octave_change {
        1 => param.push_str("+8"),
        -1 => param.push_str("-8"),
        _ => {}
    }
    Some(param)
}

/// Meter text and the measure length it sets, `None` for senza misura or
/// a non-numeric signature
pub fn meter_text(time: &Time) -> (String, Option<Rational>) {
    if time.senza_misura {
        return (String::new(), None);
    }
    match time.symbol {
        TimeSymbol::Common => {
            let length = time.whole_notes();
            let text = match time.items.as_slice() {
                [] => "C".to_string(),
                [item] if item.beats == "4" && item.beat_type == "4" => "C".to_string(),
                [item] if item.beats == "2" && item.beat_type == "2" => "C/".to_string(),
                items => joined_items(items),
            };
            (text, length)
        }
        TimeSymbol::Cut => ("C/".to_string(), Some(Rational::from_integer(1))),
        _ => (joined_items(&time.items), time.whole_notes()),
    }
}

fn joined_items(items: &[crate::msr::attributes::TimeItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}/{}", item.beats, item.beat_type))
        .collect::<Vec<_>>()
        .join("+")
}

pub fn meter_tag(time: &Time, generate_bars: bool) -> GuidoTag {
    let (text, _) = meter_text(time);
    let mut tag = GuidoTag::new("meter").quoted(text);
    if generate_bars {
        tag = tag.bare("autoBarlines=\"off\"");
    }
    tag.bare("autoMeasuresNum=\"system\"")
}

pub fn clef_tag(clef: &Clef, diagnostics: &mut Diagnostics) -> Option<GuidoTag> {
    match clef_to_guido(clef) {
        Some(param) => Some(GuidoTag::new("clef").quoted(param)),
        None => {
            diagnostics.warn(
                clef.input_line,
                "unknown_clef_sign",
                "clef",
                format!("unknown clef sign \"{}\", no clef written", clef.sign),
            );
            None
        }
    }
}

pub fn key_tag(key: &Key) -> GuidoTag {
    GuidoTag::new("key").bare(key.fifths.to_string())
}

/// Source offset in tenths to Guido half spaces, plus an anchor offset;
/// `None` when the result is zero
pub fn half_spaces(tenths: f32, anchor: f32) -> Option<f32> {
    let converted = tenths / TENTHS_PER_SPACE * 2.0 + anchor;
    (converted != 0.0).then_some(converted)
}

/// `dx`/`dy` parameters for a position; zero offsets produce nothing
pub fn position_params(position: &Position, dx_anchor: f32, dy_anchor: f32) -> Vec<GuidoParam> {
    let mut params = Vec::new();
    if let Some(dx) = half_spaces(position.x(), dx_anchor) {
        params.push(GuidoParam::Bare(format!("dx={}hs", dx)));
    }
    if let Some(dy) = half_spaces(position.y(), dy_anchor) {
        params.push(GuidoParam::Bare(format!("dy={}hs", dy)));
    }
    params
}

/// Duration as (numerator, denominator) of the undotted value, and dots
pub fn duration_parts(duration: Rational) -> Option<((i32, i32), u8)> {
    if *duration.numer() <= 0 {
        return None;
    }
    match NoteType::from_whole_notes(duration) {
        Some((note_type, dots)) => {
            let base = note_type.whole_notes();
            Some(((*base.numer(), *base.denom()), dots))
        }
        None => Some(((*duration.numer(), *duration.denom()), 0)),
    }
}

pub fn guido_note(note: &Note) -> GuidoNote {
    let mut guido = match note.content {
        NoteContent::Pitched(pitch) => {
            let mut guido = GuidoNote::new(&pitch.letter().to_string());
            guido.accidentals = if pitch.alteration >= 0 {
                "#".repeat(pitch.alteration as usize)
            } else {
                "&".repeat(pitch.alteration.unsigned_abs() as usize)
            };
            guido.octave = Some(i32::from(pitch.octave) - 3);
            guido
        }
        NoteContent::Rest { .. } => GuidoNote::rest(),
        NoteContent::Unpitched { display } => {
            let (step, octave) = display.unwrap_or((4, 4));
            let letter = ['c', 'd', 'e', 'f', 'g', 'a', 'b'][usize::from(step) % 7];
            GuidoNote {
                octave: Some(i32::from(octave) - 3),
                ..GuidoNote::new(&letter.to_string())
            }
        }
        NoteContent::Skip => GuidoNote::empty(),
    };

    let duration = if note.is_grace() || *note.sounding_duration.numer() == 0 {
        note.displayed_duration
    } else {
        note.sounding_duration
    };
    if let Some((fraction, dots)) = duration_parts(duration) {
        guido.duration = Some(fraction);
        guido.dots = dots;
    }
    guido
}

fn tempo_tag(tempo: &Tempo, positions: bool) -> Option<GuidoTag> {
    let metronome = match (&tempo.beat_unit, tempo.per_minute.as_deref()) {
        (Some(unit), Some(per_minute)) => {
            let base = unit.whole_notes();
            let dots = ".".repeat(usize::from(tempo.dots));
            Some(format!("{}/{}{}={}", base.numer(), base.denom(), dots, per_minute.trim()))
        }
        _ => None,
    };
    let words = tempo.words.clone().unwrap_or_default();
    if words.is_empty() && metronome.is_none() {
        return None;
    }
    let mut tag = GuidoTag::new("tempo").quoted(words);
    if let Some(metronome) = metronome {
        tag = tag.quoted(metronome);
    }
    if positions {
        tag = tag.with_params(position_params(&tempo.position, 0.0, 0.0));
    }
    Some(tag)
}

// ============================================================================
// VOICE WRITER
// ============================================================================

#[derive(Debug, Default)]
struct Attachments {
    before: Vec<GuidoElement>,
    /// Range tags wrapped around the event, innermost first
    wrappers: Vec<GuidoTag>,
    after: Vec<GuidoElement>,
}

impl Attachments {
    fn surround(mut self, event: GuidoElement) -> Vec<GuidoElement> {
        let mut wrapped = event;
        for tag in self.wrappers {
            wrapped = GuidoElement::Tag(tag.applied_to(vec![wrapped]));
        }
        self.before.push(wrapped);
        self.before.extend(self.after);
        self.before
    }
}

#[derive(Debug)]
struct Frame {
    /// Measures are written directly in this frame, so the begin/end
    /// window applies to its events
    measure_level: bool,
    elements: Vec<GuidoElement>,
}

impl Frame {
    fn new(measure_level: bool) -> Self {
        Self {
            measure_level,
            elements: Vec::new(),
        }
    }
}

/// Per voice counters reported with the result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceStats {
    pub measures_written: u32,
    pub last_measure_number: u32,
    pub duration: Rational,
    /// Start of each written measure, in whole notes from the score start
    pub measure_positions: BTreeMap<Rational, u32>,
    /// Every meter of the voice at its score position, text and length
    pub meters: BTreeMap<Rational, (String, Option<Rational>)>,
    pub begin_position: Rational,
    pub end_position: Rational,
}

pub struct VoiceWriter<'a> {
    settings: &'a GuidoSettings,
    diagnostics: Diagnostics,
    part_staff_offset: i32,
    current_staff: i32,
    changed_staff: bool,

    frames: Vec<Frame>,
    owners: Vec<Attachments>,
    /// Attributes met before the first written measure, replayed there
    carried: Vec<(&'static str, GuidoElement)>,

    measure_active: bool,
    measure_number: u32,
    /// Score position of the current measure's start
    measure_start: Rational,
    position: Rational,
    event_start: Rational,
    pending_repeat_begin: bool,
    open_wedge: Option<WedgeKind>,
    current_stem: Option<StemKind>,
    lyrics_stanza: Option<String>,
    stats: VoiceStats,
}

impl<'a> VoiceWriter<'a> {
    pub fn new(settings: &'a GuidoSettings, part_staff_offset: i32, home_staff: i32) -> Self {
        Self {
            settings,
            diagnostics: Diagnostics::new(),
            part_staff_offset,
            current_staff: home_staff,
            changed_staff: false,
            frames: vec![Frame::new(true)],
            owners: Vec::new(),
            carried: Vec::new(),
            measure_active: false,
            measure_number: 0,
            measure_start: zero(),
            position: zero(),
            event_start: zero(),
            pending_repeat_begin: false,
            open_wedge: None,
            current_stem: None,
            lyrics_stanza: None,
            stats: VoiceStats::default(),
        }
    }

    /// Written music, whether the voice moved to another staff, counters
    /// and warnings
    pub fn finish(mut self) -> (Vec<GuidoElement>, bool, VoiceStats, Diagnostics) {
        let elements = match self.frames.drain(..).next() {
            Some(root) => root.elements,
            None => Vec::new(),
        };
        (elements, self.changed_staff, self.stats, self.diagnostics)
    }

    fn top(&mut self) -> &mut Vec<GuidoElement> {
        if self.frames.is_empty() {
            self.frames.push(Frame::new(true));
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last].elements
    }

    fn in_measure_range(&self, number: u32) -> bool {
        let begin = self.settings.begin_measure;
        let end = self.settings.end_measure;
        (begin <= 1 || number >= begin) && (end == 0 || number <= end)
    }

    /// Whether an event starting at `start` in the current measure is kept
    fn keeps(&self, start: Rational) -> bool {
        if !self.measure_active {
            return false;
        }
        let quarters = Rational::new(1, 4);
        let begin_offset = self.settings.begin_measure_beat_offset * quarters;
        let end_offset = self.settings.end_measure_beat_offset * quarters;
        if self.measure_number == self.settings.begin_measure && start < begin_offset {
            return false;
        }
        if self.settings.end_measure != 0
            && self.measure_number == self.settings.end_measure
            && end_offset > zero()
            && start >= end_offset
        {
            return false;
        }
        true
    }

    fn place(&mut self, items: Vec<GuidoElement>, start: Rational) {
        let measure_level = self.frames.last().map_or(true, |f| f.measure_level);
        if measure_level && !self.keeps(start) {
            log::trace!("event at {} of measure {} left out", start, self.measure_number);
            return;
        }
        self.top().extend(items);
    }

    /// Clefs, keys and meters: written in range, remembered before it
    fn attribute(&mut self, kind: &'static str, element: GuidoElement) {
        if self.measure_active {
            self.top().push(element);
        } else if self.stats.measures_written == 0 {
            self.carried.retain(|(carried, _)| *carried != kind);
            self.carried.push((kind, element));
        }
    }

    fn marker(&mut self, element: GuidoElement) {
        if self.measure_active {
            self.top().push(element);
        }
    }

    fn owner(&mut self, line: u32) -> Result<&mut Attachments> {
        match self.owners.last_mut() {
            Some(owner) => Ok(owner),
            None => Err(internal_error!(line, "mark found outside of any note or chord")),
        }
    }

    fn stem_change(&mut self, stem: Option<StemKind>) -> Option<GuidoElement> {
        if !self.settings.generate_stem || stem.is_none() || stem == self.current_stem {
            return None;
        }
        self.current_stem = stem;
        let name = match stem? {
            StemKind::Up => "stemsUp",
            StemKind::Down => "stemsDown",
            StemKind::None | StemKind::Double => "stemsOff",
        };
        Some(GuidoElement::tag(GuidoTag::new(name)))
    }

    fn tie_attachments(owner: &mut Attachments, tie: Option<TieKind>) {
        match tie {
            Some(TieKind::Start) => owner.before.push(GuidoElement::tag(GuidoTag::new("tieBegin"))),
            Some(TieKind::Stop) => owner.after.push(GuidoElement::tag(GuidoTag::new("tieEnd"))),
            Some(TieKind::Continue) => {
                owner.after.push(GuidoElement::tag(GuidoTag::new("tieEnd")));
                owner.after.push(GuidoElement::tag(GuidoTag::new("tieBegin")));
            }
            None => {}
        }
    }

    fn wrap_owner(&mut self, tag: GuidoTag, line: u32) -> Result<()> {
        self.owner(line)?.wrappers.push(tag);
        Ok(())
    }
}

impl<'a> MsrVisitor for VoiceWriter<'a> {
    // ------------------------------------------------------------------------
    // measures and repeats
    // ------------------------------------------------------------------------

    fn visit_start_measure(&mut self, elt: &Measure) -> Result<()> {
        let number = elt.number.trim().parse::<u32>().unwrap_or(elt.ordinal);
        self.measure_number = number;
        self.position = zero();
        self.measure_active = self.in_measure_range(number);
        if !self.measure_active {
            return Ok(());
        }
        self.stats.measure_positions.entry(self.measure_start).or_insert(number);
        if self.stats.measures_written == 0 {
            self.stats.begin_position = self.measure_start;
            if number == self.settings.begin_measure {
                self.stats.begin_position +=
                    self.settings.begin_measure_beat_offset * Rational::new(1, 4);
            }
        }

        if self.stats.measures_written > 0 && self.settings.generate_bars {
            self.top().push(GuidoElement::tag(GuidoTag::new("bar")));
        }
        if self.settings.generate_comments {
            let comment = GuidoElement::Comment(format!("meas. {}", elt.number));
            self.top().push(comment);
        }
        let carried: Vec<GuidoElement> =
            self.carried.drain(..).map(|(_, element)| element).collect();
        self.top().extend(carried);
        if self.pending_repeat_begin {
            self.pending_repeat_begin = false;
            self.top().push(GuidoElement::tag(GuidoTag::new("repeatBegin")));
        }
        Ok(())
    }

    fn visit_end_measure(&mut self, elt: &Measure) -> Result<()> {
        let length = elt.accumulated_duration();
        if self.measure_active {
            self.stats.measures_written += 1;
            self.stats.last_measure_number =
                self.stats.last_measure_number.max(self.measure_number);
            self.stats.duration += length;
            let end_offset = self.settings.end_measure_beat_offset * Rational::new(1, 4);
            let cut = self.measure_number == self.settings.end_measure
                && end_offset > zero()
                && end_offset < length;
            self.stats.end_position = self.measure_start + if cut { end_offset } else { length };
        }
        self.measure_start += length;
        Ok(())
    }

    fn visit_start_repeat(&mut self, _elt: &Repeat) -> Result<()> {
        self.pending_repeat_begin = true;
        Ok(())
    }

    fn visit_end_repeat_common_part(&mut self, elt: &Repeat) -> Result<()> {
        if elt.endings.is_empty() {
            self.marker(GuidoElement::tag(GuidoTag::new("repeatEnd")));
        }
        Ok(())
    }

    fn visit_start_repeat_ending(&mut self, _elt: &RepeatEnding) -> Result<()> {
        self.frames.push(Frame::new(true));
        Ok(())
    }

    fn visit_end_repeat_ending(&mut self, elt: &RepeatEnding) -> Result<()> {
        let Some(mut frame) = self.frames.pop() else {
            return Err(internal_error!(
                elt.input_line,
                "repeat ending end without a matching start"
            ));
        };
        if frame.elements.is_empty() {
            return Ok(());
        }
        if elt.kind == RepeatEndingKind::Hooked {
            frame.elements.push(GuidoElement::tag(GuidoTag::new("repeatEnd")));
        }
        let volta = GuidoTag::new("volta")
            .quoted(elt.number.clone())
            .quoted(format!("{}.", elt.number))
            .applied_to(frame.elements);
        self.top().push(GuidoElement::Tag(volta));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // attributes and markers
    // ------------------------------------------------------------------------

    fn visit_start_clef(&mut self, elt: &Clef) -> Result<()> {
        if let Some(tag) = clef_tag(elt, &mut self.diagnostics) {
            self.attribute("clef", GuidoElement::Tag(tag));
        }
        Ok(())
    }

    fn visit_start_key(&mut self, elt: &Key) -> Result<()> {
        self.attribute("key", GuidoElement::Tag(key_tag(elt)));
        Ok(())
    }

    fn visit_start_time(&mut self, elt: &Time) -> Result<()> {
        let at = self.measure_start + self.position;
        self.stats.meters.insert(at, meter_text(elt));
        if elt.print_object {
            let tag = meter_tag(elt, self.settings.generate_bars);
            self.attribute("meter", GuidoElement::Tag(tag));
        }
        Ok(())
    }

    fn visit_start_voice_staff_change(&mut self, elt: &VoiceStaffChange) -> Result<()> {
        if elt.staff_number == self.current_staff {
            return Ok(());
        }
        self.current_staff = elt.staff_number;
        self.changed_staff = true;
        let index = self.part_staff_offset + elt.staff_number;
        self.marker(GuidoElement::tag(GuidoTag::new("staff").bare(index.to_string())));
        Ok(())
    }

    fn visit_start_tempo(&mut self, elt: &Tempo) -> Result<()> {
        if let Some(tag) = tempo_tag(elt, self.settings.generate_positions) {
            self.marker(GuidoElement::Tag(tag));
        }
        Ok(())
    }

    fn visit_start_rehearsal(&mut self, elt: &Rehearsal) -> Result<()> {
        self.marker(GuidoElement::tag(GuidoTag::new("mark").quoted(elt.text.clone())));
        Ok(())
    }

    fn visit_start_segno(&mut self, _elt: &Segno) -> Result<()> {
        self.marker(GuidoElement::tag(GuidoTag::new("segno")));
        Ok(())
    }

    fn visit_start_coda(&mut self, _elt: &Coda) -> Result<()> {
        self.marker(GuidoElement::tag(GuidoTag::new("coda")));
        Ok(())
    }

    fn visit_start_line_break(&mut self, _elt: &LineBreak) -> Result<()> {
        self.marker(GuidoElement::tag(GuidoTag::new("newLine")));
        Ok(())
    }

    fn visit_start_page_break(&mut self, _elt: &PageBreak) -> Result<()> {
        self.marker(GuidoElement::tag(GuidoTag::new("newPage")));
        Ok(())
    }

    fn visit_start_barline(&mut self, elt: &Barline) -> Result<()> {
        if elt.style == BarlineStyle::LightLight && !elt.is_structural_only() {
            self.marker(GuidoElement::tag(GuidoTag::new("doubleBar")));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // notes and their containers
    // ------------------------------------------------------------------------

    fn visit_start_note(&mut self, elt: &Note) -> Result<()> {
        let mut owner = Attachments::default();
        if !elt.is_chord_member() && !elt.is_grace() {
            if let Some(stem) = self.stem_change(elt.stem) {
                owner.before.push(stem);
            }
        }
        Self::tie_attachments(&mut owner, elt.tie);
        self.owners.push(owner);
        Ok(())
    }

    fn visit_end_note(&mut self, elt: &Note) -> Result<()> {
        let Some(owner) = self.owners.pop() else {
            return Err(internal_error!(elt.input_line, "{} ends without having started", elt));
        };
        let start = self.position;
        self.position += elt.measure_duration();

        if elt.is_chord_member() {
            let Attachments { before, wrappers, after } = owner;
            let member = Attachments {
                wrappers,
                ..Attachments::default()
            }
            .surround(GuidoElement::Note(guido_note(elt)));
            self.top().extend(member);
            // ties and slurs of members go around the whole chord
            let Some(chord) = self.owners.last_mut() else {
                return Err(internal_error!(
                    elt.input_line,
                    "chord member {} outside of a chord",
                    elt
                ));
            };
            for element in before {
                if !chord.before.contains(&element) {
                    chord.before.push(element);
                }
            }
            for element in after {
                if !chord.after.contains(&element) {
                    chord.after.push(element);
                }
            }
            return Ok(());
        }

        let items = owner.surround(GuidoElement::Note(guido_note(elt)));
        self.place(items, start);
        Ok(())
    }

    fn visit_start_chord(&mut self, elt: &Chord) -> Result<()> {
        let mut owner = Attachments::default();
        if !elt.is_grace {
            if let Some(stem) = self.stem_change(elt.stem) {
                owner.before.push(stem);
            }
        }
        self.owners.push(owner);
        self.frames.push(Frame::new(false));
        Ok(())
    }

    fn visit_end_chord(&mut self, elt: &Chord) -> Result<()> {
        let (Some(frame), Some(owner)) = (self.frames.pop(), self.owners.pop()) else {
            return Err(internal_error!(elt.input_line, "chord end without a matching start"));
        };
        let start = self.position;
        self.position += elt.measure_duration();
        let items = owner.surround(GuidoElement::Chord(frame.elements));
        self.place(items, start);
        Ok(())
    }

    fn visit_start_tuplet(&mut self, _elt: &Tuplet) -> Result<()> {
        if self.frames.last().map_or(false, |f| f.measure_level) {
            self.event_start = self.position;
        }
        self.frames.push(Frame::new(false));
        Ok(())
    }

    fn visit_end_tuplet(&mut self, elt: &Tuplet) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Err(internal_error!(elt.input_line, "tuplet end without a matching start"));
        };
        let text = match elt.show_number {
            TupletShowNumber::Actual => format!("-{}-", elt.actual),
            TupletShowNumber::Both => format!("-{}:{}-", elt.actual, elt.normal),
            TupletShowNumber::None => String::new(),
        };
        let tag = GuidoTag::new("tuplet").quoted(text).applied_to(frame.elements);
        let start = self.event_start;
        self.place(vec![GuidoElement::Tag(tag)], start);
        Ok(())
    }

    fn visit_start_grace_notes_group(&mut self, _elt: &GraceNotesGroup) -> Result<()> {
        self.frames.push(Frame::new(false));
        Ok(())
    }

    fn visit_end_grace_notes_group(&mut self, elt: &GraceNotesGroup) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Err(internal_error!(
                elt.input_line,
                "grace notes group end without a matching start"
            ));
        };
        if elt.is_skip || frame.elements.is_empty() {
            return Ok(());
        }
        let grace = GuidoElement::Tag(GuidoTag::new("grace").applied_to(frame.elements));
        let owner = self.owner(elt.input_line)?;
        match elt.kind {
            GraceKind::Before => owner.before.push(grace),
            GraceKind::After => owner.after.push(grace),
        }
        Ok(())
    }

    fn visit_start_double_tremolo(&mut self, _elt: &DoubleTremolo) -> Result<()> {
        self.event_start = self.position;
        self.frames.push(Frame::new(false));
        Ok(())
    }

    fn visit_end_double_tremolo(&mut self, elt: &DoubleTremolo) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Err(internal_error!(
                elt.input_line,
                "double tremolo end without a matching start"
            ));
        };
        let style = "/".repeat(usize::from(elt.marks.max(1)));
        let tag = GuidoTag::new("tremolo")
            .bare(format!("style=\"{}\"", style))
            .applied_to(frame.elements);
        let start = self.event_start;
        self.place(vec![GuidoElement::Tag(tag)], start);
        Ok(())
    }

    fn visit_start_syllable(&mut self, elt: &Syllable) -> Result<()> {
        // stanzas are browsed after the music, outside of any note
        if self.owners.is_empty() {
            return Ok(());
        }
        let stanza = self
            .lyrics_stanza
            .get_or_insert_with(|| elt.stanza_number.clone());
        if *stanza != elt.stanza_number {
            return Ok(());
        }
        let mut text = elt.text();
        match elt.kind {
            SyllableKind::Skip | SyllableKind::MeasureEnd => return Ok(()),
            SyllableKind::Begin | SyllableKind::Middle => text.push('-'),
            SyllableKind::Single | SyllableKind::End => {}
        }
        self.wrap_owner(GuidoTag::new("lyrics").quoted(text), elt.input_line)
    }

    // ------------------------------------------------------------------------
    // marks
    // ------------------------------------------------------------------------

    fn visit_start_articulation(&mut self, elt: &Articulation) -> Result<()> {
        let name = match elt.kind {
            ArticulationKind::Accent => "accent",
            ArticulationKind::StrongAccent => "marcato",
            ArticulationKind::Staccato
            | ArticulationKind::Staccatissimo
            | ArticulationKind::Spiccato => "stacc",
            ArticulationKind::Tenuto | ArticulationKind::DetachedLegato => "ten",
            ArticulationKind::Arpeggiato => "arpeggio",
            ArticulationKind::BreathMark => {
                self.owner(elt.input_line)?
                    .after
                    .push(GuidoElement::tag(GuidoTag::new("breathMark")));
                return Ok(());
            }
            ArticulationKind::Caesura | ArticulationKind::NonArpeggiato => {
                log::debug!("{:?} has no Guido counterpart (line {})", elt.kind, elt.input_line);
                return Ok(());
            }
        };
        self.wrap_owner(GuidoTag::new(name), elt.input_line)
    }

    fn visit_start_ornament(&mut self, elt: &Ornament) -> Result<()> {
        let tag = match elt.kind {
            OrnamentKind::TrillMark => GuidoTag::new("trill"),
            OrnamentKind::Turn => GuidoTag::new("turn"),
            OrnamentKind::InvertedTurn => GuidoTag::new("turn").bare("type=\"inverted\""),
            OrnamentKind::Mordent => GuidoTag::new("mord"),
            OrnamentKind::InvertedMordent => GuidoTag::new("mord").bare("type=\"inverted\""),
        };
        self.wrap_owner(tag, elt.input_line)
    }

    fn visit_start_technical(&mut self, elt: &Technical) -> Result<()> {
        let tag = match &elt.kind {
            TechnicalKind::UpBow => GuidoTag::new("bow").quoted("up"),
            TechnicalKind::DownBow => GuidoTag::new("bow").quoted("down"),
            TechnicalKind::Harmonic => GuidoTag::new("harmonic"),
            TechnicalKind::Fingering(finger) => {
                GuidoTag::new("fingering").bare(format!("text=\"{}\"", finger))
            }
            other => {
                log::debug!("{:?} has no Guido counterpart (line {})", other, elt.input_line);
                return Ok(());
            }
        };
        self.wrap_owner(tag, elt.input_line)
    }

    fn visit_start_fermata(&mut self, elt: &Fermata) -> Result<()> {
        let mut tag = GuidoTag::new("fermata");
        if elt.inverted {
            tag = tag.bare("position=\"below\"");
        }
        self.wrap_owner(tag, elt.input_line)
    }

    fn visit_start_dynamics(&mut self, elt: &Dynamics) -> Result<()> {
        let mut tag = GuidoTag::new("intens").quoted(elt.text.clone());
        if self.settings.generate_positions {
            tag = tag.with_params(position_params(&elt.position, 0.0, 0.0));
        }
        self.owner(elt.input_line)?.before.push(GuidoElement::Tag(tag));
        Ok(())
    }

    fn visit_start_words(&mut self, elt: &Words) -> Result<()> {
        let text = elt.text.replace('"', "'");
        let mut tag = GuidoTag::new("text").quoted(text);
        if self.settings.generate_positions {
            tag = tag.with_params(position_params(&elt.position, 0.0, 0.0));
        }
        self.owner(elt.input_line)?.before.push(GuidoElement::Tag(tag));
        Ok(())
    }

    fn visit_start_wedge(&mut self, elt: &Wedge) -> Result<()> {
        let (name, before) = match elt.kind {
            WedgeKind::Crescendo => ("crescBegin", true),
            WedgeKind::Diminuendo => ("dimBegin", true),
            WedgeKind::Stop => match self.open_wedge {
                Some(WedgeKind::Diminuendo) => ("dimEnd", false),
                _ => ("crescEnd", false),
            },
        };
        self.open_wedge = (elt.kind != WedgeKind::Stop).then_some(elt.kind);
        let element = GuidoElement::tag(GuidoTag::new(name));
        let owner = self.owner(elt.input_line)?;
        if before {
            owner.before.push(element);
        } else {
            owner.after.push(element);
        }
        Ok(())
    }

    fn visit_start_slur(&mut self, elt: &Slur) -> Result<()> {
        let owner = self.owner(elt.input_line)?;
        match elt.kind {
            SlurKind::Start => owner.before.push(GuidoElement::tag(GuidoTag::new("slurBegin"))),
            SlurKind::Stop => owner.after.push(GuidoElement::tag(GuidoTag::new("slurEnd"))),
            SlurKind::Continue => {}
        }
        Ok(())
    }

    fn visit_start_spanner(&mut self, elt: &Spanner) -> Result<()> {
        let (begin, end) = match elt.kind {
            SpannerKind::Glissando | SpannerKind::Slide => ("glissandoBegin", "glissandoEnd"),
            SpannerKind::WavyLine => ("trillBegin", "trillEnd"),
            SpannerKind::Dashes => return Ok(()),
        };
        let owner = self.owner(elt.input_line)?;
        match elt.spanner_type {
            SpannerType::Start => owner.before.push(GuidoElement::tag(GuidoTag::new(begin))),
            SpannerType::Stop => owner.after.push(GuidoElement::tag(GuidoTag::new(end))),
            SpannerType::Continue => {}
        }
        Ok(())
    }

    fn visit_start_single_tremolo(&mut self, elt: &SingleTremolo) -> Result<()> {
        let style = "/".repeat(usize::from(elt.marks.max(1)));
        self.wrap_owner(
            GuidoTag::new("tremolo").bare(format!("style=\"{}\"", style)),
            elt.input_line,
        )
    }

    fn visit_start_octave_shift(&mut self, elt: &OctaveShift) -> Result<()> {
        let octaves = if elt.size >= 15 { 2 } else { 1 };
        let owner = self.owner(elt.input_line)?;
        match elt.kind {
            // notes written an octave down sound an octave up: 8va
            OctaveShiftKind::Down => owner
                .before
                .push(GuidoElement::tag(GuidoTag::new("oct").bare(octaves.to_string()))),
            OctaveShiftKind::Up => owner
                .before
                .push(GuidoElement::tag(GuidoTag::new("oct").bare((-octaves).to_string()))),
            OctaveShiftKind::Stop => owner
                .after
                .push(GuidoElement::tag(GuidoTag::new("oct").bare("0"))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::attributes::TimeItem;
    use crate::msr::basics::Pitch;

    fn clef(sign: &str, line: i32, octave_change: i32) -> Clef {
        Clef {
            sign: sign.to_string(),
            line,
            octave_change,
            staff_number: 1,
            input_line: 7,
        }
    }

    #[test]
    fn test_clef_table() {
        assert_eq!(clef_to_guido(&clef("G", 2, 0)).as_deref(), Some("g2"));
        assert_eq!(clef_to_guido(&clef("F", 4, -1)).as_deref(), Some("f-8"));
        assert_eq!(clef_to_guido(&clef("C", 3, 0)).as_deref(), Some("alto"));
        assert_eq!(clef_to_guido(&clef("C", 1, 0)).as_deref(), Some("c1"));
        assert_eq!(clef_to_guido(&clef("percussion", 0, 0)).as_deref(), Some("perc"));
    }

    #[test]
    fn test_unknown_clef_warns_without_tag() {
        let mut diagnostics = Diagnostics::new();
        assert!(clef_tag(&clef("jianpu", 0, 0), &mut diagnostics).is_none());
        assert!(diagnostics.has_kind("unknown_clef_sign"));
        let warning = diagnostics.warnings().next().unwrap();
        assert_eq!(warning.line, 7, "warning points at the clef");
    }

    #[test]
    fn test_meter_texts() {
        let common = Time {
            symbol: TimeSymbol::Common,
            ..Time::new("4", "4", 1)
        };
        assert_eq!(meter_text(&common), ("C".to_string(), Some(Rational::from_integer(1))));

        let cut = Time {
            symbol: TimeSymbol::Cut,
            ..Time::new("2", "2", 1)
        };
        assert_eq!(meter_text(&cut).0, "C/");

        let composite = Time {
            items: vec![TimeItem::new("3", "8"), TimeItem::new("2", "8")],
            ..Time::new("3", "8", 1)
        };
        assert_eq!(
            meter_text(&composite),
            ("3/8+2/8".to_string(), Some(Rational::new(5, 8)))
        );

        let tag = meter_tag(&Time::new("3", "4", 1), true);
        assert_eq!(
            tag.to_string(),
            "\\meter<\"3/4\", autoBarlines=\"off\", autoMeasuresNum=\"system\">"
        );
    }

    #[test]
    fn test_zero_position_has_no_offsets() {
        assert!(position_params(&Position::default(), 0.0, 0.0).is_empty());

        let moved = Position {
            default_x: 10.0,
            relative_y: -20.0,
            ..Position::default()
        };
        let params = position_params(&moved, 0.0, 0.0);
        assert_eq!(
            params,
            vec![
                GuidoParam::Bare("dx=2hs".to_string()),
                GuidoParam::Bare("dy=-4hs".to_string())
            ]
        );
        assert_eq!(half_spaces(0.0, 3.0), Some(3.0), "anchor alone still moves");
    }

    #[test]
    fn test_note_conversion() {
        let pitch = Pitch::new(1, -1, 5).unwrap();
        let mut note = Note::new(1, NoteContent::Pitched(pitch), Rational::new(3, 8), 3);
        note.displayed_duration = Rational::new(3, 8);
        assert_eq!(guido_note(&note).to_string(), "d&2/4.");

        let triplet = Note::new(2, NoteContent::Rest { display: None }, Rational::new(1, 12), 3);
        assert_eq!(guido_note(&triplet).to_string(), "_/12");
    }
}
