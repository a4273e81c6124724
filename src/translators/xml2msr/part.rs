//! Building one part
//!
//! A MusicXML part is listed measure by measure, each measure holding the
//! music of all its voices one after the other, separated by `<backup>`.
//! [`PartBuilder`] routes every note to its voice, keeps the per-voice
//! scopes (pending chord, tuplets, grace notes, double tremolo) open across
//! those jumps, and finishes a measure for all voices at once.

use std::collections::BTreeMap;
use std::mem;

use crate::context::{NestingStack, Slot};
use crate::diagnostics::{DiagnosticMark, Diagnostics};
use crate::errors::Result;
use crate::msr::attributes::{
    Barline, BarlineLocation, Clef, Key, LineBreak, PageBreak, Time, VoiceStaffChange,
};
use crate::msr::basics::{checked_sum, is_zero, zero, Rational};
use crate::msr::chord::Chord;
use crate::msr::grace::{DoubleTremolo, GraceElement, GraceKind, GraceNotesGroup, TremoloElement};
use crate::msr::harmony::{FiguredBass, Harmony};
use crate::msr::lyrics::Syllable;
use crate::msr::marks::NoteMark;
use crate::msr::measure::{Measure, MeasureElement, MeasureRepeatMark};
use crate::msr::note::{Note, NoteKind, TremoloPosition};
use crate::msr::part::Part;
use crate::msr::staff::{
    StaffKind, FIGURED_BASS_STAFF_NUMBER, FIGURED_BASS_VOICE_NUMBER, HARMONY_STAFF_NUMBER,
    HARMONY_VOICE_NUMBER,
};
use crate::msr::tuplet::Tuplet;
use crate::msr::voice::{Voice, VoiceKind};
use crate::translators::xml2msr::attributes::{
    read_barline, read_clef, read_key, read_staff_details, read_time, read_transpose,
};
use crate::translators::xml2msr::directions::{read_direction, read_figured_bass, read_harmony};
use crate::translators::xml2msr::folding::fold_voice;
use crate::translators::xml2msr::notes::{
    read_note, whole_notes_from_divisions, ReadNote, TremoloHalf,
};
use crate::xml::element::{ElementKind, XmlElement};

/// (staff number, voice number) of a voice in the part
type VoiceSlot = (i32, i32);

fn next_ordinal(counter: &mut u32) -> u32 {
    *counter += 1;
    *counter
}

// ============================================================================
// PART STATE
// ============================================================================

#[derive(Debug, Clone)]
struct CurrentMeasure {
    number: String,
    ordinal: u32,
    implicit: bool,
    input_line: u32,
}

/// A finished measure, replayed for voices that show up later
#[derive(Debug, Clone)]
struct MeasureRecord {
    number: String,
    ordinal: u32,
    implicit: bool,
    full_length: Rational,
    senza_misura: bool,
    length: Rational,
    input_line: u32,
}

impl MeasureRecord {
    fn empty_measure(&self) -> Measure {
        let mut measure = Measure::new(&self.number, self.ordinal, self.full_length, self.input_line);
        measure.implicit = self.implicit;
        measure.senza_misura = self.senza_misura;
        measure
    }
}

#[derive(Debug)]
struct StaffState {
    clef: Option<Clef>,
    key: Option<Key>,
    time: Option<Time>,
    full_length: Rational,
    senza_misura: bool,
    /// Attribute changes of the current measure, for voices joining it late
    measure_attributes: Vec<MeasureElement>,
    /// Direction marks waiting for the next note of the staff
    pending_marks: Vec<NoteMark>,
    pending_elements: Vec<MeasureElement>,
}

impl StaffState {
    fn new() -> Self {
        Self {
            clef: None,
            key: None,
            time: None,
            full_length: Rational::from_integer(1),
            senza_misura: false,
            measure_attributes: Vec::new(),
            pending_marks: Vec::new(),
            pending_elements: Vec::new(),
        }
    }

    /// Clef, key and time in force, minus those the current measure restates
    fn inherited_attributes(&self) -> Vec<MeasureElement> {
        let restated =
            |is_kind: fn(&MeasureElement) -> bool| self.measure_attributes.iter().any(is_kind);
        let mut inherited = Vec::new();
        if let Some(clef) = &self.clef {
            if !restated(|e| matches!(e, MeasureElement::Clef(_))) {
                inherited.push(MeasureElement::Clef(clef.clone()));
            }
        }
        if let Some(key) = &self.key {
            if !restated(|e| matches!(e, MeasureElement::Key(_))) {
                inherited.push(MeasureElement::Key(key.clone()));
            }
        }
        if let Some(time) = &self.time {
            if !restated(|e| matches!(e, MeasureElement::Time(_))) {
                inherited.push(MeasureElement::Time(time.clone()));
            }
        }
        inherited
    }
}

/// A note or chord whose members may still be arriving
#[derive(Debug)]
enum Event {
    Note(Note),
    Chord(Chord),
}

impl Event {
    /// Turn a lone note into a chord; the note's attachments move to the chord
    fn into_chord(self) -> Chord {
        match self {
            Event::Chord(chord) => chord,
            Event::Note(mut note) => {
                let mut chord = Chord::shaped_like(&note);
                chord.marks = mem::take(&mut note.marks);
                chord.harmony = note.harmony.take();
                chord.figured_bass = note.figured_bass.take();
                chord.add_note(note);
                chord
            }
        }
    }

    fn duration(&self) -> Rational {
        match self {
            Event::Note(note) => note.measure_duration(),
            Event::Chord(chord) => chord.measure_duration(),
        }
    }

    fn tremolo_position(&self) -> Option<TremoloPosition> {
        match self {
            Event::Note(note) => note.double_tremolo_position,
            Event::Chord(chord) => chord.double_tremolo_position,
        }
    }

    fn into_tremolo_element(self) -> TremoloElement {
        match self {
            Event::Note(note) => TremoloElement::Note(note),
            Event::Chord(chord) => TremoloElement::Chord(chord),
        }
    }

    fn into_measure_element(self) -> MeasureElement {
        match self {
            Event::Note(note) => MeasureElement::Note(note),
            Event::Chord(chord) => MeasureElement::Chord(chord),
        }
    }
}

#[derive(Debug)]
struct PendingEvent {
    event: Event,
    tuplet_stops: usize,
}

#[derive(Debug)]
struct VoiceState {
    kind: VoiceKind,
    current_staff: i32,
    tuplets: NestingStack<Tuplet>,
    pending: Option<PendingEvent>,
    grace: Slot<GraceNotesGroup>,
    tremolo: Slot<DoubleTremolo>,
    /// Time elapsed in the voice since the part started
    position: Rational,
    measure_start: Rational,
    /// Ordinal of the voice's last measure
    measure_ordinal: u32,
    /// Attributes for the first measure of a voice created mid-part
    inherited: Vec<MeasureElement>,
    /// Ordinal and duration of every lyric-eligible note so far
    lyric_slots: Vec<(u32, Rational)>,
}

impl VoiceState {
    fn new(kind: VoiceKind, staff: i32, position: Rational, measure_ordinal: u32) -> Self {
        Self {
            kind,
            current_staff: staff,
            tuplets: NestingStack::new(),
            pending: None,
            grace: Slot::new("grace notes group"),
            tremolo: Slot::new("double tremolo"),
            position,
            measure_start: position,
            measure_ordinal,
            inherited: Vec::new(),
            lyric_slots: Vec::new(),
        }
    }
}

/// Everything tracked while one `<part>` is read
#[derive(Debug)]
pub(crate) struct PartState {
    divisions: i32,
    current: Option<CurrentMeasure>,
    history: Vec<MeasureRecord>,
    staves: BTreeMap<i32, StaffState>,
    voices: BTreeMap<VoiceSlot, VoiceState>,
    /// Staff each voice number was first seen on
    homes: BTreeMap<i32, i32>,
    barlines: Vec<Barline>,
    breaks: Vec<MeasureElement>,
    multiple_rest: Option<u32>,
    measure_repeat: Option<MeasureRepeatMark>,
    harmony: Option<Harmony>,
    figured_bass: Option<FiguredBass>,
}

impl Default for PartState {
    fn default() -> Self {
        Self {
            divisions: 1,
            current: None,
            history: Vec::new(),
            staves: BTreeMap::new(),
            voices: BTreeMap::new(),
            homes: BTreeMap::new(),
            barlines: Vec::new(),
            breaks: Vec::new(),
            multiple_rest: None,
            measure_repeat: None,
            harmony: None,
            figured_bass: None,
        }
    }
}

fn voice_mut(part: &mut Part, slot: VoiceSlot, input_line: u32) -> Result<&mut Voice> {
    match part.voice_mut(slot.0, slot.1) {
        Some(voice) => Ok(voice),
        None => Err(internal_error!(
            input_line,
            "voice {} of staff {} does not exist",
            slot.1,
            slot.0
        )),
    }
}

fn measure_mut(part: &mut Part, slot: VoiceSlot, input_line: u32) -> Result<&mut Measure> {
    match voice_mut(part, slot, input_line)?.last_measure_mut() {
        Some(measure) => Ok(measure),
        None => Err(internal_error!(
            input_line,
            "voice {} of staff {} has no measure",
            slot.1,
            slot.0
        )),
    }
}

fn voice_state(
    voices: &mut BTreeMap<VoiceSlot, VoiceState>,
    slot: VoiceSlot,
    input_line: u32,
) -> Result<&mut VoiceState> {
    match voices.get_mut(&slot) {
        Some(state) => Ok(state),
        None => Err(internal_error!(
            input_line,
            "no state for voice {} of staff {}",
            slot.1,
            slot.0
        )),
    }
}

// ============================================================================
// PART BUILDER
// ============================================================================

/// Borrowed view of the builder while a part is open
pub(crate) struct PartBuilder<'a> {
    pub part: &'a mut Part,
    pub state: &'a mut PartState,
    pub diagnostics: &'a mut Diagnostics,
    pub note_ordinals: &'a mut u32,
}

impl<'a> PartBuilder<'a> {
    fn warn(&mut self, line: u32, kind: &str, element: &str, message: impl Into<String>) {
        let measure = self.state.current.as_ref().map(|m| m.number.clone());
        self.diagnostics.add(
            DiagnosticMark::warning(line, kind, element, message)
                .in_context(Some(&self.part.id), measure.as_deref()),
        );
    }

    fn current_measure(&self, input_line: u32) -> Result<CurrentMeasure> {
        match &self.state.current {
            Some(current) => Ok(current.clone()),
            None => Err(internal_error!(
                input_line,
                "music outside of a measure in part {}",
                self.part.id
            )),
        }
    }

    fn staff_state(&mut self, number: i32) -> &mut StaffState {
        self.state.staves.entry(number).or_insert_with(StaffState::new)
    }

    fn ensure_staff(&mut self, number: i32, kind: StaffKind, input_line: u32) -> Result<()> {
        self.part.get_or_create_staff(number, kind, input_line)?;
        self.staff_state(number);
        Ok(())
    }

    /// Numbers of the staves that take clefs, keys and times
    fn music_staves(&mut self, input_line: u32) -> Result<Vec<i32>> {
        let numbers: Vec<i32> = self
            .part
            .staves()
            .iter()
            .filter(|s| !matches!(s.kind, StaffKind::Harmony | StaffKind::FiguredBass))
            .map(|s| s.number)
            .collect();
        if numbers.is_empty() {
            self.ensure_staff(1, StaffKind::Regular, input_line)?;
            return Ok(vec![1]);
        }
        Ok(numbers)
    }

    /// Full length of a measure of `staff`, falling back on any staff with a time
    fn measure_length(&self, staff: i32) -> (Rational, bool) {
        self.state
            .staves
            .get(&staff)
            .filter(|s| s.time.is_some())
            .or_else(|| self.state.staves.values().find(|s| s.time.is_some()))
            .map(|s| (s.full_length, s.senza_misura))
            .unwrap_or((Rational::from_integer(1), false))
    }

    // ========================================================================
    // VOICES AND MEASURES
    // ========================================================================

    /// Create the voice on first use, back-filled with skip measures for
    /// the measures it missed
    fn ensure_voice(
        &mut self,
        slot: VoiceSlot,
        kind: VoiceKind,
        regular_voice: Option<i32>,
        input_line: u32,
    ) -> Result<()> {
        if self.state.voices.contains_key(&slot) {
            return Ok(());
        }
        let staff_kind = match kind {
            VoiceKind::Regular => StaffKind::Regular,
            VoiceKind::Harmony => StaffKind::Harmony,
            VoiceKind::FiguredBass => StaffKind::FiguredBass,
        };
        self.ensure_staff(slot.0, staff_kind, input_line)?;
        log::debug!(
            "creating voice {} in staff {} of part {}",
            slot.1,
            slot.0,
            self.part.id
        );

        let mut inherited = self.staff_state(slot.0).inherited_attributes();
        let mut voice = Voice::new(slot.1, kind, input_line);
        voice.regular_voice_number = regular_voice;

        let staff = self
            .part
            .get_or_create_staff(slot.0, staff_kind, input_line)?;
        let voice = staff.register_voice(voice)?;

        let mut position = zero();
        let mut last_ordinal = 0;
        for record in &self.state.history {
            let mut measure = record.empty_measure();
            for element in inherited.drain(..) {
                measure.append(element);
            }
            if !is_zero(&record.length) {
                let ordinal = next_ordinal(self.note_ordinals);
                measure.append(MeasureElement::Note(Note::skip(
                    ordinal,
                    record.length,
                    slot.1,
                    slot.0,
                    input_line,
                )));
            }
            measure.finalize(record.ordinal == 1);
            voice.append_measure(measure)?;
            position += record.length;
            last_ordinal = record.ordinal;
        }

        let mut state = VoiceState::new(kind, slot.0, position, last_ordinal);
        state.inherited = inherited;
        self.state.voices.insert(slot, state);
        if kind == VoiceKind::Regular {
            self.state.homes.entry(slot.1).or_insert(slot.0);
        }
        Ok(())
    }

    /// Open the current measure in the voice if it is not open yet
    fn ensure_voice_measure(&mut self, slot: VoiceSlot, input_line: u32) -> Result<()> {
        let current = self.current_measure(input_line)?;
        let attributes_staff = match slot.0 {
            HARMONY_STAFF_NUMBER | FIGURED_BASS_STAFF_NUMBER => None,
            number => Some(number),
        };
        let (full_length, senza_misura) = self.measure_length(attributes_staff.unwrap_or(1));

        let state = voice_state(&mut self.state.voices, slot, input_line)?;
        if state.measure_ordinal >= current.ordinal {
            return Ok(());
        }
        state.measure_ordinal = current.ordinal;
        state.measure_start = state.position;

        let mut measure = Measure::new(&current.number, current.ordinal, full_length, current.input_line);
        measure.implicit = current.implicit;
        measure.senza_misura = senza_misura;
        for element in state.inherited.drain(..) {
            measure.append(element);
        }
        if let Some(staff) = attributes_staff.and_then(|n| self.state.staves.get(&n)) {
            for element in &staff.measure_attributes {
                measure.append(element.clone());
            }
        }
        voice_mut(self.part, slot, input_line)?.append_measure(measure)
    }

    /// Voice slot of a regular voice; a voice keeps the staff it started on
    fn regular_slot(&mut self, voice_number: i32, staff_number: i32) -> VoiceSlot {
        let home = *self.state.homes.entry(voice_number).or_insert(staff_number);
        (home, voice_number)
    }

    // ========================================================================
    // NOTES
    // ========================================================================

    pub fn note(&mut self, elt: &XmlElement) -> Result<()> {
        let ordinal = next_ordinal(self.note_ordinals);
        let read = read_note(elt, self.state.divisions, ordinal, self.diagnostics);
        self.place(read, elt.line())
    }

    /// `<forward>` moves its voice ahead with an invisible note
    pub fn forward(&mut self, elt: &XmlElement) -> Result<()> {
        let duration = whole_notes_from_divisions(
            elt.child_int_value(&ElementKind::Duration, 0),
            self.state.divisions,
        );
        let ordinal = next_ordinal(self.note_ordinals);
        let skip = Note::skip(
            ordinal,
            duration,
            elt.child_int_value(&ElementKind::Voice, 1),
            elt.child_int_value(&ElementKind::Staff, 1),
            elt.line(),
        );
        self.place(ReadNote::plain(skip), elt.line())
    }

    fn place(&mut self, mut read: ReadNote, line: u32) -> Result<()> {
        let slot = self.regular_slot(read.note.voice_number, read.note.staff_number);
        self.ensure_voice(slot, VoiceKind::Regular, None, line)?;
        self.ensure_voice_measure(slot, line)?;

        if read.grace.is_some() {
            return self.add_grace_note(slot, read, line);
        }
        if read.chord {
            return self.add_chord_member(slot, read, line);
        }

        self.flush(slot, line)?;
        self.follow_staff(slot, read.note.staff_number, line)?;

        let staff = self.staff_state(read.note.staff_number);
        let marks = mem::take(&mut staff.pending_marks);
        let elements = mem::take(&mut staff.pending_elements);
        if !elements.is_empty() {
            let measure = measure_mut(self.part, slot, line)?;
            for element in elements {
                measure.append(element);
            }
        }
        if !marks.is_empty() {
            let own = mem::replace(&mut read.note.marks, marks);
            read.note.marks.extend(own);
        }

        let state = voice_state(&mut self.state.voices, slot, line)?;
        if let Some(group) = state.grace.clear() {
            read.note.grace_before = Some(group);
        }
        let offset = state.position - state.measure_start;

        if let Some(mut harmony) = self.state.harmony.take() {
            harmony.duration = read.note.sounding_duration;
            read.note.harmony = Some(harmony.clone());
            self.append_auxiliary(VoiceKind::Harmony, slot.1, offset, MeasureElement::Harmony(harmony), line)?;
        }
        if let Some(mut figured_bass) = self.state.figured_bass.take() {
            if is_zero(&figured_bass.duration) {
                figured_bass.duration = read.note.sounding_duration;
            }
            read.note.figured_bass = Some(figured_bass.clone());
            self.append_auxiliary(
                VoiceKind::FiguredBass,
                slot.1,
                offset,
                MeasureElement::FiguredBass(figured_bass),
                line,
            )?;
        }

        let lyrics = mem::take(&mut read.lyrics);
        self.attach_lyrics(slot, &mut read.note, lyrics, line)?;

        let state = voice_state(&mut self.state.voices, slot, line)?;
        for tuplet in read.tuplet_starts {
            state.tuplets.push(tuplet);
        }
        match read.double_tremolo {
            Some(TremoloHalf::Start { marks, placement }) => {
                if state.tremolo.is_set() {
                    return Err(internal_error!(
                        line,
                        "double tremolo starts while another one is open in voice {}",
                        slot.1
                    ));
                }
                state.tremolo.set(DoubleTremolo::new(marks, placement, line));
                read.note.kind = NoteKind::DoubleTremoloMember;
                read.note.double_tremolo_position = Some(TremoloPosition::First);
            }
            Some(TremoloHalf::Stop) => {
                if !state.tremolo.is_set() {
                    return Err(internal_error!(
                        line,
                        "note {} ends a double tremolo that never started",
                        read.note.ordinal
                    ));
                }
                read.note.kind = NoteKind::DoubleTremoloMember;
                read.note.double_tremolo_position = Some(TremoloPosition::Second);
            }
            None => {}
        }

        state.pending = Some(PendingEvent {
            event: Event::Note(read.note),
            tuplet_stops: read.tuplet_stops,
        });
        Ok(())
    }

    fn add_chord_member(&mut self, slot: VoiceSlot, read: ReadNote, line: u32) -> Result<()> {
        let state = voice_state(&mut self.state.voices, slot, line)?;
        let Some(pending) = state.pending.take() else {
            return Err(internal_error!(
                line,
                "chord member note {} has no preceding note in voice {}",
                read.note.ordinal,
                slot.1
            ));
        };

        let mut chord = pending.event.into_chord();
        let mut note = read.note;
        for mark in note.marks.drain(..) {
            if !chord.marks.contains(&mark) {
                chord.marks.push(mark);
            }
        }
        chord.add_note(note);
        state.pending = Some(PendingEvent {
            event: Event::Chord(chord),
            tuplet_stops: pending.tuplet_stops + read.tuplet_stops,
        });

        if !read.lyrics.is_empty() {
            log::debug!("lyrics on chord member at line {} ignored", line);
        }
        Ok(())
    }

    fn add_grace_note(&mut self, slot: VoiceSlot, read: ReadNote, line: u32) -> Result<()> {
        let state = voice_state(&mut self.state.voices, slot, line)?;
        let slashed = read.grace.unwrap_or(false);

        if read.chord {
            let Some(group) = state.grace.as_mut() else {
                return Err(internal_error!(
                    line,
                    "grace chord member note {} has no preceding grace note",
                    read.note.ordinal
                ));
            };
            let mut chord = match group.take_last_note() {
                Some(first) => Event::Note(first).into_chord(),
                None => match group.elements.pop() {
                    Some(GraceElement::Chord(chord)) => chord,
                    _ => {
                        return Err(internal_error!(
                            line,
                            "grace chord member note {} has no preceding grace note",
                            read.note.ordinal
                        ))
                    }
                },
            };
            chord.add_note(read.note);
            group.add_chord(chord);
            return Ok(());
        }

        if !state.grace.is_set() {
            state.grace.set(GraceNotesGroup::new(GraceKind::Before, slashed, line));
        }
        if let Some(group) = state.grace.as_mut() {
            if !read.note.beams.is_empty() {
                group.beamed = true;
            }
            group.add_note(read.note);
        }
        Ok(())
    }

    /// Re-emit the staff a voice is on when its notes cross to another staff
    fn follow_staff(&mut self, slot: VoiceSlot, staff_number: i32, line: u32) -> Result<()> {
        let state = voice_state(&mut self.state.voices, slot, line)?;
        if state.current_staff == staff_number {
            return Ok(());
        }
        state.current_staff = staff_number;
        self.ensure_staff(staff_number, StaffKind::Regular, line)?;
        measure_mut(self.part, slot, line)?.append(MeasureElement::VoiceStaffChange(VoiceStaffChange {
            staff_number,
            input_line: line,
        }));
        Ok(())
    }

    /// Place the voice's pending note or chord
    fn flush(&mut self, slot: VoiceSlot, line: u32) -> Result<()> {
        let state = voice_state(&mut self.state.voices, slot, line)?;
        let Some(pending) = state.pending.take() else {
            return Ok(());
        };
        let duration = pending.event.duration();
        let measure = measure_mut(self.part, slot, line)?;
        let (Some(position), Some(_)) = (
            checked_sum(state.position, duration),
            checked_sum(measure.accumulated_duration(), duration),
        ) else {
            return Err(internal_error!(
                line,
                "duration {} overflows the time position in measure {}",
                duration,
                measure.number
            ));
        };
        state.position = position;

        let placed = match pending.event.tremolo_position() {
            Some(TremoloPosition::First) => {
                let tremolo = state.tremolo.get_mut(line)?;
                tremolo.set_element(TremoloPosition::First, pending.event.into_tremolo_element());
                None
            }
            Some(TremoloPosition::Second) => {
                let mut tremolo = state.tremolo.take(line)?;
                tremolo.set_element(TremoloPosition::Second, pending.event.into_tremolo_element());
                Some(MeasureElement::DoubleTremolo(tremolo))
            }
            None => Some(pending.event.into_measure_element()),
        };

        if let Some(element) = placed {
            match (state.tuplets.top_mut(), element) {
                (Some(tuplet), MeasureElement::Note(note)) => tuplet.add_note(note),
                (Some(tuplet), MeasureElement::Chord(chord)) => tuplet.add_chord(chord),
                (_, element) => measure.append(element),
            }
        }

        for _ in 0..pending.tuplet_stops {
            if let Some(outermost) = state.tuplets.close(line)? {
                measure.append(MeasureElement::Tuplet(outermost));
            }
        }
        Ok(())
    }

    /// Append a chord symbol or figure to its own voice at `offset` into
    /// the measure
    fn append_auxiliary(
        &mut self,
        kind: VoiceKind,
        regular_voice: i32,
        offset: Rational,
        element: MeasureElement,
        line: u32,
    ) -> Result<()> {
        let slot = match kind {
            VoiceKind::FiguredBass => (FIGURED_BASS_STAFF_NUMBER, FIGURED_BASS_VOICE_NUMBER),
            _ => (HARMONY_STAFF_NUMBER, HARMONY_VOICE_NUMBER),
        };
        self.ensure_voice(slot, kind, Some(regular_voice), line)?;
        self.ensure_voice_measure(slot, line)?;
        let skip_ordinal = next_ordinal(self.note_ordinals);

        let state = voice_state(&mut self.state.voices, slot, line)?;
        let measure = measure_mut(self.part, slot, line)?;
        let filled = measure.accumulated_duration();
        let overlaps = filled > offset;
        if filled < offset {
            measure.append(MeasureElement::Note(Note::skip(
                skip_ordinal,
                offset - filled,
                slot.1,
                slot.0,
                line,
            )));
        }
        measure.append(element);
        state.position = state.measure_start + measure.accumulated_duration();

        if overlaps {
            self.warn(
                line,
                "overlapping_harmonies",
                "harmony",
                "chord symbols or figures overlap, the later one is shifted",
            );
        }
        Ok(())
    }

    fn attach_lyrics(
        &mut self,
        slot: VoiceSlot,
        note: &mut Note,
        syllables: Vec<Syllable>,
        line: u32,
    ) -> Result<()> {
        if !note.is_lyric_eligible() {
            if !syllables.is_empty() {
                self.warn(line, "lyrics_on_rest", "lyric", "lyrics on a rest or skip are ignored");
            }
            return Ok(());
        }

        let state = voice_state(&mut self.state.voices, slot, line)?;
        let voice = voice_mut(self.part, slot, line)?;
        for syllable in syllables {
            let created = voice.stanza_mut(&syllable.stanza_number).is_none();
            let stanza = voice.get_or_create_stanza(&syllable.stanza_number, syllable.input_line)?;
            if created {
                for (ordinal, duration) in &state.lyric_slots {
                    let mut skip = Syllable::skip(&stanza.number, *duration, syllable.input_line);
                    skip.note_ordinal = Some(*ordinal);
                    stanza.append_syllable(skip);
                }
            }
            stanza.append_syllable(syllable.clone());
            note.syllables.push(syllable);
        }

        for stanza in voice.stanzas.iter_mut() {
            if !note.syllables.iter().any(|s| s.stanza_number == stanza.number) {
                let mut skip = Syllable::skip(&stanza.number, note.sounding_duration, line);
                skip.note_ordinal = Some(note.ordinal);
                stanza.append_syllable(skip);
            }
        }
        state.lyric_slots.push((note.ordinal, note.sounding_duration));
        Ok(())
    }

    // ========================================================================
    // ATTRIBUTES
    // ========================================================================

    /// Record an attribute change for `staff` and append it to the voices
    /// already in the current measure
    fn add_measure_attribute(&mut self, staff: i32, element: MeasureElement, line: u32) -> Result<()> {
        let ordinal = self.current_measure(line)?.ordinal;
        self.staff_state(staff).measure_attributes.push(element.clone());

        let slots: Vec<VoiceSlot> = self
            .state
            .voices
            .iter()
            .filter(|(slot, state)| slot.0 == staff && state.measure_ordinal == ordinal)
            .map(|(slot, _)| *slot)
            .collect();
        for slot in slots {
            self.flush(slot, line)?;
            let measure = measure_mut(self.part, slot, line)?;
            if let MeasureElement::Time(time) = &element {
                if let Some(length) = time.whole_notes() {
                    measure.full_length = length;
                }
                measure.senza_misura = time.senza_misura;
            }
            measure.append(element.clone());
        }
        Ok(())
    }

    pub fn divisions(&mut self, elt: &XmlElement) {
        let divisions = elt.int_value(0);
        if divisions <= 0 {
            self.warn(
                elt.line(),
                "invalid_divisions",
                "divisions",
                format!("divisions \"{}\" must be positive, keeping {}", elt.text(), self.state.divisions),
            );
            return;
        }
        self.state.divisions = divisions;
    }

    pub fn staves(&mut self, elt: &XmlElement) -> Result<()> {
        let count = elt.int_value(1).max(1);
        self.part.declared_staff_count = count;
        for number in 1..=count {
            self.ensure_staff(number, StaffKind::Regular, elt.line())?;
        }
        Ok(())
    }

    pub fn key(&mut self, elt: &XmlElement) -> Result<()> {
        let key = read_key(elt, self.diagnostics);
        let staves = match key.staff_number {
            Some(number) => {
                self.ensure_staff(number, StaffKind::Regular, elt.line())?;
                vec![number]
            }
            None => self.music_staves(elt.line())?,
        };
        for number in staves {
            self.staff_state(number).key = Some(key.clone());
            self.add_measure_attribute(number, MeasureElement::Key(key.clone()), elt.line())?;
        }
        Ok(())
    }

    pub fn time(&mut self, elt: &XmlElement) -> Result<()> {
        let time = read_time(elt);
        let full_length = match time.whole_notes() {
            Some(length) if !is_zero(&length) => length,
            _ => {
                if !time.senza_misura {
                    self.warn(elt.line(), "invalid_time", "time", "time signature has no usable length, 4/4 assumed");
                }
                Rational::from_integer(1)
            }
        };
        let staves = match time.staff_number {
            Some(number) => {
                self.ensure_staff(number, StaffKind::Regular, elt.line())?;
                vec![number]
            }
            None => self.music_staves(elt.line())?,
        };
        for number in staves {
            let staff = self.staff_state(number);
            staff.time = Some(time.clone());
            staff.full_length = full_length;
            staff.senza_misura = time.senza_misura;
            self.add_measure_attribute(number, MeasureElement::Time(time.clone()), elt.line())?;
        }
        Ok(())
    }

    pub fn clef(&mut self, elt: &XmlElement) -> Result<()> {
        let clef = read_clef(elt);
        let number = clef.staff_number;
        self.ensure_staff(number, StaffKind::Regular, elt.line())?;
        match clef.sign.as_str() {
            "TAB" => self.part.set_staff_kind(number, StaffKind::Tablature),
            "percussion" => self.part.set_staff_kind(number, StaffKind::Drum),
            _ => {}
        }
        self.staff_state(number).clef = Some(clef.clone());
        self.add_measure_attribute(number, MeasureElement::Clef(clef), elt.line())
    }

    pub fn staff_details(&mut self, elt: &XmlElement) -> Result<()> {
        let number = elt.attribute_int("number", 1);
        self.ensure_staff(number, StaffKind::Regular, elt.line())?;
        let (lines, tunings) = read_staff_details(elt, self.diagnostics);
        let is_tablature = !tunings.is_empty();
        if let Some(staff) = self.part.staff_mut(number) {
            if let Some(lines) = lines {
                staff.lines = lines;
            }
            if is_tablature {
                staff.tunings = tunings;
            }
        }
        if is_tablature {
            self.part.set_staff_kind(number, StaffKind::Tablature);
        }
        Ok(())
    }

    pub fn transpose(&mut self, elt: &XmlElement) -> Result<()> {
        let transpose = read_transpose(elt);
        self.part.transpose = Some(transpose.clone());
        let staves = match elt.attribute("number").and_then(|n| n.trim().parse().ok()) {
            Some(number) => vec![number],
            None => self.music_staves(elt.line())?,
        };
        for number in staves {
            self.add_measure_attribute(number, MeasureElement::Transpose(transpose.clone()), elt.line())?;
        }
        Ok(())
    }

    pub fn measure_style(&mut self, elt: &XmlElement) {
        if let Some(rest) = elt.child(&ElementKind::MultipleRest) {
            self.state.multiple_rest = Some(rest.int_value(1).max(1) as u32);
        }
        if let Some(repeat) = elt.child(&ElementKind::MeasureRepeat) {
            self.state.measure_repeat = match repeat.attribute_value("type") {
                "start" => Some(MeasureRepeatMark::Start {
                    measures: repeat.int_value(1).max(1) as u32,
                    slashes: repeat.attribute_int("slashes", 1).max(1) as u32,
                }),
                "stop" => Some(MeasureRepeatMark::Stop),
                other => {
                    self.warn(
                        repeat.line(),
                        "unknown_measure_repeat_type",
                        "measure-repeat",
                        format!("measure repeat type \"{}\" is unknown", other),
                    );
                    None
                }
            };
        }
    }

    // ========================================================================
    // DIRECTIONS AND OTHER MEASURE CONTENT
    // ========================================================================

    pub fn direction(&mut self, elt: &XmlElement) {
        let items = read_direction(elt, self.diagnostics);
        let staff = self.staff_state(items.staff_number);
        staff.pending_marks.extend(items.marks);
        staff.pending_elements.extend(items.elements);
    }

    pub fn harmony(&mut self, elt: &XmlElement) {
        let Some(harmony) = read_harmony(elt, self.diagnostics) else {
            return;
        };
        if self.state.harmony.replace(harmony).is_some() {
            self.warn(
                elt.line(),
                "harmony_without_note",
                "harmony",
                "harmony replaced by the next one before reaching a note",
            );
        }
    }

    pub fn figured_bass(&mut self, elt: &XmlElement) {
        let figured_bass = read_figured_bass(elt, self.state.divisions);
        if self.state.figured_bass.replace(figured_bass).is_some() {
            self.warn(
                elt.line(),
                "figured_bass_without_note",
                "figured-bass",
                "figured bass replaced by the next one before reaching a note",
            );
        }
    }

    pub fn barline(&mut self, elt: &XmlElement) {
        let barline = read_barline(elt, self.diagnostics);
        self.state.barlines.push(barline);
    }

    /// System and page breaks; the first measure never breaks
    pub fn print(&mut self, elt: &XmlElement) -> Result<()> {
        let current = self.current_measure(elt.line())?;
        if current.ordinal == 1 {
            return Ok(());
        }
        if elt.attribute_yes_no("new-page", false) {
            self.state.breaks.push(MeasureElement::PageBreak(PageBreak {
                input_line: elt.line(),
            }));
        } else if elt.attribute_yes_no("new-system", false) {
            self.state.breaks.push(MeasureElement::LineBreak(LineBreak {
                next_bar_number: current.number,
                input_line: elt.line(),
            }));
        }
        Ok(())
    }

    // ========================================================================
    // MEASURE AND PART BOUNDARIES
    // ========================================================================

    pub fn start_measure(&mut self, elt: &XmlElement) {
        self.state.current = Some(CurrentMeasure {
            number: elt.attribute_value("number").trim().to_string(),
            ordinal: self.state.history.len() as u32 + 1,
            implicit: elt.attribute_yes_no("implicit", false),
            input_line: elt.line(),
        });
        for staff in self.state.staves.values_mut() {
            staff.measure_attributes.clear();
        }
        self.state.barlines.clear();
        self.state.breaks.clear();
        self.state.multiple_rest = None;
        self.state.measure_repeat = None;
    }

    /// Close the voice's scopes that may not cross a barline
    fn close_voice_scopes(&mut self, slot: VoiceSlot, ordinal: u32, line: u32) -> Result<()> {
        let in_measure = voice_state(&mut self.state.voices, slot, line)?.measure_ordinal == ordinal;
        if !in_measure {
            return Ok(());
        }
        self.flush(slot, line)?;

        let state = voice_state(&mut self.state.voices, slot, line)?;
        let measure = measure_mut(self.part, slot, line)?;
        if let Some(mut group) = state.grace.clear() {
            match measure.last_note_mut() {
                Some(note) => {
                    group.kind = GraceKind::After;
                    note.grace_after = Some(group);
                }
                // carried to the first note of the next measure
                None => {
                    state.grace.set(group);
                }
            }
        }

        let open_tuplets = state.tuplets.depth();
        if let Some(outermost) = state.tuplets.close_all(line)? {
            measure.append(MeasureElement::Tuplet(outermost));
        }
        let open_tremolo = state.tremolo.clear();
        let had_tremolo = open_tremolo.is_some();
        if let Some(tremolo) = open_tremolo {
            measure.append(MeasureElement::DoubleTremolo(tremolo));
        }

        if open_tuplets > 0 {
            self.warn(
                line,
                "unterminated_tuplet",
                "tuplet",
                format!("{} tuplet(s) still open at the end of the measure were closed", open_tuplets),
            );
        }
        if had_tremolo {
            self.warn(
                line,
                "unterminated_tremolo",
                "tremolo",
                "double tremolo without its second element",
            );
        }
        Ok(())
    }

    pub fn end_measure(&mut self, line: u32) -> Result<()> {
        let current = self.current_measure(line)?;
        let slots: Vec<VoiceSlot> = self.state.voices.keys().copied().collect();
        for &slot in &slots {
            self.close_voice_scopes(slot, current.ordinal, line)?;
        }

        let mut length = zero();
        for state in self.state.voices.values() {
            if state.kind == VoiceKind::Regular && state.measure_ordinal == current.ordinal {
                let filled = state.position - state.measure_start;
                if filled > length {
                    length = filled;
                }
            }
        }
        let (full_length, senza_misura) = self.measure_length(1);
        if is_zero(&length) && !senza_misura {
            length = full_length;
        }

        let barlines = mem::take(&mut self.state.barlines);
        let breaks = mem::take(&mut self.state.breaks);
        let multiple_rest = self.state.multiple_rest.take();
        let measure_repeat = self.state.measure_repeat.take();

        for &slot in &slots {
            self.ensure_voice_measure(slot, line)?;
            let skip_ordinal = next_ordinal(self.note_ordinals);
            let state = voice_state(&mut self.state.voices, slot, line)?;
            let voice = voice_mut(self.part, slot, line)?;
            let Some(measure) = voice.last_measure_mut() else {
                return Err(internal_error!(
                    line,
                    "voice {} lost its measure {}",
                    slot.1,
                    current.number
                ));
            };

            let filled = measure.accumulated_duration();
            if filled < length {
                measure.append(MeasureElement::Note(Note::skip(
                    skip_ordinal,
                    length - filled,
                    slot.1,
                    slot.0,
                    line,
                )));
            }
            measure.multiple_rest = multiple_rest;
            measure.measure_repeat = measure_repeat;
            for barline in &barlines {
                match barline.location {
                    BarlineLocation::Left => measure.prepend(MeasureElement::Barline(barline.clone())),
                    _ => measure.append(MeasureElement::Barline(barline.clone())),
                }
            }
            for element in breaks.iter().rev() {
                measure.prepend(element.clone());
            }
            measure.finalize(current.ordinal == 1);
            state.position = state.measure_start + measure.accumulated_duration();

            for stanza in voice.stanzas.iter_mut() {
                let end = Syllable::measure_end(&stanza.number, line);
                stanza.append_syllable(end);
            }
        }

        self.state.history.push(MeasureRecord {
            number: current.number,
            ordinal: current.ordinal,
            implicit: current.implicit,
            full_length,
            senza_misura,
            length,
            input_line: current.input_line,
        });
        self.state.current = None;
        Ok(())
    }

    /// Finish the part: report leftovers, then fold every voice's measures
    pub fn end_part(&mut self, line: u32) -> Result<()> {
        if self.state.current.is_some() {
            self.end_measure(line)?;
        }

        let leftover_grace = self.state.voices.values().any(|v| v.grace.is_set());
        if leftover_grace {
            self.warn(line, "dangling_grace_notes", "grace", "grace notes after the last note are dropped");
        }
        let dangling_directions: Vec<i32> = self
            .state
            .staves
            .iter()
            .filter(|(_, s)| !s.pending_marks.is_empty() || !s.pending_elements.is_empty())
            .map(|(n, _)| *n)
            .collect();
        for number in dangling_directions {
            self.warn(
                line,
                "dangling_direction",
                "direction",
                format!("directions after the last note of staff {} are dropped", number),
            );
        }
        if self.state.harmony.is_some() || self.state.figured_bass.is_some() {
            self.warn(
                line,
                "dangling_harmony",
                "harmony",
                "chord symbol or figured bass after the last note is dropped",
            );
        }

        for number in 1..=self.part.declared_staff_count {
            self.ensure_staff(number, StaffKind::Regular, line)?;
        }

        let slots: Vec<VoiceSlot> = self.state.voices.keys().copied().collect();
        for slot in slots {
            fold_voice(voice_mut(self.part, slot, line)?, self.diagnostics)?;
        }
        Ok(())
    }
}
