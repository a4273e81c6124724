//! Score model to LilyPond Score Representation
//!
//! [`LpsrBuilder`] browses the canonical score and rebuilds every voice it
//! meets out of newborn clones: the canonical score is only read, the LPSR
//! tree owns its own copies. Children met while a note, chord, grace group
//! or tuplet is open are re-attached to that container when it closes.

mod header;

use crate::browser::browse;
use crate::context::{ContextStack, ScopeFlag, ScopeGuard, Slot};
use crate::diagnostics::{DiagnosticMark, Diagnostics};
use crate::errors::Result;
use crate::lpsr::tree::{
    staff_context_name, ContextKind, ContextUse, LpsrScore, LyricsUse, PartBlock,
    PartGroupBlock, PartGroupBlockElement, ScoreElement, StaffBlock, StanzaDefinition,
    VoiceDefinition,
};
use crate::msr::attributes::{
    BarCheck, BarNumberCheck, Barline, BarlineStyle, Clef, Coda, Key, LineBreak, PageBreak,
    Rehearsal, Segno, Tempo, Time, Transpose, VoiceStaffChange,
};
use crate::msr::basics::{Placement, Position};
use crate::msr::chord::Chord;
use crate::msr::grace::{DoubleTremolo, GraceKind, GraceNotesGroup, TremoloElement};
use crate::msr::harmony::{Figure, FiguredBass, Harmony, HarmonyDegree};
use crate::msr::lyrics::{ExtendKind, Stanza, Syllable, SyllableKind};
use crate::msr::marks::{
    Articulation, Dynamics, Fermata, NoteMark, OctaveShift, Ornament, SingleTremolo, Slur,
    Spanner, Technical, Wedge, Words,
};
use crate::msr::measure::{Measure, MeasureElement, MeasureKind};
use crate::msr::note::{Note, NoteKind, TremoloPosition};
use crate::msr::part::Part;
use crate::msr::part_group::PartGroup;
use crate::msr::score::Score;
use crate::msr::staff::Staff;
use crate::msr::tuplet::{Tuplet, TupletElement, TupletLineShape};
use crate::msr::visitor::{MsrNode, MsrVisitor};
use crate::msr::voice::{
    MeasuresRepeat, Repeat, RepeatEnding, RestMeasures, Voice, VoiceElement, VoiceKind,
};
use crate::settings::LpsrSettings;

/// Build the LPSR tree for a finished score
pub fn build_lpsr(score: &Score, settings: &LpsrSettings) -> Result<(LpsrScore, Diagnostics)> {
    LpsrBuilder::new(settings).build(score)
}

/// Innermost open container that receives marks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkOwner {
    Note,
    Chord,
}

pub struct LpsrBuilder {
    settings: LpsrSettings,
    diagnostics: Diagnostics,
    context: ContextStack,
    lpsr: LpsrScore,

    group_blocks: Vec<PartGroupBlock>,
    part: Slot<Part>,
    part_block: Slot<PartBlock>,
    staff: Slot<Staff>,
    staff_block: Slot<StaffBlock>,
    voice: Slot<Voice>,
    measure: Slot<Measure>,
    rest_measures: Slot<RestMeasures>,
    measures_repeat: Slot<MeasuresRepeat>,
    tremolo: Slot<DoubleTremolo>,
    harmony: Slot<Harmony>,
    figured_bass: Slot<FiguredBass>,
    stanza: Slot<Stanza>,

    notes: Vec<Note>,
    chords: Vec<Chord>,
    grace_groups: Vec<GraceNotesGroup>,
    owners: Vec<MarkOwner>,

    /// The last measure ended with a bar check still waiting for the next
    /// measure's number
    pending_bar_check: bool,
    /// No non-grace note has been completed in the current voice yet
    first_note_pending: bool,
    /// Voice whose first note has grace notes, with their skip clone
    skip_grace: Option<(String, GraceNotesGroup)>,
    part_voice_names: Vec<String>,
}

impl LpsrBuilder {
    pub fn new(settings: &LpsrSettings) -> Self {
        Self {
            settings: settings.clone(),
            diagnostics: Diagnostics::new(),
            context: ContextStack::new(),
            lpsr: LpsrScore::new(Score::new(0), settings),
            group_blocks: Vec::new(),
            part: Slot::new("part"),
            part_block: Slot::new("part block"),
            staff: Slot::new("staff"),
            staff_block: Slot::new("staff block"),
            voice: Slot::new("voice"),
            measure: Slot::new("measure"),
            rest_measures: Slot::new("rest measures"),
            measures_repeat: Slot::new("measures repeat"),
            tremolo: Slot::new("double tremolo"),
            harmony: Slot::new("harmony"),
            figured_bass: Slot::new("figured bass"),
            stanza: Slot::new("stanza"),
            notes: Vec::new(),
            chords: Vec::new(),
            grace_groups: Vec::new(),
            owners: Vec::new(),
            pending_bar_check: false,
            first_note_pending: false,
            skip_grace: None,
            part_voice_names: Vec::new(),
        }
    }

    pub fn build(mut self, score: &Score) -> Result<(LpsrScore, Diagnostics)> {
        browse(&mut self, MsrNode::Score(score))?;
        log::info!(
            "LPSR built: {} definition(s), {} part block(s), {} diagnostic(s)",
            self.lpsr.elements.len(),
            self.lpsr.score_block.part_blocks().len(),
            self.diagnostics.len()
        );
        Ok((self.lpsr, self.diagnostics))
    }

    fn warn(&mut self, line: u32, kind: &str, element: &str, message: impl Into<String>) {
        let part_id = self.part.as_ref().map(|p| p.id.clone());
        let measure_number = self.measure.as_ref().map(|m| m.number.clone());
        self.diagnostics.add(
            DiagnosticMark::warning(line, kind, element, message)
                .in_context(part_id.as_deref(), measure_number.as_deref()),
        );
    }

    fn in_wrapped_measures(&self) -> bool {
        self.context.is_set(ScopeFlag::RestMeasures)
            || self.context.is_set(ScopeFlag::MeasuresRepeatPattern)
            || self.context.is_set(ScopeFlag::MeasuresRepeatReplicas)
    }

    fn append_to_measure(&mut self, element: MeasureElement, input_line: u32) -> Result<()> {
        self.measure.get_mut(input_line)?.append(element);
        Ok(())
    }

    /// Mark goes to the innermost open note or chord
    fn attach_mark(&mut self, mark: NoteMark) -> Result<()> {
        let line = mark.input_line();
        match self.owners.last() {
            Some(MarkOwner::Note) => match self.notes.last_mut() {
                Some(note) => note.marks.push(mark),
                None => return Err(internal_error!(line, "mark without an open note")),
            },
            Some(MarkOwner::Chord) => match self.chords.last_mut() {
                Some(chord) => chord.marks.push(mark),
                None => return Err(internal_error!(line, "mark without an open chord")),
            },
            None => return Err(internal_error!(line, "mark found outside of any note or chord")),
        }
        Ok(())
    }

    /// Measure before the one starting now, in the open repeat or the voice
    fn previous_measure_mut(&mut self) -> Option<&mut Measure> {
        if self.context.repeats.last_measure_mut().is_some() {
            return self.context.repeats.last_measure_mut();
        }
        self.voice.as_mut()?.last_measure_mut()
    }

    /// Route a finished measure or wrapper to the open repeat or the voice
    fn store_voice_element(&mut self, element: VoiceElement, input_line: u32) -> Result<()> {
        if let Some(element) = self.context.repeats.append(element) {
            self.voice.get_mut(input_line)?.append_element(element)?;
        }
        Ok(())
    }

    fn place_tremolo_element(
        &mut self,
        element: TremoloElement,
        position: Option<TremoloPosition>,
        input_line: u32,
    ) -> Result<()> {
        let Some(position) = position else {
            return Err(internal_error!(
                input_line,
                "double tremolo member without a position"
            ));
        };
        self.tremolo.get_mut(input_line)?.set_element(position, element);
        Ok(())
    }

    /// Give the other voices of the part skip grace notes matching those at
    /// the start of `grace_voice`, so that all voices stay aligned
    fn apply_skip_grace(&mut self, input_line: u32) {
        let Some((grace_voice, skip)) = self.skip_grace.take() else {
            return;
        };
        let names = std::mem::take(&mut self.part_voice_names);
        let mut patched = 0;
        for definition in self.lpsr.voice_definitions_mut() {
            if definition.name == grace_voice
                || definition.voice.kind != VoiceKind::Regular
                || !names.contains(&definition.name)
            {
                continue;
            }
            if let Some(note) = first_note_mut(&mut definition.voice.elements) {
                if note.grace_before.is_none() {
                    note.grace_before = Some(skip.clone());
                    patched += 1;
                }
            }
        }
        if patched > 0 {
            log::debug!(
                "added skip grace notes to {} voice(s) aligned with {} (line {})",
                patched,
                grace_voice,
                input_line
            );
        }
    }
}

fn first_tuplet_note(tuplet: &mut Tuplet) -> Option<&mut Note> {
    match tuplet.elements.first_mut()? {
        TupletElement::Note(note) => Some(note),
        TupletElement::Chord(chord) => chord.notes.first_mut(),
        TupletElement::Tuplet(inner) => first_tuplet_note(inner),
    }
}

fn first_measure_note(elements: &mut [MeasureElement]) -> Option<&mut Note> {
    for element in elements.iter_mut() {
        match element {
            MeasureElement::Note(note) => return Some(note),
            MeasureElement::Chord(chord) => return chord.notes.first_mut(),
            MeasureElement::Tuplet(tuplet) => return first_tuplet_note(tuplet),
            other if other.is_music() => return None,
            _ => {}
        }
    }
    None
}

fn first_note_mut(elements: &mut [VoiceElement]) -> Option<&mut Note> {
    for element in elements.iter_mut() {
        let found = match element {
            VoiceElement::Measure(measure) => first_measure_note(&mut measure.elements),
            VoiceElement::Repeat(repeat) => first_note_mut(&mut repeat.common_part),
            VoiceElement::RestMeasures(_) => return None,
            VoiceElement::MeasuresRepeat(repeat) => repeat
                .pattern
                .iter_mut()
                .find_map(|measure| first_measure_note(&mut measure.elements)),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

// ============================================================================
// SCORE, GROUPS AND PARTS
// ============================================================================

impl MsrVisitor for LpsrBuilder {
    fn visit_start_score(&mut self, elt: &Score) -> Result<()> {
        let mut msr = elt.newborn_clone();
        header::correct_titles(&mut msr.identification, &mut self.diagnostics, elt.input_line);
        self.lpsr = LpsrScore::new(msr, &self.settings);
        self.lpsr.comments = header::credit_comments(elt);
        Ok(())
    }

    fn visit_end_score(&mut self, _elt: &Score) -> Result<()> {
        header::fill_header(&mut self.lpsr, &self.settings);
        self.lpsr.paper = header::paper_from(&self.lpsr.msr.page_geometry, &self.lpsr.msr);
        header::set_global_staff_size(&mut self.lpsr, &self.settings);
        Ok(())
    }

    fn visit_start_part_group(&mut self, elt: &PartGroup) -> Result<()> {
        let owner = self.context.part_groups.top().map(PartGroup::key);
        self.context.part_groups.push(elt.newborn_clone(owner.as_ref()));
        self.group_blocks.push(PartGroupBlock {
            absolute_number: elt.absolute_number,
            symbol: elt.symbol,
            barline: elt.barline,
            name: elt.name.clone(),
            abbreviation: elt.abbreviation.clone(),
            elements: Vec::new(),
        });
        Ok(())
    }

    fn visit_end_part_group(&mut self, elt: &PartGroup) -> Result<()> {
        if let Some(outermost) = self.context.part_groups.close(elt.input_line)? {
            self.lpsr.msr.add_part_group(outermost);
        }
        let Some(block) = self.group_blocks.pop() else {
            return Err(internal_error!(elt.input_line, "part group block end without a start"));
        };
        match self.group_blocks.last_mut() {
            Some(parent) => parent.elements.push(PartGroupBlockElement::Group(block)),
            None => self.lpsr.score_block.part_groups.push(block),
        }
        Ok(())
    }

    fn visit_start_part(&mut self, elt: &Part) -> Result<()> {
        let Some(owner) = self.context.part_groups.top().map(PartGroup::key) else {
            return Err(internal_error!(
                elt.input_line,
                "part {} outside of any part group",
                elt.id
            ));
        };
        log::debug!("LPSR for part {}", elt.combined_name());
        self.part.set(elt.newborn_clone(&owner));
        self.part_block.set(PartBlock {
            part_id: elt.id.clone(),
            name: elt.name.clone(),
            abbreviation: elt.abbreviation.clone(),
            instrument_name: elt.instrument_name.clone(),
            instrument_abbreviation: elt.instrument_abbreviation.clone(),
            transpose: elt.transpose.clone(),
            staves: Vec::new(),
            contexts: Vec::new(),
        });
        self.skip_grace = None;
        self.part_voice_names.clear();
        Ok(())
    }

    fn visit_end_part(&mut self, elt: &Part) -> Result<()> {
        let mut part = self.part.take(elt.input_line)?;
        let mut block = self.part_block.take(elt.input_line)?;

        if part.instrument_abbreviation.is_empty() && !part.abbreviation.is_empty() {
            part.instrument_abbreviation = part.abbreviation.clone();
            block.instrument_abbreviation = part.abbreviation.clone();
        }

        if self.settings.skip_grace_notes_workaround {
            self.apply_skip_grace(elt.input_line);
        }

        self.context
            .part_groups
            .require_top(elt.input_line)?
            .append_part(part);
        match self.group_blocks.last_mut() {
            Some(group) => group.elements.push(PartGroupBlockElement::Part(block)),
            None => {
                return Err(internal_error!(
                    elt.input_line,
                    "part block outside of any part group block"
                ))
            }
        }
        Ok(())
    }

    // ========================================================================
    // STAVES, VOICES AND STANZAS
    // ========================================================================

    fn visit_start_staff(&mut self, elt: &Staff) -> Result<()> {
        let owner = self.part.get(elt.input_line)?.key();
        if elt.kind.has_staff_block() {
            self.staff_block.set(StaffBlock {
                context_name: staff_context_name(&owner.part_id, elt.number),
                number: elt.number,
                kind: elt.kind,
                lines: elt.lines,
                tunings: elt.tunings.clone(),
                instrument_name: String::new(),
                short_instrument_name: String::new(),
                voice_names: Vec::new(),
                lyrics: Vec::new(),
            });
        }
        self.staff.set(elt.newborn_clone(&owner));
        Ok(())
    }

    fn visit_end_staff(&mut self, elt: &Staff) -> Result<()> {
        let staff = self.staff.take(elt.input_line)?;
        self.part.get_mut(elt.input_line)?.add_staff(staff)?;
        if let Some(block) = self.staff_block.clear() {
            if block.voice_names.is_empty() {
                log::debug!("staff {} has no voice to show, no staff block", block.context_name);
            } else {
                self.part_block.get_mut(elt.input_line)?.staves.push(block);
            }
        }
        Ok(())
    }

    fn visit_start_voice(&mut self, elt: &Voice) -> Result<()> {
        let owner = self.staff.get(elt.input_line)?.key()?;
        self.voice.set(elt.newborn_clone(&owner));
        self.context.repeats.reset();
        self.context.flags.clear(ScopeFlag::HarmonyVoice);
        self.context.flags.clear(ScopeFlag::FiguredBassVoice);
        match elt.kind {
            VoiceKind::Regular => {}
            VoiceKind::Harmony => self.context.flags.set(ScopeFlag::HarmonyVoice),
            VoiceKind::FiguredBass => self.context.flags.set(ScopeFlag::FiguredBassVoice),
        }
        self.pending_bar_check = false;
        self.first_note_pending = true;
        Ok(())
    }

    fn visit_end_voice(&mut self, elt: &Voice) -> Result<()> {
        let line = elt.input_line;
        if !self.context.repeats.is_outside() {
            return Err(internal_error!(line, "voice {} ends inside a repeat", elt.name()));
        }
        let mut voice = self.voice.take(line)?;

        // nothing follows the last bar check
        if self.pending_bar_check {
            if let Some(measure) = voice.last_measure_mut() {
                if matches!(measure.elements.last(), Some(MeasureElement::BarCheck(_))) {
                    measure.elements.pop();
                }
            }
            self.pending_bar_check = false;
        }

        let name = voice.name();
        let has_music = voice.has_music();
        match voice.kind {
            VoiceKind::Regular => match self.staff_block.as_mut() {
                Some(block) => block.voice_names.push(name.clone()),
                None => self.warn(
                    line,
                    "voice_without_staff",
                    "voice",
                    format!("voice {} is on a staff that is not printed", name),
                ),
            },
            VoiceKind::Harmony | VoiceKind::FiguredBass if !has_music => {
                log::debug!("{} has no music, not shown", name);
            }
            VoiceKind::Harmony => self.part_block.get_mut(line)?.contexts.push(ContextUse {
                kind: ContextKind::ChordNames,
                voice_name: name.clone(),
            }),
            VoiceKind::FiguredBass => self.part_block.get_mut(line)?.contexts.push(ContextUse {
                kind: ContextKind::FiguredBass,
                voice_name: name.clone(),
            }),
        }

        self.context.flags.clear(ScopeFlag::HarmonyVoice);
        self.context.flags.clear(ScopeFlag::FiguredBassVoice);
        self.part_voice_names.push(name.clone());
        self.lpsr
            .elements
            .push(ScoreElement::Voice(VoiceDefinition { name, voice }));
        Ok(())
    }

    fn visit_start_stanza(&mut self, elt: &Stanza) -> Result<()> {
        let owner = self.voice.get(elt.input_line)?.key()?;
        let mut context = ScopeGuard::new(&mut self.context);
        context.flags.enter(ScopeFlag::Stanza, elt.input_line)?;
        context.flags.clear(ScopeFlag::SyllableExtend);
        context.commit();
        self.stanza.set(elt.newborn_clone(&owner));
        Ok(())
    }

    fn visit_end_stanza(&mut self, elt: &Stanza) -> Result<()> {
        self.context.flags.leave(ScopeFlag::Stanza, elt.input_line)?;
        self.context.flags.clear(ScopeFlag::SyllableExtend);
        let stanza = self.stanza.take(elt.input_line)?;
        if !stanza.has_text {
            log::debug!("stanza {} has no text, dropped", stanza.number);
            return Ok(());
        }

        let voice_name = self.voice.get(elt.input_line)?.name();
        let name = stanza.name(&voice_name);
        match self.staff_block.as_mut() {
            Some(block) => block.lyrics.push(LyricsUse {
                voice_name: voice_name.clone(),
                stanza_name: name.clone(),
            }),
            None => self.warn(
                elt.input_line,
                "stanza_without_staff",
                "lyric",
                format!("stanza {} is on a staff that is not printed", name),
            ),
        }
        self.lpsr.elements.push(ScoreElement::Stanza(StanzaDefinition {
            name,
            voice_name,
            stanza,
        }));
        Ok(())
    }

    fn visit_start_syllable(&mut self, elt: &Syllable) -> Result<()> {
        let mut syllable = elt.newborn_clone();
        match syllable.extend {
            ExtendKind::Start | ExtendKind::Standalone => {
                self.context.flags.set(ScopeFlag::SyllableExtend)
            }
            ExtendKind::Stop => self.context.flags.clear(ScopeFlag::SyllableExtend),
            ExtendKind::None | ExtendKind::Continue => {}
        }

        if self.context.is_set(ScopeFlag::Stanza) {
            // a skip under a melisma line continues it
            if syllable.kind == SyllableKind::Skip
                && self.context.is_set(ScopeFlag::SyllableExtend)
            {
                syllable.extend = ExtendKind::Continue;
            }
            self.stanza.get_mut(elt.input_line)?.append_syllable(syllable);
            return Ok(());
        }

        let add_words = self.settings.add_words_from_lyrics;
        let Some(note) = self.notes.last_mut() else {
            return Err(internal_error!(elt.input_line, "syllable outside of a note and a stanza"));
        };
        let text = syllable.text();
        if add_words && !text.is_empty() {
            note.marks.push(NoteMark::Words(Words {
                text,
                placement: Placement::Below,
                position: Position::default(),
                italic: true,
                bold: false,
                input_line: elt.input_line,
            }));
        }
        note.syllables.push(syllable);
        Ok(())
    }

    // ========================================================================
    // MEASURES AND WRAPPERS
    // ========================================================================

    fn visit_start_measure(&mut self, elt: &Measure) -> Result<()> {
        let owner = self.voice.get(elt.input_line)?.key()?;
        let mut measure = elt.newborn_clone(&owner);

        if self.pending_bar_check {
            self.pending_bar_check = false;
            let number = elt.number.clone();
            if let Some(previous) = self.previous_measure_mut() {
                if let Some(MeasureElement::BarCheck(check)) = previous.elements.last_mut() {
                    check.next_bar_number = Some(number.clone());
                }
            }
            measure.append(MeasureElement::BarNumberCheck(BarNumberCheck {
                number,
                input_line: elt.input_line,
            }));
        }

        self.measure.set(measure);
        Ok(())
    }

    fn visit_end_measure(&mut self, elt: &Measure) -> Result<()> {
        let mut measure = self.measure.take(elt.input_line)?;
        let kind = measure.finalize(measure.ordinal == 1);

        let wrapped = self.in_wrapped_measures();
        if self.settings.generate_bar_checks
            && !wrapped
            && matches!(
                kind,
                MeasureKind::Regular
                    | MeasureKind::Overcomplete
                    | MeasureKind::Cadenza
                    | MeasureKind::Anacrusis
            )
        {
            measure.append(MeasureElement::BarCheck(BarCheck {
                next_bar_number: None,
                input_line: elt.input_line,
            }));
            self.pending_bar_check = true;
        }

        if self.context.is_set(ScopeFlag::RestMeasures) {
            self.rest_measures.get_mut(elt.input_line)?.measures.push(measure);
        } else if self.context.is_set(ScopeFlag::MeasuresRepeatPattern) {
            self.measures_repeat.get_mut(elt.input_line)?.pattern.push(measure);
        } else if self.context.is_set(ScopeFlag::MeasuresRepeatReplicas) {
            self.measures_repeat.get_mut(elt.input_line)?.replicas.push(measure);
        } else {
            self.store_voice_element(VoiceElement::Measure(measure), elt.input_line)?;
        }
        Ok(())
    }

    fn visit_start_repeat(&mut self, elt: &Repeat) -> Result<()> {
        self.context.repeats.repeat_start(elt.newborn_clone(), elt.input_line)
    }

    fn visit_start_repeat_common_part(&mut self, elt: &Repeat) -> Result<()> {
        self.context.repeats.common_part_start(elt.input_line)
    }

    fn visit_end_repeat_common_part(&mut self, elt: &Repeat) -> Result<()> {
        self.context.repeats.common_part_end(elt.input_line)
    }

    fn visit_start_repeat_ending(&mut self, elt: &RepeatEnding) -> Result<()> {
        self.context.repeats.ending_start(elt.newborn_clone(), elt.input_line)
    }

    fn visit_end_repeat_ending(&mut self, elt: &RepeatEnding) -> Result<()> {
        self.context.repeats.ending_end(elt.kind, elt.input_line)
    }

    fn visit_end_repeat(&mut self, elt: &Repeat) -> Result<()> {
        let repeat = self.context.repeats.repeat_end(elt.input_line)?;
        self.voice
            .get_mut(elt.input_line)?
            .append_element(VoiceElement::Repeat(repeat))
    }

    fn visit_start_rest_measures(&mut self, elt: &RestMeasures) -> Result<()> {
        let mut context = ScopeGuard::new(&mut self.context);
        context.flags.enter(ScopeFlag::RestMeasures, elt.input_line)?;
        if !self.voice.is_set() {
            return Err(internal_error!(elt.input_line, "rest measures outside of a voice"));
        }
        context.commit();
        self.rest_measures.set(elt.newborn_clone());
        Ok(())
    }

    fn visit_end_rest_measures(&mut self, elt: &RestMeasures) -> Result<()> {
        self.context.flags.leave(ScopeFlag::RestMeasures, elt.input_line)?;
        let rests = self.rest_measures.take(elt.input_line)?;
        // the next measure follows the whole multi-measure rest
        self.pending_bar_check = false;
        self.store_voice_element(VoiceElement::RestMeasures(rests), elt.input_line)
    }

    fn visit_start_measures_repeat(&mut self, elt: &MeasuresRepeat) -> Result<()> {
        if !self.voice.is_set() {
            return Err(internal_error!(elt.input_line, "measures repeat outside of a voice"));
        }
        self.measures_repeat.set(elt.newborn_clone());
        Ok(())
    }

    fn visit_start_measures_repeat_pattern(&mut self, elt: &MeasuresRepeat) -> Result<()> {
        self.context.flags.enter(ScopeFlag::MeasuresRepeatPattern, elt.input_line)
    }

    fn visit_end_measures_repeat_pattern(&mut self, elt: &MeasuresRepeat) -> Result<()> {
        self.context.flags.leave(ScopeFlag::MeasuresRepeatPattern, elt.input_line)
    }

    fn visit_start_measures_repeat_replicas(&mut self, elt: &MeasuresRepeat) -> Result<()> {
        self.context.flags.enter(ScopeFlag::MeasuresRepeatReplicas, elt.input_line)
    }

    fn visit_end_measures_repeat_replicas(&mut self, elt: &MeasuresRepeat) -> Result<()> {
        self.context.flags.leave(ScopeFlag::MeasuresRepeatReplicas, elt.input_line)
    }

    fn visit_end_measures_repeat(&mut self, elt: &MeasuresRepeat) -> Result<()> {
        let repeat = self.measures_repeat.take(elt.input_line)?;
        self.pending_bar_check = false;
        self.store_voice_element(VoiceElement::MeasuresRepeat(repeat), elt.input_line)
    }

    // ========================================================================
    // NOTES AND CONTAINERS
    // ========================================================================

    fn visit_start_note(&mut self, elt: &Note) -> Result<()> {
        if elt.editorial_accidental {
            self.lpsr.scheme_functions.editorial_accidentals = true;
        }
        self.notes.push(elt.newborn_clone());
        self.owners.push(MarkOwner::Note);
        Ok(())
    }

    fn visit_end_note(&mut self, elt: &Note) -> Result<()> {
        let line = elt.input_line;
        self.owners.pop();
        let Some(note) = self.notes.pop() else {
            return Err(internal_error!(line, "{} ends without having started", elt));
        };
        if !note.is_grace() {
            self.first_note_pending = false;
        }

        match note.kind {
            NoteKind::ChordMember | NoteKind::GraceChordMember => match self.chords.last_mut() {
                Some(chord) => chord.add_note(note),
                None => {
                    return Err(internal_error!(
                        line,
                        "chord member {} outside of a chord",
                        note
                    ))
                }
            },
            NoteKind::DoubleTremoloMember => {
                let position = note.double_tremolo_position;
                self.place_tremolo_element(TremoloElement::Note(note), position, line)?;
            }
            NoteKind::Grace | NoteKind::GraceTupletMember => match self.grace_groups.last_mut() {
                Some(group) => group.add_note(note),
                None => {
                    return Err(internal_error!(
                        line,
                        "grace {} outside of a grace notes group",
                        note
                    ))
                }
            },
            _ => {
                if let Some(tuplet) = self.context.tuplets.top_mut() {
                    tuplet.add_note(note);
                } else if note.is_tuplet_member() {
                    return Err(internal_error!(line, "tuplet member {} outside of a tuplet", note));
                } else {
                    self.append_to_measure(MeasureElement::Note(note), line)?;
                }
            }
        }
        Ok(())
    }

    fn visit_start_chord(&mut self, elt: &Chord) -> Result<()> {
        self.chords.push(elt.newborn_clone());
        self.owners.push(MarkOwner::Chord);
        Ok(())
    }

    fn visit_end_chord(&mut self, elt: &Chord) -> Result<()> {
        let line = elt.input_line;
        self.owners.pop();
        let Some(chord) = self.chords.pop() else {
            return Err(internal_error!(line, "chord end without a matching start"));
        };

        if chord.is_grace {
            match self.grace_groups.last_mut() {
                Some(group) => group.add_chord(chord),
                None => {
                    return Err(internal_error!(
                        line,
                        "grace chord outside of a grace notes group"
                    ))
                }
            }
        } else if chord.double_tremolo_position.is_some() && self.tremolo.is_set() {
            let position = chord.double_tremolo_position;
            self.place_tremolo_element(TremoloElement::Chord(chord), position, line)?;
        } else if let Some(tuplet) = self.context.tuplets.top_mut() {
            tuplet.add_chord(chord);
        } else {
            self.append_to_measure(MeasureElement::Chord(chord), line)?;
        }
        Ok(())
    }

    fn visit_start_grace_notes_group(&mut self, elt: &GraceNotesGroup) -> Result<()> {
        let mut context = ScopeGuard::new(&mut self.context);
        context.flags.enter(ScopeFlag::GraceNotes, elt.input_line)?;
        if self.notes.is_empty() {
            return Err(internal_error!(elt.input_line, "grace notes without a note to attach to"));
        }
        context.commit();
        self.grace_groups.push(elt.newborn_clone());
        Ok(())
    }

    fn visit_end_grace_notes_group(&mut self, elt: &GraceNotesGroup) -> Result<()> {
        let line = elt.input_line;
        self.context.flags.leave(ScopeFlag::GraceNotes, line)?;
        let Some(group) = self.grace_groups.pop() else {
            return Err(internal_error!(line, "grace notes group end without a matching start"));
        };

        if group.kind == GraceKind::Before
            && self.first_note_pending
            && self.skip_grace.is_none()
            && !group.is_skip
        {
            let voice_name = self.voice.get(line)?.name();
            self.skip_grace = Some((voice_name, group.skip_clone()));
        }

        let Some(note) = self.notes.last_mut() else {
            return Err(internal_error!(line, "grace notes group without an owning note"));
        };
        match group.kind {
            GraceKind::Before => note.grace_before = Some(group),
            GraceKind::After => note.grace_after = Some(group),
        }
        Ok(())
    }

    fn visit_start_tuplet(&mut self, elt: &Tuplet) -> Result<()> {
        if elt.line_shape == TupletLineShape::Curved {
            self.lpsr.scheme_functions.tuplets_curved_brackets = true;
        }
        self.context.tuplets.push(elt.newborn_clone());
        Ok(())
    }

    fn visit_end_tuplet(&mut self, elt: &Tuplet) -> Result<()> {
        let Some(outermost) = self.context.tuplets.close(elt.input_line)? else {
            return Ok(());
        };
        if outermost.elements.is_empty() {
            log::debug!("tuplet at line {} kept no element", elt.input_line);
            return Ok(());
        }
        self.append_to_measure(MeasureElement::Tuplet(outermost), elt.input_line)
    }

    fn visit_start_double_tremolo(&mut self, elt: &DoubleTremolo) -> Result<()> {
        let mut context = ScopeGuard::new(&mut self.context);
        context.flags.enter(ScopeFlag::DoubleTremolo, elt.input_line)?;
        if !self.measure.is_set() {
            return Err(internal_error!(elt.input_line, "double tremolo outside of a measure"));
        }
        context.commit();
        self.tremolo.set(elt.newborn_clone());
        Ok(())
    }

    fn visit_end_double_tremolo(&mut self, elt: &DoubleTremolo) -> Result<()> {
        self.context.flags.leave(ScopeFlag::DoubleTremolo, elt.input_line)?;
        let tremolo = self.tremolo.take(elt.input_line)?;
        self.append_to_measure(MeasureElement::DoubleTremolo(tremolo), elt.input_line)
    }

    // ========================================================================
    // HARMONIES AND FIGURED BASS
    // ========================================================================

    fn visit_start_harmony(&mut self, elt: &Harmony) -> Result<()> {
        self.harmony.set(elt.newborn_clone());
        Ok(())
    }

    fn visit_start_harmony_degree(&mut self, elt: &HarmonyDegree) -> Result<()> {
        self.harmony.get_mut(elt.input_line)?.append_degree(elt.clone());
        Ok(())
    }

    fn visit_end_harmony(&mut self, elt: &Harmony) -> Result<()> {
        let harmony = self.harmony.take(elt.input_line)?;
        if self.context.is_set(ScopeFlag::HarmonyVoice) {
            return self.append_to_measure(MeasureElement::Harmony(harmony), elt.input_line);
        }
        match self.owners.last() {
            Some(MarkOwner::Chord) => {
                if let Some(chord) = self.chords.last_mut() {
                    chord.harmony = Some(harmony);
                }
            }
            Some(MarkOwner::Note) => {
                if let Some(note) = self.notes.last_mut() {
                    note.harmony = Some(harmony);
                }
            }
            None => self.append_to_measure(MeasureElement::Harmony(harmony), elt.input_line)?,
        }
        Ok(())
    }

    fn visit_start_figured_bass(&mut self, elt: &FiguredBass) -> Result<()> {
        self.figured_bass.set(elt.newborn_clone());
        Ok(())
    }

    fn visit_start_figure(&mut self, elt: &Figure) -> Result<()> {
        self.figured_bass.get_mut(elt.input_line)?.append_figure(elt.clone());
        Ok(())
    }

    fn visit_end_figured_bass(&mut self, elt: &FiguredBass) -> Result<()> {
        let figured_bass = self.figured_bass.take(elt.input_line)?;
        if self.context.is_set(ScopeFlag::FiguredBassVoice) {
            return self
                .append_to_measure(MeasureElement::FiguredBass(figured_bass), elt.input_line);
        }
        match self.owners.last() {
            Some(MarkOwner::Chord) => {
                if let Some(chord) = self.chords.last_mut() {
                    chord.figured_bass = Some(figured_bass);
                }
            }
            Some(MarkOwner::Note) => {
                if let Some(note) = self.notes.last_mut() {
                    note.figured_bass = Some(figured_bass);
                }
            }
            None => {
                self.append_to_measure(MeasureElement::FiguredBass(figured_bass), elt.input_line)?
            }
        }
        Ok(())
    }

    // ========================================================================
    // MEASURE LEVEL ELEMENTS
    // ========================================================================

    fn visit_start_clef(&mut self, elt: &Clef) -> Result<()> {
        self.append_to_measure(MeasureElement::Clef(elt.clone()), elt.input_line)
    }

    fn visit_start_key(&mut self, elt: &Key) -> Result<()> {
        self.append_to_measure(MeasureElement::Key(elt.clone()), elt.input_line)
    }

    fn visit_start_time(&mut self, elt: &Time) -> Result<()> {
        self.append_to_measure(MeasureElement::Time(elt.clone()), elt.input_line)
    }

    fn visit_start_transpose(&mut self, elt: &Transpose) -> Result<()> {
        self.append_to_measure(MeasureElement::Transpose(elt.clone()), elt.input_line)
    }

    fn visit_start_barline(&mut self, elt: &Barline) -> Result<()> {
        if elt.style == BarlineStyle::Short {
            self.lpsr.scheme_functions.custom_short_barline = true;
        }
        self.append_to_measure(MeasureElement::Barline(elt.clone()), elt.input_line)
    }

    fn visit_start_bar_check(&mut self, elt: &BarCheck) -> Result<()> {
        self.append_to_measure(MeasureElement::BarCheck(elt.clone()), elt.input_line)
    }

    fn visit_start_bar_number_check(&mut self, elt: &BarNumberCheck) -> Result<()> {
        self.append_to_measure(MeasureElement::BarNumberCheck(elt.clone()), elt.input_line)
    }

    fn visit_start_voice_staff_change(&mut self, elt: &VoiceStaffChange) -> Result<()> {
        self.append_to_measure(MeasureElement::VoiceStaffChange(elt.clone()), elt.input_line)
    }

    fn visit_start_tempo(&mut self, elt: &Tempo) -> Result<()> {
        self.append_to_measure(MeasureElement::Tempo(elt.clone()), elt.input_line)
    }

    fn visit_start_rehearsal(&mut self, elt: &Rehearsal) -> Result<()> {
        self.append_to_measure(MeasureElement::Rehearsal(elt.clone()), elt.input_line)
    }

    fn visit_start_segno(&mut self, elt: &Segno) -> Result<()> {
        self.append_to_measure(MeasureElement::Segno(elt.clone()), elt.input_line)
    }

    fn visit_start_coda(&mut self, elt: &Coda) -> Result<()> {
        self.append_to_measure(MeasureElement::Coda(elt.clone()), elt.input_line)
    }

    fn visit_start_line_break(&mut self, elt: &LineBreak) -> Result<()> {
        self.append_to_measure(MeasureElement::LineBreak(elt.clone()), elt.input_line)
    }

    fn visit_start_page_break(&mut self, elt: &PageBreak) -> Result<()> {
        self.append_to_measure(MeasureElement::PageBreak(elt.clone()), elt.input_line)
    }

    // ========================================================================
    // MARKS
    // ========================================================================

    fn visit_start_articulation(&mut self, elt: &Articulation) -> Result<()> {
        self.attach_mark(NoteMark::Articulation(elt.clone()))
    }

    fn visit_start_ornament(&mut self, elt: &Ornament) -> Result<()> {
        self.attach_mark(NoteMark::Ornament(elt.clone()))
    }

    fn visit_start_technical(&mut self, elt: &Technical) -> Result<()> {
        self.attach_mark(NoteMark::Technical(elt.clone()))
    }

    fn visit_start_fermata(&mut self, elt: &Fermata) -> Result<()> {
        self.attach_mark(NoteMark::Fermata(elt.clone()))
    }

    fn visit_start_dynamics(&mut self, elt: &Dynamics) -> Result<()> {
        self.attach_mark(NoteMark::Dynamics(elt.clone()))
    }

    fn visit_start_words(&mut self, elt: &Words) -> Result<()> {
        self.attach_mark(NoteMark::Words(elt.clone()))
    }

    fn visit_start_wedge(&mut self, elt: &Wedge) -> Result<()> {
        self.attach_mark(NoteMark::Wedge(elt.clone()))
    }

    fn visit_start_slur(&mut self, elt: &Slur) -> Result<()> {
        self.attach_mark(NoteMark::Slur(elt.clone()))
    }

    fn visit_start_spanner(&mut self, elt: &Spanner) -> Result<()> {
        self.attach_mark(NoteMark::Spanner(elt.clone()))
    }

    fn visit_start_single_tremolo(&mut self, elt: &SingleTremolo) -> Result<()> {
        self.attach_mark(NoteMark::Tremolo(elt.clone()))
    }

    fn visit_start_octave_shift(&mut self, elt: &OctaveShift) -> Result<()> {
        self.attach_mark(NoteMark::OctaveShift(elt.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lpsr::render;
    use crate::translators::xml2msr::build_msr;
    use crate::xml::XmlDocument;

    fn score_from(xml: &str) -> Score {
        let root = XmlDocument::parse(xml).unwrap();
        build_msr(&root).unwrap().0
    }

    fn partwise(parts: &str, part_list: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<score-partwise version="3.1">
  <movement-title>Little Waltz</movement-title>
  <part-list>{}</part-list>
  {}
</score-partwise>"#,
            part_list, parts
        )
    }

    const WALTZ: &str = r#"<part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><key><fifths>0</fifths></key>
        <time><beats>3</beats><beat-type>4</beat-type></time>
        <clef><sign>G</sign><line>2</line></clef></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration><type>quarter</type>
        <lyric number="1"><syllabic>begin</syllabic><text>Wal</text></lyric></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration><type>quarter</type>
        <lyric number="1"><syllabic>end</syllabic><text>tzing</text></lyric></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration><type>quarter</type></note>
    </measure>
    <measure number="2">
      <note><pitch><step>F</step><octave>4</octave></pitch><duration>3</duration><type>half</type><dot/></note>
    </measure>
  </part>"#;

    fn waltz() -> Score {
        score_from(&partwise(
            WALTZ,
            r#"<score-part id="P1"><part-name>Flute</part-name></score-part>"#,
        ))
    }

    #[test]
    fn test_voices_are_clones() {
        let score = waltz();
        let before = score.clone();
        let (lpsr, _) = build_lpsr(&score, &LpsrSettings::default()).unwrap();
        assert_eq!(score, before, "the canonical score is left untouched");

        let definition = lpsr
            .voice_definition("Part_POne_Staff_One_Voice_One")
            .expect("voice definition");
        let measures = definition.voice.measures();
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].notes().count(), 3);
    }

    #[test]
    fn test_bar_checks_carry_next_number() {
        let score = waltz();
        let (lpsr, _) = build_lpsr(&score, &LpsrSettings::default()).unwrap();
        let voice = &lpsr.voice_definition("Part_POne_Staff_One_Voice_One").unwrap().voice;
        let measures = voice.measures();

        match measures[0].elements.last() {
            Some(MeasureElement::BarCheck(check)) => {
                assert_eq!(check.next_bar_number.as_deref(), Some("2"))
            }
            other => panic!("expected a bar check, got {:?}", other),
        }
        assert!(matches!(
            measures[1].elements.first(),
            Some(MeasureElement::BarNumberCheck(check)) if check.number == "2"
        ));
        assert!(
            !matches!(measures[1].elements.last(), Some(MeasureElement::BarCheck(_))),
            "no bar check after the last measure"
        );
    }

    #[test]
    fn test_no_bar_checks_when_disabled() {
        let settings = LpsrSettings {
            generate_bar_checks: false,
            ..LpsrSettings::default()
        };
        let (lpsr, _) = build_lpsr(&waltz(), &settings).unwrap();
        let voice = &lpsr.voice_definition("Part_POne_Staff_One_Voice_One").unwrap().voice;
        for measure in voice.measures() {
            assert!(measure.elements.iter().all(|e| !matches!(
                e,
                MeasureElement::BarCheck(_) | MeasureElement::BarNumberCheck(_)
            )));
        }
    }

    #[test]
    fn test_stanza_and_score_block() {
        let (lpsr, diagnostics) = build_lpsr(&waltz(), &LpsrSettings::default()).unwrap();
        assert_eq!(lpsr.stanza_definitions().count(), 1);
        let stanza = lpsr.stanza_definitions().next().unwrap();
        assert_eq!(stanza.name, "Part_POne_Staff_One_Voice_One_Stanza_One");

        let parts = lpsr.score_block.part_blocks();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Flute");
        assert_eq!(parts[0].staves.len(), 1);
        assert_eq!(parts[0].staves[0].lyrics.len(), 1);

        assert_eq!(lpsr.header.get("title"), Some("Little Waltz"));
        assert!(diagnostics.has_kind("title_correction"));
    }

    #[test]
    fn test_rendered_waltz() {
        let settings = LpsrSettings::default();
        let (lpsr, _) = build_lpsr(&waltz(), &settings).unwrap();
        let text = render(&lpsr, &settings).unwrap();
        assert!(text.contains("\\numericTimeSignature \\time 3/4"), "got:\n{}", text);
        assert!(text.contains("c'4 d'4 e'4 | % 2"), "got:\n{}", text);
        assert!(text.contains("\\barNumberCheck #2 f'2."), "got:\n{}", text);
        assert!(text.contains("\"Wal\" -- \"tzing\""), "got:\n{}", text);
    }

    #[test]
    fn test_mark_outside_note_is_fatal() {
        let mut builder = LpsrBuilder::new(&LpsrSettings::default());
        let fermata = Fermata {
            inverted: false,
            input_line: 12,
        };
        let err = builder.visit_start_fermata(&fermata).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(err.line(), Some(12));
    }

    #[test]
    fn test_grace_group_without_note_unwinds() {
        let mut builder = LpsrBuilder::new(&LpsrSettings::default());
        let group = GraceNotesGroup::new(GraceKind::Before, true, 4);
        assert!(builder.visit_start_grace_notes_group(&group).is_err());
        assert!(
            !builder.context.is_set(ScopeFlag::GraceNotes),
            "the failed scope is not left open"
        );
    }

    #[test]
    fn test_skip_grace_notes_align_voices() {
        let xml = partwise(
            r#"<part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>1</beats><beat-type>4</beat-type></time></attributes>
      <note><grace slash="yes"/><pitch><step>B</step><octave>4</octave></pitch><voice>1</voice><type>eighth</type></note>
      <note><pitch><step>C</step><octave>5</octave></pitch><duration>1</duration><voice>1</voice><type>quarter</type></note>
      <backup><duration>1</duration></backup>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration><voice>2</voice><type>quarter</type></note>
    </measure>
  </part>"#,
            r#"<score-part id="P1"><part-name>Piano</part-name></score-part>"#,
        );
        let (lpsr, _) = build_lpsr(&score_from(&xml), &LpsrSettings::default()).unwrap();
        let second = &lpsr.voice_definition("Part_POne_Staff_One_Voice_Two").unwrap().voice;
        let first_note = second.measures()[0].notes().next().unwrap().clone();
        let group = first_note.grace_before.expect("skip grace notes added");
        assert!(group.is_skip);
        assert_eq!(group.elements.len(), 1);
    }
}
