//! Visitor interface over the score model
//!
//! [`MsrNode`] is a borrowed view of any browsable score entity. Browsing a
//! node dispatches to the visitor method of its variant; every method
//! defaults to a no-op, so a target pass overrides only what it needs and
//! still has the children of unhandled nodes visited.

use crate::browser::Browsable;
use crate::errors::Result;
use crate::msr::attributes::{
    BarCheck, BarNumberCheck, Barline, Clef, Coda, Key, LineBreak, PageBreak, Rehearsal, Segno,
    Tempo, Time, Transpose, VoiceStaffChange,
};
use crate::msr::chord::Chord;
use crate::msr::grace::{DoubleTremolo, GraceElement, GraceNotesGroup, TremoloElement};
use crate::msr::harmony::{Figure, FiguredBass, Harmony, HarmonyDegree};
use crate::msr::lyrics::{Stanza, Syllable};
use crate::msr::marks::{
    Articulation, Dynamics, Fermata, NoteMark, OctaveShift, Ornament, SingleTremolo, Slur,
    Spanner, Technical, Wedge, Words,
};
use crate::msr::measure::{Measure, MeasureElement};
use crate::msr::note::Note;
use crate::msr::part::Part;
use crate::msr::part_group::{PartGroup, PartGroupElement};
use crate::msr::score::Score;
use crate::msr::staff::Staff;
use crate::msr::tuplet::{Tuplet, TupletElement};
use crate::msr::voice::{MeasuresRepeat, Repeat, RepeatEnding, RestMeasures, Voice, VoiceElement};

macro_rules! msr_nodes {
    ($($variant:ident($ty:ty) => $start:ident, $end:ident;)*) => {
        /// Borrowed view of a browsable score entity
        #[derive(Debug, Clone, Copy)]
        pub enum MsrNode<'a> {
            $($variant(&'a $ty),)*
        }

        /// Handlers for score model nodes
        pub trait MsrVisitor {
            $(
                fn $start(&mut self, _elt: &$ty) -> Result<()> {
                    Ok(())
                }
                fn $end(&mut self, _elt: &$ty) -> Result<()> {
                    Ok(())
                }
            )*
        }

        impl<'a> MsrNode<'a> {
            /// Name of the node's variant
            pub fn kind_name(&self) -> &'static str {
                match self {
                    $(MsrNode::$variant(_) => stringify!($variant),)*
                }
            }
        }

        impl<'a, V: MsrVisitor + ?Sized> Browsable<V> for MsrNode<'a> {
            fn accept_in(&self, visitor: &mut V) -> Result<()> {
                if log::log_enabled!(log::Level::Trace) {
                    log::trace!("--> Start visiting {}", self.describe());
                }
                match *self {
                    $(MsrNode::$variant(elt) => visitor.$start(elt),)*
                }
            }

            fn accept_out(&self, visitor: &mut V) -> Result<()> {
                match *self {
                    $(MsrNode::$variant(elt) => visitor.$end(elt),)*
                }
            }

            fn children(&self) -> Vec<Self> {
                self.child_nodes()
            }
        }
    };
}

msr_nodes! {
    Score(Score) => visit_start_score, visit_end_score;
    PartGroup(PartGroup) => visit_start_part_group, visit_end_part_group;
    Part(Part) => visit_start_part, visit_end_part;
    Staff(Staff) => visit_start_staff, visit_end_staff;
    Voice(Voice) => visit_start_voice, visit_end_voice;
    Stanza(Stanza) => visit_start_stanza, visit_end_stanza;
    Syllable(Syllable) => visit_start_syllable, visit_end_syllable;
    Measure(Measure) => visit_start_measure, visit_end_measure;
    Repeat(Repeat) => visit_start_repeat, visit_end_repeat;
    RepeatCommonPart(Repeat) => visit_start_repeat_common_part, visit_end_repeat_common_part;
    RepeatEnding(RepeatEnding) => visit_start_repeat_ending, visit_end_repeat_ending;
    RestMeasures(RestMeasures) => visit_start_rest_measures, visit_end_rest_measures;
    MeasuresRepeat(MeasuresRepeat) => visit_start_measures_repeat, visit_end_measures_repeat;
    MeasuresRepeatPattern(MeasuresRepeat) => visit_start_measures_repeat_pattern, visit_end_measures_repeat_pattern;
    MeasuresRepeatReplicas(MeasuresRepeat) => visit_start_measures_repeat_replicas, visit_end_measures_repeat_replicas;
    Note(Note) => visit_start_note, visit_end_note;
    Chord(Chord) => visit_start_chord, visit_end_chord;
    Tuplet(Tuplet) => visit_start_tuplet, visit_end_tuplet;
    GraceNotesGroup(GraceNotesGroup) => visit_start_grace_notes_group, visit_end_grace_notes_group;
    DoubleTremolo(DoubleTremolo) => visit_start_double_tremolo, visit_end_double_tremolo;
    Clef(Clef) => visit_start_clef, visit_end_clef;
    Key(Key) => visit_start_key, visit_end_key;
    Time(Time) => visit_start_time, visit_end_time;
    Transpose(Transpose) => visit_start_transpose, visit_end_transpose;
    Barline(Barline) => visit_start_barline, visit_end_barline;
    BarCheck(BarCheck) => visit_start_bar_check, visit_end_bar_check;
    BarNumberCheck(BarNumberCheck) => visit_start_bar_number_check, visit_end_bar_number_check;
    VoiceStaffChange(VoiceStaffChange) => visit_start_voice_staff_change, visit_end_voice_staff_change;
    Tempo(Tempo) => visit_start_tempo, visit_end_tempo;
    Rehearsal(Rehearsal) => visit_start_rehearsal, visit_end_rehearsal;
    Segno(Segno) => visit_start_segno, visit_end_segno;
    Coda(Coda) => visit_start_coda, visit_end_coda;
    LineBreak(LineBreak) => visit_start_line_break, visit_end_line_break;
    PageBreak(PageBreak) => visit_start_page_break, visit_end_page_break;
    Harmony(Harmony) => visit_start_harmony, visit_end_harmony;
    HarmonyDegree(HarmonyDegree) => visit_start_harmony_degree, visit_end_harmony_degree;
    FiguredBass(FiguredBass) => visit_start_figured_bass, visit_end_figured_bass;
    Figure(Figure) => visit_start_figure, visit_end_figure;
    Articulation(Articulation) => visit_start_articulation, visit_end_articulation;
    Ornament(Ornament) => visit_start_ornament, visit_end_ornament;
    Technical(Technical) => visit_start_technical, visit_end_technical;
    Fermata(Fermata) => visit_start_fermata, visit_end_fermata;
    Dynamics(Dynamics) => visit_start_dynamics, visit_end_dynamics;
    Words(Words) => visit_start_words, visit_end_words;
    Wedge(Wedge) => visit_start_wedge, visit_end_wedge;
    Slur(Slur) => visit_start_slur, visit_end_slur;
    Spanner(Spanner) => visit_start_spanner, visit_end_spanner;
    SingleTremolo(SingleTremolo) => visit_start_single_tremolo, visit_end_single_tremolo;
    OctaveShift(OctaveShift) => visit_start_octave_shift, visit_end_octave_shift;
}

impl<'a> MsrNode<'a> {
    fn child_nodes(&self) -> Vec<MsrNode<'a>> {
        match *self {
            MsrNode::Score(score) => score.part_groups.iter().map(MsrNode::PartGroup).collect(),
            MsrNode::PartGroup(group) => group
                .elements
                .iter()
                .map(|element| match element {
                    PartGroupElement::Part(part) => MsrNode::Part(part),
                    PartGroupElement::Group(group) => MsrNode::PartGroup(group),
                })
                .collect(),
            MsrNode::Part(part) => part.staves().iter().map(MsrNode::Staff).collect(),
            MsrNode::Staff(staff) => staff.voices().iter().map(MsrNode::Voice).collect(),
            MsrNode::Voice(voice) => {
                let mut nodes = voice_element_nodes(&voice.elements);
                nodes.extend(voice.stanzas.iter().map(MsrNode::Stanza));
                nodes
            }
            MsrNode::Stanza(stanza) => stanza.syllables.iter().map(MsrNode::Syllable).collect(),
            MsrNode::Repeat(repeat) => {
                let mut nodes = vec![MsrNode::RepeatCommonPart(repeat)];
                nodes.extend(repeat.endings.iter().map(MsrNode::RepeatEnding));
                nodes
            }
            MsrNode::RepeatCommonPart(repeat) => voice_element_nodes(&repeat.common_part),
            MsrNode::RepeatEnding(ending) => voice_element_nodes(&ending.elements),
            MsrNode::RestMeasures(rests) => rests.measures.iter().map(MsrNode::Measure).collect(),
            MsrNode::MeasuresRepeat(repeat) => vec![
                MsrNode::MeasuresRepeatPattern(repeat),
                MsrNode::MeasuresRepeatReplicas(repeat),
            ],
            MsrNode::MeasuresRepeatPattern(repeat) => {
                repeat.pattern.iter().map(MsrNode::Measure).collect()
            }
            MsrNode::MeasuresRepeatReplicas(repeat) => {
                repeat.replicas.iter().map(MsrNode::Measure).collect()
            }
            MsrNode::Measure(measure) => measure.elements.iter().map(measure_element_node).collect(),
            MsrNode::Note(note) => {
                let mut nodes = Vec::new();
                if let Some(group) = &note.grace_before {
                    nodes.push(MsrNode::GraceNotesGroup(group));
                }
                nodes.extend(note.marks.iter().map(mark_node));
                if let Some(harmony) = &note.harmony {
                    nodes.push(MsrNode::Harmony(harmony));
                }
                if let Some(figured_bass) = &note.figured_bass {
                    nodes.push(MsrNode::FiguredBass(figured_bass));
                }
                nodes.extend(note.syllables.iter().map(MsrNode::Syllable));
                if let Some(group) = &note.grace_after {
                    nodes.push(MsrNode::GraceNotesGroup(group));
                }
                nodes
            }
            MsrNode::Chord(chord) => {
                let mut nodes: Vec<MsrNode<'a>> = chord.notes.iter().map(MsrNode::Note).collect();
                nodes.extend(chord.marks.iter().map(mark_node));
                if let Some(harmony) = &chord.harmony {
                    nodes.push(MsrNode::Harmony(harmony));
                }
                if let Some(figured_bass) = &chord.figured_bass {
                    nodes.push(MsrNode::FiguredBass(figured_bass));
                }
                nodes
            }
            MsrNode::Tuplet(tuplet) => tuplet
                .elements
                .iter()
                .map(|element| match element {
                    TupletElement::Note(note) => MsrNode::Note(note),
                    TupletElement::Chord(chord) => MsrNode::Chord(chord),
                    TupletElement::Tuplet(tuplet) => MsrNode::Tuplet(tuplet),
                })
                .collect(),
            MsrNode::GraceNotesGroup(group) => group
                .elements
                .iter()
                .map(|element| match element {
                    GraceElement::Note(note) => MsrNode::Note(note),
                    GraceElement::Chord(chord) => MsrNode::Chord(chord),
                })
                .collect(),
            MsrNode::DoubleTremolo(tremolo) => tremolo
                .first
                .iter()
                .chain(tremolo.second.iter())
                .map(|element| match element {
                    TremoloElement::Note(note) => MsrNode::Note(note),
                    TremoloElement::Chord(chord) => MsrNode::Chord(chord),
                })
                .collect(),
            MsrNode::Harmony(harmony) => harmony.degrees.iter().map(MsrNode::HarmonyDegree).collect(),
            MsrNode::FiguredBass(figured_bass) => {
                figured_bass.figures.iter().map(MsrNode::Figure).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Short description for trace logs
    fn describe(&self) -> String {
        match self {
            MsrNode::Part(part) => format!("part {}", part.combined_name()),
            MsrNode::Staff(staff) => format!("staff {} (line {})", staff.number, staff.input_line),
            MsrNode::Voice(voice) => format!("voice {} (line {})", voice.name(), voice.input_line),
            MsrNode::Measure(measure) => {
                format!("measure {} (line {})", measure.number, measure.input_line)
            }
            MsrNode::Note(note) => note.to_string(),
            other => other.kind_name().to_string(),
        }
    }
}

fn voice_element_nodes(elements: &[VoiceElement]) -> Vec<MsrNode<'_>> {
    elements
        .iter()
        .map(|element| match element {
            VoiceElement::Measure(measure) => MsrNode::Measure(measure),
            VoiceElement::Repeat(repeat) => MsrNode::Repeat(repeat),
            VoiceElement::RestMeasures(rests) => MsrNode::RestMeasures(rests),
            VoiceElement::MeasuresRepeat(repeat) => MsrNode::MeasuresRepeat(repeat),
        })
        .collect()
}

fn measure_element_node(element: &MeasureElement) -> MsrNode<'_> {
    match element {
        MeasureElement::Note(note) => MsrNode::Note(note),
        MeasureElement::Chord(chord) => MsrNode::Chord(chord),
        MeasureElement::Tuplet(tuplet) => MsrNode::Tuplet(tuplet),
        MeasureElement::DoubleTremolo(tremolo) => MsrNode::DoubleTremolo(tremolo),
        MeasureElement::Clef(clef) => MsrNode::Clef(clef),
        MeasureElement::Key(key) => MsrNode::Key(key),
        MeasureElement::Time(time) => MsrNode::Time(time),
        MeasureElement::Transpose(transpose) => MsrNode::Transpose(transpose),
        MeasureElement::Barline(barline) => MsrNode::Barline(barline),
        MeasureElement::BarCheck(check) => MsrNode::BarCheck(check),
        MeasureElement::BarNumberCheck(check) => MsrNode::BarNumberCheck(check),
        MeasureElement::VoiceStaffChange(change) => MsrNode::VoiceStaffChange(change),
        MeasureElement::Tempo(tempo) => MsrNode::Tempo(tempo),
        MeasureElement::Rehearsal(rehearsal) => MsrNode::Rehearsal(rehearsal),
        MeasureElement::Segno(segno) => MsrNode::Segno(segno),
        MeasureElement::Coda(coda) => MsrNode::Coda(coda),
        MeasureElement::LineBreak(line_break) => MsrNode::LineBreak(line_break),
        MeasureElement::PageBreak(page_break) => MsrNode::PageBreak(page_break),
        MeasureElement::Harmony(harmony) => MsrNode::Harmony(harmony),
        MeasureElement::FiguredBass(figured_bass) => MsrNode::FiguredBass(figured_bass),
    }
}

fn mark_node(mark: &NoteMark) -> MsrNode<'_> {
    match mark {
        NoteMark::Articulation(m) => MsrNode::Articulation(m),
        NoteMark::Ornament(m) => MsrNode::Ornament(m),
        NoteMark::Technical(m) => MsrNode::Technical(m),
        NoteMark::Fermata(m) => MsrNode::Fermata(m),
        NoteMark::Dynamics(m) => MsrNode::Dynamics(m),
        NoteMark::Words(m) => MsrNode::Words(m),
        NoteMark::Wedge(m) => MsrNode::Wedge(m),
        NoteMark::Slur(m) => MsrNode::Slur(m),
        NoteMark::Spanner(m) => MsrNode::Spanner(m),
        NoteMark::Tremolo(m) => MsrNode::SingleTremolo(m),
        NoteMark::OctaveShift(m) => MsrNode::OctaveShift(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::browse;
    use crate::msr::basics::{Pitch, Rational};
    use crate::msr::note::NoteContent;
    use crate::msr::staff::StaffKind;
    use crate::msr::voice::VoiceKind;

    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
    }

    impl MsrVisitor for Trace {
        fn visit_start_part(&mut self, elt: &Part) -> Result<()> {
            self.events.push(format!("+part {}", elt.id));
            Ok(())
        }
        fn visit_end_part(&mut self, elt: &Part) -> Result<()> {
            self.events.push(format!("-part {}", elt.id));
            Ok(())
        }
        fn visit_start_measure(&mut self, elt: &Measure) -> Result<()> {
            self.events.push(format!("+measure {}", elt.number));
            Ok(())
        }
        fn visit_start_repeat_common_part(&mut self, _elt: &Repeat) -> Result<()> {
            self.events.push("+common".to_string());
            Ok(())
        }
        fn visit_start_note(&mut self, elt: &Note) -> Result<()> {
            self.events.push(format!("+note {}", elt.ordinal));
            Ok(())
        }
    }

    fn sample_score() -> Score {
        let mut part = Part::new("P1", 2);
        let staff = part.get_or_create_staff(1, StaffKind::Regular, 3).unwrap();
        let voice = staff
            .register_voice(Voice::new(1, VoiceKind::Regular, 4))
            .unwrap();

        let mut first = Measure::new("1", 1, Rational::new(1, 4), 5);
        first.append(MeasureElement::Note(Note::new(
            1,
            NoteContent::Pitched(Pitch::new(0, 0, 4).unwrap()),
            Rational::new(1, 4),
            6,
        )));
        voice.append_measure(first).unwrap();

        let mut repeat = Repeat::new(2, 7);
        repeat
            .common_part
            .push(VoiceElement::Measure(Measure::new("2", 2, Rational::new(1, 4), 8)));
        voice.append_element(VoiceElement::Repeat(repeat)).unwrap();

        let mut group = PartGroup::implicit(1);
        group.append_part(part);
        let mut score = Score::new(1);
        score.add_part_group(group);
        score
    }

    #[test]
    fn test_browse_order() {
        let score = sample_score();
        let mut trace = Trace::default();
        browse(&mut trace, MsrNode::Score(&score)).unwrap();
        assert_eq!(
            trace.events,
            vec!["+part P1", "+measure 1", "+note 1", "+common", "+measure 2", "-part P1"]
        );
    }
}
