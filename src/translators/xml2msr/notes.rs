//! Reading `<note>` elements
//!
//! A note element carries the note itself and the structure around it:
//! chord membership, grace, tuplet boundaries, double tremolo halves and
//! lyrics. [`read_note`] separates the two so the builder can decide where
//! the note goes.

use crate::diagnostics::Diagnostics;
use crate::msr::basics::{dotted, rational, zero, NoteType, Pitch, Placement, Position, Rational};
use crate::msr::lyrics::{ExtendKind, Syllable, SyllableKind};
use crate::msr::marks::{
    Articulation, ArticulationKind, Beam, BeamKind, Dynamics, Fermata, NoteMark, Ornament,
    OrnamentKind, SingleTremolo, Slur, SlurKind, Spanner, SpannerKind, SpannerType, StemKind,
    Technical, TechnicalKind, TieKind,
};
use crate::msr::note::{Note, NoteContent};
use crate::msr::tuplet::{Tuplet, TupletLineShape, TupletShowNumber};
use crate::xml::element::{ElementKind, XmlElement};

/// Half of a double tremolo announced by a note
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TremoloHalf {
    Start { marks: u8, placement: Placement },
    Stop,
}

/// A note and the structure it announces
#[derive(Debug)]
pub(crate) struct ReadNote {
    pub note: Note,
    pub chord: bool,
    /// `Some(slashed)` for grace notes
    pub grace: Option<bool>,
    pub tuplet_starts: Vec<Tuplet>,
    pub tuplet_stops: usize,
    pub double_tremolo: Option<TremoloHalf>,
    pub lyrics: Vec<Syllable>,
}

impl ReadNote {
    /// A note with no surrounding structure, e.g. the skip of a `<forward>`
    pub fn plain(note: Note) -> Self {
        Self {
            note,
            chord: false,
            grace: None,
            tuplet_starts: Vec::new(),
            tuplet_stops: 0,
            double_tremolo: None,
            lyrics: Vec::new(),
        }
    }
}

/// Whole notes for a duration in divisions of a quarter note
pub(crate) fn whole_notes_from_divisions(duration: i32, divisions: i32) -> Rational {
    rational(duration, divisions.saturating_mul(4)).unwrap_or_else(zero)
}

pub(crate) fn read_note(
    elt: &XmlElement,
    divisions: i32,
    ordinal: u32,
    diagnostics: &mut Diagnostics,
) -> ReadNote {
    let line = elt.line();
    let grace = elt
        .child(&ElementKind::Grace)
        .map(|grace| grace.attribute_value("slash") == "yes");

    let content = read_content(elt, diagnostics);
    let sounding = if grace.is_some() {
        zero()
    } else {
        whole_notes_from_divisions(elt.child_int_value(&ElementKind::Duration, 0), divisions)
    };

    let mut note = Note::new(ordinal, content, sounding, line);
    note.voice_number = elt.child_int_value(&ElementKind::Voice, 1);
    note.staff_number = elt.child_int_value(&ElementKind::Staff, 1);
    note.cue = elt.has_child(&ElementKind::Cue);
    note.print_object = elt.attribute_yes_no("print-object", true);
    note.position = Position::from_element(elt);
    note.measure_full_rest = elt
        .child(&ElementKind::Rest)
        .is_some_and(|rest| rest.attribute_yes_no("measure", false));

    // written length
    note.dots = elt.children_of(&ElementKind::Dot).count() as u8;
    note.graphic_type = elt
        .child_text(&ElementKind::Type)
        .and_then(NoteType::from_name);
    match note.graphic_type {
        Some(graphic_type) => {
            note.displayed_duration = dotted(graphic_type.whole_notes(), note.dots);
        }
        None if grace.is_some() => {
            note.graphic_type = Some(NoteType::Eighth);
            note.displayed_duration = NoteType::Eighth.whole_notes();
        }
        None => {
            if let Some((graphic_type, dots)) = NoteType::from_whole_notes(sounding) {
                note.graphic_type = Some(graphic_type);
                note.dots = dots;
            }
        }
    }

    note.time_modification = elt.child(&ElementKind::TimeModification).map(|modification| {
        (
            modification.child_int_value(&ElementKind::ActualNotes, 1).max(1) as u32,
            modification.child_int_value(&ElementKind::NormalNotes, 1).max(1) as u32,
        )
    });

    if let Some(accidental) = elt.child(&ElementKind::Accidental) {
        note.accidental = Some(accidental.text().to_string());
        note.editorial_accidental = accidental.attribute_yes_no("editorial", false)
            || accidental.attribute_yes_no("parentheses", false)
            || accidental.attribute_yes_no("bracket", false);
        note.cautionary_accidental = accidental.attribute_yes_no("cautionary", false);
    }

    note.stem = elt.child_text(&ElementKind::Stem).and_then(|stem| match stem {
        "up" => Some(StemKind::Up),
        "down" => Some(StemKind::Down),
        "none" => Some(StemKind::None),
        "double" => Some(StemKind::Double),
        _ => None,
    });
    note.beams = elt
        .children_of(&ElementKind::Beam)
        .filter_map(|beam| {
            let kind = match beam.text() {
                "begin" => BeamKind::Begin,
                "continue" => BeamKind::Continue,
                "end" => BeamKind::End,
                "forward hook" => BeamKind::ForwardHook,
                "backward hook" => BeamKind::BackwardHook,
                _ => return None,
            };
            Some(Beam {
                number: beam.attribute_int("number", 1),
                kind,
            })
        })
        .collect();

    let mut read = ReadNote {
        chord: elt.has_child(&ElementKind::Chord),
        grace,
        tuplet_starts: Vec::new(),
        tuplet_stops: 0,
        double_tremolo: None,
        lyrics: Vec::new(),
        note,
    };

    let mut tie_types: Vec<&str> = elt
        .children_of(&ElementKind::Tie)
        .map(|tie| tie.attribute_value("type"))
        .collect();
    for notations in elt.children_of(&ElementKind::Notations) {
        read_notations(notations, &mut read, &mut tie_types, diagnostics);
    }
    read.note.tie = tie_from_types(&tie_types);

    read.lyrics = elt
        .children_of(&ElementKind::Lyric)
        .map(|lyric| read_lyric(lyric, &read.note, diagnostics))
        .collect();

    read
}

fn read_content(elt: &XmlElement, diagnostics: &mut Diagnostics) -> NoteContent {
    let display = |holder: &XmlElement| {
        let step = Pitch::step_from_letter(holder.child_value(&ElementKind::DisplayStep))?;
        Some((step, holder.child_int_value(&ElementKind::DisplayOctave, 4) as i8))
    };

    if let Some(rest) = elt.child(&ElementKind::Rest) {
        return NoteContent::Rest {
            display: display(rest),
        };
    }
    if let Some(unpitched) = elt.child(&ElementKind::Unpitched) {
        return NoteContent::Unpitched {
            display: display(unpitched),
        };
    }

    let Some(pitch) = elt.child(&ElementKind::Pitch) else {
        diagnostics.warn(
            elt.line(),
            "missing_pitch",
            "note",
            "note without pitch, rest or unpitched is read as a rest",
        );
        return NoteContent::Rest { display: None };
    };

    let letter = pitch.child_value(&ElementKind::Step);
    let alter = pitch.child_float_value(&ElementKind::Alter, 0.0);
    if alter.fract() != 0.0 {
        diagnostics.warn(
            pitch.line(),
            "microtonal_alteration",
            "pitch",
            format!("alteration {} is rounded to a semitone", alter),
        );
    }
    let octave = pitch.child_int_value(&ElementKind::Octave, 4);

    let result = Pitch::step_from_letter(letter)
        .ok_or_else(|| format!("\"{}\" is not a note name", letter))
        .and_then(|step| Pitch::new(step, alter.round() as i8, octave as i8));
    match result {
        Ok(pitch) => NoteContent::Pitched(pitch),
        Err(message) => {
            diagnostics.warn(
                pitch.line(),
                "invalid_pitch",
                "pitch",
                format!("{}, the note is read as a rest", message),
            );
            NoteContent::Rest { display: None }
        }
    }
}

fn tie_from_types(types: &[&str]) -> Option<TieKind> {
    let start = types.contains(&"start");
    let stop = types.contains(&"stop");
    if types.contains(&"continue") || (start && stop) {
        Some(TieKind::Continue)
    } else if start {
        Some(TieKind::Start)
    } else if stop {
        Some(TieKind::Stop)
    } else {
        None
    }
}

fn spanner_type(elt: &XmlElement) -> SpannerType {
    match elt.attribute_value("type") {
        "stop" => SpannerType::Stop,
        "continue" => SpannerType::Continue,
        _ => SpannerType::Start,
    }
}

fn spanner(kind: SpannerKind, elt: &XmlElement) -> NoteMark {
    NoteMark::Spanner(Spanner {
        kind,
        spanner_type: spanner_type(elt),
        number: elt.attribute_int("number", 1),
        text: Some(elt.text().to_string()).filter(|text| !text.is_empty()),
        input_line: elt.line(),
    })
}

fn read_notations<'a>(
    notations: &'a XmlElement,
    read: &mut ReadNote,
    tie_types: &mut Vec<&'a str>,
    diagnostics: &mut Diagnostics,
) {
    for child in notations.children() {
        let line = child.line();
        let placement = Placement::from_element(child);
        match child.kind() {
            ElementKind::Tied => tie_types.push(child.attribute_value("type")),
            ElementKind::Slur => {
                let kind = match child.attribute_value("type") {
                    "stop" => SlurKind::Stop,
                    "continue" => SlurKind::Continue,
                    _ => SlurKind::Start,
                };
                read.note.marks.push(NoteMark::Slur(Slur {
                    number: child.attribute_int("number", 1),
                    kind,
                    placement,
                    input_line: line,
                }));
            }
            ElementKind::Tuplet => match child.attribute_value("type") {
                "start" => read.tuplet_starts.push(read_tuplet(child, &read.note, diagnostics)),
                "stop" => read.tuplet_stops += 1,
                other => diagnostics.warn(
                    line,
                    "unknown_tuplet_type",
                    "tuplet",
                    format!("tuplet type \"{}\" is unknown", other),
                ),
            },
            ElementKind::Glissando => read.note.marks.push(spanner(SpannerKind::Glissando, child)),
            ElementKind::Slide => read.note.marks.push(spanner(SpannerKind::Slide, child)),
            ElementKind::Ornaments => read_ornaments(child, read),
            ElementKind::Technical => read_technicals(child, read),
            ElementKind::Articulations => read_articulations(child, read),
            ElementKind::Fermata => read.note.marks.push(NoteMark::Fermata(Fermata {
                inverted: child.attribute_value("type") == "inverted",
                input_line: line,
            })),
            ElementKind::Arpeggiate | ElementKind::NonArpeggiate => {
                let kind = if child.is(&ElementKind::Arpeggiate) {
                    ArticulationKind::Arpeggiato
                } else {
                    ArticulationKind::NonArpeggiato
                };
                read.note.marks.push(NoteMark::Articulation(Articulation {
                    kind,
                    placement,
                    input_line: line,
                }));
            }
            ElementKind::Dynamics => {
                for dynamic in child.children() {
                    read.note.marks.push(NoteMark::Dynamics(Dynamics {
                        text: dynamic.name().to_string(),
                        placement,
                        position: Position::from_element(child),
                        input_line: dynamic.line(),
                    }));
                }
            }
            _ => log::debug!("ignoring notation {}", child),
        }
    }
}

fn read_tuplet(elt: &XmlElement, note: &Note, diagnostics: &mut Diagnostics) -> Tuplet {
    let (actual, normal) = note.time_modification.unwrap_or_else(|| {
        diagnostics.warn(
            elt.line(),
            "tuplet_without_time_modification",
            "tuplet",
            "tuplet start on a note without time-modification, 3:2 is assumed",
        );
        (3, 2)
    });

    let mut tuplet = Tuplet::new(elt.attribute_int("number", 1), actual, normal, elt.line());
    tuplet.bracket = elt.attribute_yes_no("bracket", true);
    tuplet.line_shape = if elt.attribute_value("line-shape") == "curved" {
        TupletLineShape::Curved
    } else {
        TupletLineShape::Straight
    };
    tuplet.show_number = match elt.attribute_value("show-number") {
        "both" => TupletShowNumber::Both,
        "none" => TupletShowNumber::None,
        _ => TupletShowNumber::Actual,
    };
    tuplet.placement = Placement::from_element(elt);
    tuplet
}

fn read_ornaments(ornaments: &XmlElement, read: &mut ReadNote) {
    for child in ornaments.children() {
        let placement = Placement::from_element(child);
        let kind = match child.kind() {
            ElementKind::TrillMark => OrnamentKind::TrillMark,
            ElementKind::Turn => OrnamentKind::Turn,
            ElementKind::InvertedTurn => OrnamentKind::InvertedTurn,
            ElementKind::Mordent => OrnamentKind::Mordent,
            ElementKind::InvertedMordent => OrnamentKind::InvertedMordent,
            ElementKind::WavyLine => {
                read.note.marks.push(spanner(SpannerKind::WavyLine, child));
                continue;
            }
            ElementKind::Tremolo => {
                let marks = child.int_value(3).clamp(0, 8) as u8;
                match child.attribute_value("type") {
                    "start" => read.double_tremolo = Some(TremoloHalf::Start { marks, placement }),
                    "stop" => read.double_tremolo = Some(TremoloHalf::Stop),
                    _ => read.note.marks.push(NoteMark::Tremolo(SingleTremolo {
                        marks,
                        placement,
                        input_line: child.line(),
                    })),
                }
                continue;
            }
            _ => {
                log::debug!("ignoring ornament {}", child);
                continue;
            }
        };
        read.note.marks.push(NoteMark::Ornament(Ornament {
            kind,
            placement,
            input_line: child.line(),
        }));
    }
}

fn read_technicals(technical: &XmlElement, read: &mut ReadNote) {
    for child in technical.children() {
        let kind = match child.kind() {
            ElementKind::UpBow => TechnicalKind::UpBow,
            ElementKind::DownBow => TechnicalKind::DownBow,
            ElementKind::Harmonic => TechnicalKind::Harmonic,
            ElementKind::OpenString => TechnicalKind::OpenString,
            ElementKind::ThumbPosition => TechnicalKind::ThumbPosition,
            ElementKind::SnapPizzicato => TechnicalKind::SnapPizzicato,
            ElementKind::Fingering => TechnicalKind::Fingering(child.int_value(0)),
            ElementKind::StringNumber => TechnicalKind::StringNumber(child.int_value(0)),
            ElementKind::Fret => TechnicalKind::Fret(child.int_value(0)),
            ElementKind::Pluck => TechnicalKind::Pluck(child.text().to_string()),
            _ => {
                log::debug!("ignoring technical {}", child);
                continue;
            }
        };
        read.note.marks.push(NoteMark::Technical(Technical {
            kind,
            placement: Placement::from_element(child),
            input_line: child.line(),
        }));
    }
}

fn read_articulations(articulations: &XmlElement, read: &mut ReadNote) {
    for child in articulations.children() {
        let kind = match child.kind() {
            ElementKind::Accent => ArticulationKind::Accent,
            ElementKind::StrongAccent => ArticulationKind::StrongAccent,
            ElementKind::Staccato => ArticulationKind::Staccato,
            ElementKind::Tenuto => ArticulationKind::Tenuto,
            ElementKind::DetachedLegato => ArticulationKind::DetachedLegato,
            ElementKind::Staccatissimo => ArticulationKind::Staccatissimo,
            ElementKind::Spiccato => ArticulationKind::Spiccato,
            ElementKind::BreathMark => ArticulationKind::BreathMark,
            ElementKind::Caesura => ArticulationKind::Caesura,
            _ => {
                log::debug!("ignoring articulation {}", child);
                continue;
            }
        };
        read.note.marks.push(NoteMark::Articulation(Articulation {
            kind,
            placement: Placement::from_element(child),
            input_line: child.line(),
        }));
    }
}

fn read_lyric(lyric: &XmlElement, note: &Note, diagnostics: &mut Diagnostics) -> Syllable {
    let number = lyric
        .attribute("number")
        .or_else(|| lyric.attribute("name"))
        .unwrap_or("1")
        .trim()
        .to_string();
    let texts: Vec<String> = lyric
        .children_of(&ElementKind::Text)
        .map(|text| text.text().to_string())
        .collect();

    let kind = match lyric.child_text(&ElementKind::Syllabic) {
        Some(syllabic) => SyllableKind::from_syllabic(syllabic).unwrap_or_else(|| {
            diagnostics.warn(
                lyric.line(),
                "unknown_syllabic",
                "lyric",
                format!("syllabic \"{}\" is unknown, single is assumed", syllabic),
            );
            SyllableKind::Single
        }),
        None if texts.is_empty() => SyllableKind::Skip,
        None => SyllableKind::Single,
    };

    Syllable {
        kind,
        texts,
        extend: lyric
            .child(&ElementKind::Extend)
            .map(|extend| ExtendKind::from_type(extend.attribute("type")))
            .unwrap_or_default(),
        duration: note.sounding_duration,
        note_ordinal: Some(note.ordinal),
        stanza_number: number,
        input_line: lyric.line(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    fn first_note(xml_note: &str) -> XmlElement {
        let xml = format!(
            r#"<score-partwise><part-list/><part id="P1"><measure number="1">{}</measure></part></score-partwise>"#,
            xml_note
        );
        let root = XmlDocument::parse(&xml).unwrap();
        root.find(&ElementKind::Note).unwrap().clone()
    }

    #[test]
    fn test_tuplet_member() {
        let elt = first_note(
            r#"<note><pitch><step>E</step><alter>-1</alter><octave>5</octave></pitch>
               <duration>2</duration><voice>2</voice><type>eighth</type>
               <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>
               <staff>2</staff>
               <notations><tuplet type="start" bracket="no"/><slur type="start"/></notations></note>"#,
        );
        let mut diagnostics = Diagnostics::new();
        let read = read_note(&elt, 4, 7, &mut diagnostics);

        assert_eq!(read.note.sounding_duration, Rational::new(1, 8));
        assert_eq!(read.note.displayed_duration, Rational::new(1, 8));
        assert_eq!((read.note.voice_number, read.note.staff_number), (2, 2));
        assert_eq!(read.note.pitch().map(|p| p.alteration), Some(-1));
        assert_eq!(read.tuplet_starts.len(), 1, "tuplet start announced");
        assert!(!read.tuplet_starts[0].bracket);
        assert_eq!(read.tuplet_starts[0].actual, 3);
        assert!(read.note.has_slur_start());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_grace_chord_and_ties() {
        let elt = first_note(
            r#"<note><grace slash="yes"/><chord/><pitch><step>G</step><octave>4</octave></pitch>
               <type>16th</type><tie type="stop"/><tie type="start"/></note>"#,
        );
        let read = read_note(&elt, 1, 1, &mut Diagnostics::new());
        assert_eq!(read.grace, Some(true));
        assert!(read.chord);
        assert_eq!(read.note.sounding_duration, zero(), "grace notes take no time");
        assert_eq!(read.note.tie, Some(TieKind::Continue));
    }

    #[test]
    fn test_lyrics_and_double_tremolo() {
        let elt = first_note(
            r#"<note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration><type>quarter</type>
               <notations><ornaments><tremolo type="start">2</tremolo></ornaments></notations>
               <lyric number="2"><syllabic>begin</syllabic><text>Hal</text><extend/></lyric></note>"#,
        );
        let read = read_note(&elt, 1, 3, &mut Diagnostics::new());
        assert!(matches!(
            read.double_tremolo,
            Some(TremoloHalf::Start { marks: 2, .. })
        ));
        assert_eq!(read.lyrics.len(), 1);
        let syllable = &read.lyrics[0];
        assert_eq!(syllable.stanza_number, "2");
        assert_eq!(syllable.kind, SyllableKind::Begin);
        assert_eq!(syllable.note_ordinal, Some(3));
        assert!(syllable.extend.is_ongoing());
    }

    #[test]
    fn test_unknown_step_becomes_rest() {
        let elt = first_note(
            r#"<note><pitch><step>H</step><octave>4</octave></pitch><duration>1</duration></note>"#,
        );
        let mut diagnostics = Diagnostics::new();
        let read = read_note(&elt, 1, 1, &mut diagnostics);
        assert!(read.note.is_rest());
        assert!(diagnostics.has_kind("invalid_pitch"));
        assert_eq!(read.note.graphic_type, Some(NoteType::Quarter), "type derived from duration");
    }
}
