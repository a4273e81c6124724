//! Readers for `<direction>`, `<harmony>` and `<figured-bass>`

use crate::diagnostics::Diagnostics;
use crate::msr::attributes::{Coda, Rehearsal, Segno, Tempo};
use crate::msr::basics::{zero, NoteType, Pitch, Placement, Position};
use crate::msr::harmony::{DegreeType, Figure, FiguredBass, Harmony, HarmonyDegree, HarmonyKind};
use crate::msr::marks::{
    Dynamics, NoteMark, OctaveShift, OctaveShiftKind, Spanner, SpannerKind, SpannerType, Wedge,
    WedgeKind, Words,
};
use crate::msr::measure::MeasureElement;
use crate::translators::xml2msr::notes::whole_notes_from_divisions;
use crate::xml::element::{ElementKind, XmlElement};

/// What a `<direction>` contributes to the staff it belongs to
#[derive(Debug, Default)]
pub(crate) struct DirectionItems {
    pub staff_number: i32,
    /// Attached to the next note of the staff
    pub marks: Vec<NoteMark>,
    /// Appended to the measure ahead of that note
    pub elements: Vec<MeasureElement>,
}

pub(crate) fn read_direction(elt: &XmlElement, diagnostics: &mut Diagnostics) -> DirectionItems {
    let placement = Placement::from_element(elt);
    let mut items = DirectionItems {
        staff_number: elt.child_int_value(&ElementKind::Staff, 1),
        ..DirectionItems::default()
    };
    let mut words: Vec<Words> = Vec::new();
    let mut tempo: Option<Tempo> = None;

    for direction_type in elt.children_of(&ElementKind::DirectionType) {
        for child in direction_type.children() {
            let line = child.line();
            let position = Position::from_element(child);
            match child.kind() {
                ElementKind::Words => {
                    if child.text().is_empty() {
                        continue;
                    }
                    words.push(Words {
                        text: child.text().to_string(),
                        placement,
                        position,
                        italic: child.attribute_value("font-style") == "italic",
                        bold: child.attribute_value("font-weight") == "bold",
                        input_line: line,
                    });
                }
                ElementKind::Dynamics => {
                    for dynamic in child.children() {
                        let text = if dynamic.name() == "other-dynamics" {
                            dynamic.text().to_string()
                        } else {
                            dynamic.name().to_string()
                        };
                        items.marks.push(NoteMark::Dynamics(Dynamics {
                            text,
                            placement,
                            position,
                            input_line: dynamic.line(),
                        }));
                    }
                }
                ElementKind::Wedge => {
                    let kind = match child.attribute_value("type") {
                        "crescendo" => WedgeKind::Crescendo,
                        "diminuendo" => WedgeKind::Diminuendo,
                        "stop" => WedgeKind::Stop,
                        other => {
                            diagnostics.warn(
                                line,
                                "unknown_wedge_type",
                                "wedge",
                                format!("wedge type \"{}\" is unknown", other),
                            );
                            continue;
                        }
                    };
                    items.marks.push(NoteMark::Wedge(Wedge {
                        kind,
                        placement,
                        position,
                        input_line: line,
                    }));
                }
                ElementKind::Metronome => {
                    tempo = Some(Tempo {
                        beat_unit: child
                            .child_text(&ElementKind::BeatUnit)
                            .and_then(NoteType::from_name),
                        dots: child.children_of(&ElementKind::BeatUnitDot).count() as u8,
                        per_minute: child
                            .child_text(&ElementKind::PerMinute)
                            .map(str::to_string),
                        words: None,
                        placement,
                        position,
                        input_line: line,
                    });
                }
                ElementKind::Rehearsal => items.elements.push(MeasureElement::Rehearsal(Rehearsal {
                    text: child.text().to_string(),
                    placement,
                    position,
                    input_line: line,
                })),
                ElementKind::Segno => items
                    .elements
                    .push(MeasureElement::Segno(Segno { input_line: line })),
                ElementKind::Coda => items
                    .elements
                    .push(MeasureElement::Coda(Coda { input_line: line })),
                ElementKind::OctaveShift => {
                    let kind = match child.attribute_value("type") {
                        "up" => OctaveShiftKind::Up,
                        "down" => OctaveShiftKind::Down,
                        _ => OctaveShiftKind::Stop,
                    };
                    items.marks.push(NoteMark::OctaveShift(OctaveShift {
                        kind,
                        size: child.attribute_int("size", 8),
                        input_line: line,
                    }));
                }
                ElementKind::Dashes => {
                    let spanner_type = match child.attribute_value("type") {
                        "stop" => SpannerType::Stop,
                        "continue" => SpannerType::Continue,
                        _ => SpannerType::Start,
                    };
                    items.marks.push(NoteMark::Spanner(Spanner {
                        kind: SpannerKind::Dashes,
                        spanner_type,
                        number: child.attribute_int("number", 1),
                        text: None,
                        input_line: line,
                    }));
                }
                _ => diagnostics.warn(
                    line,
                    "unsupported_direction",
                    child.name(),
                    format!("direction type <{}> is not supported", child.name()),
                ),
            }
        }
    }

    // words next to a metronome mark are the tempo's text
    if let Some(mut tempo) = tempo {
        if !words.is_empty() {
            tempo.words = Some(words.remove(0).text);
        }
        items.elements.push(MeasureElement::Tempo(tempo));
    }
    items
        .marks
        .extend(words.into_iter().map(NoteMark::Words));

    items
}

fn step_and_alter(
    elt: &XmlElement,
    step_kind: &ElementKind,
    alter_kind: &ElementKind,
) -> Option<(u8, i8)> {
    let step = Pitch::step_from_letter(elt.child_value(step_kind))?;
    Some((step, elt.child_float_value(alter_kind, 0.0).round() as i8))
}

/// Chord symbol; `None` when it has no usable root
pub(crate) fn read_harmony(elt: &XmlElement, diagnostics: &mut Diagnostics) -> Option<Harmony> {
    let line = elt.line();
    let root = elt
        .child(&ElementKind::Root)
        .and_then(|root| step_and_alter(root, &ElementKind::RootStep, &ElementKind::RootAlter));
    let Some(root) = root else {
        diagnostics.warn(
            line,
            "harmony_without_root",
            "harmony",
            "harmony without a root is ignored",
        );
        return None;
    };

    let kind_elt = elt.child(&ElementKind::Kind);
    let kind_name = kind_elt.map(XmlElement::text).unwrap_or("none");
    let kind = HarmonyKind::from_name(kind_name).unwrap_or_else(|| {
        diagnostics.warn(
            line,
            "unknown_harmony_kind",
            "harmony",
            format!("harmony kind \"{}\" is unknown", kind_name),
        );
        HarmonyKind::Other
    });

    let degrees = elt
        .children_of(&ElementKind::Degree)
        .filter_map(|degree| {
            let degree_type = match degree.child_value(&ElementKind::DegreeType) {
                "add" => DegreeType::Add,
                "alter" => DegreeType::Alter,
                "subtract" => DegreeType::Subtract,
                other => {
                    diagnostics.warn(
                        degree.line(),
                        "unknown_degree_type",
                        "degree",
                        format!("degree type \"{}\" is unknown", other),
                    );
                    return None;
                }
            };
            Some(HarmonyDegree {
                value: degree.child_int_value(&ElementKind::DegreeValue, 0),
                alteration: degree.child_float_value(&ElementKind::DegreeAlter, 0.0).round() as i8,
                degree_type,
                input_line: degree.line(),
            })
        })
        .collect();

    Some(Harmony {
        root,
        kind,
        kind_text: kind_elt
            .map(|k| k.attribute_value("text").to_string())
            .unwrap_or_default(),
        inversion: elt.child_int_value(&ElementKind::Inversion, 0),
        bass: elt
            .child(&ElementKind::Bass)
            .and_then(|bass| step_and_alter(bass, &ElementKind::BassStep, &ElementKind::BassAlter)),
        degrees,
        duration: zero(),
        staff_number: elt.child_int_value(&ElementKind::Staff, 1),
        input_line: line,
    })
}

pub(crate) fn read_figured_bass(elt: &XmlElement, divisions: i32) -> FiguredBass {
    let figures = elt
        .children_of(&ElementKind::Figure)
        .map(|figure| Figure {
            prefix: figure.child_text(&ElementKind::Prefix).map(str::to_string),
            number: figure
                .child(&ElementKind::FigureNumber)
                .and_then(|number| number.text().parse().ok()),
            suffix: figure.child_text(&ElementKind::Suffix).map(str::to_string),
            input_line: figure.line(),
        })
        .collect();

    FiguredBass {
        figures,
        parenthesized: elt.attribute_yes_no("parentheses", false),
        duration: whole_notes_from_divisions(elt.child_int_value(&ElementKind::Duration, 0), divisions),
        input_line: elt.line(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;

    fn first(kind: ElementKind, content: &str) -> XmlElement {
        let xml = format!(
            r#"<score-partwise><part-list/><part id="P1"><measure number="1">{}</measure></part></score-partwise>"#,
            content
        );
        let root = XmlDocument::parse(&xml).unwrap();
        root.find(&kind).unwrap().clone()
    }

    #[test]
    fn test_metronome_takes_words() {
        let elt = first(
            ElementKind::Direction,
            r#"<direction placement="above">
                 <direction-type><words>Allegro</words></direction-type>
                 <direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>120</per-minute></metronome></direction-type>
                 <direction-type><dynamics><mf/></dynamics></direction-type>
                 <staff>2</staff>
               </direction>"#,
        );
        let items = read_direction(&elt, &mut Diagnostics::new());
        assert_eq!(items.staff_number, 2);
        assert_eq!(items.elements.len(), 1);
        match &items.elements[0] {
            MeasureElement::Tempo(tempo) => {
                assert_eq!(tempo.words.as_deref(), Some("Allegro"));
                assert_eq!(tempo.per_minute.as_deref(), Some("120"));
            }
            other => panic!("expected a tempo, got {:?}", other),
        }
        assert!(
            matches!(&items.marks[..], [NoteMark::Dynamics(d)] if d.text == "mf" && d.placement == Placement::Above),
            "words were folded into the tempo, only the dynamics remain"
        );
    }

    #[test]
    fn test_harmony_with_degree() {
        let elt = first(
            ElementKind::Harmony,
            r#"<harmony><root><root-step>B</root-step><root-alter>-1</root-alter></root>
               <kind>dominant</kind><bass><bass-step>D</bass-step></bass>
               <degree><degree-value>9</degree-value><degree-alter>0</degree-alter><degree-type>add</degree-type></degree>
               </harmony>"#,
        );
        let harmony = read_harmony(&elt, &mut Diagnostics::new()).unwrap();
        assert_eq!(harmony.root, (6, -1));
        assert_eq!(harmony.kind, HarmonyKind::Dominant);
        assert_eq!(harmony.bass, Some((1, 0)));
        assert_eq!(harmony.degrees.len(), 1);
    }

    #[test]
    fn test_unsupported_direction_warns() {
        let elt = first(
            ElementKind::Direction,
            r#"<direction><direction-type><pedal type="start"/></direction-type></direction>"#,
        );
        let mut diagnostics = Diagnostics::new();
        let items = read_direction(&elt, &mut diagnostics);
        assert!(items.marks.is_empty() && items.elements.is_empty());
        assert!(diagnostics.has_kind("unsupported_direction"));
    }
}
