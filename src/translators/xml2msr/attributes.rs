//! Readers for `<attributes>` children and `<barline>`
//!
//! Each reader turns one element into its score model value. Values the
//! model cannot represent are reported to the caller's diagnostics and
//! replaced by the closest supported value.

use crate::diagnostics::Diagnostics;
use crate::msr::attributes::{
    Barline, BarlineEnding, BarlineLocation, BarlineRepeat, BarlineStyle, Clef, EndingType, Key,
    KeyMode, RepeatDirection, Time, TimeItem, TimeSymbol, Transpose,
};
use crate::msr::basics::Pitch;
use crate::msr::staff::StaffTuning;
use crate::xml::element::{ElementKind, XmlElement};

/// `<key>`; the `number` attribute restricts it to one staff
pub(crate) fn read_key(elt: &XmlElement, diagnostics: &mut Diagnostics) -> Key {
    let mode = match elt.child_text(&ElementKind::Mode) {
        None => KeyMode::None,
        Some(name) => KeyMode::from_name(name).unwrap_or_else(|| {
            diagnostics.warn(
                elt.line(),
                "unknown_key_mode",
                "key",
                format!("key mode \"{}\" is unknown, major is assumed", name),
            );
            KeyMode::Major
        }),
    };

    let fifths = elt.child_int_value(&ElementKind::Fifths, 0);
    if !elt.has_child(&ElementKind::Fifths) {
        diagnostics.warn(
            elt.line(),
            "unsupported_key",
            "key",
            "non-traditional keys are not supported, C major is used instead",
        );
    }

    Key {
        fifths,
        mode,
        cancel: elt
            .child(&ElementKind::Cancel)
            .map(|cancel| cancel.int_value(0)),
        staff_number: elt.attribute("number").and_then(|n| n.trim().parse().ok()),
        input_line: elt.line(),
    }
}

/// `<time>` with any number of beats/beat-type pairs
pub(crate) fn read_time(elt: &XmlElement) -> Time {
    let beats: Vec<&str> = elt
        .children_of(&ElementKind::Beats)
        .map(XmlElement::text)
        .collect();
    let beat_types: Vec<&str> = elt
        .children_of(&ElementKind::BeatType)
        .map(XmlElement::text)
        .collect();

    Time {
        items: beats
            .iter()
            .zip(beat_types.iter())
            .map(|(beats, beat_type)| TimeItem::new(beats, beat_type))
            .collect(),
        symbol: TimeSymbol::from_name(elt.attribute_value("symbol")),
        senza_misura: elt.has_child(&ElementKind::SenzaMisura),
        print_object: elt.attribute_yes_no("print-object", true),
        staff_number: elt.attribute("number").and_then(|n| n.trim().parse().ok()),
        input_line: elt.line(),
    }
}

/// `<clef>`; a missing line gets the usual line for its sign
pub(crate) fn read_clef(elt: &XmlElement) -> Clef {
    let sign = elt.child_value(&ElementKind::Sign).to_string();
    let default_line = match sign.as_str() {
        "G" => 2,
        "F" => 4,
        "C" => 3,
        _ => 0,
    };

    Clef {
        line: elt.child_int_value(&ElementKind::Line, default_line),
        octave_change: elt.child_int_value(&ElementKind::ClefOctaveChange, 0),
        staff_number: elt.attribute_int("number", 1),
        input_line: elt.line(),
        sign,
    }
}

/// Line count and tunings from `<staff-details>`
pub(crate) fn read_staff_details(
    elt: &XmlElement,
    diagnostics: &mut Diagnostics,
) -> (Option<u32>, Vec<StaffTuning>) {
    let lines = elt
        .child(&ElementKind::StaffLines)
        .map(|lines| lines.int_value(5).max(0) as u32);

    let mut tunings = Vec::new();
    for tuning in elt.children_of(&ElementKind::StaffTuning) {
        let letter = tuning.child_value(&ElementKind::TuningStep);
        let Some(step) = Pitch::step_from_letter(letter) else {
            diagnostics.warn(
                tuning.line(),
                "invalid_tuning",
                "staff-tuning",
                format!("tuning step \"{}\" is not a note name", letter),
            );
            continue;
        };
        tunings.push(StaffTuning {
            line: tuning.attribute_int("line", 0),
            step,
            alteration: tuning.child_float_value(&ElementKind::TuningAlter, 0.0).round() as i8,
            octave: tuning.child_int_value(&ElementKind::TuningOctave, 4) as i8,
        });
    }

    (lines, tunings)
}

pub(crate) fn read_transpose(elt: &XmlElement) -> Transpose {
    Transpose {
        diatonic: elt.child_int_value(&ElementKind::Diatonic, 0),
        chromatic: elt.child_int_value(&ElementKind::Chromatic, 0),
        octave_change: elt.child_int_value(&ElementKind::OctaveChange, 0),
        double: elt.has_child(&ElementKind::Double),
        input_line: elt.line(),
    }
}

pub(crate) fn read_barline(elt: &XmlElement, diagnostics: &mut Diagnostics) -> Barline {
    let location = match elt.attribute_value("location") {
        "left" => BarlineLocation::Left,
        "middle" => BarlineLocation::Middle,
        _ => BarlineLocation::Right,
    };

    let style = match elt.child_text(&ElementKind::BarStyle) {
        None => BarlineStyle::Regular,
        Some(name) => BarlineStyle::from_name(name).unwrap_or_else(|| {
            diagnostics.warn(
                elt.line(),
                "unknown_bar_style",
                "barline",
                format!("bar style \"{}\" is unknown", name),
            );
            BarlineStyle::Regular
        }),
    };

    let repeat = elt.child(&ElementKind::Repeat).map(|repeat| BarlineRepeat {
        direction: if repeat.attribute_value("direction") == "forward" {
            RepeatDirection::Forward
        } else {
            RepeatDirection::Backward
        },
        times: repeat.attribute_int("times", 2).max(1) as u32,
    });

    let ending = elt.child(&ElementKind::Ending).and_then(|ending| {
        let ending_type = match ending.attribute_value("type") {
            "start" => EndingType::Start,
            "stop" => EndingType::Stop,
            "discontinue" => EndingType::Discontinue,
            other => {
                diagnostics.warn(
                    ending.line(),
                    "unknown_ending_type",
                    "ending",
                    format!("ending type \"{}\" is unknown, ending ignored", other),
                );
                return None;
            }
        };
        Some(BarlineEnding {
            number: ending.attribute_value("number").trim().to_string(),
            ending_type,
        })
    });

    Barline {
        location,
        style,
        repeat,
        ending,
        segno: elt.has_child(&ElementKind::Segno),
        coda: elt.has_child(&ElementKind::Coda),
        input_line: elt.line(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, text: &str) -> XmlElement {
        XmlElement::new(name, 1).with_text(text)
    }

    #[test]
    fn test_time_pairs() {
        let elt = XmlElement::new("time", 4)
            .with_child(leaf("beats", "3"))
            .with_child(leaf("beat-type", "8"))
            .with_child(leaf("beats", "2"))
            .with_child(leaf("beat-type", "8"));
        let time = read_time(&elt);
        assert_eq!(time.items.len(), 2);
        assert_eq!(time.items[1].beats, "2");
        assert!(time.print_object);
    }

    #[test]
    fn test_clef_default_line() {
        let elt = XmlElement::new("clef", 5)
            .with_attribute("number", "2")
            .with_child(leaf("sign", "F"));
        let clef = read_clef(&elt);
        assert_eq!((clef.sign.as_str(), clef.line, clef.staff_number), ("F", 4, 2));
    }

    #[test]
    fn test_barline_with_ending() {
        let mut diagnostics = Diagnostics::new();
        let elt = XmlElement::new("barline", 9)
            .with_attribute("location", "left")
            .with_child(
                XmlElement::new("ending", 10)
                    .with_attribute("number", "1")
                    .with_attribute("type", "start"),
            )
            .with_child(XmlElement::new("repeat", 11).with_attribute("direction", "forward"));
        let barline = read_barline(&elt, &mut diagnostics);
        assert_eq!(barline.location, BarlineLocation::Left);
        assert!(barline.is_repeat_start());
        assert_eq!(barline.ending.map(|e| e.ending_type), Some(EndingType::Start));
        assert!(diagnostics.is_empty());
    }
}
