//! Folding a voice's measures into its repeat structure
//!
//! Measures are collected flat while a part is read. Once the part ends,
//! each voice is folded twice: runs of measures marked as multiple rests or
//! measure repeats become wrappers, then barline repeats and endings are
//! replayed through the repeat state machine.

use crate::context::{RepeatState, RepeatTracker};
use crate::diagnostics::Diagnostics;
use crate::errors::Result;
use crate::msr::attributes::{Barline, BarlineLocation, EndingType};
use crate::msr::measure::{Measure, MeasureElement, MeasureRepeatMark};
use crate::msr::voice::{
    MeasuresRepeat, Repeat, RepeatEnding, RepeatEndingKind, RestMeasures, Voice, VoiceElement,
};

pub(crate) fn fold_voice(voice: &mut Voice, diagnostics: &mut Diagnostics) -> Result<()> {
    let measures = voice.take_trailing_measures(voice.measure_count());
    let grouped = group_measures(measures, diagnostics);
    for element in fold_repeats(grouped, diagnostics)? {
        voice.append_element(element)?;
    }
    Ok(())
}

// ============================================================================
// MULTIPLE RESTS AND MEASURE REPEATS
// ============================================================================

fn group_measures(measures: Vec<Measure>, diagnostics: &mut Diagnostics) -> Vec<VoiceElement> {
    let mut grouped: Vec<VoiceElement> = Vec::new();
    let mut measures = measures.into_iter().peekable();

    while let Some(measure) = measures.next() {
        if let Some(count) = measure.multiple_rest.filter(|count| *count > 1) {
            let input_line = measure.input_line;
            let mut run = vec![measure];
            while run.len() < count as usize {
                match measures.next() {
                    Some(next) => run.push(next),
                    None => break,
                }
            }
            if run.len() < count as usize {
                diagnostics.warn(
                    input_line,
                    "short_multiple_rest",
                    "multiple-rest",
                    format!("multiple rest of {} measures has only {}", count, run.len()),
                );
            }
            grouped.push(VoiceElement::RestMeasures(RestMeasures {
                count: run.len() as u32,
                measures: run,
                input_line,
            }));
            continue;
        }

        if let Some(MeasureRepeatMark::Start { measures: per_pattern, slashes }) = measure.measure_repeat {
            let input_line = measure.input_line;

            // the pattern is the run of plain measures just before
            let mut pattern = Vec::new();
            while pattern.len() < per_pattern as usize {
                match grouped.last() {
                    Some(VoiceElement::Measure(_)) => {}
                    _ => break,
                }
                if let Some(VoiceElement::Measure(previous)) = grouped.pop() {
                    pattern.push(previous);
                }
            }
            pattern.reverse();
            if pattern.is_empty() {
                diagnostics.warn(
                    input_line,
                    "measure_repeat_without_pattern",
                    "measure-repeat",
                    "measure repeat without preceding measures is ignored",
                );
                grouped.push(VoiceElement::Measure(measure));
                continue;
            }

            let mut replicas = vec![measure];
            while let Some(next) = measures.peek() {
                if next.measure_repeat == Some(MeasureRepeatMark::Stop) {
                    break;
                }
                if let Some(next) = measures.next() {
                    replicas.push(next);
                }
            }
            grouped.push(VoiceElement::MeasuresRepeat(MeasuresRepeat {
                measures_per_pattern: pattern.len() as u32,
                slashes,
                pattern,
                replicas,
                input_line,
            }));
            continue;
        }

        grouped.push(VoiceElement::Measure(measure));
    }

    grouped
}

// ============================================================================
// BARLINE REPEATS
// ============================================================================

fn first_measure(element: &VoiceElement) -> Option<&Measure> {
    match element {
        VoiceElement::Measure(measure) => Some(measure),
        VoiceElement::RestMeasures(rests) => rests.measures.first(),
        VoiceElement::MeasuresRepeat(repeat) => repeat.pattern.first(),
        VoiceElement::Repeat(_) => None,
    }
}

fn last_measure(element: &VoiceElement) -> Option<&Measure> {
    match element {
        VoiceElement::Measure(measure) => Some(measure),
        VoiceElement::RestMeasures(rests) => rests.measures.last(),
        VoiceElement::MeasuresRepeat(repeat) => repeat.replicas.last().or(repeat.pattern.last()),
        VoiceElement::Repeat(_) => None,
    }
}

fn barlines(measure: Option<&Measure>, location: BarlineLocation) -> Vec<Barline> {
    measure
        .map(|measure| {
            measure
                .elements
                .iter()
                .filter_map(|element| match element {
                    MeasureElement::Barline(barline) if barline.location == location => {
                        Some(barline.clone())
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Turn the plain elements after the last repeat into an open repeat
fn open_implicit_repeat(
    folded: &mut Vec<VoiceElement>,
    tracker: &mut RepeatTracker,
    input_line: u32,
) -> Result<()> {
    let mut common_part = Vec::new();
    while let Some(element) = folded.pop() {
        if matches!(element, VoiceElement::Repeat(_)) {
            folded.push(element);
            break;
        }
        common_part.push(element);
    }
    common_part.reverse();

    let mut repeat = Repeat::new(2, input_line);
    repeat.common_part = common_part;
    tracker.repeat_start(repeat, input_line)?;
    tracker.common_part_start(input_line)
}

fn close_open_repeat(
    folded: &mut Vec<VoiceElement>,
    tracker: &mut RepeatTracker,
    input_line: u32,
) -> Result<()> {
    if let RepeatState::InEnding { .. } = tracker.state() {
        tracker.ending_end(RepeatEndingKind::Hooked, input_line)?;
    }
    if !tracker.is_outside() {
        folded.push(VoiceElement::Repeat(tracker.repeat_end(input_line)?));
    }
    Ok(())
}

fn fold_repeats(
    elements: Vec<VoiceElement>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<VoiceElement>> {
    let mut tracker = RepeatTracker::new();
    let mut folded: Vec<VoiceElement> = Vec::new();
    let mut last_line = 0;

    for element in elements {
        let left = barlines(first_measure(&element), BarlineLocation::Left);
        let right = barlines(last_measure(&element), BarlineLocation::Right);
        let line = first_measure(&element).map_or(last_line, |m| m.input_line);
        last_line = line;

        let ending_start = left.iter().find_map(|barline| match &barline.ending {
            Some(ending) if ending.ending_type == EndingType::Start => Some(ending.number.clone()),
            _ => None,
        });

        // a repeat whose endings are over
        if *tracker.state() == RepeatState::BetweenEndings && ending_start.is_none() {
            folded.push(VoiceElement::Repeat(tracker.repeat_end(line)?));
        }

        if let Some(forward) = left.iter().find(|barline| barline.is_repeat_start()) {
            if !tracker.is_outside() {
                diagnostics.warn(
                    forward.input_line,
                    "unclosed_repeat",
                    "repeat",
                    "forward repeat inside an open repeat closes the open one",
                );
                close_open_repeat(&mut folded, &mut tracker, line)?;
            }
            tracker.repeat_start(Repeat::new(2, forward.input_line), forward.input_line)?;
            tracker.common_part_start(forward.input_line)?;
        }

        if let Some(number) = ending_start {
            if tracker.is_outside() {
                open_implicit_repeat(&mut folded, &mut tracker, line)?;
            }
            if *tracker.state() == RepeatState::InCommonPart {
                tracker.common_part_end(line)?;
            }
            tracker.ending_start(RepeatEnding::new(&number, RepeatEndingKind::Hooked, line), line)?;
        }

        if let Some(element) = tracker.append(element) {
            folded.push(element);
        }

        for barline in &right {
            if let Some(ending) = &barline.ending {
                let kind = match ending.ending_type {
                    EndingType::Stop => RepeatEndingKind::Hooked,
                    EndingType::Discontinue => RepeatEndingKind::Hookless,
                    EndingType::Start => continue,
                };
                tracker.ending_end(kind, barline.input_line)?;
            }
        }

        if let Some(backward) = right.iter().find(|barline| barline.is_repeat_end()) {
            let times = backward.repeat.as_ref().map_or(2, |repeat| repeat.times);
            match tracker.state().clone() {
                RepeatState::Outside => {
                    open_implicit_repeat(&mut folded, &mut tracker, backward.input_line)?;
                    let mut repeat = tracker.repeat_end(backward.input_line)?;
                    repeat.times = times;
                    folded.push(VoiceElement::Repeat(repeat));
                }
                RepeatState::InCommonPart => {
                    let mut repeat = tracker.repeat_end(backward.input_line)?;
                    repeat.times = times;
                    folded.push(VoiceElement::Repeat(repeat));
                }
                RepeatState::InEnding { .. } => {
                    tracker.ending_end(RepeatEndingKind::Hooked, backward.input_line)?;
                }
                // more endings may follow
                RepeatState::BetweenEndings => {}
            }
        }
    }

    if *tracker.state() == RepeatState::InCommonPart {
        diagnostics.warn(
            last_line,
            "unclosed_repeat",
            "repeat",
            "forward repeat without a backward repeat, repeated up to the end",
        );
    }
    close_open_repeat(&mut folded, &mut tracker, last_line)?;

    Ok(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::attributes::{BarlineEnding, BarlineRepeat, BarlineStyle, RepeatDirection};
    use crate::msr::uplinks::StaffKey;
    use crate::msr::voice::VoiceKind;
    use crate::msr::Rational;

    fn barline(location: BarlineLocation, repeat: Option<RepeatDirection>, ending: Option<(&str, EndingType)>) -> MeasureElement {
        MeasureElement::Barline(Barline {
            location,
            style: BarlineStyle::Regular,
            repeat: repeat.map(|direction| BarlineRepeat { direction, times: 2 }),
            ending: ending.map(|(number, ending_type)| BarlineEnding {
                number: number.to_string(),
                ending_type,
            }),
            segno: false,
            coda: false,
            input_line: 1,
        })
    }

    fn voice_with(measures: Vec<Measure>) -> Voice {
        let mut voice = Voice::new(1, VoiceKind::Regular, 1);
        voice.uplink = Some(StaffKey {
            part_id: "P1".to_string(),
            staff_number: 1,
        });
        for measure in measures {
            voice.append_measure(measure).unwrap();
        }
        voice
    }

    fn measure(number: u32) -> Measure {
        Measure::new(&number.to_string(), number, Rational::new(1, 1), number * 10)
    }

    #[test]
    fn test_backward_repeat_from_voice_start() {
        let mut second = measure(2);
        second.append(barline(BarlineLocation::Right, Some(RepeatDirection::Backward), None));
        let mut voice = voice_with(vec![measure(1), second, measure(3)]);

        fold_voice(&mut voice, &mut Diagnostics::new()).unwrap();
        assert_eq!(voice.elements.len(), 2);
        match &voice.elements[0] {
            VoiceElement::Repeat(repeat) => {
                assert_eq!(repeat.common_part.len(), 2);
                assert!(repeat.endings.is_empty());
            }
            other => panic!("expected a repeat, got {:?}", other),
        }
        assert_eq!(voice.measure_count(), 3);
    }

    #[test]
    fn test_repeat_with_volta_endings() {
        let mut first = measure(1);
        first.prepend(barline(BarlineLocation::Left, Some(RepeatDirection::Forward), None));
        let mut ending_one = measure(2);
        ending_one.prepend(barline(BarlineLocation::Left, None, Some(("1", EndingType::Start))));
        ending_one.append(barline(BarlineLocation::Right, Some(RepeatDirection::Backward), Some(("1", EndingType::Stop))));
        let mut ending_two = measure(3);
        ending_two.prepend(barline(BarlineLocation::Left, None, Some(("2", EndingType::Start))));
        ending_two.append(barline(BarlineLocation::Right, None, Some(("2", EndingType::Discontinue))));
        let mut voice = voice_with(vec![first, ending_one, ending_two, measure(4)]);

        fold_voice(&mut voice, &mut Diagnostics::new()).unwrap();
        assert_eq!(voice.elements.len(), 2, "one repeat then measure 4");
        let VoiceElement::Repeat(repeat) = &voice.elements[0] else {
            panic!("expected a repeat first");
        };
        assert_eq!(repeat.common_part.len(), 1);
        assert_eq!(repeat.endings.len(), 2);
        assert_eq!(repeat.endings[0].number, "1");
        assert_eq!(repeat.endings[1].kind, RepeatEndingKind::Hookless);
    }

    #[test]
    fn test_multiple_rest_and_measure_repeat() {
        let mut rest = measure(1);
        rest.multiple_rest = Some(2);
        let mut replica = measure(4);
        replica.measure_repeat = Some(MeasureRepeatMark::Start { measures: 1, slashes: 1 });
        let mut stop = measure(6);
        stop.measure_repeat = Some(MeasureRepeatMark::Stop);
        let mut voice = voice_with(vec![rest, measure(2), measure(3), replica, measure(5), stop]);

        fold_voice(&mut voice, &mut Diagnostics::new()).unwrap();
        assert!(matches!(&voice.elements[0], VoiceElement::RestMeasures(r) if r.count == 2));
        match &voice.elements[1] {
            VoiceElement::MeasuresRepeat(repeat) => {
                assert_eq!(repeat.pattern.len(), 1);
                assert_eq!(repeat.replicas.len(), 2);
                assert_eq!(repeat.replicas_count(), 2);
            }
            other => panic!("expected a measures repeat, got {:?}", other),
        }
        assert!(matches!(&voice.elements[2], VoiceElement::Measure(m) if m.number == "6"));
    }
}
