// Building the score model from MusicXML documents

mod common;

use common::*;
use score_bridge::msr::measure::MeasureElement;
use score_bridge::msr::voice::VoiceElement;
use score_bridge::{
    convert_musicxml_to_lilypond, msr_to_lpsr, musicxml_to_msr, LpsrSettings, TranslationError,
};

#[test]
fn test_declared_staves_are_created() {
    let piano = r#"<attributes><divisions>1</divisions><staves>3</staves>
        <time><beats>3</beats><beat-type>4</beat-type></time>
        <clef number="1"><sign>G</sign><line>2</line></clef>
        <clef number="2"><sign>F</sign><line>4</line></clef>
        <clef number="3"><sign>F</sign><line>4</line></clef></attributes>"#;
    let xml = one_part(&[format!(
        "{}{}<backup><duration>3</duration></backup>{}",
        piano,
        note("C", 5, 3, "half", "<dot/>"),
        "<note><pitch><step>C</step><octave>3</octave></pitch><duration>3</duration><voice>5</voice><type>half</type><dot/><staff>2</staff></note>"
    )]);

    let result = musicxml_to_msr(&xml).expect("piano score should build");
    let part = result.score.parts()[0];
    assert_eq!(part.declared_staff_count, 3);
    assert_eq!(part.regular_staff_count(), 3, "every declared staff exists");
    assert!(part.voice(2, 5).is_some(), "voice 5 lives on staff 2");
    assert!(part.voice(3, 5).is_none());
}

#[test]
fn test_tuplet_stop_without_start_is_fatal() {
    let stray_stop = note(
        "C",
        4,
        1,
        "quarter",
        r#"<notations><tuplet type="stop"/></notations>"#,
    );
    let xml = one_part(&[format!("{}{}{}{}", WALTZ_PROLOG, stray_stop, quarter("D"), quarter("E"))]);

    let error = musicxml_to_msr(&xml).unwrap_err();
    assert!(error.is_internal(), "expected an internal error, got {:?}", error);
    assert!(error.line().unwrap_or(0) > 0, "the error points at the input");
}

#[test]
fn test_ending_inside_an_ending_is_fatal() {
    let first_ending = r#"<barline location="left"><ending number="1" type="start"/></barline>"#;
    let second_ending = r#"<barline location="left"><ending number="2" type="start"/></barline>"#;
    let xml = one_part(&[
        format!("{}{}{}{}{}", WALTZ_PROLOG, first_ending, quarter("C"), quarter("D"), quarter("E")),
        format!("{}{}{}{}", second_ending, quarter("F"), quarter("G"), quarter("A")),
    ]);

    let error = musicxml_to_msr(&xml).unwrap_err();
    assert!(error.is_internal(), "expected an internal error, got {:?}", error);
}

#[test]
fn test_volta_endings_fold_into_a_repeat() {
    let xml = one_part(&[
        format!(
            r#"{}<barline location="left"><repeat direction="forward"/></barline>{}{}{}"#,
            WALTZ_PROLOG,
            quarter("C"),
            quarter("D"),
            quarter("E")
        ),
        format!(
            r#"<barline location="left"><ending number="1" type="start"/></barline>{}{}{}
               <barline location="right"><ending number="1" type="stop"/><repeat direction="backward"/></barline>"#,
            quarter("F"),
            quarter("G"),
            quarter("A")
        ),
        format!(
            r#"<barline location="left"><ending number="2" type="start"/></barline>{}{}{}
               <barline location="right"><ending number="2" type="discontinue"/></barline>"#,
            quarter("B"),
            quarter("A"),
            quarter("G")
        ),
    ]);

    let result = musicxml_to_msr(&xml).unwrap();
    let voice = result.score.parts()[0].voice(1, 1).unwrap();
    let VoiceElement::Repeat(repeat) = &voice.elements[0] else {
        panic!("expected a repeat, got {:?}", voice.elements[0]);
    };
    assert_eq!(repeat.common_part.len(), 1);
    assert_eq!(repeat.endings.len(), 2);
    assert_eq!(voice.measures().len(), 3, "no measure lost while folding");
}

#[test]
fn test_timewise_documents_are_rejected() {
    let xml = r#"<?xml version="1.0"?><score-timewise version="3.1"><part-list/></score-timewise>"#;
    let error = musicxml_to_msr(xml).unwrap_err();
    assert!(matches!(error, TranslationError::Parse(_)), "got {:?}", error);
    assert!(!error.is_internal());
}

#[test]
fn test_malformed_xml_is_a_parse_error() {
    let error = musicxml_to_msr("<score-partwise><part-list>").unwrap_err();
    assert!(matches!(error, TranslationError::Parse(_)), "got {:?}", error);
}

#[test]
fn test_projection_leaves_the_score_untouched() {
    let result = musicxml_to_msr(&two_bar_waltz()).unwrap();
    let before = result.score.clone();

    let projected = msr_to_lpsr(&result.score, &LpsrSettings::default()).unwrap();
    assert_eq!(result.score, before, "the canonical score is only read");
    assert!(projected.lpsr.voice_definitions().count() > 0);

    let measure = result.score.parts()[0].voice(1, 1).unwrap().measures()[0];
    assert!(
        !measure
            .elements
            .iter()
            .any(|element| matches!(element, MeasureElement::BarCheck(_))),
        "bar checks belong to the projection only"
    );
}

#[test]
fn test_identification_reaches_the_score() {
    let result = musicxml_to_msr(&two_bar_waltz()).unwrap();
    assert_eq!(result.score.identification.title(), Some("Fixture"));
    assert_eq!(result.score.identification.composers, vec!["Anon".to_string()]);
    assert!(result.diagnostics.is_empty(), "unexpected warnings: {:?}", result.diagnostics);
}

#[test]
fn test_undeclared_staves_follow_their_numbers() {
    let lower_first = format!(
        "{}{}<backup><duration>3</duration></backup>{}",
        WALTZ_PROLOG,
        "<note><pitch><step>C</step><octave>3</octave></pitch><duration>3</duration><voice>2</voice><type>half</type><dot/><staff>2</staff></note>",
        "<note><pitch><step>E</step><octave>4</octave></pitch><duration>3</duration><voice>1</voice><type>half</type><dot/><staff>1</staff></note>"
    );
    let xml = one_part(&[lower_first]);

    let result = musicxml_to_msr(&xml).unwrap();
    let part = result.score.parts()[0];
    assert_eq!(part.declared_staff_count, 0, "no <staves> in this part");
    let numbers: Vec<i32> = part.staves().iter().map(|staff| staff.number).collect();
    assert_eq!(numbers, vec![1, 2], "staff 2 was seen first");

    let lilypond = convert_musicxml_to_lilypond(&xml, None).unwrap().lilypond_source;
    let upper = lilypond.find("Part_POne_Staff_One\"");
    let lower = lilypond.find("Part_POne_Staff_Two\"");
    assert!(
        upper.is_some() && lower.is_some() && upper < lower,
        "staff one is printed above staff two:\n{}",
        lilypond
    );
}

#[test]
fn test_overflowing_durations_are_fatal() {
    let prolog = r#"<attributes><divisions>7</divisions>
        <time><beats>3</beats><beat-type>4</beat-type></time></attributes>"#;
    let xml = one_part(&[format!(
        "{}{}{}",
        prolog,
        note("C", 4, 2147483647, "whole", ""),
        note("D", 4, 2147483647, "whole", "")
    )]);

    let error = musicxml_to_msr(&xml).unwrap_err();
    assert!(error.is_internal(), "expected an internal error, got {:?}", error);
    assert!(error.to_string().contains("overflows"), "got {}", error);
}
