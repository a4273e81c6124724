// MusicXML to LilyPond, end to end

mod common;

use common::*;
use score_bridge::settings::PitchLanguage;
use score_bridge::{convert_musicxml, convert_musicxml_to_lilypond, LpsrSettings, TranslationSettings};

#[test]
fn test_two_bar_waltz() {
    let result = convert_musicxml_to_lilypond(&two_bar_waltz(), None)
        .expect("conversion should succeed");
    let text = &result.lilypond_source;

    assert!(text.starts_with("\\version \"2.19\""), "got:\n{}", text);
    assert!(text.contains("\\language \"nederlands\""), "got:\n{}", text);
    assert!(text.contains("title = \"Fixture\""), "got:\n{}", text);
    assert!(text.contains("\\time 3/4"), "got:\n{}", text);
    assert!(text.contains("c'4 d'4 e'4 | % 2"), "got:\n{}", text);
    assert!(text.contains("\\barNumberCheck #2"), "got:\n{}", text);
    assert!(text.contains("\\score {"), "got:\n{}", text);
}

#[test]
fn test_bar_checks_can_be_turned_off() {
    let settings = TranslationSettings {
        lpsr: LpsrSettings {
            generate_bar_checks: false,
            language: PitchLanguage::English,
            ..LpsrSettings::default()
        },
        ..TranslationSettings::default()
    };
    let result = convert_musicxml_to_lilypond(&two_bar_waltz(), Some(settings)).unwrap();
    let text = &result.lilypond_source;
    assert!(!text.contains("\\barNumberCheck"), "got:\n{}", text);
    assert!(text.contains("\\language \"english\""), "got:\n{}", text);
}

#[test]
fn test_lyrics_become_a_stanza() {
    let sung = |step: &str, syllabic: &str, text: &str| {
        note(
            step,
            4,
            1,
            "quarter",
            &format!(
                r#"<lyric number="1"><syllabic>{}</syllabic><text>{}</text></lyric>"#,
                syllabic, text
            ),
        )
    };
    let xml = one_part(&[format!(
        "{}{}{}{}",
        WALTZ_PROLOG,
        sung("C", "begin", "Wal"),
        sung("D", "end", "tzing"),
        sung("E", "single", "on")
    )]);
    let result = convert_musicxml_to_lilypond(&xml, None).unwrap();
    let text = &result.lilypond_source;
    assert!(text.contains("\\lyricmode"), "got:\n{}", text);
    assert!(text.contains("\"Wal\" -- \"tzing\""), "got:\n{}", text);
}

#[test]
fn test_same_score_both_formats() {
    let (lilypond, guido) = convert_musicxml(&two_bar_waltz(), None).unwrap();
    assert!(lilypond.lilypond_source.contains("\\version"));
    assert!(
        guido.guido_source.starts_with("{\n["),
        "got:\n{}",
        guido.guido_source
    );
}

#[test]
fn test_invalid_input_reports_a_parse_error() {
    let error = convert_musicxml_to_lilypond("not xml at all", None).unwrap_err();
    assert!(!error.is_internal());
    assert!(error.to_string().starts_with("XML parsing failed"), "got {}", error);
}

#[test]
fn test_double_tremolo_becomes_a_tremolo_repeat() {
    let prolog = r#"<attributes><divisions>1</divisions>
        <time><beats>4</beats><beat-type>4</beat-type></time><clef><sign>G</sign><line>2</line></clef></attributes>"#;
    let tremolo = |kind: &str| {
        format!(
            r#"<notations><ornaments><tremolo type="{}">2</tremolo></ornaments></notations>"#,
            kind
        )
    };
    let xml = one_part(&[format!(
        "{}{}{}",
        prolog,
        note("C", 4, 2, "half", &tremolo("start")),
        note("E", 4, 2, "half", &tremolo("stop"))
    )]);
    let text = convert_musicxml_to_lilypond(&xml, None)
        .expect("conversion should succeed")
        .lilypond_source;

    assert!(text.contains("\\repeat tremolo 8 {"), "two beams over a whole note:\n{}", text);
    assert!(text.contains("c'16"), "got:\n{}", text);
}
