// MusicXML to Guido, end to end

mod common;

use common::*;
use score_bridge::guido::GuidoElement;
use score_bridge::msr::basics::Rational;
use score_bridge::{
    convert_musicxml_to_guido, msr_to_guido, musicxml_to_msr, GuidoSettings, TranslationSettings,
};

fn guido_of(xml: &str, settings: &GuidoSettings) -> GuidoElement {
    let built = musicxml_to_msr(xml).expect("score should build");
    msr_to_guido(&built.score, settings).expect("guido should build").guido
}

#[test]
fn test_two_bar_waltz() {
    let result = convert_musicxml_to_guido(&two_bar_waltz(), None)
        .expect("conversion should succeed");
    let text = &result.guido_source;

    assert_eq!(text.matches("\\staff<").count(), 1, "one staff opened:\n{}", text);
    assert!(text.contains("\\meter<\"3/4\", autoMeasuresNum=\"system\">"), "got:\n{}", text);
    assert!(text.contains("\\clef<\"g2\">"), "got:\n{}", text);
    assert!(text.contains("\\title<\"Fixture\">"), "got:\n{}", text);
    assert!(text.contains("c1/4 d1/4 e1/4"), "got:\n{}", text);
    assert!(text.trim_end().ends_with("\\endBar ]\n}"), "got:\n{}", text);

    assert_eq!(result.stats.total_measures, 2);
    assert_eq!(result.stats.total_quarter_notes(), 6.0);
    assert_eq!(result.stats.parts_available, 1);
    assert_eq!(result.stats.total_staves, 1);

    let guido = guido_of(&two_bar_waltz(), &GuidoSettings::default());
    assert_eq!(guido.notes().len(), 6);
    assert!(guido.notes().iter().all(|note| note.duration == Some((1, 4))));
}

#[test]
fn test_meters_and_clefs() {
    let attributes = r#"<attributes><divisions>1</divisions>
        <time symbol="common"><beats>4</beats><beat-type>4</beat-type></time>
        <clef><sign>F</sign><line>4</line><clef-octave-change>-1</clef-octave-change></clef></attributes>"#;
    let composite = r#"<attributes><divisions>2</divisions><time><beats>3</beats><beat-type>8</beat-type><beats>2</beats><beat-type>8</beat-type></time>
        <clef><sign>C</sign><line>3</line></clef></attributes>"#;
    let xml = one_part(&[
        format!("{}{}", attributes, note("C", 3, 4, "whole", "")),
        format!(
            "{}{}{}",
            composite,
            note("C", 4, 3, "quarter", "<dot/>"),
            note("D", 4, 2, "quarter", "")
        ),
    ]);
    let guido = guido_of(&xml, &GuidoSettings::default());

    let meters: Vec<Option<&str>> = guido.tags_named("meter").iter().map(|tag| tag.text()).collect();
    assert_eq!(meters, vec![Some("C"), Some("3/8+2/8")]);
    let clefs: Vec<Option<&str>> = guido.tags_named("clef").iter().map(|tag| tag.text()).collect();
    assert_eq!(clefs, vec![Some("f-8"), Some("alto")]);
}

#[test]
fn test_unknown_clef_is_reported_and_skipped() {
    let attributes = r#"<attributes><divisions>1</divisions><clef><sign>jianpu</sign></clef></attributes>"#;
    let xml = one_part(&[format!("{}{}", attributes, quarter("C"))]);

    let result = convert_musicxml_to_guido(&xml, None).unwrap();
    assert!(!result.guido_source.contains("\\clef"), "got:\n{}", result.guido_source);
    assert!(result.diagnostics.has_kind("unknown_clef_sign"));
}

#[test]
fn test_no_offsets_at_zero_position() {
    let direction = |attributes: &str| {
        format!(
            r#"<direction><direction-type><dynamics {}><p/></dynamics></direction-type></direction>"#,
            attributes
        )
    };
    let xml = one_part(&[format!(
        "{}{}{}{}{}{}",
        WALTZ_PROLOG,
        direction(""),
        quarter("C"),
        direction(r#"default-x="10" relative-y="-5""#),
        quarter("D"),
        quarter("E")
    )]);
    let guido = guido_of(&xml, &GuidoSettings::default());

    let dynamics = guido.tags_named("intens");
    assert_eq!(dynamics.len(), 2);
    assert_eq!(dynamics[0].to_string(), "\\intens<\"p\">");
    assert_eq!(dynamics[1].named_param("dx"), Some("2hs"));
    assert_eq!(dynamics[1].named_param("dy"), Some("-1hs"));

    let without_positions = GuidoSettings {
        generate_positions: false,
        ..GuidoSettings::default()
    };
    let guido = guido_of(&xml, &without_positions);
    assert!(guido.tags_named("intens").iter().all(|tag| tag.params.len() == 1));
}

#[test]
fn test_bars_and_comments_on_request() {
    let settings = TranslationSettings {
        guido: GuidoSettings {
            generate_bars: true,
            generate_comments: true,
            ..GuidoSettings::default()
        },
        ..TranslationSettings::default()
    };
    let result = convert_musicxml_to_guido(&two_bar_waltz(), Some(settings)).unwrap();
    let text = &result.guido_source;
    assert!(text.contains("autoBarlines=\"off\""), "got:\n{}", text);
    assert_eq!(text.matches("\\bar ").count(), 1, "one bar between two measures:\n{}", text);
    assert!(text.contains("(* meas. 1 *)") && text.contains("(* meas. 2 *)"));
}

#[test]
fn test_piano_staves_are_braced() {
    let piano = r#"<attributes><divisions>1</divisions><staves>2</staves>
        <time><beats>3</beats><beat-type>4</beat-type></time>
        <clef number="1"><sign>G</sign><line>2</line></clef>
        <clef number="2"><sign>F</sign><line>4</line></clef></attributes>"#;
    let lower = "<note><pitch><step>C</step><octave>3</octave></pitch><duration>3</duration><voice>5</voice><type>half</type><dot/><staff>2</staff></note>";
    let xml = one_part(&[format!(
        "{}{}<backup><duration>3</duration></backup>{}",
        piano,
        note("C", 5, 3, "half", "<dot/><staff>1</staff>"),
        lower
    )]);
    let guido = guido_of(&xml, &GuidoSettings::default());

    assert_eq!(guido.children().len(), 2, "one sequence per voice");
    let accolades = guido.tags_named("accol");
    assert_eq!(accolades.len(), 1);
    assert_eq!(accolades[0].named_param("range"), Some("\"1-2\""));
    let staves: Vec<String> = guido.tags_named("staff").iter().map(|tag| tag.to_string()).collect();
    assert_eq!(staves, vec!["\\staff<1>", "\\staff<2>"]);
}

/// Two one-staff parts inside a part group with the given settings
fn grouped_duet(symbol: &str, barline: &str) -> String {
    let part_list = format!(
        r#"<part-group number="1" type="start"><group-symbol>{}</group-symbol><group-barline>{}</group-barline></part-group>
        <score-part id="P1"><part-name>Violin</part-name></score-part>
        <score-part id="P2"><part-name>Viola</part-name></score-part>
        <part-group number="1" type="stop"/>"#,
        symbol, barline
    );
    let measure = format!(
        r#"<measure number="1">{}{}{}{}</measure>"#,
        WALTZ_PROLOG,
        quarter("C"),
        quarter("D"),
        quarter("E")
    );
    let parts = format!(
        r#"<part id="P1">{}</part><part id="P2">{}</part>"#,
        measure, measure
    );
    score(&part_list, &parts)
}

fn ranges_of(guido: &GuidoElement, tag: &str) -> Vec<String> {
    guido
        .tags_named(tag)
        .iter()
        .filter_map(|tag| tag.named_param("range"))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_group_without_barline_gets_no_system_bar_format() {
    let guido = guido_of(&grouped_duet("bracket", "no"), &GuidoSettings::default());

    assert_eq!(ranges_of(&guido, "accol"), vec!["\"1-2\""], "bracket draws an accolade");
    let bar_formats = ranges_of(&guido, "barFormat");
    assert!(
        !bar_formats.contains(&"\"1-2\"".to_string()),
        "bar lines are not joined across the group: {:?}",
        bar_formats
    );
    assert_eq!(
        bar_formats,
        vec!["\"1\"", "\"2\""],
        "each staff keeps a bar line format of its own"
    );
    let lonely = guido.tags_named("barFormat")[0].to_string();
    assert_eq!(lonely, "\\barFormat<style=\"system\", range=\"1\">");
}

#[test]
fn test_group_without_symbol_gets_no_accolade() {
    let guido = guido_of(&grouped_duet("none", "yes"), &GuidoSettings::default());

    assert!(guido.tags_named("accol").is_empty(), "nothing to draw for symbol none");
    assert_eq!(ranges_of(&guido, "barFormat"), vec!["\"1-2\""]);
    let bar_format = guido.tags_named("barFormat")[0].to_string();
    assert!(bar_format.contains("style=\"system\""), "got {}", bar_format);
}

/// Bb clarinet: 3/4 for two bars, then a bar of 2/4
fn clarinet_with_meter_change() -> String {
    let prolog = WALTZ_PROLOG.replace(
        "</clef></attributes>",
        "</clef><transpose><diatonic>-1</diatonic><chromatic>-2</chromatic></transpose></attributes>",
    );
    one_part(&[
        format!("{}{}{}{}", prolog, quarter("C"), quarter("D"), quarter("E")),
        format!("{}{}{}", quarter("F"), quarter("G"), quarter("A")),
        format!(
            "<attributes><time><beats>2</beats><beat-type>4</beat-type></time></attributes>{}{}",
            quarter("B"),
            quarter("C")
        ),
    ])
}

fn stats_of(xml: &str, settings: &GuidoSettings) -> score_bridge::GuidoStats {
    let built = musicxml_to_msr(xml).expect("score should build");
    msr_to_guido(&built.score, settings).expect("guido should build").stats
}

#[test]
fn test_stats_map_positions_to_measures_and_meters() {
    let stats = stats_of(&clarinet_with_meter_change(), &GuidoSettings::default());

    let measures: Vec<(Rational, u32)> = stats
        .measure_positions
        .iter()
        .map(|measure| (measure.position, measure.number))
        .collect();
    assert_eq!(
        measures,
        vec![(Rational::from_integer(0), 1), (Rational::new(3, 4), 2), (Rational::new(3, 2), 3)]
    );
    assert_eq!(stats.measure_at(Rational::from_integer(1)), Some(2));

    let meters: Vec<(Rational, &str)> = stats
        .time_signatures
        .iter()
        .map(|meter| (meter.position, meter.text.as_str()))
        .collect();
    assert_eq!(
        meters,
        vec![(Rational::from_integer(0), "3/4"), (Rational::new(3, 2), "2/4")]
    );
    let last = stats.meter_at(Rational::new(7, 4)).expect("a meter is in effect");
    assert_eq!(last.measure_length, Some(Rational::new(1, 2)));

    assert_eq!(stats.begin_position, Rational::from_integer(0));
    assert_eq!(stats.end_position, Rational::from_integer(2));
}

#[test]
fn test_stats_carry_the_first_part_layout_and_transposition() {
    let stats = stats_of(&clarinet_with_meter_change(), &GuidoSettings::default());

    let transposition = stats.transposition.expect("the part transposes");
    assert_eq!(transposition.instrument_name, "Bb");
    assert_eq!(transposition.chromatic_steps, -2);
    assert_eq!(stats.first_part_staves, 1);
    assert_eq!(stats.first_part_clefs, vec!["g2"]);

    let concert = stats_of(&two_bar_waltz(), &GuidoSettings::default());
    assert!(concert.transposition.is_none());
}

#[test]
fn test_stats_follow_the_written_range() {
    let settings = GuidoSettings {
        begin_measure: 2,
        end_measure: 2,
        ..GuidoSettings::default()
    };
    let stats = stats_of(&clarinet_with_meter_change(), &settings);

    assert_eq!(stats.total_measures, 1);
    assert_eq!(stats.measure_positions.len(), 1);
    assert_eq!(stats.measure_positions[0].number, 2);
    assert_eq!(stats.begin_position, Rational::new(3, 4));
    assert_eq!(stats.end_position, Rational::new(3, 2));
    assert_eq!(
        stats.meter_at(stats.begin_position).map(|meter| meter.text.as_str()),
        Some("3/4"),
        "meters before the range are still known"
    );
}
