// Shared MusicXML fixtures for the integration tests

#![allow(dead_code)]

pub const ONE_PART_LIST: &str = r#"<score-part id="P1"><part-name>Flute</part-name></score-part>"#;

/// Divisions, C major, 3/4 and a treble clef
pub const WALTZ_PROLOG: &str = r#"<attributes><divisions>1</divisions><key><fifths>0</fifths></key>
    <time><beats>3</beats><beat-type>4</beat-type></time><clef><sign>G</sign><line>2</line></clef></attributes>"#;

pub fn score(part_list: &str, parts: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <work><work-title>Fixture</work-title></work>
  <identification><creator type="composer">Anon</creator></identification>
  <part-list>{}</part-list>
  {}
</score-partwise>"#,
        part_list, parts
    )
}

/// Single part `P1` made of the given measure bodies, numbered from 1
pub fn one_part(measures: &[String]) -> String {
    let body: String = measures
        .iter()
        .enumerate()
        .map(|(index, content)| format!(r#"<measure number="{}">{}</measure>"#, index + 1, content))
        .collect();
    score(ONE_PART_LIST, &format!(r#"<part id="P1">{}</part>"#, body))
}

pub fn note(step: &str, octave: i32, duration: u32, note_type: &str, extra: &str) -> String {
    format!(
        "<note><pitch><step>{}</step><octave>{}</octave></pitch><duration>{}</duration><voice>1</voice><type>{}</type>{}</note>",
        step, octave, duration, note_type, extra
    )
}

pub fn quarter(step: &str) -> String {
    note(step, 4, 1, "quarter", "")
}

/// Two measures of 3/4 in quarters: C D E | F G A
pub fn two_bar_waltz() -> String {
    one_part(&[
        format!("{}{}{}{}", WALTZ_PROLOG, quarter("C"), quarter("D"), quarter("E")),
        format!("{}{}{}", quarter("F"), quarter("G"), quarter("A")),
    ])
}
