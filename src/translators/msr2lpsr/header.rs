//! Score level data of the LilyPond document: header fields, paper block,
//! global staff size and credit comments

use crate::diagnostics::{DiagnosticMark, Diagnostics};
use crate::lpsr::tree::{format_number, LpsrPaper, LpsrScore};
use crate::msr::score::{Identification, PageGeometry, Score};
use crate::settings::LpsrSettings;

/// Indent of the first system when parts have names, in millimeters
const NAMED_PARTS_INDENT: f32 = 20.0;
const ABBREVIATED_PARTS_INDENT: f32 = 10.0;

/// A movement title (or number) alone is promoted to the work title (or
/// number)
pub(crate) fn correct_titles(
    identification: &mut Identification,
    diagnostics: &mut Diagnostics,
    line: u32,
) {
    if identification.work_title.is_none() {
        if let Some(title) = identification.movement_title.take() {
            diagnostics.add(DiagnosticMark::info(
                line,
                "title_correction",
                "movement-title",
                format!("movement title \"{}\" used as the work title", title),
            ));
            identification.work_title = Some(title);
        }
    }
    if identification.work_number.is_none() {
        if let Some(number) = identification.movement_number.take() {
            diagnostics.add(DiagnosticMark::info(
                line,
                "title_correction",
                "movement-number",
                format!("movement number \"{}\" used as the work number", number),
            ));
            identification.work_number = Some(number);
        }
    }
}

fn joined(names: &[String]) -> Option<String> {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

pub(crate) fn fill_header(lpsr: &mut LpsrScore, settings: &LpsrSettings) {
    let identification = lpsr.msr.identification.clone();
    let header = &mut lpsr.header;

    if let Some(title) = &identification.work_title {
        header.set("title", title);
    }
    if let Some(subtitle) = &identification.movement_title {
        header.set("subtitle", subtitle);
    }
    if let Some(opus) = &identification.work_number {
        header.set("opus", opus);
    }
    if let Some(piece) = &identification.movement_number {
        header.set("piece", piece);
    }

    let fields = [
        ("composer", settings.composer.clone(), &identification.composers),
        ("arranger", settings.arranger.clone(), &identification.arrangers),
        ("poet", settings.poet.clone(), &identification.poets),
        ("lyricist", settings.lyricist.clone(), &identification.lyricists),
        ("copyright", settings.rights.clone(), &identification.rights),
    ];
    for (name, overridden, found) in fields {
        if let Some(value) = overridden.or_else(|| joined(found)) {
            header.set(name, &value);
        }
    }
    if let Some(translator) = joined(&identification.translators) {
        header.set("translator", &translator);
    }

    if let Some(software) = settings.software.clone().or_else(|| joined(&identification.software)) {
        header.note("software", &software);
    }
    if let Some(date) = &identification.encoding_date {
        header.note("encodingDate", date);
    }
}

pub(crate) fn paper_from(geometry: &PageGeometry, score: &Score) -> LpsrPaper {
    let millimeters = |tenths: Option<f32>| tenths.and_then(|t| geometry.tenths_to_millimeters(t));

    let parts = score.parts();
    let named = parts.iter().any(|p| !p.name.is_empty() || !p.instrument_name.is_empty());
    let abbreviated = parts.iter().any(|p| !p.abbreviation.is_empty());

    LpsrPaper {
        paper_width: millimeters(geometry.page_width),
        paper_height: millimeters(geometry.page_height),
        top_margin: millimeters(geometry.top_margin),
        bottom_margin: millimeters(geometry.bottom_margin),
        left_margin: millimeters(geometry.left_margin),
        right_margin: millimeters(geometry.right_margin),
        between_system_space: millimeters(geometry.staff_distance),
        indent: named.then_some(NAMED_PARTS_INDENT),
        short_indent: abbreviated.then_some(ABBREVIATED_PARTS_INDENT),
    }
}

/// Use the score's own staff size; the line stays commented out when it
/// matches the configured default
pub(crate) fn set_global_staff_size(lpsr: &mut LpsrScore, settings: &LpsrSettings) {
    let size = lpsr
        .msr
        .page_geometry
        .global_staff_size()
        .unwrap_or(settings.global_staff_size);
    lpsr.global_staff_size.value = format_number(size);
    lpsr.global_staff_size.commented_out = (size - settings.global_staff_size).abs() < 0.01;
}

pub(crate) fn credit_comments(score: &Score) -> Vec<String> {
    score
        .credits
        .iter()
        .flat_map(|credit| {
            credit
                .words
                .iter()
                .filter(|w| !w.trim().is_empty())
                .map(move |w| format!("credit page {}: {}", credit.page, w.replace('\n', " ")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_title_becomes_work_title() {
        let mut identification = Identification {
            movement_title: Some("Allegro".to_string()),
            movement_number: Some("1".to_string()),
            ..Identification::default()
        };
        let mut diagnostics = Diagnostics::new();
        correct_titles(&mut identification, &mut diagnostics, 3);
        assert_eq!(identification.work_title.as_deref(), Some("Allegro"));
        assert_eq!(identification.movement_title, None);
        assert_eq!(identification.work_number.as_deref(), Some("1"));
        assert!(diagnostics.has_kind("title_correction"));
    }

    #[test]
    fn test_work_title_is_kept() {
        let mut identification = Identification {
            work_title: Some("Sonata".to_string()),
            movement_title: Some("Allegro".to_string()),
            ..Identification::default()
        };
        let mut diagnostics = Diagnostics::new();
        correct_titles(&mut identification, &mut diagnostics, 3);
        assert_eq!(identification.movement_title.as_deref(), Some("Allegro"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_settings_override_creators() {
        let mut score = Score::new(1);
        score.identification.composers = vec!["J. S. Bach".to_string()];
        score.identification.rights = vec!["Public domain".to_string()];
        score.identification.encoding_date = Some("2011-08-08".to_string());
        let settings = LpsrSettings {
            composer: Some("Bach".to_string()),
            ..LpsrSettings::default()
        };
        let mut lpsr = LpsrScore::new(score, &settings);
        fill_header(&mut lpsr, &settings);
        assert_eq!(lpsr.header.get("composer"), Some("Bach"));
        assert_eq!(lpsr.header.get("copyright"), Some("Public domain"));
        let date = lpsr.header.assocs().iter().find(|a| a.name == "encodingDate").unwrap();
        assert!(date.commented_out, "encoding date is informational");
    }

    #[test]
    fn test_global_staff_size_from_scaling() {
        let mut score = Score::new(1);
        score.page_geometry.millimeters = Some(7.0);
        score.page_geometry.tenths = Some(40.0);
        let settings = LpsrSettings::default();
        let mut lpsr = LpsrScore::new(score, &settings);
        set_global_staff_size(&mut lpsr, &settings);
        assert_eq!(lpsr.global_staff_size.value, "19.92");
        assert!(!lpsr.global_staff_size.commented_out);

        let mut plain = LpsrScore::new(Score::new(1), &settings);
        set_global_staff_size(&mut plain, &settings);
        assert_eq!(plain.global_staff_size.value, "20");
        assert!(plain.global_staff_size.commented_out);
    }
}
