//! LilyPond printer
//!
//! Voice and stanza definitions and the score block are rendered in code,
//! one measure per line. The document around them (version, header, paper,
//! layout) comes from `templates/score.ly.mustache`.

use crate::errors::Result;
use crate::lpsr::tree::{
    format_number, staff_context_name, ContextKind, LpsrPaper, LpsrScore, PartBlock,
    PartGroupBlock, PartGroupBlockElement, SchemeFunctions, ScoreElement, StaffBlock,
    StanzaDefinition, VariableValueAssoc, VoiceDefinition,
};
use crate::msr::attributes::{Barline, BarlineLocation, BarlineStyle, Clef, Key, KeyMode, Tempo, Time, TimeSymbol, Transpose};
use crate::msr::basics::{zero, NoteType, Placement, Rational};
use crate::msr::chord::Chord;
use crate::msr::grace::{DoubleTremolo, GraceElement, GraceNotesGroup, TremoloElement};
use crate::msr::harmony::{DegreeType, Figure, FiguredBass, Harmony};
use crate::msr::lyrics::{ExtendKind, SyllableKind};
use crate::msr::marks::{
    ArticulationKind, NoteMark, OctaveShift, OctaveShiftKind, OrnamentKind, SlurKind,
    SpannerKind, SpannerType, TechnicalKind, TieKind, WedgeKind,
};
use crate::msr::measure::{Measure, MeasureElement, MeasureKind};
use crate::msr::note::{Note, NoteContent};
use crate::msr::part_group::PartGroupSymbol;
use crate::msr::staff::StaffKind;
use crate::msr::tuplet::{Tuplet, TupletElement, TupletLineShape, TupletShowNumber};
use crate::msr::voice::{VoiceElement, VoiceKind};
use crate::settings::{LpsrSettings, PitchLanguage};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const SCORE_TEMPLATE: &str = include_str!("templates/score.ly.mustache");

const TUPLETS_CURVED_BRACKETS: &str = r#"tupletsCurvedBrackets = {
  \override TupletBracket.stencil = #ly:slur::print
  \override TupletBracket.thickness = #1.2
  \override TupletBracket.control-points =
    #(lambda (grob)
       (let* ((x-pos (ly:grob-property grob 'X-positions))
              (pos (ly:grob-property grob 'positions))
              (dir (ly:grob-property grob 'direction)))
         (list (cons (car x-pos) (car pos))
               (cons (+ (car x-pos) 1) (+ (car pos) dir))
               (cons (- (cdr x-pos) 1) (+ (cdr pos) dir))
               (cons (cdr x-pos) (cdr pos)))))
}"#;

const CUSTOM_SHORT_BARLINE: &str = r#"#(define ((make-custom-short-bar-line x y) grob extent)
   (let* ((line-thickness (ly:staff-symbol-line-thickness grob))
          (thickness (* (ly:grob-property grob 'hair-thickness 1) line-thickness))
          (height (interval-length extent))
          (blot (ly:output-def-lookup (ly:grob-layout grob) 'blot-diameter)))
     (ly:round-filled-box (cons 0 thickness) (cons (* height x) (* height y)) blot)))

#(add-bar-glyph-print-procedure "/" (make-custom-short-bar-line 0.1 0.5))
#(define-bar-line "/" "/" #f #f)"#;

const EDITORIAL_ACCIDENTAL: &str = r#"editorialAccidental =
#(define-music-function (note) (ly:music?)
   #{ \once \override Accidental.parenthesized = ##t $note #})"#;

/// Dynamics LilyPond knows as `\name`
const PREDEFINED_DYNAMICS: [&str; 20] = [
    "ppppp", "pppp", "ppp", "pp", "p", "mp", "mf", "f", "ff", "fff", "ffff", "fffff", "fp",
    "sf", "sff", "sp", "spp", "sfz", "rfz", "n",
];

// ============================================================================
// TEMPLATE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct Line {
    text: String,
}

impl Line {
    fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Data for `score.ly.mustache`
#[derive(Debug, Clone, Serialize)]
struct TemplateContext {
    version: String,
    language: String,
    comments: Vec<Line>,
    global_staff_size: String,
    has_header: bool,
    header: Vec<Line>,
    has_paper: bool,
    paper: Vec<Line>,
    layout: Vec<Line>,
    has_scheme_functions: bool,
    scheme_functions: String,
    definitions: String,
    score_block: String,
}

/// Render an LPSR tree as a LilyPond document
pub fn render(score: &LpsrScore, settings: &LpsrSettings) -> Result<String> {
    let printer = Printer {
        language: settings.language,
        bar_checks: settings.generate_bar_checks,
    };
    let context = printer.template_context(score);

    log::debug!(
        "rendering {} definition(s), {} part group block(s)",
        score.elements.len(),
        score.score_block.part_groups.len()
    );

    let template = mustache::compile_str(SCORE_TEMPLATE)?;
    Ok(template.render_to_string(&context)?)
}

// ============================================================================
// LEAF HELPERS
// ============================================================================

/// Escape a string for use inside LilyPond double quotes
pub fn escape_lilypond_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Note name of a step (0 = C) and alteration in the given language
pub fn pitch_name(step: u8, alteration: i8, language: PitchLanguage) -> String {
    let index = (step % 7) as usize;
    let (names, flat, sharp) = match language {
        PitchLanguage::Nederlands => (["c", "d", "e", "f", "g", "a", "b"], "es", "is"),
        PitchLanguage::English => (["c", "d", "e", "f", "g", "a", "b"], "f", "s"),
        PitchLanguage::Deutsch => (["c", "d", "e", "f", "g", "a", "h"], "es", "is"),
        PitchLanguage::Italiano => (["do", "re", "mi", "fa", "sol", "la", "si"], "b", "d"),
    };

    // German B flat is plain "b"
    if language == PitchLanguage::Deutsch && index == 6 && alteration == -1 {
        return "b".to_string();
    }

    let mut name = names[index].to_string();
    let suffix = if alteration < 0 { flat } else { sharp };
    for _ in 0..alteration.unsigned_abs() {
        name.push_str(suffix);
    }
    name
}

/// Absolute octave marks: `c` is octave 3, `c'` octave 4
pub fn octave_marks(octave: i8) -> String {
    if octave >= 3 {
        "'".repeat((octave - 3) as usize)
    } else {
        ",".repeat((3 - octave) as usize)
    }
}

fn note_type_duration(note_type: NoteType) -> &'static str {
    match note_type {
        NoteType::Maxima => "\\maxima",
        NoteType::Long => "\\longa",
        NoteType::Breve => "\\breve",
        NoteType::Whole => "1",
        NoteType::Half => "2",
        NoteType::Quarter => "4",
        NoteType::Eighth => "8",
        NoteType::N16th => "16",
        NoteType::N32nd => "32",
        NoteType::N64th => "64",
        NoteType::N128th => "128",
        NoteType::N256th => "256",
    }
}

/// LilyPond duration for a length in whole notes; a multiplied whole note
/// when no note type fits. Empty for a zero length.
pub fn duration_to_lilypond(length: Rational) -> String {
    if *length.numer() <= 0 {
        return String::new();
    }
    match NoteType::from_whole_notes(length) {
        Some((note_type, dots)) => {
            format!("{}{}", note_type_duration(note_type), ".".repeat(dots as usize))
        }
        None if length.is_integer() => format!("1*{}", length.numer()),
        None => format!("1*{}/{}", length.numer(), length.denom()),
    }
}

fn written_duration(graphic_type: Option<NoteType>, dots: u8, displayed: Rational) -> String {
    match graphic_type {
        Some(note_type) => format!("{}{}", note_type_duration(note_type), ".".repeat(dots as usize)),
        None => duration_to_lilypond(displayed),
    }
}

fn tremolo_suffix(marks: &[NoteMark]) -> String {
    marks
        .iter()
        .find_map(|mark| match mark {
            NoteMark::Tremolo(tremolo) if tremolo.marks > 0 => {
                Some(format!(":{}", 4u32 << tremolo.marks.min(5)))
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// Prefix a script with its direction; `-.` keeps its own neutral dash
fn directed(placement: Placement, script: &str) -> String {
    let direction = match placement {
        Placement::Above => "^",
        Placement::Below => "_",
        Placement::None => "",
    };
    match script.strip_prefix('-') {
        Some(rest) if direction.is_empty() => format!("-{}", rest),
        Some(rest) => format!("{}{}", direction, rest),
        None => format!("{}{}", direction, script),
    }
}

fn octave_shift_command(shift: &OctaveShift) -> &'static str {
    match (shift.kind, shift.size) {
        (OctaveShiftKind::Down, 15) => "\\ottava #2",
        (OctaveShiftKind::Down, _) => "\\ottava #1",
        (OctaveShiftKind::Up, 15) => "\\ottava #-2",
        (OctaveShiftKind::Up, _) => "\\ottava #-1",
        (OctaveShiftKind::Stop, _) => "\\ottava #0",
    }
}

/// Post-event text for a note mark; empty for marks printed elsewhere
fn mark_to_lilypond(mark: &NoteMark) -> String {
    match mark {
        NoteMark::Articulation(articulation) => {
            let script = match articulation.kind {
                ArticulationKind::Accent => "->",
                ArticulationKind::StrongAccent => "-^",
                ArticulationKind::Staccato => "-.",
                ArticulationKind::Tenuto => "--",
                ArticulationKind::DetachedLegato => "-_",
                ArticulationKind::Staccatissimo | ArticulationKind::Spiccato => "-!",
                ArticulationKind::Arpeggiato => "\\arpeggio",
                ArticulationKind::NonArpeggiato => return String::new(),
                ArticulationKind::BreathMark => return " \\breathe".to_string(),
                ArticulationKind::Caesura => {
                    return " \\once \\override BreathingSign.text = \\markup { \\musicglyph \"scripts.caesura.curved\" } \\breathe"
                        .to_string()
                }
            };
            directed(articulation.placement, script)
        }
        NoteMark::Ornament(ornament) => {
            let script = match ornament.kind {
                OrnamentKind::TrillMark => "\\trill",
                OrnamentKind::Turn => "\\turn",
                OrnamentKind::InvertedTurn => "\\reverseturn",
                OrnamentKind::Mordent => "\\mordent",
                OrnamentKind::InvertedMordent => "\\prall",
            };
            directed(ornament.placement, script)
        }
        NoteMark::Technical(technical) => {
            let script = match &technical.kind {
                TechnicalKind::UpBow => "\\upbow".to_string(),
                TechnicalKind::DownBow => "\\downbow".to_string(),
                TechnicalKind::Harmonic => "\\flageolet".to_string(),
                TechnicalKind::OpenString => "\\open".to_string(),
                TechnicalKind::ThumbPosition => "\\thumb".to_string(),
                TechnicalKind::SnapPizzicato => "\\snappizzicato".to_string(),
                TechnicalKind::Fingering(finger) => format!("-{}", finger),
                TechnicalKind::StringNumber(string) => return format!("\\{}", string),
                TechnicalKind::Fret(fret) => format!("-\\markup {{ \\small \"{}\" }}", fret),
                TechnicalKind::Pluck(text) => {
                    format!("-\\markup {{ \\italic \"{}\" }}", escape_lilypond_string(text))
                }
            };
            directed(technical.placement, &script)
        }
        NoteMark::Fermata(fermata) => {
            if fermata.inverted {
                "_\\fermata".to_string()
            } else {
                "\\fermata".to_string()
            }
        }
        NoteMark::Dynamics(dynamics) => {
            if PREDEFINED_DYNAMICS.contains(&dynamics.text.as_str()) {
                directed(dynamics.placement, &format!("\\{}", dynamics.text))
            } else {
                directed(
                    dynamics.placement,
                    &format!(
                        "-\\markup {{ \\dynamic \"{}\" }}",
                        escape_lilypond_string(&dynamics.text)
                    ),
                )
            }
        }
        NoteMark::Words(words) => {
            let mut markup = format!("\"{}\"", escape_lilypond_string(&words.text));
            if words.italic {
                markup = format!("\\italic {}", markup);
            }
            if words.bold {
                markup = format!("\\bold {}", markup);
            }
            let direction = if words.placement == Placement::Below { "_" } else { "^" };
            format!("{}\\markup {{ {} }}", direction, markup)
        }
        NoteMark::Wedge(wedge) => match wedge.kind {
            WedgeKind::Crescendo => "\\<".to_string(),
            WedgeKind::Diminuendo => "\\>".to_string(),
            WedgeKind::Stop => "\\!".to_string(),
        },
        NoteMark::Slur(slur) => {
            let symbol = match slur.kind {
                SlurKind::Start => "(",
                SlurKind::Stop => ")",
                SlurKind::Continue => return String::new(),
            };
            if slur.number > 1 {
                format!("\\={}{}", slur.number, symbol)
            } else {
                symbol.to_string()
            }
        }
        NoteMark::Spanner(spanner) => match (spanner.kind, spanner.spanner_type) {
            (SpannerKind::Glissando | SpannerKind::Slide, SpannerType::Start) => {
                "\\glissando".to_string()
            }
            (SpannerKind::WavyLine, SpannerType::Start) => "\\startTrillSpan".to_string(),
            (SpannerKind::WavyLine, SpannerType::Stop) => "\\stopTrillSpan".to_string(),
            (SpannerKind::Dashes, SpannerType::Start) => "\\startTextSpan".to_string(),
            (SpannerKind::Dashes, SpannerType::Stop) => "\\stopTextSpan".to_string(),
            _ => String::new(),
        },
        NoteMark::Tremolo(_) | NoteMark::OctaveShift(_) => String::new(),
    }
}

/// `\clef "..."`; `None` for signs LilyPond has no clef for
pub fn clef_to_lilypond(clef: &Clef) -> Option<String> {
    let name = match (clef.sign.as_str(), clef.line) {
        ("G", 1) => "french",
        ("G", _) => "treble",
        ("F", 3) => "varbaritone",
        ("F", 5) => "subbass",
        ("F", _) => "bass",
        ("C", 1) => "soprano",
        ("C", 2) => "mezzosoprano",
        ("C", 4) => "tenor",
        ("C", 5) => "baritone",
        ("C", _) => "alto",
        ("percussion", _) => "percussion",
        ("TAB", _) => "tab",
        _ => return None,
    };
    let transposition = match clef.octave_change {
        1 => "^8",
        -1 => "_8",
        2 => "^15",
        -2 => "_15",
        _ => "",
    };
    Some(format!("\\clef \"{}{}\"", name, transposition))
}

pub fn key_to_lilypond(key: &Key, language: PitchLanguage) -> String {
    let (step, alteration) = key.tonic();
    let mode = match key.mode {
        KeyMode::None => KeyMode::Major.name(),
        other => other.name(),
    };
    format!("\\key {} \\{}", pitch_name(step, alteration, language), mode)
}

pub fn time_to_lilypond(time: &Time) -> String {
    if time.senza_misura {
        return "\\cadenzaOn".to_string();
    }
    let hidden = if time.print_object {
        ""
    } else {
        "\\once \\omit Staff.TimeSignature "
    };

    let body = match time.items.as_slice() {
        [] if time.symbol == TimeSymbol::Cut => "\\defaultTimeSignature \\time 2/2".to_string(),
        [] => "\\defaultTimeSignature \\time 4/4".to_string(),
        [item] if !item.beats.contains('+') => {
            let style = match time.symbol {
                TimeSymbol::Common | TimeSymbol::Cut => "\\defaultTimeSignature ",
                TimeSymbol::SingleNumber => {
                    "\\once \\override Staff.TimeSignature.style = #'single-digit "
                }
                _ => "\\numericTimeSignature ",
            };
            format!("{}\\time {}/{}", style, item.beats, item.beat_type)
        }
        items => {
            let groups: Vec<String> = items
                .iter()
                .map(|item| {
                    let beats: Vec<&str> = item.beats.split('+').map(str::trim).collect();
                    format!("({} {})", beats.join(" "), item.beat_type)
                })
                .collect();
            format!("\\compoundMeter #'({})", groups.join(" "))
        }
    };
    format!("{}{}", hidden, body)
}

/// `\transposition` naming the sounding pitch of a written middle C
pub fn transpose_to_lilypond(transpose: &Transpose, language: PitchLanguage) -> String {
    const NATURAL_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
    let step = transpose.diatonic.rem_euclid(7);
    let octaves = transpose.diatonic.div_euclid(7);
    let natural = NATURAL_SEMITONES[step as usize] + 12 * octaves;
    let alteration = (transpose.chromatic - natural).clamp(-2, 2) as i8;
    let octave = (4 + octaves + transpose.octave_change) as i8;
    format!(
        "\\transposition {}{}",
        pitch_name(step as u8, alteration, language),
        octave_marks(octave)
    )
}

fn barline_to_lilypond(barline: &Barline) -> Option<String> {
    let mut parts = Vec::new();
    if !barline.is_structural_only() {
        let glyph = match barline.style {
            BarlineStyle::None => Some(""),
            BarlineStyle::Regular if barline.location == BarlineLocation::Middle => Some("|"),
            BarlineStyle::Regular => None,
            BarlineStyle::Dotted => Some(";"),
            BarlineStyle::Dashed => Some("!"),
            BarlineStyle::Heavy => Some("."),
            BarlineStyle::LightLight => Some("||"),
            BarlineStyle::LightHeavy => Some("|."),
            BarlineStyle::HeavyLight => Some(".|"),
            BarlineStyle::HeavyHeavy => Some(".."),
            BarlineStyle::Tick => Some("'"),
            BarlineStyle::Short => Some("/"),
        };
        if let Some(glyph) = glyph {
            parts.push(format!("\\bar \"{}\"", glyph));
        }
    }
    if barline.segno {
        parts.push("\\mark \\markup { \\musicglyph \"scripts.segno\" }".to_string());
    }
    if barline.coda {
        parts.push("\\mark \\markup { \\musicglyph \"scripts.coda\" }".to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// A metronome figure, or a range such as `60-70`
static PER_MINUTE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)(?:\s*-\s*(\d+))?\s*$").unwrap());

fn tempo_to_lilypond(tempo: &Tempo) -> Option<String> {
    let words = tempo
        .words
        .as_deref()
        .map(|w| format!("\"{}\"", escape_lilypond_string(w)));
    let per_minute = tempo.per_minute.as_deref().and_then(|text| {
        let captures = PER_MINUTE_REGEX.captures(text)?;
        match captures.get(2) {
            Some(high) => Some(format!("{} - {}", &captures[1], high.as_str())),
            None => Some(captures[1].to_string()),
        }
    });

    match (words, per_minute) {
        (words, Some(bpm)) => {
            let unit = tempo.beat_unit.map(note_type_duration).unwrap_or("4");
            let text = words.map(|w| format!("{} ", w)).unwrap_or_default();
            Some(format!(
                "\\tempo {}{}{} = {}",
                text,
                unit,
                ".".repeat(tempo.dots as usize),
                bpm
            ))
        }
        (Some(words), None) => Some(format!("\\tempo {}", words)),
        (None, None) => tempo
            .per_minute
            .as_deref()
            .map(|text| format!("\\tempo \"{}\"", escape_lilypond_string(text))),
    }
}

fn figure_to_lilypond(figure: &Figure) -> String {
    fn accidental(name: &str) -> &'static str {
        match name {
            "sharp" => "+",
            "flat" => "-",
            "natural" => "!",
            "double-sharp" | "sharp-sharp" => "++",
            "flat-flat" => "--",
            _ => "",
        }
    }

    let mut text = figure
        .number
        .map(|n| n.to_string())
        .unwrap_or_else(|| "_".to_string());
    if let Some(prefix) = &figure.prefix {
        text.push_str(accidental(prefix));
    }
    if let Some(suffix) = &figure.suffix {
        match suffix.as_str() {
            "backslash" => text.push_str("\\\\"),
            "slash" | "cross" => text.push('/'),
            other => text.push_str(accidental(other)),
        }
    }
    text
}

fn with_block(items: &[String]) -> String {
    if items.is_empty() {
        String::new()
    } else {
        format!(" \\with {{ {} }}", items.join(" "))
    }
}

fn push_line(out: &mut String, level: usize, text: &str) {
    out.push_str(&"  ".repeat(level));
    out.push_str(text);
    out.push('\n');
}

fn assoc_line(assoc: &VariableValueAssoc) -> Line {
    let value = if assoc.quoted {
        format!("\"{}\"", escape_lilypond_string(&assoc.value))
    } else {
        assoc.value.clone()
    };
    let prefix = if assoc.commented_out { "% " } else { "" };
    Line::new(format!("{}{} = {}", prefix, assoc.name, value))
}

fn paper_lines(paper: &LpsrPaper) -> Vec<Line> {
    [
        ("paper-width", paper.paper_width),
        ("paper-height", paper.paper_height),
        ("top-margin", paper.top_margin),
        ("bottom-margin", paper.bottom_margin),
        ("left-margin", paper.left_margin),
        ("right-margin", paper.right_margin),
        ("between-system-space", paper.between_system_space),
        ("indent", paper.indent),
        ("short-indent", paper.short_indent),
    ]
    .iter()
    .filter_map(|(name, value)| {
        value.map(|v| Line::new(format!("{} = {}\\mm", name, format_number(v))))
    })
    .collect()
}

fn scheme_functions_text(functions: &SchemeFunctions) -> String {
    let mut blocks = Vec::new();
    if functions.tuplets_curved_brackets {
        blocks.push(TUPLETS_CURVED_BRACKETS);
    }
    if functions.custom_short_barline {
        blocks.push(CUSTOM_SHORT_BARLINE);
    }
    if functions.editorial_accidentals {
        blocks.push(EDITORIAL_ACCIDENTAL);
    }
    blocks.join("\n\n")
}

// ============================================================================
// PRINTER
// ============================================================================

/// How a note prints its duration
enum DurationMode {
    /// Its own written duration
    Written,
    /// None: a member inside `< >`
    InChord,
    /// A duration imposed by the container
    Fixed(String),
}

struct Printer {
    language: PitchLanguage,
    bar_checks: bool,
}

impl Printer {
    fn template_context(&self, score: &LpsrScore) -> TemplateContext {
        let header: Vec<Line> = score.header.assocs().iter().map(assoc_line).collect();
        let paper = paper_lines(&score.paper);
        let scheme_functions = scheme_functions_text(&score.scheme_functions);

        let size = format!("#(set-global-staff-size {})", score.global_staff_size.value);
        let global_staff_size = if score.global_staff_size.commented_out {
            format!("% {}", size)
        } else {
            size
        };

        let mut definitions = String::new();
        for element in &score.elements {
            match element {
                ScoreElement::Voice(definition) => self.voice_definition(definition, &mut definitions),
                ScoreElement::Stanza(definition) => self.stanza_definition(definition, &mut definitions),
            }
            definitions.push('\n');
        }

        let mut score_block = String::new();
        for group in &score.score_block.part_groups {
            self.part_group_block(group, 2, &mut score_block);
        }

        TemplateContext {
            version: score.version.clone(),
            language: self.language.lilypond_name().to_string(),
            comments: score.comments.iter().map(Line::new).collect(),
            global_staff_size,
            has_header: !header.is_empty(),
            header,
            has_paper: !paper.is_empty(),
            paper,
            layout: score.layout.assocs.iter().map(assoc_line).collect(),
            has_scheme_functions: !scheme_functions.is_empty(),
            scheme_functions,
            definitions,
            score_block: score_block.trim_end().to_string(),
        }
    }

    // ------------------------------------------------------------------
    // definitions
    // ------------------------------------------------------------------

    fn voice_definition(&self, definition: &VoiceDefinition, out: &mut String) {
        let voice = &definition.voice;
        let part_id = voice.uplink.as_ref().map(|key| key.part_id.as_str()).unwrap_or("");
        let mode = match voice.kind {
            VoiceKind::Regular => "\\absolute",
            VoiceKind::Harmony => "\\chordmode",
            VoiceKind::FiguredBass => "\\figuremode",
        };
        push_line(out, 0, &format!("{} = {} {{", definition.name, mode));
        self.voice_elements(&voice.elements, part_id, 1, out);
        push_line(out, 0, "}");
    }

    fn stanza_definition(&self, definition: &StanzaDefinition, out: &mut String) {
        push_line(out, 0, &format!("{} = \\lyricmode {{", definition.name));
        let mut line: Vec<String> = Vec::new();
        for syllable in &definition.stanza.syllables {
            match syllable.kind {
                SyllableKind::MeasureEnd => {
                    if !line.is_empty() {
                        push_line(out, 1, &line.join(" "));
                        line.clear();
                    }
                }
                SyllableKind::Skip => line.push("_".to_string()),
                kind => {
                    let mut text = format!("\"{}\"", escape_lilypond_string(&syllable.text()));
                    if matches!(kind, SyllableKind::Begin | SyllableKind::Middle) {
                        text.push_str(" --");
                    }
                    if matches!(syllable.extend, ExtendKind::Standalone | ExtendKind::Start) {
                        text.push_str(" __");
                    }
                    line.push(text);
                }
            }
        }
        if !line.is_empty() {
            push_line(out, 1, &line.join(" "));
        }
        push_line(out, 0, "}");
    }

    fn voice_elements(&self, elements: &[VoiceElement], part_id: &str, level: usize, out: &mut String) {
        for element in elements {
            match element {
                VoiceElement::Measure(measure) => self.measure_line(measure, part_id, level, out),
                VoiceElement::Repeat(repeat) => {
                    push_line(out, level, &format!("\\repeat volta {} {{", repeat.times.max(2)));
                    self.voice_elements(&repeat.common_part, part_id, level + 1, out);
                    push_line(out, level, "}");
                    if !repeat.endings.is_empty() {
                        push_line(out, level, "\\alternative {");
                        for ending in &repeat.endings {
                            push_line(out, level + 1, "{");
                            self.voice_elements(&ending.elements, part_id, level + 2, out);
                            push_line(out, level + 1, "}");
                        }
                        push_line(out, level, "}");
                    }
                }
                VoiceElement::RestMeasures(rests) => {
                    let Some(first) = rests.measures.first() else {
                        continue;
                    };
                    // attributes of the first measure still apply
                    let mut items: Vec<String> = first
                        .elements
                        .iter()
                        .filter(|e| !e.is_music() && !matches!(e, MeasureElement::BarCheck(_)))
                        .filter_map(|e| self.measure_element(e, part_id))
                        .collect();
                    let length = if *first.full_length.numer() > 0 {
                        first.full_length
                    } else {
                        Rational::from_integer(1)
                    };
                    items.push(format!(
                        "R{}*{}",
                        duration_to_lilypond(length),
                        rests.count.max(1)
                    ));
                    if self.bar_checks {
                        items.push("|".to_string());
                    }
                    push_line(out, level, &items.join(" "));
                }
                VoiceElement::MeasuresRepeat(repeat) => {
                    push_line(
                        out,
                        level,
                        &format!("\\repeat percent {} {{", repeat.replicas_count() + 1),
                    );
                    for measure in &repeat.pattern {
                        self.measure_line(measure, part_id, level + 1, out);
                    }
                    push_line(out, level, "}");
                }
            }
        }
    }

    fn measure_line(&self, measure: &Measure, part_id: &str, level: usize, out: &mut String) {
        let mut items = Vec::new();
        if measure.kind == MeasureKind::Anacrusis {
            let length = measure
                .elements
                .iter()
                .fold(zero(), |total, element| total + element.duration());
            let partial = duration_to_lilypond(length);
            if !partial.is_empty() {
                items.push(format!("\\partial {}", partial));
            }
        }
        items.extend(
            measure
                .elements
                .iter()
                .filter_map(|element| self.measure_element(element, part_id)),
        );
        if !items.is_empty() {
            push_line(out, level, &items.join(" "));
        }
    }

    fn measure_element(&self, element: &MeasureElement, part_id: &str) -> Option<String> {
        let text = match element {
            MeasureElement::Note(note) => self.note(note, &DurationMode::Written),
            MeasureElement::Chord(chord) => self.chord(chord, &DurationMode::Written),
            MeasureElement::Tuplet(tuplet) => self.tuplet(tuplet),
            MeasureElement::DoubleTremolo(tremolo) => self.double_tremolo(tremolo),
            MeasureElement::Clef(clef) => return clef_to_lilypond(clef),
            MeasureElement::Key(key) => key_to_lilypond(key, self.language),
            MeasureElement::Time(time) => time_to_lilypond(time),
            MeasureElement::Transpose(transpose) => transpose_to_lilypond(transpose, self.language),
            MeasureElement::Barline(barline) => return barline_to_lilypond(barline),
            MeasureElement::BarCheck(check) => {
                if !self.bar_checks {
                    return None;
                }
                match &check.next_bar_number {
                    Some(number) => format!("| % {}", number),
                    None => "|".to_string(),
                }
            }
            MeasureElement::BarNumberCheck(check) => {
                let number = check.number.trim().parse::<u32>().ok()?;
                if !self.bar_checks {
                    return None;
                }
                format!("\\barNumberCheck #{}", number)
            }
            MeasureElement::VoiceStaffChange(change) => format!(
                "\\change Staff = \"{}\"",
                staff_context_name(part_id, change.staff_number)
            ),
            MeasureElement::Tempo(tempo) => return tempo_to_lilypond(tempo),
            MeasureElement::Rehearsal(rehearsal) => format!(
                "\\mark \\markup {{ \\box \"{}\" }}",
                escape_lilypond_string(&rehearsal.text)
            ),
            MeasureElement::Segno(_) => "\\mark \\markup { \\musicglyph \"scripts.segno\" }".to_string(),
            MeasureElement::Coda(_) => "\\mark \\markup { \\musicglyph \"scripts.coda\" }".to_string(),
            MeasureElement::LineBreak(_) => "\\break".to_string(),
            MeasureElement::PageBreak(_) => "\\pageBreak".to_string(),
            MeasureElement::Harmony(harmony) => self.harmony(harmony),
            MeasureElement::FiguredBass(figured_bass) => self.figured_bass(figured_bass),
        };
        Some(text)
    }

    // ------------------------------------------------------------------
    // notes and containers
    // ------------------------------------------------------------------

    fn note_head(&self, note: &Note) -> String {
        match note.content {
            NoteContent::Pitched(pitch) => {
                let mut head = format!(
                    "{}{}",
                    pitch_name(pitch.step, pitch.alteration, self.language),
                    octave_marks(pitch.octave)
                );
                if note.cautionary_accidental {
                    head.push('?');
                } else if note.accidental.is_some() {
                    head.push('!');
                }
                head
            }
            NoteContent::Rest { .. } if note.measure_full_rest => "R".to_string(),
            NoteContent::Rest { .. } => "r".to_string(),
            NoteContent::Unpitched { display } => {
                let (step, octave) = display.unwrap_or((0, 4));
                format!("{}{}", pitch_name(step, 0, self.language), octave_marks(octave))
            }
            NoteContent::Skip => "s".to_string(),
        }
    }

    fn note(&self, note: &Note, duration: &DurationMode) -> String {
        let in_chord = matches!(duration, DurationMode::InChord);
        let mut out = String::new();

        if !in_chord {
            for mark in &note.marks {
                if let NoteMark::OctaveShift(shift) = mark {
                    out.push_str(octave_shift_command(shift));
                    out.push(' ');
                }
            }
            if let Some(group) = &note.grace_before {
                out.push_str(&self.grace_group(group));
                out.push(' ');
            }
            if note.grace_after.is_some() {
                out.push_str("\\afterGrace ");
            }
            if !note.print_object {
                out.push_str("\\once \\hideNotes ");
            }
            if note.editorial_accidental {
                out.push_str("\\editorialAccidental ");
            }
        }

        out.push_str(&self.note_head(note));
        match duration {
            DurationMode::Written => {
                out.push_str(&written_duration(note.graphic_type, note.dots, note.displayed_duration));
                out.push_str(&tremolo_suffix(&note.marks));
            }
            DurationMode::Fixed(fixed) => out.push_str(fixed),
            DurationMode::InChord => {}
        }

        for mark in &note.marks {
            out.push_str(&mark_to_lilypond(mark));
        }
        if matches!(note.tie, Some(TieKind::Start) | Some(TieKind::Continue)) {
            out.push_str(if in_chord { "~" } else { " ~" });
        }

        if !in_chord {
            if let Some(group) = &note.grace_after {
                out.push_str(&format!(" {{ {} }}", self.grace_elements(group)));
            }
        }
        out
    }

    fn chord(&self, chord: &Chord, duration: &DurationMode) -> String {
        let mut out = String::new();
        for mark in &chord.marks {
            if let NoteMark::OctaveShift(shift) = mark {
                out.push_str(octave_shift_command(shift));
                out.push(' ');
            }
        }
        if let Some(group) = chord.first_note().and_then(|note| note.grace_before.as_ref()) {
            out.push_str(&self.grace_group(group));
            out.push(' ');
        }

        let members: Vec<String> = chord
            .notes
            .iter()
            .map(|note| self.note(note, &DurationMode::InChord))
            .collect();
        out.push_str(&format!("<{}>", members.join(" ")));

        match duration {
            DurationMode::Written => {
                out.push_str(&written_duration(chord.graphic_type, chord.dots, chord.displayed_duration));
                out.push_str(&tremolo_suffix(&chord.marks));
            }
            DurationMode::Fixed(fixed) => out.push_str(fixed),
            DurationMode::InChord => {}
        }
        for mark in &chord.marks {
            out.push_str(&mark_to_lilypond(mark));
        }
        out
    }

    fn grace_elements(&self, group: &GraceNotesGroup) -> String {
        group
            .elements
            .iter()
            .map(|element| match element {
                GraceElement::Note(note) => self.note(note, &DurationMode::Written),
                GraceElement::Chord(chord) => self.chord(chord, &DurationMode::Written),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn grace_group(&self, group: &GraceNotesGroup) -> String {
        let command = if group.slashed && !group.is_skip {
            "\\acciaccatura"
        } else {
            "\\grace"
        };
        format!("{} {{ {} }}", command, self.grace_elements(group))
    }

    fn tuplet(&self, tuplet: &Tuplet) -> String {
        let mut out = String::new();
        if tuplet.line_shape == TupletLineShape::Curved {
            out.push_str("\\once \\tupletsCurvedBrackets ");
        }
        if !tuplet.bracket {
            out.push_str("\\once \\omit TupletBracket ");
        }
        match tuplet.show_number {
            TupletShowNumber::None => out.push_str("\\once \\omit TupletNumber "),
            TupletShowNumber::Both => out.push_str(
                "\\once \\override TupletNumber.text = #tuplet-number::calc-fraction-text ",
            ),
            TupletShowNumber::Actual => {}
        }

        let elements: Vec<String> = tuplet
            .elements
            .iter()
            .map(|element| match element {
                TupletElement::Note(note) => self.note(note, &DurationMode::Written),
                TupletElement::Chord(chord) => self.chord(chord, &DurationMode::Written),
                TupletElement::Tuplet(inner) => self.tuplet(inner),
            })
            .collect();
        out.push_str(&format!(
            "\\tuplet {}/{} {{ {} }}",
            tuplet.actual,
            tuplet.normal,
            elements.join(" ")
        ));
        out
    }

    fn double_tremolo(&self, tremolo: &DoubleTremolo) -> String {
        // each beam halves the alternation value, from an eighth
        let value = Rational::new(1, 4 << tremolo.marks.clamp(1, 5));
        let repeats = tremolo.duration() / (value * 2);
        let repeats = if repeats.is_integer() && *repeats.numer() > 0 {
            *repeats.numer()
        } else {
            1
        };

        let fixed = DurationMode::Fixed(duration_to_lilypond(value));
        let elements: Vec<String> = tremolo
            .first
            .iter()
            .chain(tremolo.second.iter())
            .map(|element| match element {
                TremoloElement::Note(note) => self.note(note, &fixed),
                TremoloElement::Chord(chord) => self.chord(chord, &fixed),
            })
            .collect();
        format!("\\repeat tremolo {} {{ {} }}", repeats, elements.join(" "))
    }

    fn harmony(&self, harmony: &Harmony) -> String {
        let mut modifiers = harmony.kind.chord_mode_suffix().to_string();
        let mut additions = String::new();
        let mut removals = String::new();
        for degree in &harmony.degrees {
            let sign = match degree.alteration {
                a if a > 0 => "+",
                a if a < 0 => "-",
                _ => "",
            };
            match degree.degree_type {
                DegreeType::Add | DegreeType::Alter => {
                    additions.push_str(&format!(".{}{}", degree.value, sign))
                }
                DegreeType::Subtract => removals.push_str(&format!("^{}", degree.value)),
            }
        }
        if modifiers.is_empty() && !additions.is_empty() {
            modifiers.push('5');
        }

        let mut out = format!(
            "{}{}",
            pitch_name(harmony.root.0, harmony.root.1, self.language),
            duration_to_lilypond(harmony.duration)
        );
        let chord_text = format!("{}{}{}", modifiers, additions, removals);
        if !chord_text.is_empty() {
            out.push(':');
            out.push_str(&chord_text);
        }
        if let Some((step, alteration)) = harmony.bass {
            out.push('/');
            out.push_str(&pitch_name(step, alteration, self.language));
        }
        out
    }

    fn figured_bass(&self, figured_bass: &FiguredBass) -> String {
        let figures: Vec<String> = figured_bass.figures.iter().map(figure_to_lilypond).collect();
        let body = if figured_bass.parenthesized {
            format!("[{}]", figures.join(" "))
        } else {
            figures.join(" ")
        };
        format!("<{}>{}", body, duration_to_lilypond(figured_bass.duration))
    }

    // ------------------------------------------------------------------
    // score block
    // ------------------------------------------------------------------

    fn part_group_block(&self, group: &PartGroupBlock, level: usize, out: &mut String) {
        if group.is_implicit() {
            for element in &group.elements {
                self.group_element(element, level, out);
            }
            return;
        }

        let joined = if group.barline { "StaffGroup" } else { "ChoirStaff" };
        let (context, delimiter) = match group.symbol {
            PartGroupSymbol::Brace if group.barline => ("GrandStaff", None),
            PartGroupSymbol::Brace => (joined, Some("SystemStartBrace")),
            PartGroupSymbol::Bracket => (joined, None),
            PartGroupSymbol::Square => (joined, Some("SystemStartSquare")),
            PartGroupSymbol::Line | PartGroupSymbol::None => (joined, Some("SystemStartBar")),
        };

        let mut with = Vec::new();
        if let Some(delimiter) = delimiter {
            with.push(format!("systemStartDelimiter = #'{}", delimiter));
        }
        if let Some(name) = group.name.as_deref().filter(|n| !n.is_empty()) {
            with.push(format!("instrumentName = \"{}\"", escape_lilypond_string(name)));
        }
        if let Some(abbreviation) = group.abbreviation.as_deref().filter(|a| !a.is_empty()) {
            with.push(format!(
                "shortInstrumentName = \"{}\"",
                escape_lilypond_string(abbreviation)
            ));
        }

        push_line(out, level, &format!("\\new {}{} <<", context, with_block(&with)));
        for element in &group.elements {
            self.group_element(element, level + 1, out);
        }
        push_line(out, level, ">>");
    }

    fn group_element(&self, element: &PartGroupBlockElement, level: usize, out: &mut String) {
        match element {
            PartGroupBlockElement::Part(part) => self.part_block(part, level, out),
            PartGroupBlockElement::Group(group) => self.part_group_block(group, level, out),
        }
    }

    fn part_block(&self, part: &PartBlock, level: usize, out: &mut String) {
        for context in part.contexts.iter().filter(|c| c.kind == ContextKind::ChordNames) {
            push_line(out, level, &format!("\\new ChordNames \\{}", context.voice_name));
        }

        let name = if part.name.is_empty() { &part.instrument_name } else { &part.name };
        let short = if part.abbreviation.is_empty() {
            &part.instrument_abbreviation
        } else {
            &part.abbreviation
        };

        if part.staves.len() > 1 {
            let mut with = Vec::new();
            if !name.is_empty() {
                with.push(format!("instrumentName = \"{}\"", escape_lilypond_string(name)));
            }
            if !short.is_empty() {
                with.push(format!("shortInstrumentName = \"{}\"", escape_lilypond_string(short)));
            }
            push_line(
                out,
                level,
                &format!("\\new PianoStaff = \"{}\"{} <<", part.context_name(), with_block(&with)),
            );
            for staff in &part.staves {
                self.staff_block(staff, None, level + 1, out);
            }
            push_line(out, level, ">>");
        } else if let Some(staff) = part.staves.first() {
            self.staff_block(staff, Some((name, short)), level, out);
        }

        for context in part.contexts.iter().filter(|c| c.kind == ContextKind::FiguredBass) {
            push_line(out, level, &format!("\\new FiguredBass \\{}", context.voice_name));
        }
    }

    fn staff_block(
        &self,
        staff: &StaffBlock,
        part_names: Option<(&str, &str)>,
        level: usize,
        out: &mut String,
    ) {
        let (staff_context, voice_context) = match staff.kind {
            StaffKind::Tablature => ("TabStaff", "TabVoice"),
            StaffKind::Drum => ("DrumStaff", "DrumVoice"),
            StaffKind::Rhythmic => ("RhythmicStaff", "Voice"),
            _ => ("Staff", "Voice"),
        };

        let (name, short) = if staff.instrument_name.is_empty() {
            part_names.unwrap_or(("", ""))
        } else {
            (staff.instrument_name.as_str(), staff.short_instrument_name.as_str())
        };

        let mut with = Vec::new();
        if !name.is_empty() {
            with.push(format!("instrumentName = \"{}\"", escape_lilypond_string(name)));
        }
        if !short.is_empty() {
            with.push(format!("shortInstrumentName = \"{}\"", escape_lilypond_string(short)));
        }
        if staff.kind == StaffKind::Tablature {
            if !staff.tunings.is_empty() {
                let mut tunings = staff.tunings.clone();
                tunings.sort_by_key(|tuning| tuning.line);
                let pitches: Vec<String> = tunings
                    .iter()
                    .map(|t| {
                        format!(
                            "{}{}",
                            pitch_name(t.step, t.alteration, self.language),
                            octave_marks(t.octave)
                        )
                    })
                    .collect();
                with.push(format!("stringTunings = \\stringTuning <{}>", pitches.join(" ")));
            }
        } else if staff.lines != 5 {
            with.push(format!("\\override StaffSymbol.line-count = #{}", staff.lines));
        }

        push_line(
            out,
            level,
            &format!(
                "\\new {} = \"{}\"{} <<",
                staff_context,
                staff.context_name,
                with_block(&with)
            ),
        );

        let several = staff.voice_names.len() > 1;
        for (index, voice_name) in staff.voice_names.iter().enumerate() {
            let style = match index {
                0 if several => "\\voiceOne ",
                1 => "\\voiceTwo ",
                2 => "\\voiceThree ",
                3 => "\\voiceFour ",
                _ => "",
            };
            push_line(
                out,
                level + 1,
                &format!(
                    "\\context {} = \"{}\" {{ {}\\{} }}",
                    voice_context, voice_name, style, voice_name
                ),
            );
        }
        for lyrics in &staff.lyrics {
            push_line(
                out,
                level + 1,
                &format!(
                    "\\new Lyrics \\lyricsto \"{}\" \\{}",
                    lyrics.voice_name, lyrics.stanza_name
                ),
            );
        }
        push_line(out, level, ">>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lpsr::tree::{LyricsUse, PartGroupBlock};
    use crate::msr::basics::{Pitch, Position};
    use crate::msr::lyrics::{Stanza, Syllable};
    use crate::msr::marks::{Articulation, Slur};
    use crate::msr::score::Score;
    use crate::msr::voice::Voice;

    fn quarter(step: u8, alteration: i8, octave: i8) -> Note {
        let pitch = Pitch::new(step, alteration, octave).unwrap();
        let mut note = Note::new(1, NoteContent::Pitched(pitch), Rational::new(1, 4), 1);
        note.graphic_type = Some(NoteType::Quarter);
        note
    }

    fn printer() -> Printer {
        Printer {
            language: PitchLanguage::Nederlands,
            bar_checks: true,
        }
    }

    #[test]
    fn test_tempo_ranges_and_words() {
        let mut tempo = Tempo {
            beat_unit: Some(NoteType::Quarter),
            dots: 1,
            per_minute: Some(" 60-72 ".to_string()),
            words: Some("Allegro".to_string()),
            placement: Placement::default(),
            position: Position::default(),
            input_line: 3,
        };
        assert_eq!(
            tempo_to_lilypond(&tempo).as_deref(),
            Some("\\tempo \"Allegro\" 4. = 60 - 72")
        );

        tempo.per_minute = Some("ca. 60".to_string());
        assert_eq!(
            tempo_to_lilypond(&tempo).as_deref(),
            Some("\\tempo \"Allegro\""),
            "an unreadable figure keeps only the words"
        );
    }

    #[test]
    fn test_pitch_names_per_language() {
        assert_eq!(pitch_name(0, 1, PitchLanguage::Nederlands), "cis");
        assert_eq!(pitch_name(2, -1, PitchLanguage::Nederlands), "ees");
        assert_eq!(pitch_name(3, 2, PitchLanguage::English), "fss");
        assert_eq!(pitch_name(6, -1, PitchLanguage::Deutsch), "b");
        assert_eq!(pitch_name(6, 0, PitchLanguage::Deutsch), "h");
        assert_eq!(pitch_name(4, -1, PitchLanguage::Italiano), "solb");
    }

    #[test]
    fn test_octave_marks() {
        assert_eq!(octave_marks(4), "'");
        assert_eq!(octave_marks(3), "");
        assert_eq!(octave_marks(1), ",,");
    }

    #[test]
    fn test_duration_to_lilypond() {
        assert_eq!(duration_to_lilypond(Rational::new(3, 8)), "4.");
        assert_eq!(duration_to_lilypond(Rational::new(2, 1)), "\\breve");
        assert_eq!(duration_to_lilypond(Rational::new(5, 8)), "1*5/8");
        assert_eq!(duration_to_lilypond(zero()), "");
    }

    #[test]
    fn test_clef_table() {
        let mut clef = Clef::treble(1);
        assert_eq!(clef_to_lilypond(&clef).as_deref(), Some("\\clef \"treble\""));
        clef.octave_change = -1;
        assert_eq!(clef_to_lilypond(&clef).as_deref(), Some("\\clef \"treble_8\""));
        clef.sign = "C".to_string();
        clef.line = 4;
        clef.octave_change = 0;
        assert_eq!(clef_to_lilypond(&clef).as_deref(), Some("\\clef \"tenor\""));
        clef.sign = "jianpu".to_string();
        assert_eq!(clef_to_lilypond(&clef), None, "no LilyPond clef for jianpu");
    }

    #[test]
    fn test_time_signatures() {
        assert_eq!(time_to_lilypond(&Time::new("3", "4", 1)), "\\numericTimeSignature \\time 3/4");
        let mut common = Time::new("4", "4", 1);
        common.symbol = TimeSymbol::Common;
        assert_eq!(time_to_lilypond(&common), "\\defaultTimeSignature \\time 4/4");
        let additive = Time::new("3+2", "8", 1);
        assert_eq!(time_to_lilypond(&additive), "\\compoundMeter #'((3 2 8))");
    }

    #[test]
    fn test_transposition_for_b_flat_instrument() {
        let transpose = Transpose {
            diatonic: -1,
            chromatic: -2,
            octave_change: 0,
            double: false,
            input_line: 1,
        };
        assert_eq!(
            transpose_to_lilypond(&transpose, PitchLanguage::Nederlands),
            "\\transposition bes"
        );
    }

    #[test]
    fn test_note_with_marks_and_tie() {
        let mut note = quarter(4, 1, 4);
        note.tie = Some(TieKind::Start);
        note.marks.push(NoteMark::Articulation(Articulation {
            kind: ArticulationKind::Staccato,
            placement: Placement::Above,
            input_line: 1,
        }));
        note.marks.push(NoteMark::Slur(Slur {
            number: 2,
            kind: SlurKind::Start,
            placement: Placement::None,
            input_line: 1,
        }));
        assert_eq!(printer().note(&note, &DurationMode::Written), "gis'4^.\\=2( ~");
    }

    #[test]
    fn test_chord_members_share_duration() {
        let first = quarter(0, 0, 4);
        let mut chord = Chord::shaped_like(&first);
        chord.add_note(first);
        chord.add_note(quarter(2, 0, 4));
        assert_eq!(printer().chord(&chord, &DurationMode::Written), "<c' e'>4");
    }

    #[test]
    fn test_tuplet_nesting() {
        let mut tuplet = Tuplet::new(1, 3, 2, 1);
        for step in 0..3 {
            let mut note = quarter(step, 0, 4);
            note.graphic_type = Some(NoteType::Eighth);
            tuplet.add_note(note);
        }
        assert_eq!(printer().tuplet(&tuplet), "\\tuplet 3/2 { c'8 d'8 e'8 }");
    }

    #[test]
    fn test_bar_checks_follow_settings() {
        let check = MeasureElement::BarCheck(crate::msr::attributes::BarCheck {
            next_bar_number: Some("2".to_string()),
            input_line: 1,
        });
        assert_eq!(printer().measure_element(&check, "P1").as_deref(), Some("| % 2"));
        let quiet = Printer {
            language: PitchLanguage::Nederlands,
            bar_checks: false,
        };
        assert_eq!(quiet.measure_element(&check, "P1"), None);

        let non_numeric = MeasureElement::BarNumberCheck(crate::msr::attributes::BarNumberCheck {
            number: "X1".to_string(),
            input_line: 1,
        });
        assert_eq!(printer().measure_element(&non_numeric, "P1"), None);
    }

    #[test]
    fn test_render_document() {
        let settings = LpsrSettings::default();
        let mut score = LpsrScore::new(Score::new(1), &settings);
        score.header.set("title", "Etude \"No. 1\"");

        let mut voice = Voice::new(1, VoiceKind::Regular, 1);
        let mut measure = Measure::new("1", 1, Rational::new(1, 2), 1);
        measure.append(MeasureElement::Note(quarter(0, 0, 4)));
        measure.append(MeasureElement::Note(quarter(1, 0, 4)));
        voice.elements.push(VoiceElement::Measure(measure));
        score.elements.push(ScoreElement::Voice(VoiceDefinition {
            name: "Part_POne_Staff_One_Voice_One".to_string(),
            voice,
        }));

        let mut stanza = Stanza::new("1", 1);
        let mut syllable = Syllable::skip("1", Rational::new(1, 4), 1);
        syllable.kind = SyllableKind::Begin;
        syllable.texts = vec!["hel".to_string()];
        stanza.syllables.push(syllable);
        score.elements.push(ScoreElement::Stanza(StanzaDefinition {
            name: "Part_POne_Staff_One_Voice_One_Stanza_One".to_string(),
            voice_name: "Part_POne_Staff_One_Voice_One".to_string(),
            stanza,
        }));

        score.score_block.part_groups.push(PartGroupBlock {
            absolute_number: 0,
            symbol: PartGroupSymbol::None,
            barline: false,
            name: None,
            abbreviation: None,
            elements: vec![PartGroupBlockElement::Part(PartBlock {
                part_id: "P1".to_string(),
                name: "Flute".to_string(),
                abbreviation: String::new(),
                instrument_name: String::new(),
                instrument_abbreviation: String::new(),
                transpose: None,
                staves: vec![StaffBlock {
                    context_name: staff_context_name("P1", 1),
                    number: 1,
                    kind: StaffKind::Regular,
                    lines: 5,
                    tunings: Vec::new(),
                    instrument_name: String::new(),
                    short_instrument_name: String::new(),
                    voice_names: vec!["Part_POne_Staff_One_Voice_One".to_string()],
                    lyrics: vec![LyricsUse {
                        voice_name: "Part_POne_Staff_One_Voice_One".to_string(),
                        stanza_name: "Part_POne_Staff_One_Voice_One_Stanza_One".to_string(),
                    }],
                }],
                contexts: Vec::new(),
            })],
        });

        let text = render(&score, &settings).unwrap();
        assert!(text.starts_with("\\version \"2.19\""), "got:\n{}", text);
        assert!(text.contains("\\language \"nederlands\""));
        assert!(text.contains("title = \"Etude \\\"No. 1\\\"\""), "title is escaped:\n{}", text);
        assert!(text.contains("Part_POne_Staff_One_Voice_One = \\absolute {\n  c'4 d'4\n}"), "got:\n{}", text);
        assert!(text.contains("\"hel\" --"));
        assert!(text.contains("\\new Staff = \"Part_POne_Staff_One\" \\with { instrumentName = \"Flute\" } <<"));
        assert!(text.contains("\\new Lyrics \\lyricsto \"Part_POne_Staff_One_Voice_One\""));
        assert!(!text.contains("tupletsCurvedBrackets"), "no scheme functions requested");
    }
}
