//! Score Bridge
//!
//! Translates MusicXML documents through a shared score model (MSR) into
//! LilyPond source, via the LilyPond Score Representation (LPSR), or into
//! Guido Music Notation.
//!
//! # Pipeline
//!
//! 1. **Parse**: load partwise MusicXML into an owned element tree (roxmltree)
//! 2. **Build**: browse the element tree into the canonical [`msr::Score`]
//! 3. **Project**: browse the score into an LPSR tree or a Guido score
//! 4. **Print**: render the LPSR tree as LilyPond text, or print the Guido
//!    score with `Display`
//!
//! Fatal problems end the translation with a [`TranslationError`]; anything
//! recoverable is reported as a [`diagnostics::DiagnosticMark`] alongside the
//! output.
//!
//! # Basic Usage
//!
//! ```ignore
//! use score_bridge::convert_musicxml_to_lilypond;
//!
//! let result = convert_musicxml_to_lilypond(musicxml, None)?;
//! println!("{}", result.lilypond_source);
//! ```

#[macro_use]
pub mod errors;

pub mod browser;
pub mod context;
pub mod diagnostics;
pub mod guido;
pub mod lpsr;
pub mod msr;
pub mod settings;
pub mod translators;
pub mod xml;

pub use diagnostics::{DiagnosticMark, Diagnostics};
pub use errors::{ParseError, Result, TranslationError};
pub use settings::{GuidoSettings, LpsrSettings, TranslationSettings};
pub use translators::msr2guido::GuidoStats;

use guido::GuidoElement;
use lpsr::LpsrScore;
use msr::score::Score;
use serde::Serialize;
use xml::XmlDocument;

/// Canonical score and what was noticed while building it
#[derive(Debug, Clone, Serialize)]
pub struct MsrResult {
    pub score: Score,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct LpsrResult {
    pub lpsr: LpsrScore,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuidoResult {
    pub guido: GuidoElement,
    pub stats: GuidoStats,
    pub diagnostics: Diagnostics,
}

/// MusicXML to LilyPond in one go
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub lilypond_source: String,
    /// Warnings from both passes, building first
    pub diagnostics: Diagnostics,
}

/// MusicXML to Guido in one go
#[derive(Debug, Clone, Serialize)]
pub struct GuidoConversionResult {
    pub guido_source: String,
    pub stats: GuidoStats,
    pub diagnostics: Diagnostics,
}

/// Parse a MusicXML document and build its score model
pub fn musicxml_to_msr(musicxml: &str) -> Result<MsrResult> {
    let root = XmlDocument::parse(musicxml)?;
    let (score, diagnostics) = translators::xml2msr::build_msr(&root)?;
    log::info!(
        "score built: {} parts, {} warnings",
        score.parts().len(),
        diagnostics.len()
    );
    Ok(MsrResult { score, diagnostics })
}

/// Project a score model to the LilyPond Score Representation
pub fn msr_to_lpsr(score: &Score, settings: &LpsrSettings) -> Result<LpsrResult> {
    let (lpsr, diagnostics) = translators::msr2lpsr::build_lpsr(score, settings)?;
    Ok(LpsrResult { lpsr, diagnostics })
}

/// Project a score model to Guido
pub fn msr_to_guido(score: &Score, settings: &GuidoSettings) -> Result<GuidoResult> {
    let (guido, stats, diagnostics) = translators::msr2guido::build_guido(score, settings)?;
    Ok(GuidoResult {
        guido,
        stats,
        diagnostics,
    })
}

/// Convert a MusicXML document to LilyPond source.
///
/// # Arguments
///
/// * `musicxml` - partwise MusicXML document
/// * `settings` - translation settings, defaults when `None`
pub fn convert_musicxml_to_lilypond(
    musicxml: &str,
    settings: Option<TranslationSettings>,
) -> Result<ConversionResult> {
    let settings = settings.unwrap_or_default();
    let MsrResult { score, diagnostics } = musicxml_to_msr(musicxml)?;
    lilypond_from(&score, diagnostics, &settings.lpsr)
}

/// Convert a MusicXML document to Guido text
pub fn convert_musicxml_to_guido(
    musicxml: &str,
    settings: Option<TranslationSettings>,
) -> Result<GuidoConversionResult> {
    let settings = settings.unwrap_or_default();
    let MsrResult { score, diagnostics } = musicxml_to_msr(musicxml)?;
    guido_from(&score, diagnostics, &settings.guido)
}

/// Build the score once and project it to both targets.
///
/// Each result carries the building warnings followed by its own pass's.
pub fn convert_musicxml(
    musicxml: &str,
    settings: Option<TranslationSettings>,
) -> Result<(ConversionResult, GuidoConversionResult)> {
    let settings = settings.unwrap_or_default();
    let MsrResult { score, diagnostics } = musicxml_to_msr(musicxml)?;
    let lilypond = lilypond_from(&score, diagnostics.clone(), &settings.lpsr)?;
    let guido = guido_from(&score, diagnostics, &settings.guido)?;
    Ok((lilypond, guido))
}

fn lilypond_from(
    score: &Score,
    mut diagnostics: Diagnostics,
    settings: &LpsrSettings,
) -> Result<ConversionResult> {
    let projected = msr_to_lpsr(score, settings)?;
    diagnostics.extend(projected.diagnostics);
    let lilypond_source = lpsr::render(&projected.lpsr, settings)?;
    Ok(ConversionResult {
        lilypond_source,
        diagnostics,
    })
}

fn guido_from(
    score: &Score,
    mut diagnostics: Diagnostics,
    settings: &GuidoSettings,
) -> Result<GuidoConversionResult> {
    let projected = msr_to_guido(score, settings)?;
    diagnostics.extend(projected.diagnostics);
    Ok(GuidoConversionResult {
        guido_source: projected.guido.to_string(),
        stats: projected.stats,
        diagnostics,
    })
}
