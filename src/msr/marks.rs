//! Marks attached to notes and chords
//!
//! Articulations, ornaments, dynamics and friends. They live in the `marks`
//! list of their note or chord, in source order, and are browsed as children
//! of it so each target pass can decide where to re-attach them.

use crate::msr::basics::{Placement, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NoteMark {
    Articulation(Articulation),
    Ornament(Ornament),
    Technical(Technical),
    Fermata(Fermata),
    Dynamics(Dynamics),
    Words(Words),
    Wedge(Wedge),
    Slur(Slur),
    Spanner(Spanner),
    Tremolo(SingleTremolo),
    OctaveShift(OctaveShift),
}

impl NoteMark {
    pub fn input_line(&self) -> u32 {
        match self {
            NoteMark::Articulation(m) => m.input_line,
            NoteMark::Ornament(m) => m.input_line,
            NoteMark::Technical(m) => m.input_line,
            NoteMark::Fermata(m) => m.input_line,
            NoteMark::Dynamics(m) => m.input_line,
            NoteMark::Words(m) => m.input_line,
            NoteMark::Wedge(m) => m.input_line,
            NoteMark::Slur(m) => m.input_line,
            NoteMark::Spanner(m) => m.input_line,
            NoteMark::Tremolo(m) => m.input_line,
            NoteMark::OctaveShift(m) => m.input_line,
        }
    }

    pub fn is_slur_start(&self) -> bool {
        matches!(self, NoteMark::Slur(slur) if slur.kind == SlurKind::Start)
    }
}

// ============================================================================
// ARTICULATIONS, ORNAMENTS, TECHNICALS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticulationKind {
    Accent,
    StrongAccent,
    Staccato,
    Tenuto,
    DetachedLegato,
    Staccatissimo,
    Spiccato,
    BreathMark,
    Caesura,
    Arpeggiato,
    NonArpeggiato,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Articulation {
    pub kind: ArticulationKind,
    pub placement: Placement,
    pub input_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrnamentKind {
    TrillMark,
    Turn,
    InvertedTurn,
    Mordent,
    InvertedMordent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ornament {
    pub kind: OrnamentKind,
    pub placement: Placement,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TechnicalKind {
    UpBow,
    DownBow,
    Harmonic,
    OpenString,
    ThumbPosition,
    SnapPizzicato,
    Fingering(i32),
    StringNumber(i32),
    Fret(i32),
    Pluck(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technical {
    pub kind: TechnicalKind,
    pub placement: Placement,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fermata {
    pub inverted: bool,
    pub input_line: u32,
}

// ============================================================================
// DIRECTIONS ATTACHED TO NOTES
// ============================================================================

/// Dynamic marking such as `p`, `mf` or `sfz`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub text: String,
    pub placement: Placement,
    pub position: Position,
    pub input_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Words {
    pub text: String,
    pub placement: Placement,
    pub position: Position,
    pub italic: bool,
    pub bold: bool,
    pub input_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WedgeKind {
    Crescendo,
    Diminuendo,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wedge {
    pub kind: WedgeKind,
    pub placement: Placement,
    pub position: Position,
    pub input_line: u32,
}

// ============================================================================
// SLURS AND SPANNERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlurKind {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slur {
    pub number: i32,
    pub kind: SlurKind,
    pub placement: Placement,
    pub input_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpannerKind {
    Glissando,
    Slide,
    WavyLine,
    Dashes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpannerType {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanner {
    pub kind: SpannerKind,
    pub spanner_type: SpannerType,
    pub number: i32,
    pub text: Option<String>,
    pub input_line: u32,
}

/// Single-note tremolo (slashes through the stem)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTremolo {
    pub marks: u8,
    pub placement: Placement,
    pub input_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OctaveShiftKind {
    Up,
    Down,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OctaveShift {
    pub kind: OctaveShiftKind,
    pub size: i32,
    pub input_line: u32,
}

// ============================================================================
// NOTE-LEVEL ATTRIBUTES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieKind {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StemKind {
    Up,
    Down,
    None,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamKind {
    Begin,
    Continue,
    End,
    ForwardHook,
    BackwardHook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beam {
    pub number: i32,
    pub kind: BeamKind,
}
