//! Scope flags
//!
//! Many marks attach to a different owner depending on what is open when
//! they are met: an articulation goes to the chord while a chord is open, to
//! the grace note while grace notes are open, and so on. These flags record
//! which of those scopes are open.

use crate::errors::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeFlag {
    Chord,
    DoubleTremolo,
    GraceNotes,
    NonGraceNote,
    HarmonyVoice,
    FiguredBassVoice,
    Stanza,
    SyllableExtend,
    RestMeasures,
    MeasuresRepeatPattern,
    MeasuresRepeatReplicas,
}

impl ScopeFlag {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of open scopes; `Copy` so it can be snapshot cheaply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeFlags {
    bits: u16,
}

impl ScopeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, flag: ScopeFlag) -> bool {
        self.bits & flag.bit() != 0
    }

    pub fn set(&mut self, flag: ScopeFlag) {
        self.bits |= flag.bit();
    }

    pub fn clear(&mut self, flag: ScopeFlag) {
        self.bits &= !flag.bit();
    }

    /// Open a scope that must not already be open
    pub fn enter(&mut self, flag: ScopeFlag, input_line: u32) -> Result<()> {
        if self.is_set(flag) {
            return Err(internal_error!(input_line, "{:?} scope opened twice", flag));
        }
        self.set(flag);
        Ok(())
    }

    /// Close a scope that must be open
    pub fn leave(&mut self, flag: ScopeFlag, input_line: u32) -> Result<()> {
        if !self.is_set(flag) {
            return Err(internal_error!(
                input_line,
                "{:?} scope closed without being opened",
                flag
            ));
        }
        self.clear(flag);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}
