//! Repeat state machine
//!
//! One tracker per voice. A repeat is opened, its common part is filled,
//! then zero or more endings are filled one at a time, and the repeat is
//! closed. Elements appended while no repeat is open are handed back to the
//! caller, which appends them to the voice.

use crate::errors::Result;
use crate::msr::measure::Measure;
use crate::msr::voice::{Repeat, RepeatEnding, RepeatEndingKind, VoiceElement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepeatState {
    Outside,
    InCommonPart,
    /// Common part closed, no ending open
    BetweenEndings,
    InEnding {
        number: String,
        kind: RepeatEndingKind,
    },
}

#[derive(Debug, Clone)]
pub struct RepeatTracker {
    state: RepeatState,
    repeat: Option<Repeat>,
    ending: Option<RepeatEnding>,
}

impl Default for RepeatTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RepeatTracker {
    pub fn new() -> Self {
        Self {
            state: RepeatState::Outside,
            repeat: None,
            ending: None,
        }
    }

    pub fn state(&self) -> &RepeatState {
        &self.state
    }

    pub fn is_outside(&self) -> bool {
        self.state == RepeatState::Outside
    }

    /// Open a repeat with an empty common part
    pub fn repeat_start(&mut self, repeat: Repeat, input_line: u32) -> Result<()> {
        if self.state != RepeatState::Outside {
            return Err(internal_error!(
                input_line,
                "repeat start while in state {:?}",
                self.state
            ));
        }
        self.repeat = Some(repeat);
        self.state = RepeatState::InCommonPart;
        Ok(())
    }

    /// The common part starts right after the repeat start
    pub fn common_part_start(&self, input_line: u32) -> Result<()> {
        match self.state {
            RepeatState::InCommonPart => Ok(()),
            _ => Err(internal_error!(
                input_line,
                "repeat common part start while in state {:?}",
                self.state
            )),
        }
    }

    pub fn common_part_end(&mut self, input_line: u32) -> Result<()> {
        match self.state {
            RepeatState::InCommonPart => {
                self.state = RepeatState::BetweenEndings;
                Ok(())
            }
            _ => Err(internal_error!(
                input_line,
                "repeat common part end while in state {:?}",
                self.state
            )),
        }
    }

    /// Open an ending; an open common part is closed first
    pub fn ending_start(&mut self, ending: RepeatEnding, input_line: u32) -> Result<()> {
        match self.state {
            RepeatState::InCommonPart | RepeatState::BetweenEndings => {
                self.state = RepeatState::InEnding {
                    number: ending.number.clone(),
                    kind: ending.kind,
                };
                self.ending = Some(ending);
                Ok(())
            }
            RepeatState::InEnding { ref number, .. } => Err(internal_error!(
                input_line,
                "repeat ending {} starts while ending {} is open",
                ending.number,
                number
            )),
            RepeatState::Outside => Err(internal_error!(
                input_line,
                "repeat ending {} outside of any repeat",
                ending.number
            )),
        }
    }

    /// Close the open ending, with the kind known only at its end
    pub fn ending_end(&mut self, kind: RepeatEndingKind, input_line: u32) -> Result<()> {
        let (Some(mut ending), Some(repeat)) = (self.ending.take(), self.repeat.as_mut()) else {
            return Err(internal_error!(
                input_line,
                "repeat ending end without a matching start"
            ));
        };
        ending.kind = kind;
        log::debug!("closing repeat ending {} ({:?})", ending.number, kind);
        repeat.endings.push(ending);
        self.state = RepeatState::BetweenEndings;
        Ok(())
    }

    /// Close the repeat, returning it for the voice
    pub fn repeat_end(&mut self, input_line: u32) -> Result<Repeat> {
        match self.state {
            RepeatState::InCommonPart | RepeatState::BetweenEndings => {}
            _ => {
                return Err(internal_error!(
                    input_line,
                    "repeat end while in state {:?}",
                    self.state
                ))
            }
        }
        let repeat = self
            .repeat
            .take()
            .ok_or_else(|| internal_error!(input_line, "repeat end without an open repeat"))?;
        self.state = RepeatState::Outside;
        Ok(repeat)
    }

    /// Route an element to the open ending or common part.
    ///
    /// Returns the element back when no repeat is open.
    pub fn append(&mut self, element: VoiceElement) -> Option<VoiceElement> {
        match (&self.state, self.repeat.as_mut(), self.ending.as_mut()) {
            (RepeatState::InEnding { .. }, _, Some(ending)) => {
                ending.elements.push(element);
                None
            }
            (RepeatState::InCommonPart, Some(repeat), _) => {
                repeat.common_part.push(element);
                None
            }
            (RepeatState::BetweenEndings, Some(repeat), _) => {
                // music between endings belongs to the last one
                match repeat.endings.last_mut() {
                    Some(ending) => ending.elements.push(element),
                    None => repeat.common_part.push(element),
                }
                None
            }
            _ => Some(element),
        }
    }

    /// Last measure appended to the open repeat, if any
    pub fn last_measure_mut(&mut self) -> Option<&mut Measure> {
        if let Some(ending) = self.ending.as_mut() {
            return ending
                .elements
                .last_mut()
                .and_then(VoiceElement::last_measure_mut);
        }
        let repeat = self.repeat.as_mut()?;
        match repeat.endings.last_mut() {
            Some(ending) => ending
                .elements
                .last_mut()
                .and_then(VoiceElement::last_measure_mut),
            None => repeat
                .common_part
                .last_mut()
                .and_then(VoiceElement::last_measure_mut),
        }
    }

    /// Drop any open repeat
    pub fn reset(&mut self) {
        self.state = RepeatState::Outside;
        self.repeat = None;
        self.ending = None;
    }
}
