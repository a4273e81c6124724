//! Translation context
//!
//! The source groups music part, then measure, then voice, while every
//! target wants part, staff, voice, then measure. The state needed to bridge
//! the two lives here: single slots for the entity being built at each
//! level, stacks for the scopes that nest, flags for the scopes that change
//! where marks attach, the per-voice repeat state machine and the staff
//! counters of the Guido output.
//!
//! Each translator owns its own context; nothing here is shared between
//! passes.

pub mod flags;
pub mod guard;
pub mod repeats;
pub mod spanning;
pub mod stacks;

pub use flags::{ScopeFlag, ScopeFlags};
pub use guard::{ScopeGuard, Scoped};
pub use repeats::{RepeatState, RepeatTracker};
pub use spanning::{Accolade, StaffSpanning, VoicePlacement};
pub use stacks::{Nest, NestingStack, Slot};

use crate::msr::part_group::PartGroup;
use crate::msr::tuplet::Tuplet;

/// Scope state shared by the score model translators
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    pub flags: ScopeFlags,
    pub tuplets: NestingStack<Tuplet>,
    pub part_groups: NestingStack<PartGroup>,
    pub repeats: RepeatTracker,
}

/// Snapshot taken by [`Scoped::mark`]
#[derive(Debug, Clone)]
pub struct ContextMark {
    flags: ScopeFlags,
    tuplet_depth: usize,
    part_group_depth: usize,
    outside_repeats: bool,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, flag: ScopeFlag) -> bool {
        self.flags.is_set(flag)
    }
}

impl Scoped for ContextStack {
    type Mark = ContextMark;

    fn mark(&self) -> ContextMark {
        ContextMark {
            flags: self.flags,
            tuplet_depth: self.tuplets.depth(),
            part_group_depth: self.part_groups.depth(),
            outside_repeats: self.repeats.is_outside(),
        }
    }

    fn unwind_to(&mut self, mark: ContextMark) {
        self.flags = mark.flags;
        self.tuplets.truncate(mark.tuplet_depth);
        self.part_groups.truncate(mark.part_group_depth);
        if mark.outside_repeats && !self.repeats.is_outside() {
            self.repeats.reset();
        }
    }
}
