//! Guido Music Notation output
//!
//! The tree built by [`crate::translators::msr2guido`] and its text form,
//! produced by `Display`.

pub mod element;

pub use element::{GuidoElement, GuidoNote, GuidoParam, GuidoTag};
