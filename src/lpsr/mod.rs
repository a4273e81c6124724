//! LilyPond Score Representation
//!
//! [`tree`] holds the output tree built by the MSR to LPSR pass, [`printer`]
//! turns it into LilyPond source text.

pub mod printer;
pub mod tree;

pub use printer::render;
pub use tree::*;
