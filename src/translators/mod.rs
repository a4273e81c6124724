//! Translators between the three score representations
//!
//! - [`xml2msr`]: MusicXML element tree to score model
//! - [`msr2lpsr`]: score model to LilyPond output tree
//! - [`msr2guido`]: score model to Guido output tree

pub mod msr2guido;
pub mod msr2lpsr;
pub mod xml2msr;
