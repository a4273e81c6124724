//! Guido output tree
//!
//! A Guido score is a chord of voice sequences. Sequences hold notes, chords,
//! comments and tags; a tag has parameters (quoted or bare) and may apply to
//! a range of elements, written in parentheses after it.

use serde::Serialize;
use std::fmt;

/// Tag parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GuidoParam {
    /// Written between double quotes
    Quoted(String),
    /// Written as is: numbers and `name=value` pairs
    Bare(String),
}

impl fmt::Display for GuidoParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuidoParam::Quoted(value) => write!(f, "\"{}\"", value),
            GuidoParam::Bare(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuidoTag {
    pub name: String,
    pub params: Vec<GuidoParam>,
    /// Range the tag applies to, empty for a position tag
    pub elements: Vec<GuidoElement>,
}

impl GuidoTag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn quoted(mut self, value: impl Into<String>) -> Self {
        self.params.push(GuidoParam::Quoted(value.into()));
        self
    }

    pub fn bare(mut self, value: impl Into<String>) -> Self {
        self.params.push(GuidoParam::Bare(value.into()));
        self
    }

    pub fn with_params(mut self, params: impl IntoIterator<Item = GuidoParam>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn applied_to(mut self, elements: Vec<GuidoElement>) -> Self {
        self.elements = elements;
        self
    }

    /// Value of the first `name=...` bare parameter
    pub fn named_param(&self, name: &str) -> Option<&str> {
        self.params.iter().find_map(|param| match param {
            GuidoParam::Bare(value) => value
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('=')),
            GuidoParam::Quoted(_) => None,
        })
    }

    /// First quoted parameter
    pub fn text(&self) -> Option<&str> {
        self.params.iter().find_map(|param| match param {
            GuidoParam::Quoted(value) => Some(value.as_str()),
            GuidoParam::Bare(_) => None,
        })
    }
}

/// Note, rest or invisible `empty` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuidoNote {
    /// Step letter, `_` for a rest, `empty` for a skip
    pub name: String,
    /// `#` and `&` signs
    pub accidentals: String,
    pub octave: Option<i32>,
    /// (numerator, denominator) of a whole note
    pub duration: Option<(i32, i32)>,
    pub dots: u8,
}

impl GuidoNote {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            accidentals: String::new(),
            octave: None,
            duration: None,
            dots: 0,
        }
    }

    pub fn rest() -> Self {
        Self::new("_")
    }

    pub fn empty() -> Self {
        Self::new("empty")
    }
}

impl fmt::Display for GuidoNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.accidentals)?;
        if let Some(octave) = self.octave {
            write!(f, "{}", octave)?;
        }
        if let Some((numerator, denominator)) = self.duration {
            if numerator != 1 {
                write!(f, "*{}", numerator)?;
            }
            write!(f, "/{}", denominator)?;
        }
        for _ in 0..self.dots {
            f.write_str(".")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GuidoElement {
    /// The whole score: simultaneous voice sequences
    Score(Vec<GuidoElement>),
    Sequence(Vec<GuidoElement>),
    Chord(Vec<GuidoElement>),
    Tag(GuidoTag),
    Note(GuidoNote),
    Comment(String),
}

impl GuidoElement {
    pub fn tag(tag: GuidoTag) -> Self {
        GuidoElement::Tag(tag)
    }

    pub fn children(&self) -> &[GuidoElement] {
        match self {
            GuidoElement::Score(elements)
            | GuidoElement::Sequence(elements)
            | GuidoElement::Chord(elements) => elements,
            GuidoElement::Tag(tag) => &tag.elements,
            GuidoElement::Note(_) | GuidoElement::Comment(_) => &[],
        }
    }

    /// Tags with the given name, depth first
    pub fn tags_named<'a>(&'a self, name: &str) -> Vec<&'a GuidoTag> {
        let mut found = Vec::new();
        self.collect_tags(name, &mut found);
        found
    }

    fn collect_tags<'a>(&'a self, name: &str, found: &mut Vec<&'a GuidoTag>) {
        if let GuidoElement::Tag(tag) = self {
            if tag.name == name {
                found.push(tag);
            }
        }
        for child in self.children() {
            child.collect_tags(name, found);
        }
    }

    /// Notes and rests, depth first, chord members included
    pub fn notes(&self) -> Vec<&GuidoNote> {
        let mut found = Vec::new();
        self.collect_notes(&mut found);
        found
    }

    fn collect_notes<'a>(&'a self, found: &mut Vec<&'a GuidoNote>) {
        if let GuidoElement::Note(note) = self {
            found.push(note);
        }
        for child in self.children() {
            child.collect_notes(found);
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, elements: &[GuidoElement], separator: &str) -> fmt::Result {
    for (index, element) in elements.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", element)?;
    }
    Ok(())
}

impl fmt::Display for GuidoTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\{}", self.name)?;
        if !self.params.is_empty() {
            f.write_str("<")?;
            for (index, param) in self.params.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", param)?;
            }
            f.write_str(">")?;
        }
        if !self.elements.is_empty() {
            f.write_str("(")?;
            write_joined(f, &self.elements, " ")?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for GuidoElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuidoElement::Score(sequences) => {
                f.write_str("{\n")?;
                write_joined(f, sequences, ",\n")?;
                f.write_str("\n}\n")
            }
            GuidoElement::Sequence(elements) if elements.is_empty() => f.write_str("[ ]"),
            GuidoElement::Sequence(elements) => {
                f.write_str("[ ")?;
                write_joined(f, elements, " ")?;
                f.write_str(" ]")
            }
            GuidoElement::Chord(notes) => {
                f.write_str("{")?;
                write_joined(f, notes, ", ")?;
                f.write_str("}")
            }
            GuidoElement::Tag(tag) => write!(f, "{}", tag),
            GuidoElement::Note(note) => write!(f, "{}", note),
            GuidoElement::Comment(text) => write!(f, "(* {} *)", text),
        }
    }
}
