//! MusicXML element tree
//!
//! Input side of the translators: a roxmltree-based loader producing an
//! owned element tree, and the visitor interface used to browse it.

pub mod element;
pub mod parser;
pub mod visitor;

pub use element::{ElementKind, XmlElement};
pub use parser::XmlDocument;
pub use visitor::XmlVisitor;
