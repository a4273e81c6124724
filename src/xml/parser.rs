//! XML parsing layer for MusicXML documents
//!
//! Wraps roxmltree: the borrowed roxmltree document is walked once and
//! copied into an owned [`XmlElement`] tree, keeping the line number of every
//! start tag for error reporting.

use crate::errors::ParseError;
use crate::xml::element::{ElementKind, XmlElement};
use roxmltree::{Document, Node};

// ============================================================================
// XML DOCUMENT
// ============================================================================

/// Entry point for loading a MusicXML document
pub struct XmlDocument;

impl XmlDocument {
    /// Parse a partwise MusicXML string into an element tree rooted at
    /// `<score-partwise>`
    pub fn parse(xml: &str) -> Result<XmlElement, ParseError> {
        // roxmltree rejects DTDs
        let xml_without_dtd = strip_doctype(xml);

        let doc = Document::parse(&xml_without_dtd)
            .map_err(|e| ParseError::InvalidXml(format!("XML parse error: {}", e)))?;

        let root = doc.root_element();
        match root.tag_name().name() {
            "score-partwise" => {}
            "score-timewise" => {
                return Err(ParseError::UnsupportedFormat(
                    "score-timewise documents must be converted to score-partwise first".to_string(),
                ))
            }
            other => {
                return Err(ParseError::UnsupportedFormat(format!(
                    "Expected score-partwise, found {}",
                    other
                )))
            }
        }

        let tree = copy_element(&doc, root);

        if !tree.has_child(&ElementKind::Part) {
            return Err(ParseError::MissingRequiredElement(
                "No parts found in score".to_string(),
            ));
        }

        log::debug!(
            "parsed MusicXML tree: {} top-level elements",
            tree.children().len()
        );

        Ok(tree)
    }
}

/// Remove a `<!DOCTYPE ...>` declaration, which may span several lines.
/// Removed lines are replaced by empty ones so line numbers stay accurate.
fn strip_doctype(xml: &str) -> String {
    let Some(start) = xml.find("<!DOCTYPE") else {
        return xml.to_string();
    };

    let rest = &xml[start..];
    let end = match rest.find('>') {
        Some(end) => start + end + 1,
        None => return xml.to_string(),
    };

    let removed_newlines = xml[start..end].matches('\n').count();
    let mut result = String::with_capacity(xml.len());
    result.push_str(&xml[..start]);
    result.push_str(&"\n".repeat(removed_newlines));
    result.push_str(&xml[end..]);
    result
}

fn copy_element(doc: &Document<'_>, node: Node<'_, '_>) -> XmlElement {
    let line = doc.text_pos_at(node.range().start).row;
    let mut element = XmlElement::new(node.tag_name().name(), line);

    for attribute in node.attributes() {
        element.push_attribute(attribute.name(), attribute.value());
    }

    for child in node.children() {
        if child.is_element() {
            element.push_child(copy_element(doc, child));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.append_text(text);
            }
        }
    }

    element
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN"
  "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <part-list>
    <score-part id="P1"><part-name>Flute</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <note><rest/><duration>4</duration></note>
    </measure>
  </part>
</score-partwise>"#;

    #[test]
    fn test_parse_strips_multiline_doctype_and_keeps_lines() {
        let root = XmlDocument::parse(MINIMAL).unwrap();
        assert_eq!(root.kind(), &ElementKind::ScorePartwise);
        assert_eq!(root.line(), 4, "line numbers must survive DOCTYPE removal");

        let part = root.child(&ElementKind::Part).unwrap();
        assert_eq!(part.attribute("id"), Some("P1"));
        assert_eq!(part.line(), 8);

        let note = part.find(&ElementKind::Note).unwrap();
        assert_eq!(note.child_int_value(&ElementKind::Duration, 0), 4);
        assert!(note.has_child(&ElementKind::Rest));
    }

    #[test]
    fn test_parse_rejects_timewise() {
        let err = XmlDocument::parse("<score-timewise/>").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_parse_requires_parts() {
        let err = XmlDocument::parse("<score-partwise><part-list/></score-partwise>").unwrap_err();
        assert!(matches!(err, ParseError::MissingRequiredElement(_)));
    }

    #[test]
    fn test_parse_invalid_xml() {
        let err = XmlDocument::parse("<score-partwise><part>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidXml(_)));
    }
}
