//! Part groups
//!
//! Every score has an implicit outermost group (absolute number 0); groups
//! declared in the part list nest inside it.

use crate::errors::Result;
use crate::msr::part::Part;
use crate::msr::uplinks::{require, PartGroupKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartGroupSymbol {
    #[default]
    None,
    Brace,
    Bracket,
    Line,
    Square,
}

impl PartGroupSymbol {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "none" => Some(PartGroupSymbol::None),
            "brace" => Some(PartGroupSymbol::Brace),
            "bracket" => Some(PartGroupSymbol::Bracket),
            "line" => Some(PartGroupSymbol::Line),
            "square" => Some(PartGroupSymbol::Square),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartGroupElement {
    Part(Part),
    Group(PartGroup),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartGroup {
    /// `number` attribute, reused by the source for successive groups
    pub number: i32,
    /// Unique over the score, 0 for the implicit outer group
    pub absolute_number: u32,
    pub symbol: PartGroupSymbol,
    /// Barlines drawn through all the group's staves
    pub barline: bool,
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub elements: Vec<PartGroupElement>,
    pub uplink: Option<PartGroupKey>,
    pub input_line: u32,
}

impl PartGroup {
    pub fn new(number: i32, absolute_number: u32, input_line: u32) -> Self {
        Self {
            number,
            absolute_number,
            symbol: PartGroupSymbol::None,
            barline: false,
            name: None,
            abbreviation: None,
            elements: Vec::new(),
            uplink: None,
            input_line,
        }
    }

    /// The outermost group every score has
    pub fn implicit(input_line: u32) -> Self {
        Self::new(0, 0, input_line)
    }

    pub fn is_implicit(&self) -> bool {
        self.absolute_number == 0
    }

    pub fn key(&self) -> PartGroupKey {
        PartGroupKey {
            absolute_number: self.absolute_number,
        }
    }

    pub fn part_group_uplink(&self) -> Result<&PartGroupKey> {
        require(
            &self.uplink,
            self.input_line,
            &format!("part group {}", self.absolute_number),
        )
    }

    pub fn append_part(&mut self, mut part: Part) {
        part.uplink = Some(self.key());
        self.elements.push(PartGroupElement::Part(part));
    }

    pub fn append_sub_group(&mut self, mut group: PartGroup) {
        group.uplink = Some(self.key());
        self.elements.push(PartGroupElement::Group(group));
    }

    /// Parts of this group and its sub-groups, depth-first
    pub fn parts(&self) -> Vec<&Part> {
        let mut parts = Vec::new();
        self.collect_parts(&mut parts);
        parts
    }

    fn collect_parts<'a>(&'a self, out: &mut Vec<&'a Part>) {
        for element in &self.elements {
            match element {
                PartGroupElement::Part(part) => out.push(part),
                PartGroupElement::Group(group) => group.collect_parts(out),
            }
        }
    }

    pub fn find_part(&self, id: &str) -> Option<&Part> {
        self.elements.iter().find_map(|element| match element {
            PartGroupElement::Part(part) if part.id == id => Some(part),
            PartGroupElement::Part(_) => None,
            PartGroupElement::Group(group) => group.find_part(id),
        })
    }

    pub fn find_part_mut(&mut self, id: &str) -> Option<&mut Part> {
        self.elements.iter_mut().find_map(|element| match element {
            PartGroupElement::Part(part) if part.id == id => Some(part),
            PartGroupElement::Part(_) => None,
            PartGroupElement::Group(group) => group.find_part_mut(id),
        })
    }

    /// Same attributes, no parts, owned by `owner` (`None` at top level)
    pub fn newborn_clone(&self, owner: Option<&PartGroupKey>) -> PartGroup {
        PartGroup {
            elements: Vec::new(),
            uplink: owner.copied(),
            ..self.clone()
        }
    }

    pub fn deep_copy(&self, owner: Option<&PartGroupKey>) -> PartGroup {
        let key = self.key();
        PartGroup {
            elements: self
                .elements
                .iter()
                .map(|element| match element {
                    PartGroupElement::Part(part) => PartGroupElement::Part(part.deep_copy(&key)),
                    PartGroupElement::Group(group) => {
                        PartGroupElement::Group(group.deep_copy(Some(&key)))
                    }
                })
                .collect(),
            uplink: owner.copied(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_groups_and_lookup() {
        let mut outer = PartGroup::implicit(1);
        let mut strings = PartGroup::new(1, 1, 2);
        strings.symbol = PartGroupSymbol::Bracket;
        strings.append_part(Part::new("P2", 3));
        strings.append_part(Part::new("P3", 4));
        outer.append_part(Part::new("P1", 2));
        outer.append_sub_group(strings);

        let ids: Vec<&str> = outer.parts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2", "P3"]);

        let p3 = outer.find_part("P3").unwrap();
        assert_eq!(p3.part_group_uplink().unwrap().absolute_number, 1);
        assert!(outer.find_part("P4").is_none());
        assert!(outer.is_implicit());
        assert!(outer.part_group_uplink().is_err(), "top level group has no owner");
    }

    #[test]
    fn test_clones() {
        let mut group = PartGroup::new(1, 4, 2);
        group.append_part(Part::new("P1", 3));
        assert!(group.newborn_clone(None).elements.is_empty());
        let copy = group.deep_copy(None);
        assert_eq!(copy.parts().len(), 1);
        assert_eq!(PartGroupSymbol::from_name("brace"), Some(PartGroupSymbol::Brace));
    }
}
