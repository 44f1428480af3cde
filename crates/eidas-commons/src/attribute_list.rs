//! Insertion-ordered personal attribute list and its textual encoding.
//!
//! The list preserves insertion order because the order of attributes is
//! significant when the SAML extension is serialized. Keys are unique;
//! re-inserting an existing name replaces the attribute in place.
//!
//! The textual grammar, used in HTTP parameters and logs, is
//! `name:isRequired:[value1,value2,...]:status;` repeated per attribute.
//! Complex values serialize their sub-fields as `[field=value,...]`.
//! Separator characters occurring inside values are percent-escaped so the
//! encoding round-trips losslessly.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeStatus, PersonalAttribute};

const ATTRIBUTE_SEP: char = ';';
const TUPLE_SEP: char = ':';
const VALUE_SEP: char = ',';

/// Ordered mapping from attribute name to [`PersonalAttribute`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalAttributeList {
    order: Vec<String>,
    entries: HashMap<String, PersonalAttribute>,
}

impl PersonalAttributeList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when the list has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Inserts an attribute, keyed by its name.
    ///
    /// A name already present keeps its original position; the stored
    /// attribute is replaced.
    pub fn insert(&mut self, attribute: PersonalAttribute) {
        if attribute.name.is_empty() {
            return;
        }
        if !self.entries.contains_key(&attribute.name) {
            self.order.push(attribute.name.clone());
        }
        self.entries.insert(attribute.name.clone(), attribute);
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PersonalAttribute> {
        self.entries.get(name)
    }

    /// Mutable lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut PersonalAttribute> {
        self.entries.get_mut(name)
    }

    /// Removes an attribute by name, returning it when present.
    pub fn remove(&mut self, name: &str) -> Option<PersonalAttribute> {
        self.order.retain(|n| n != name);
        self.entries.remove(name)
    }

    /// True when the list holds the named attribute.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PersonalAttribute> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Names of required attributes that arrived without a usable value.
    #[must_use]
    pub fn missing_mandatory(&self) -> Vec<String> {
        self.iter()
            .filter(|a| a.is_missing_mandatory())
            .map(|a| a.name.clone())
            .collect()
    }

    /// Parses the textual encoding.
    ///
    /// Tuples that do not follow the grammar are skipped, matching the
    /// tolerant behavior of the wire format; the remainder of the list is
    /// still produced.
    #[must_use]
    pub fn parse(encoded: &str) -> Self {
        let mut list = Self::new();
        for raw in encoded.split(ATTRIBUTE_SEP) {
            if raw.is_empty() {
                continue;
            }
            match parse_tuple(raw) {
                Some(attribute) => list.insert(attribute),
                None => {
                    tracing::info!(tuple = raw, "skipping invalid personal attribute tuple");
                }
            }
        }
        list
    }
}

impl fmt::Display for PersonalAttributeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attribute in self.iter() {
            write_tuple(f, attribute)?;
        }
        Ok(())
    }
}

impl FromIterator<PersonalAttribute> for PersonalAttributeList {
    fn from_iter<I: IntoIterator<Item = PersonalAttribute>>(iter: I) -> Self {
        let mut list = Self::new();
        for attribute in iter {
            list.insert(attribute);
        }
        list
    }
}

impl<'a> IntoIterator for &'a PersonalAttributeList {
    type Item = &'a PersonalAttribute;
    type IntoIter = Box<dyn Iterator<Item = &'a PersonalAttribute> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

fn write_tuple(f: &mut fmt::Formatter<'_>, attribute: &PersonalAttribute) -> fmt::Result {
    write!(f, "{}{}{}{}[", escape(&attribute.name), TUPLE_SEP, attribute.required, TUPLE_SEP)?;
    if attribute.is_empty_value() && !attribute.is_empty_complex_value() {
        let mut first = true;
        for (field, value) in &attribute.complex_value {
            if !first {
                write!(f, "{VALUE_SEP}")?;
            }
            write!(f, "{}={}", escape(field), escape(value))?;
            first = false;
        }
    } else {
        let mut first = true;
        for value in &attribute.values {
            if !first {
                write!(f, "{VALUE_SEP}")?;
            }
            write!(f, "{}", escape(value))?;
            first = false;
        }
    }
    write!(
        f,
        "]{}{}{}",
        TUPLE_SEP,
        attribute.status.map_or("", AttributeStatus::as_str),
        ATTRIBUTE_SEP
    )
}

fn parse_tuple(raw: &str) -> Option<PersonalAttribute> {
    let mut parts = raw.splitn(4, TUPLE_SEP);
    let name = parts.next()?;
    let required = parts.next()?;
    let bracketed = parts.next()?;
    let status = parts.next().unwrap_or("");

    if name.is_empty() || !bracketed.starts_with('[') || !bracketed.ends_with(']') {
        return None;
    }
    let required = match required {
        "true" => true,
        "false" => false,
        _ => return None,
    };

    let mut attribute = PersonalAttribute::new(unescape(name)?, required);
    let inner = &bracketed[1..bracketed.len() - 1];
    let elements: Vec<&str> = inner
        .split(VALUE_SEP)
        .filter(|v| !v.is_empty())
        .collect();

    // Unescaped '=' only ever appears in complex sub-field pairs; simple
    // values have it percent-escaped.
    if !elements.is_empty() && elements.iter().all(|e| e.contains('=')) {
        let mut complex = BTreeMap::new();
        for element in elements {
            let (field, value) = element.split_once('=')?;
            complex.insert(unescape(field)?, unescape(value)?);
        }
        attribute.complex_value = complex;
    } else {
        attribute.values = elements
            .into_iter()
            .map(unescape)
            .collect::<Option<Vec<_>>>()?;
    }

    if !status.is_empty() {
        attribute.status = Some(AttributeStatus::from_str_opt(status)?);
    }
    Some(attribute)
}

/// Percent-escapes the characters that are structural in the encoding.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ';' => out.push_str("%3B"),
            ':' => out.push_str("%3A"),
            ',' => out.push_str("%2C"),
            '=' => out.push_str("%3D"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Option<String> {
    urlencoding::decode(value).ok().map(|c| c.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_list() -> PersonalAttributeList {
        let mut list = PersonalAttributeList::new();
        list.insert(
            PersonalAttribute::new("PersonIdentifier", true)
                .with_value("ES/PT/12345")
                .with_status(AttributeStatus::Available),
        );
        list.insert(PersonalAttribute::new("DateOfBirth", false).with_value("1980-01-01"));
        list.insert(PersonalAttribute::new("Gender", false));
        list
    }

    #[test]
    fn round_trip_preserves_everything() {
        let list = sample_list();
        let encoded = list.to_string();
        let parsed = PersonalAttributeList::parse(&encoded);
        assert_eq!(parsed, list);
        // Insertion order survives.
        let names: Vec<_> = parsed.names().collect();
        assert_eq!(names, ["PersonIdentifier", "DateOfBirth", "Gender"]);
    }

    #[test]
    fn round_trip_with_complex_value() {
        let mut complex = BTreeMap::new();
        complex.insert("streetName".to_string(), "Rua dos Aliados".to_string());
        complex.insert("postalCode".to_string(), "4000-123".to_string());
        let mut list = PersonalAttributeList::new();
        list.insert(
            PersonalAttribute::new("CurrentAddress", true).with_complex_value(complex),
        );
        let parsed = PersonalAttributeList::parse(&list.to_string());
        assert_eq!(parsed, list);
    }

    #[test]
    fn round_trip_with_separator_characters_in_values() {
        let mut list = PersonalAttributeList::new();
        list.insert(
            PersonalAttribute::new("textResidenceAddress", false)
                .with_value("Main St. 5; Apt 2:3, door=left [rear]"),
        );
        let parsed = PersonalAttributeList::parse(&list.to_string());
        assert_eq!(parsed, list);
    }

    #[test]
    fn known_wire_form() {
        let list = sample_list();
        assert_eq!(
            list.to_string(),
            "PersonIdentifier:true:[ES/PT/12345]:Available;\
             DateOfBirth:false:[1980-01-01]:;\
             Gender:false:[]:;"
        );
    }

    #[test]
    fn parse_skips_invalid_tuples() {
        let parsed = PersonalAttributeList::parse("garbage;eIdentifier:true:[v]:;");
        assert_eq!(parsed.len(), 1);
        assert!(parsed.contains("eIdentifier"));
    }

    #[test]
    fn reinsert_keeps_position() {
        let mut list = sample_list();
        list.insert(PersonalAttribute::new("PersonIdentifier", false).with_value("other"));
        let names: Vec<_> = list.names().collect();
        assert_eq!(names, ["PersonIdentifier", "DateOfBirth", "Gender"]);
        assert_eq!(list.get("PersonIdentifier").unwrap().values, ["other"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn missing_mandatory_names() {
        let mut list = PersonalAttributeList::new();
        list.insert(PersonalAttribute::new("FamilyName", true));
        list.insert(PersonalAttribute::new("FirstName", true).with_value("Ana"));
        assert_eq!(list.missing_mandatory(), ["FamilyName"]);
    }
}
