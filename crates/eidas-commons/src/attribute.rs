//! Personal attribute model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status of an attribute as reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeStatus {
    /// The provider supplied a value.
    Available,
    /// The provider could not supply a value.
    NotAvailable,
    /// The citizen declined to release the value.
    Withheld,
}

impl AttributeStatus {
    /// Wire representation, as carried in the attribute-list encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::NotAvailable => "NotAvailable",
            Self::Withheld => "Withheld",
        }
    }

    /// Parses the wire representation. Unknown strings yield `None`.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "NotAvailable" => Some(Self::NotAvailable),
            "Withheld" => Some(Self::Withheld),
            _ => None,
        }
    }
}

/// A single personal attribute flowing through the authentication pipeline.
///
/// Values are an ordered list of strings; structured attributes (the
/// current-address family) carry a complex value of named sub-fields
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalAttribute {
    /// Attribute name in whichever vocabulary the list currently uses.
    pub name: String,
    /// Whether the requesting SP marked this attribute mandatory.
    pub required: bool,
    /// Simple values, in provider order.
    pub values: Vec<String>,
    /// Sub-field name to value, for structured attributes.
    pub complex_value: BTreeMap<String, String>,
    /// Provider-reported status, once a response has been processed.
    pub status: Option<AttributeStatus>,
}

impl PersonalAttribute {
    /// Creates an empty attribute with the given name and requirement flag.
    #[must_use]
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            required,
            values: Vec::new(),
            complex_value: BTreeMap::new(),
            status: None,
        }
    }

    /// Sets the simple values.
    #[must_use]
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a single simple value.
    #[must_use]
    pub fn with_value(self, value: impl Into<String>) -> Self {
        self.with_values([value.into()])
    }

    /// Sets the complex value.
    #[must_use]
    pub fn with_complex_value(mut self, complex: BTreeMap<String, String>) -> Self {
        self.complex_value = complex;
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: AttributeStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// True when there is no usable simple value.
    ///
    /// A list containing exactly one empty string counts as empty; that is
    /// how an unanswered form field arrives.
    #[must_use]
    pub fn is_empty_value(&self) -> bool {
        self.values.is_empty() || (self.values.len() == 1 && self.values[0].is_empty())
    }

    /// True when there is no complex value.
    #[must_use]
    pub fn is_empty_complex_value(&self) -> bool {
        self.complex_value.is_empty()
    }

    /// A mandatory attribute that arrived without value and without an
    /// `Available` status fails downstream mandatory verification.
    #[must_use]
    pub fn is_missing_mandatory(&self) -> bool {
        self.required
            && self.is_empty_value()
            && self.is_empty_complex_value()
            && self.status != Some(AttributeStatus::Available)
    }

    /// Single value for display, or the bracketed list when multivalued.
    #[must_use]
    pub fn display_value(&self) -> String {
        if self.values.len() == 1 {
            self.values[0].clone()
        } else {
            format!("[{}]", self.values.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_detection() {
        let attr = PersonalAttribute::new("dateOfBirth", true);
        assert!(attr.is_empty_value());

        let attr = attr.with_values([""]);
        assert!(attr.is_empty_value());

        let attr = attr.with_value("1980-01-01");
        assert!(!attr.is_empty_value());
    }

    #[test]
    fn missing_mandatory_detection() {
        let attr = PersonalAttribute::new("PersonIdentifier", true);
        assert!(attr.is_missing_mandatory());

        let present = attr.clone().with_value("ES/PT/1234");
        assert!(!present.is_missing_mandatory());

        let optional = PersonalAttribute::new("Gender", false);
        assert!(!optional.is_missing_mandatory());

        // NotAvailable + empty value on a required attribute still fails.
        let unavailable = attr.with_status(AttributeStatus::NotAvailable);
        assert!(unavailable.is_missing_mandatory());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            AttributeStatus::Available,
            AttributeStatus::NotAvailable,
            AttributeStatus::Withheld,
        ] {
            assert_eq!(AttributeStatus::from_str_opt(status.as_str()), Some(status));
        }
        assert_eq!(AttributeStatus::from_str_opt("bogus"), None);
    }
}
