//! Citizen consent model.

use serde::{Deserialize, Serialize};

/// Attribute names the citizen has agreed to release, split by obligation.
///
/// Derived from the consent-form submission matched against the request's
/// attribute list; an attribute absent from both lists was declined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitizenConsent {
    mandatory: Vec<String>,
    optional: Vec<String>,
}

impl CitizenConsent {
    /// Creates an empty consent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records consent for a mandatory attribute.
    pub fn add_mandatory(&mut self, name: impl Into<String>) {
        self.mandatory.push(name.into());
    }

    /// Records consent for an optional attribute.
    pub fn add_optional(&mut self, name: impl Into<String>) {
        self.optional.push(name.into());
    }

    /// Names of consented mandatory attributes, in consent order.
    #[must_use]
    pub fn mandatory(&self) -> &[String] {
        &self.mandatory
    }

    /// Names of consented optional attributes, in consent order.
    #[must_use]
    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// True when the citizen consented to the named attribute in either
    /// capacity.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.mandatory.iter().any(|n| n == name) || self.optional.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership() {
        let mut consent = CitizenConsent::new();
        consent.add_mandatory("eIdentifier");
        consent.add_optional("eMail");
        assert!(consent.contains("eIdentifier"));
        assert!(consent.contains("eMail"));
        assert!(!consent.contains("age"));
        assert_eq!(consent.mandatory(), ["eIdentifier"]);
        assert_eq!(consent.optional(), ["eMail"]);
    }
}
