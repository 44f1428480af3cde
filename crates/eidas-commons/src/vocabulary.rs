//! Attribute vocabulary registry.
//!
//! A closed, statically-resolved table of every attribute name this node
//! understands, in both the canonical eIDAS vocabulary and the legacy
//! STORK vocabulary. Lookup yields an explicit [`Lookup::Unknown`] outcome;
//! nothing is resolved reflectively at run time.

/// Category of a known attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeCategory {
    /// eIDAS natural-person attribute.
    NaturalPerson,
    /// eIDAS legal-person attribute.
    LegalPerson,
    /// Legacy STORK attribute.
    LegacyStork,
}

/// Outcome of a vocabulary lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The name is known, with its category.
    Known(AttributeCategory),
    /// The name is not part of any supported vocabulary.
    Unknown,
}

/// eIDAS natural-person attribute names (canonical vocabulary).
pub const EIDAS_NATURAL: &[&str] = &[
    "PersonIdentifier",
    "FamilyName",
    "FirstName",
    "DateOfBirth",
    "BirthName",
    "PlaceOfBirth",
    "CurrentAddress",
    "Gender",
];

/// eIDAS legal-person attribute names (canonical vocabulary).
pub const EIDAS_LEGAL: &[&str] = &[
    "LegalPersonIdentifier",
    "LegalName",
    "LegalAddress",
    "VATRegistration",
    "TaxReference",
    "EORI",
    "LEI",
    "SEED",
    "SIC",
];

/// Legacy STORK attribute names.
pub const STORK_LEGACY: &[&str] = &[
    "eIdentifier",
    "givenName",
    "surname",
    "dateOfBirth",
    "isAgeOver",
    "age",
    "gender",
    "eMail",
    "countryCodeOfBirth",
    "canonicalResidenceAddress",
    "textResidenceAddress",
    "fiscalNumber",
    "nationalityCode",
];

/// The eIDAS natural-person minimum data set. When a response carries any
/// natural-person attribute, all of these must be present.
pub const NATURAL_MANDATORY_SET: &[&str] =
    &["PersonIdentifier", "FamilyName", "FirstName", "DateOfBirth"];

/// The eIDAS legal-person minimum data set.
pub const LEGAL_MANDATORY_SET: &[&str] = &["LegalPersonIdentifier", "LegalName"];

/// Default bidirectional pairs (legacy name, canonical name) used to seed
/// the attribute translator when the deployment does not configure its own
/// mapping slots.
pub const DEFAULT_NAME_PAIRS: &[(&str, &str)] = &[
    ("eIdentifier", "PersonIdentifier"),
    ("surname", "FamilyName"),
    ("givenName", "FirstName"),
    ("dateOfBirth", "DateOfBirth"),
    ("gender", "Gender"),
    ("canonicalResidenceAddress", "CurrentAddress"),
];

/// Resolves an attribute name against every supported vocabulary.
#[must_use]
pub fn lookup(name: &str) -> Lookup {
    if EIDAS_NATURAL.contains(&name) {
        Lookup::Known(AttributeCategory::NaturalPerson)
    } else if EIDAS_LEGAL.contains(&name) {
        Lookup::Known(AttributeCategory::LegalPerson)
    } else if STORK_LEGACY.contains(&name) {
        Lookup::Known(AttributeCategory::LegacyStork)
    } else {
        Lookup::Unknown
    }
}

/// True when the name belongs to a supported vocabulary.
#[must_use]
pub fn is_known(name: &str) -> bool {
    lookup(name) != Lookup::Unknown
}

/// Checks the minimum-data-set rule over a collection of attribute names.
///
/// If any natural-person attribute is present, the whole natural-person
/// minimum set must be present; likewise for legal-person attributes. A
/// list touching neither vocabulary passes.
#[must_use]
pub fn check_mandatory_sets<'a, I>(names: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    let has_natural = names
        .iter()
        .any(|n| lookup(n) == Lookup::Known(AttributeCategory::NaturalPerson));
    let has_legal = names
        .iter()
        .any(|n| lookup(n) == Lookup::Known(AttributeCategory::LegalPerson));

    if has_natural && !NATURAL_MANDATORY_SET.iter().all(|m| names.contains(m)) {
        return false;
    }
    if has_legal && !LEGAL_MANDATORY_SET.iter().all(|m| names.contains(m)) {
        return false;
    }
    true
}
