//! Attribute translation between vocabularies.
//!
//! All format-specific attribute knowledge lives here: the bidirectional
//! name map between the national/legacy vocabulary and the canonical
//! eIDAS vocabulary, per-attribute value normalization (date encodings),
//! and derived attributes computed from source attributes already present
//! in the session (age checks from the date of birth).
//!
//! Every cross-border message passes through exactly one canonicalization
//! on ingress and one de-canonicalization on egress.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};

use eidas_commons::{
    keys, vocabulary, AttributeStatus, AuthnRequest, AuthnResponse, ErrorId, NodeConfig,
    NodeResult, PersonalAttribute, PersonalAttributeList, SessionStore,
};

use crate::saml_service::SamlService;

/// A derived attribute and the source it is computed from.
#[derive(Debug, Clone)]
struct DerivationRule {
    derived: &'static str,
    source: &'static str,
}

const DERIVATIONS: &[DerivationRule] = &[
    DerivationRule {
        derived: "isAgeOver",
        source: "dateOfBirth",
    },
    DerivationRule {
        derived: "age",
        source: "dateOfBirth",
    },
];

/// Bidirectional attribute translator.
pub struct AttributeTranslator {
    config: Arc<NodeConfig>,
    to_canonical: HashMap<String, String>,
    from_canonical: HashMap<String, String>,
    allow_unknowns: bool,
    /// chrono pattern of date values in the local vocabulary.
    local_date_format: String,
}

/// chrono pattern of date values in the canonical vocabulary (ISO).
const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

impl AttributeTranslator {
    /// Builds the translator from the configured mapping slots
    /// (`attribute.local.N` / `attribute.canonical.N`), seeded with the
    /// built-in pairs when no slots are configured.
    pub fn from_config(config: Arc<NodeConfig>) -> NodeResult<Self> {
        let mut to_canonical = HashMap::new();
        let mut from_canonical = HashMap::new();

        let slots: usize = match config.get("attribute.number") {
            None => 0,
            Some(raw) => raw
                .parse()
                .map_err(|_| config.internal(ErrorId::Configuration))?,
        };
        if slots == 0 {
            for (local, canonical) in vocabulary::DEFAULT_NAME_PAIRS {
                to_canonical.insert((*local).to_string(), (*canonical).to_string());
                from_canonical.insert((*canonical).to_string(), (*local).to_string());
            }
        } else {
            for slot in 1..=slots {
                let local = config.get(&format!("attribute.local.{slot}"));
                let canonical = config.get(&format!("attribute.canonical.{slot}"));
                let (Some(local), Some(canonical)) = (local, canonical) else {
                    return Err(config.internal(ErrorId::Configuration));
                };
                to_canonical.insert(local.to_string(), canonical.to_string());
                from_canonical.insert(canonical.to_string(), local.to_string());
            }
        }

        let allow_unknowns = config.get("specific.allowUnknowns") == Some("true");
        let local_date_format = config
            .get("attribute.date.format")
            .unwrap_or("%d/%m/%Y")
            .to_string();

        Ok(Self {
            config,
            to_canonical,
            from_canonical,
            allow_unknowns,
            local_date_format,
        })
    }

    /// Renames attributes from the local vocabulary to the canonical one.
    /// Unknown names are a validation failure unless the deployment
    /// allows passing them through.
    pub fn normalise_names_to_canonical(
        &self,
        list: &PersonalAttributeList,
    ) -> NodeResult<PersonalAttributeList> {
        self.rename(list, &self.to_canonical)
    }

    /// Renames attributes from the canonical vocabulary back to the local
    /// one.
    pub fn normalise_names_from_canonical(
        &self,
        list: &PersonalAttributeList,
    ) -> NodeResult<PersonalAttributeList> {
        self.rename(list, &self.from_canonical)
    }

    fn rename(
        &self,
        list: &PersonalAttributeList,
        map: &HashMap<String, String>,
    ) -> NodeResult<PersonalAttributeList> {
        let mut renamed = PersonalAttributeList::new();
        for attribute in list.iter() {
            match map.get(&attribute.name) {
                Some(name) => {
                    let mut translated = attribute.clone();
                    translated.name = name.clone();
                    renamed.insert(translated);
                }
                None if self.allow_unknowns || vocabulary::is_known(&attribute.name) => {
                    renamed.insert(attribute.clone());
                }
                None => {
                    tracing::info!(name = %attribute.name, "attribute unknown to this node");
                    return Err(self.config.invalid_parameter(ErrorId::InvalidAttributeList));
                }
            }
        }
        Ok(renamed)
    }

    /// Reformats attribute values into the canonical encodings. A value
    /// that fails validation is an integrity violation: a SAML error
    /// response is generated through the supplied service and reported in
    /// the raised error.
    pub fn normalise_values_to_canonical(
        &self,
        saml_service: &SamlService,
        request: &AuthnRequest,
        _remote_ip: &str,
    ) -> NodeResult<PersonalAttributeList> {
        match self.reformat_dates(&request.attributes, &self.local_date_format, CANONICAL_DATE_FORMAT)
        {
            Ok(list) => Ok(list),
            Err(()) => {
                let token = saml_service.generate_error_token(
                    request,
                    ErrorId::InvalidAttributeValue,
                    AuthnResponse::SUB_STATUS_INVALID_ATTR,
                );
                Err(self
                    .config
                    .service_error(ErrorId::InvalidAttributeValue, token))
            }
        }
    }

    /// Reformats canonical values back into the local encodings.
    pub fn normalise_values_from_canonical(
        &self,
        list: &PersonalAttributeList,
    ) -> NodeResult<PersonalAttributeList> {
        self.reformat_dates(list, CANONICAL_DATE_FORMAT, &self.local_date_format)
            .map_err(|()| self.config.security(ErrorId::InvalidAttributeValue))
    }

    fn reformat_dates(
        &self,
        list: &PersonalAttributeList,
        from: &str,
        to: &str,
    ) -> Result<PersonalAttributeList, ()> {
        let mut out = PersonalAttributeList::new();
        for attribute in list.iter() {
            let mut updated = attribute.clone();
            if is_date_attribute(&attribute.name) && !attribute.is_empty_value() {
                updated.values = attribute
                    .values
                    .iter()
                    .map(|value| {
                        NaiveDate::parse_from_str(value, from)
                            .map(|date| date.format(to).to_string())
                            .map_err(|_| ())
                    })
                    .collect::<Result<Vec<_>, ()>>()?;
            }
            out.insert(updated);
        }
        Ok(out)
    }

    /// Request direction: replaces derived attributes with the source
    /// attribute they will be computed from, so the identity provider is
    /// asked for data it actually holds.
    #[must_use]
    pub fn derive_attributes_from(&self, list: &PersonalAttributeList) -> PersonalAttributeList {
        let mut out = PersonalAttributeList::new();
        for attribute in list.iter() {
            match DERIVATIONS.iter().find(|rule| rule.derived == attribute.name) {
                Some(rule) => {
                    if !out.contains(rule.source) {
                        out.insert(PersonalAttribute::new(rule.source, attribute.required));
                    }
                }
                None => out.insert(attribute.clone()),
            }
        }
        out
    }

    /// Response direction: computes derived attributes from source data in
    /// `list`, honoring the original request stored in the session (the
    /// requested minimum age lives in the request's attribute values).
    /// Invalid or missing source data is an integrity violation reported
    /// like a bad attribute value.
    pub fn derive_attributes_to(
        &self,
        saml_service: &SamlService,
        session: &dyn SessionStore,
        list: &PersonalAttributeList,
        _remote_ip: &str,
    ) -> NodeResult<PersonalAttributeList> {
        let Some(original) = session
            .get(keys::AUTH_REQUEST)
            .and_then(|v| v.as_request().cloned())
        else {
            return Err(self.config.invalid_session(ErrorId::SessionError));
        };

        let mut out = list.clone();
        let mut derived_results = Vec::new();
        let mut consumed_sources = Vec::new();
        for rule in DERIVATIONS {
            let Some(requested) = original.attributes.get(rule.derived) else {
                continue;
            };
            let Some(source) = out.get(rule.source).cloned() else {
                continue;
            };
            match self.compute_derivation(rule, requested, &source) {
                Ok(derived) => {
                    if !original.attributes.contains(rule.source) {
                        consumed_sources.push(rule.source);
                    }
                    derived_results.push(derived);
                }
                Err(()) => {
                    let token = saml_service.generate_error_token(
                        &original,
                        ErrorId::InvalidAttributeValue,
                        AuthnResponse::SUB_STATUS_INVALID_ATTR,
                    );
                    return Err(self
                        .config
                        .service_error(ErrorId::InvalidAttributeValue, token));
                }
            }
        }
        // A source attribute the SP never asked for is dropped once its
        // derivations are computed.
        for source in consumed_sources {
            out.remove(source);
        }
        for derived in derived_results {
            out.insert(derived);
        }
        Ok(out)
    }

    fn compute_derivation(
        &self,
        rule: &DerivationRule,
        requested: &PersonalAttribute,
        source: &PersonalAttribute,
    ) -> Result<PersonalAttribute, ()> {
        if source.is_empty_value() {
            return Err(());
        }
        let birth = NaiveDate::parse_from_str(&source.values[0], CANONICAL_DATE_FORMAT)
            .map_err(|_| ())?;
        let age = age_at(birth, Utc::now().date_naive());

        let mut derived = PersonalAttribute::new(rule.derived, requested.required);
        match rule.derived {
            "isAgeOver" => {
                let minimum: i32 = requested
                    .values
                    .first()
                    .and_then(|v| v.parse().ok())
                    .ok_or(())?;
                if age >= minimum {
                    derived.values = requested.values.clone();
                    derived.status = Some(AttributeStatus::Available);
                } else {
                    derived.status = Some(AttributeStatus::NotAvailable);
                }
            }
            _ => {
                derived.values = vec![age.to_string()];
                derived.status = Some(AttributeStatus::Available);
            }
        }
        Ok(derived)
    }
}

fn is_date_attribute(name: &str) -> bool {
    name == "dateOfBirth" || name == "DateOfBirth"
}

fn age_at(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}
