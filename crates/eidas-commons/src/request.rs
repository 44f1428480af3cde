//! Authentication request and response envelopes.
//!
//! An [`AuthnRequest`] is created either by the connector (on behalf of a
//! service provider) or parsed from wire bytes by the receiving side; it is
//! then mutated by the attribute translator and the consent service as it
//! moves through the pipeline. Exactly one of the QAA level and the eIDAS
//! LoA is authoritative, selected by [`MessageFormat`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribute_list::PersonalAttributeList;
use crate::format::{MessageFormat, SamlBinding};
use crate::levels::{EidasLoa, LoaComparison, QaaLevel};

/// One authentication request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique SAML message identifier. Assigned by the engine when the
    /// request is generated; never reused within the replay window.
    pub saml_id: String,
    /// Entity that issued the request.
    pub issuer: String,
    /// URL the request is addressed to.
    pub destination: String,
    /// Where the eventual response must be delivered.
    pub assertion_consumer_service_url: String,
    /// Display name of the requesting service provider.
    pub provider_name: String,
    /// Service provider identifier, when distinct from the provider name.
    pub sp_id: Option<String>,
    /// SP business sector.
    pub sp_sector: Option<String>,
    /// SP institution.
    pub sp_institution: Option<String>,
    /// SP application.
    pub sp_application: Option<String>,
    /// Country of the requesting SP; also the replay-cache scope for
    /// incoming colleague requests.
    pub sp_country: Option<String>,
    /// Legacy STORK quality level; authoritative when the format is
    /// [`MessageFormat::Stork1`].
    pub qaa_level: Option<QaaLevel>,
    /// eIDAS level of assurance; authoritative when the format is
    /// [`MessageFormat::Eidas`].
    pub eidas_loa: Option<EidasLoa>,
    /// How the response LoA must compare to the requested one.
    pub loa_comparison: LoaComparison,
    /// Country whose identity provider will authenticate the citizen.
    pub citizen_country_code: Option<String>,
    /// Wire vocabulary of this message.
    pub message_format: MessageFormat,
    /// Requested (or, later, released) attributes.
    pub attributes: PersonalAttributeList,
    /// Signed serialized form, once generated or received.
    #[serde(skip)]
    pub raw_token: Vec<u8>,
    /// Transport binding for this message.
    pub binding: SamlBinding,
}

impl AuthnRequest {
    /// Creates an empty request in the given format. The SAML id is left
    /// blank; the engine assigns it at generation time.
    #[must_use]
    pub fn new(format: MessageFormat) -> Self {
        Self {
            saml_id: String::new(),
            issuer: String::new(),
            destination: String::new(),
            assertion_consumer_service_url: String::new(),
            provider_name: String::new(),
            sp_id: None,
            sp_sector: None,
            sp_institution: None,
            sp_application: None,
            sp_country: None,
            qaa_level: None,
            eidas_loa: None,
            loa_comparison: LoaComparison::Minimum,
            citizen_country_code: None,
            message_format: format,
            attributes: PersonalAttributeList::new(),
            raw_token: Vec::new(),
            binding: SamlBinding::HttpPost,
        }
    }

    /// Sets the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = url.into();
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    /// Sets the legacy QAA level.
    #[must_use]
    pub const fn with_qaa(mut self, qaa: QaaLevel) -> Self {
        self.qaa_level = Some(qaa);
        self
    }

    /// Sets the eIDAS level of assurance.
    #[must_use]
    pub const fn with_loa(mut self, loa: EidasLoa) -> Self {
        self.eidas_loa = Some(loa);
        self
    }

    /// Sets the citizen country.
    #[must_use]
    pub fn with_citizen_country(mut self, country: impl Into<String>) -> Self {
        self.citizen_country_code = Some(country.into());
        self
    }

    /// Sets the attribute list.
    #[must_use]
    pub fn with_attributes(mut self, attributes: PersonalAttributeList) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the transport binding.
    #[must_use]
    pub const fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.binding = binding;
        self
    }

    /// The replay-cache scope for this message: the SP country when known,
    /// otherwise the citizen country.
    #[must_use]
    pub fn origin_country(&self) -> &str {
        self.sp_country
            .as_deref()
            .or(self.citizen_country_code.as_deref())
            .unwrap_or("")
    }
}

/// One authentication response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnResponse {
    /// Unique SAML message identifier of the response itself.
    pub saml_id: String,
    /// Identifier of the request this response answers.
    pub in_response_to: String,
    /// Asserting party.
    pub issuer: String,
    /// Audience restriction recorded in the assertion.
    pub audience: Option<String>,
    /// Top-level SAML status code URI.
    pub status_code: String,
    /// Optional sub-status URI refining a failure.
    pub sub_status_code: Option<String>,
    /// Human-readable status message.
    pub status_message: Option<String>,
    /// eIDAS level of assurance asserted by the responder.
    pub eidas_loa: Option<EidasLoa>,
    /// Released attributes.
    pub attributes: PersonalAttributeList,
    /// Wire vocabulary of this message.
    pub message_format: MessageFormat,
    /// Signed serialized form.
    #[serde(skip)]
    pub raw_token: Vec<u8>,
    /// True when the status code reports a failure.
    pub failure: bool,
}

impl AuthnResponse {
    /// SAML success status URI.
    pub const STATUS_SUCCESS: &'static str = "urn:oasis:names:tc:SAML:2.0:status:Success";
    /// SAML requester-fault status URI.
    pub const STATUS_REQUESTER: &'static str = "urn:oasis:names:tc:SAML:2.0:status:Requester";
    /// SAML responder-fault status URI.
    pub const STATUS_RESPONDER: &'static str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
    /// Request-denied sub-status URI.
    pub const SUB_STATUS_REQUEST_DENIED: &'static str =
        "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";
    /// Invalid attribute name/value sub-status URI.
    pub const SUB_STATUS_INVALID_ATTR: &'static str =
        "urn:oasis:names:tc:SAML:2.0:status:InvalidAttrNameOrValue";

    /// Creates a successful response shell for the given request id.
    #[must_use]
    pub fn success(in_response_to: impl Into<String>, format: MessageFormat) -> Self {
        Self {
            saml_id: String::new(),
            in_response_to: in_response_to.into(),
            issuer: String::new(),
            audience: None,
            status_code: Self::STATUS_SUCCESS.to_string(),
            sub_status_code: None,
            status_message: None,
            eidas_loa: None,
            attributes: PersonalAttributeList::new(),
            message_format: format,
            raw_token: Vec::new(),
            failure: false,
        }
    }
}

/// Timestamp helper: the instant format used in SAML messages.
#[must_use]
pub fn saml_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::PersonalAttribute;

    #[test]
    fn builder_chain() {
        let mut attributes = PersonalAttributeList::new();
        attributes.insert(PersonalAttribute::new("PersonIdentifier", true));
        let request = AuthnRequest::new(MessageFormat::Eidas)
            .with_issuer("https://connector.example.eu/metadata")
            .with_destination("https://service.example.eu/ColleagueRequest")
            .with_provider_name("University of Oxford")
            .with_loa(EidasLoa::Substantial)
            .with_citizen_country("PT")
            .with_attributes(attributes);

        assert_eq!(request.provider_name, "University of Oxford");
        assert_eq!(request.eidas_loa, Some(EidasLoa::Substantial));
        assert!(request.qaa_level.is_none());
        assert_eq!(request.origin_country(), "PT");
    }

    #[test]
    fn origin_country_prefers_sp_country() {
        let mut request = AuthnRequest::new(MessageFormat::Stork1).with_citizen_country("PT");
        request.sp_country = Some("ES".to_string());
        assert_eq!(request.origin_country(), "ES");
    }
}
