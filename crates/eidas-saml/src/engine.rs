//! The SAML engine: generate, validate, and re-sign messages.
//!
//! One engine instance serves one trust domain. It is configured with the
//! message formats it speaks; asking it to generate or accept a format
//! outside that set fails fast with a configuration-level error instead of
//! silently changing the wire format.

use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use eidas_commons::{vocabulary, AuthnRequest, AuthnResponse, MessageFormat};

use crate::error::{SamlError, SamlResult};
use crate::format::{
    build_request_document, build_response_document, detect_format, parse_request_document,
    parse_response_document, processor_for, ProtocolProcessor,
};
use crate::signature::{sign_document, strip_signature, verify_document, SigningCredential, TrustStore};

/// Engine configuration. All fields are fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Message formats this instance accepts and emits.
    pub formats: Vec<MessageFormat>,
    /// Reject attribute names outside the known vocabularies.
    pub strict: bool,
    /// Enforce the subject-confirmation address against the citizen's
    /// remote address during response validation.
    pub ip_binding: bool,
    /// Validity window granted to generated assertions and accepted on
    /// inbound messages, in seconds.
    pub validity_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            formats: vec![MessageFormat::Eidas, MessageFormat::Stork1],
            strict: true,
            ip_binding: true,
            validity_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Configuration accepting only the eIDAS format.
    #[must_use]
    pub fn eidas_only() -> Self {
        Self {
            formats: vec![MessageFormat::Eidas],
            ..Self::default()
        }
    }

    /// Configuration accepting only the legacy format.
    #[must_use]
    pub fn stork_only() -> Self {
        Self {
            formats: vec![MessageFormat::Stork1],
            ..Self::default()
        }
    }

    /// True when the instance speaks the given format.
    #[must_use]
    pub fn supports(&self, format: MessageFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// A request that passed structure and signature validation, together with
/// the trust-store alias of its signer.
#[derive(Debug)]
pub struct ValidatedRequest {
    /// The reconstructed request envelope.
    pub request: AuthnRequest,
    /// Alias of the key that signed the message; feeds the SP
    /// certificate-alias authorization check.
    pub signer_alias: String,
}

/// Format-aware SAML engine bound to one signing credential and one trust
/// store.
pub struct SamlEngine {
    config: EngineConfig,
    signing: SigningCredential,
    trust: TrustStore,
}

impl SamlEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(config: EngineConfig, signing: SigningCredential, trust: TrustStore) -> Self {
        Self {
            config,
            signing,
            trust,
        }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Alias of the engine's own signing credential.
    #[must_use]
    pub fn signing_alias(&self) -> &str {
        self.signing.alias()
    }

    fn processor(&self, format: MessageFormat) -> SamlResult<&'static dyn ProtocolProcessor> {
        if self.config.supports(format) {
            Ok(processor_for(format))
        } else {
            Err(SamlError::FormatNotSupported(format.name()))
        }
    }

    /// Builds, signs and serializes an authentication request. Fills the
    /// SAML id and the raw token on the returned envelope.
    pub fn generate_request(&self, request: &AuthnRequest) -> SamlResult<AuthnRequest> {
        let processor = self.processor(request.message_format)?;
        if request.attributes.is_empty() {
            return Err(SamlError::EmptyAttributeList);
        }
        if self.config.strict {
            for attribute in request.attributes.iter() {
                if !vocabulary::is_known(&attribute.name) {
                    return Err(SamlError::UnknownAttribute(attribute.name.clone()));
                }
            }
        }
        if request.provider_name.is_empty() {
            return Err(SamlError::MissingProviderName);
        }
        processor.validate_request_fields(request)?;

        let mut generated = request.clone();
        generated.saml_id = new_message_id();
        let document = build_request_document(&generated, processor, Utc::now())?;
        let signed = sign_document(&document, &generated.saml_id, &self.signing)?;
        generated.raw_token = signed.into_bytes();
        tracing::debug!(saml_id = %generated.saml_id, format = generated.message_format.name(),
            "generated authentication request");
        Ok(generated)
    }

    /// Parses and validates an inbound request: format gate, signature and
    /// trust, then envelope reconstruction.
    pub fn validate_request(&self, token: &[u8]) -> SamlResult<ValidatedRequest> {
        let xml = token_str(token)?;
        let format = detect_format(xml)
            .ok_or_else(|| SamlError::XmlParse("no known extension namespace".to_string()))?;
        // Format exclusivity comes before trust: an eIDAS-only engine
        // rejects a validly-signed legacy message.
        self.processor(format)?;

        let signer_alias = verify_document(xml, &self.trust)?;
        let parsed = parse_request_document(xml, format)?;
        if parsed.request.issuer.is_empty() {
            return Err(SamlError::MissingElement("Issuer".to_string()));
        }

        let mut request = parsed.request;
        request.raw_token = token.to_vec();
        Ok(ValidatedRequest {
            request,
            signer_alias,
        })
    }

    /// Builds and signs a response to `request` from the given shell
    /// (issuer, assurance level, attribute list, status).
    pub fn generate_response(
        &self,
        request: &AuthnRequest,
        response: &AuthnResponse,
        remote_ip: Option<&str>,
        hash_attribute_values: bool,
    ) -> SamlResult<AuthnResponse> {
        let processor = self.processor(request.message_format)?;
        let mut generated = response.clone();
        generated.saml_id = new_message_id();
        generated.in_response_to = request.saml_id.clone();
        generated.message_format = request.message_format;
        generated.audience = Some(request.issuer.clone());

        let document = build_response_document(
            request,
            &generated,
            processor,
            Utc::now(),
            ChronoDuration::seconds(self.config.validity_secs),
            remote_ip,
            hash_attribute_values,
        )?;
        let signed = sign_document(&document, &generated.saml_id, &self.signing)?;
        generated.raw_token = signed.into_bytes();
        Ok(generated)
    }

    /// Builds and signs an error response carrying a protocol status code.
    pub fn generate_error_response(
        &self,
        request: &AuthnRequest,
        issuer: &str,
        status_code: &str,
        sub_status_code: Option<&str>,
        status_message: &str,
    ) -> SamlResult<AuthnResponse> {
        let mut shell = AuthnResponse::success(&request.saml_id, request.message_format);
        shell.issuer = issuer.to_string();
        shell.status_code = status_code.to_string();
        shell.sub_status_code = sub_status_code.map(str::to_string);
        shell.status_message = Some(status_message.to_string());
        shell.failure = true;
        self.generate_response(request, &shell, None, false)
    }

    /// Parses and validates an inbound response: format gate, signature,
    /// freshness window, and (when enabled) IP binding.
    pub fn validate_response(
        &self,
        token: &[u8],
        remote_ip: Option<&str>,
        skew_millis: i64,
    ) -> SamlResult<AuthnResponse> {
        let xml = token_str(token)?;
        let format = detect_format(xml)
            .ok_or_else(|| SamlError::XmlParse("no known extension namespace".to_string()))?;
        self.processor(format)?;

        verify_document(xml, &self.trust)?;
        let parsed = parse_response_document(xml, format)?;

        let issue_instant = parsed
            .issue_instant
            .ok_or_else(|| SamlError::MissingElement("IssueInstant".to_string()))?;
        let now = Utc::now();
        let skew = ChronoDuration::milliseconds(skew_millis);
        let validity = ChronoDuration::seconds(self.config.validity_secs);
        if issue_instant < now - validity - skew {
            return Err(SamlError::StaleMessage(format!(
                "issued {issue_instant}, outside the validity window"
            )));
        }
        if issue_instant > now + skew {
            return Err(SamlError::StaleMessage(format!(
                "issued {issue_instant}, in the future"
            )));
        }

        if self.config.ip_binding {
            if let (Some(remote), Some(asserted)) = (remote_ip, &parsed.subject_address) {
                if asserted != remote {
                    return Err(SamlError::IpMismatch {
                        asserted: asserted.clone(),
                        remote: remote.to_string(),
                    });
                }
            }
        }

        let mut response = parsed.response;
        response.raw_token = token.to_vec();
        Ok(response)
    }

    /// Re-signs an already-built token with this engine's credential,
    /// leaving the content untouched. Used when forwarding a message into
    /// another trust domain.
    pub fn resign(&self, token: &[u8]) -> SamlResult<Vec<u8>> {
        let xml = token_str(token)?;
        let stripped = strip_signature(xml)?;
        let reference_id = extract_id(&stripped)?;
        let signed = sign_document(&stripped, &reference_id, &self.signing)?;
        Ok(signed.into_bytes())
    }
}

fn token_str(token: &[u8]) -> SamlResult<&str> {
    if token.is_empty() {
        return Err(SamlError::MissingElement("SAML token".to_string()));
    }
    std::str::from_utf8(token).map_err(|e| SamlError::XmlParse(format!("not UTF-8: {e}")))
}

fn extract_id(xml: &str) -> SamlResult<String> {
    let start = xml
        .find(" ID=\"")
        .map(|idx| idx + " ID=\"".len())
        .ok_or_else(|| SamlError::MissingElement("ID".to_string()))?;
    let end = xml[start..]
        .find('"')
        .map(|idx| start + idx)
        .ok_or_else(|| SamlError::XmlParse("unterminated ID attribute".to_string()))?;
    Ok(xml[start..end].to_string())
}

fn new_message_id() -> String {
    format!("_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_commons::{
        AttributeStatus, EidasLoa, PersonalAttribute, PersonalAttributeList, QaaLevel,
    };

    fn engine_pair(config: EngineConfig) -> (SamlEngine, SamlEngine) {
        // Two peers that trust each other's signing keys.
        let connector_key = SigningCredential::generate_ed25519("connector-node").unwrap();
        let service_key = SigningCredential::generate_ed25519("service-node").unwrap();
        let mut connector_trust = TrustStore::new();
        connector_trust.trust(&connector_key);
        connector_trust.trust(&service_key);
        let service_trust = connector_trust.clone();
        (
            SamlEngine::new(config.clone(), connector_key, connector_trust),
            SamlEngine::new(config, service_key, service_trust),
        )
    }

    fn oxford_request() -> AuthnRequest {
        let mut attributes = PersonalAttributeList::new();
        attributes.insert(PersonalAttribute::new("PersonIdentifier", true));
        attributes.insert(PersonalAttribute::new("DateOfBirth", false));
        AuthnRequest::new(MessageFormat::Eidas)
            .with_issuer("https://connector.example.eu/metadata")
            .with_destination("https://service.example.eu/ColleagueRequest")
            .with_acs_url("https://connector.example.eu/ColleagueResponse")
            .with_provider_name("University of Oxford")
            .with_loa(EidasLoa::Substantial)
            .with_citizen_country("PT")
            .with_attributes(attributes)
    }

    #[test]
    fn generate_then_validate_request() {
        let (connector, service) = engine_pair(EngineConfig::default());
        let generated = connector.generate_request(&oxford_request()).unwrap();
        assert!(generated.saml_id.starts_with('_'));
        assert!(!generated.raw_token.is_empty());

        let validated = service.validate_request(&generated.raw_token).unwrap();
        assert_eq!(validated.signer_alias, "connector-node");
        assert_eq!(validated.request.saml_id, generated.saml_id);
        assert!(!validated.request.attributes.is_empty());
        assert!(validated.request.attributes.contains("PersonIdentifier"));
    }

    #[test]
    fn tampered_signature_raises_security_error() {
        let (connector, service) = engine_pair(EngineConfig::default());
        let generated = connector.generate_request(&oxford_request()).unwrap();
        let mut tampered = generated.raw_token.clone();
        let idx = tampered
            .windows("<ds:SignatureValue>".len())
            .position(|w| w == b"<ds:SignatureValue>")
            .unwrap()
            + "<ds:SignatureValue>".len()
            + 5;
        tampered[idx] = if tampered[idx] == b'A' { b'B' } else { b'A' };

        let err = service.validate_request(&tampered).unwrap_err();
        assert!(err.is_security(), "expected security error, got {err:?}");
    }

    #[test]
    fn generation_failures() {
        let (connector, _) = engine_pair(EngineConfig::default());

        let empty = oxford_request().with_attributes(PersonalAttributeList::new());
        assert!(matches!(
            connector.generate_request(&empty).unwrap_err(),
            SamlError::EmptyAttributeList
        ));

        let mut unknown = oxford_request();
        unknown
            .attributes
            .insert(PersonalAttribute::new("shoeSize", false));
        assert!(matches!(
            connector.generate_request(&unknown).unwrap_err(),
            SamlError::UnknownAttribute(name) if name == "shoeSize"
        ));

        let anonymous = oxford_request().with_provider_name("");
        assert!(matches!(
            connector.generate_request(&anonymous).unwrap_err(),
            SamlError::MissingProviderName
        ));

        let mut no_loa = oxford_request();
        no_loa.eidas_loa = None;
        assert!(matches!(
            connector.generate_request(&no_loa).unwrap_err(),
            SamlError::MalformedAssuranceLevel(_)
        ));
    }

    #[test]
    fn eidas_only_engine_rejects_legacy_format() {
        // A permissive peer produces a validly-signed STORK request.
        let (both, _) = engine_pair(EngineConfig::default());
        let mut legacy = oxford_request();
        legacy.message_format = MessageFormat::Stork1;
        legacy.qaa_level = Some(QaaLevel::new(3).unwrap());
        let generated = both.generate_request(&legacy).unwrap();

        // An eIDAS-only engine trusting the same keys must still refuse it.
        let (strict_connector, strict_service) = engine_pair(EngineConfig::eidas_only());
        assert!(matches!(
            strict_connector.generate_request(&legacy).unwrap_err(),
            SamlError::FormatNotSupported("stork1")
        ));
        // Signature never enters into it: the format gate fires first.
        let err = strict_service.validate_request(&generated.raw_token).unwrap_err();
        assert!(matches!(err, SamlError::FormatNotSupported("stork1")));
    }

    #[test]
    fn dual_format_engine_accepts_both() {
        let (connector, service) = engine_pair(EngineConfig::default());

        let eidas = connector.generate_request(&oxford_request()).unwrap();
        assert!(service.validate_request(&eidas.raw_token).is_ok());

        let mut legacy = oxford_request();
        legacy.message_format = MessageFormat::Stork1;
        legacy.qaa_level = Some(QaaLevel::new(2).unwrap());
        let stork = connector.generate_request(&legacy).unwrap();
        let validated = service.validate_request(&stork.raw_token).unwrap();
        assert_eq!(validated.request.message_format, MessageFormat::Stork1);
    }

    #[test]
    fn response_round_trip_with_ip_binding() {
        let (connector, service) = engine_pair(EngineConfig::default());
        let request = connector.generate_request(&oxford_request()).unwrap();

        let mut shell = AuthnResponse::success(&request.saml_id, request.message_format);
        shell.issuer = "https://service.example.eu/metadata".to_string();
        shell.eidas_loa = Some(EidasLoa::Substantial);
        shell.attributes.insert(
            PersonalAttribute::new("PersonIdentifier", true)
                .with_value("PT/UK/12345")
                .with_status(AttributeStatus::Available),
        );

        let response = service
            .generate_response(&request, &shell, Some("192.0.2.7"), false)
            .unwrap();
        assert_eq!(response.in_response_to, request.saml_id);

        let validated = connector
            .validate_response(&response.raw_token, Some("192.0.2.7"), 0)
            .unwrap();
        assert_eq!(validated.in_response_to, request.saml_id);
        assert_eq!(validated.audience.as_deref(), Some(request.issuer.as_str()));
        assert!(!validated.failure);

        let err = connector
            .validate_response(&response.raw_token, Some("198.51.100.9"), 0)
            .unwrap_err();
        assert!(matches!(err, SamlError::IpMismatch { .. }));
    }

    #[test]
    fn ip_binding_can_be_disabled() {
        let mut config = EngineConfig::default();
        config.ip_binding = false;
        let (connector, service) = engine_pair(config);
        let request = connector.generate_request(&oxford_request()).unwrap();
        let mut shell = AuthnResponse::success(&request.saml_id, request.message_format);
        shell.issuer = "https://service.example.eu/metadata".to_string();
        let response = service
            .generate_response(&request, &shell, Some("192.0.2.7"), false)
            .unwrap();
        assert!(connector
            .validate_response(&response.raw_token, Some("198.51.100.9"), 0)
            .is_ok());
    }

    #[test]
    fn stale_response_is_rejected() {
        let connector_key = SigningCredential::generate_ed25519("connector-node").unwrap();
        let service_key = SigningCredential::generate_ed25519("service-node").unwrap();
        let mut trust = TrustStore::new();
        trust.trust(&connector_key);
        trust.trust(&service_key);
        let connector = SamlEngine::new(EngineConfig::default(), connector_key, trust);

        let request = connector.generate_request(&oxford_request()).unwrap();
        let mut shell = AuthnResponse::success(&request.saml_id, request.message_format);
        shell.saml_id = new_message_id();
        shell.issuer = "https://service.example.eu/metadata".to_string();

        // Hand-build a response issued an hour ago, correctly signed.
        let document = build_response_document(
            &request,
            &shell,
            processor_for(MessageFormat::Eidas),
            Utc::now() - ChronoDuration::hours(1),
            ChronoDuration::seconds(300),
            None,
            false,
        )
        .unwrap();
        let signed = sign_document(&document, &shell.saml_id, &service_key).unwrap();

        let err = connector
            .validate_response(signed.as_bytes(), None, 0)
            .unwrap_err();
        assert!(matches!(err, SamlError::StaleMessage(_)));
    }

    #[test]
    fn error_response_reports_status_over_the_wire() {
        let (connector, service) = engine_pair(EngineConfig::default());
        let request = connector.generate_request(&oxford_request()).unwrap();
        let error = service
            .generate_error_response(
                &request,
                "https://service.example.eu/metadata",
                AuthnResponse::STATUS_REQUESTER,
                Some(AuthnResponse::SUB_STATUS_REQUEST_DENIED),
                "mandatory attribute missing",
            )
            .unwrap();
        assert!(error.failure);

        let validated = connector
            .validate_response(&error.raw_token, None, 0)
            .unwrap();
        assert!(validated.failure);
        assert_eq!(validated.status_code, AuthnResponse::STATUS_REQUESTER);
        assert_eq!(
            validated.sub_status_code.as_deref(),
            Some(AuthnResponse::SUB_STATUS_REQUEST_DENIED)
        );
    }

    #[test]
    fn resign_replaces_signer() {
        let (connector, service) = engine_pair(EngineConfig::default());
        let request = connector.generate_request(&oxford_request()).unwrap();

        let resigned = service.resign(&request.raw_token).unwrap();
        let validated = service.validate_request(&resigned).unwrap();
        assert_eq!(validated.signer_alias, "service-node");
        // Content untouched.
        assert_eq!(validated.request.saml_id, request.saml_id);
        assert_eq!(
            validated.request.attributes.names().collect::<Vec<_>>(),
            request.attributes.names().collect::<Vec<_>>()
        );
    }

    #[test]
    fn empty_token_is_invalid_parameter_shaped() {
        let (_, service) = engine_pair(EngineConfig::default());
        assert!(matches!(
            service.validate_request(&[]).unwrap_err(),
            SamlError::MissingElement(_)
        ));
    }
}
