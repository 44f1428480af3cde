//! SAML message pipeline.
//!
//! Every inbound message walks the same fail-closed sequence: structure,
//! signature, replay, SP authorization, attribute verification. A failure
//! at any step is terminal for that message; nothing is retried. Outbound
//! messages are gated on the deployment's format policy before the engine
//! ever sees them.

use std::sync::Arc;

use eidas_commons::{
    keys, AttributePermission, AuthnRequest, AuthnResponse, ErrorId, MessageFormat, NodeConfig,
    NodeError, NodeResult, QaaLevel, SessionStore, SessionValue,
};
use eidas_saml::bindings::post;
use eidas_saml::{SamlEngine, SamlError};

use eidas_cache::AntiReplayCache;

/// Request/response orchestration service shared by the Connector and the
/// ProxyService coordinators.
pub struct SamlService {
    config: Arc<NodeConfig>,
    engine: SamlEngine,
    replay: Arc<dyn AntiReplayCache>,
    issuer: String,
}

impl SamlService {
    /// Creates the service around an engine, the anti-replay cache and
    /// this node's own issuer identity.
    #[must_use]
    pub fn new(
        config: Arc<NodeConfig>,
        engine: SamlEngine,
        replay: Arc<dyn AntiReplayCache>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            config,
            engine,
            replay,
            issuer: issuer.into(),
        }
    }

    /// The node configuration this service was built with.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// This node's issuer identity.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Decodes the transported base64 token. A missing parameter is a
    /// plain invalid-parameter condition, uniformly for both formats.
    pub fn decode_token(&self, encoded: Option<&str>) -> NodeResult<Vec<u8>> {
        let encoded = encoded
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.config.invalid_parameter(ErrorId::InvalidSamlToken))?;
        post::decode(encoded).map_err(|_| self.config.invalid_parameter(ErrorId::InvalidSamlToken))
    }

    /// Builds and signs an outgoing request, enforcing the deployment
    /// format policy first.
    pub fn generate_request(&self, request: &AuthnRequest) -> NodeResult<AuthnRequest> {
        self.check_format_allowed(request.message_format)?;
        self.engine
            .generate_request(request)
            .map_err(|e| self.map_generation_error(&e))
    }

    /// Builds and signs a response to `request`.
    pub fn generate_response(
        &self,
        request: &AuthnRequest,
        response: &AuthnResponse,
        remote_ip: Option<&str>,
        hash_attribute_values: bool,
    ) -> NodeResult<AuthnResponse> {
        self.check_format_allowed(request.message_format)?;
        let mut shell = response.clone();
        shell.issuer = self.issuer.clone();
        self.engine
            .generate_response(request, &shell, remote_ip, hash_attribute_values)
            .map_err(|e| self.map_generation_error(&e))
    }

    /// Builds a signed error response and returns its base64 token, for
    /// embedding in a wire-reported `Service` error. Failures here are
    /// logged and swallowed; the caller still raises its own error.
    #[must_use]
    pub fn generate_error_token(
        &self,
        request: &AuthnRequest,
        id: ErrorId,
        sub_status_code: &str,
    ) -> Option<String> {
        let (code, message) = self.config.error(id);
        match self.engine.generate_error_response(
            request,
            &self.issuer,
            AuthnResponse::STATUS_REQUESTER,
            Some(sub_status_code),
            &format!("{code} - {message}"),
        ) {
            Ok(response) => Some(post::encode(&response.raw_token)),
            Err(error) => {
                tracing::warn!(%error, "could not generate SAML error response");
                None
            }
        }
    }

    /// Full inbound request pipeline: structure and signature through the
    /// engine, anti-replay, then SP authorization. The validated request
    /// is bound into the session before the replay check so that error
    /// responses can still be correlated.
    pub fn process_authentication_request(
        &self,
        token: &[u8],
        session: &dyn SessionStore,
        remote_ip: &str,
    ) -> NodeResult<AuthnRequest> {
        let validated = self
            .engine
            .validate_request(token)
            .map_err(|e| self.map_validation_error(&e))?;
        let request = validated.request;

        session.put(keys::AUTH_REQUEST, SessionValue::Request(request.clone()));
        session.put(
            keys::REMOTE_ADDRESS,
            SessionValue::Text(remote_ip.to_string()),
        );

        if !self
            .replay
            .check_not_present(&request.saml_id, request.origin_country())
        {
            return Err(self.config.security(ErrorId::ReplayAttack));
        }

        self.authorize_sp(&request, Some(validated.signer_alias.as_str()))?;
        tracing::info!(saml_id = %request.saml_id, country = request.origin_country(),
            "authentication request accepted");
        Ok(request)
    }

    /// Full inbound response pipeline: structure/signature/freshness
    /// through the engine, anti-replay, request correlation, audience
    /// check, then mandatory-attribute verification. Correlation failures
    /// invalidate the session.
    pub fn process_authentication_response(
        &self,
        token: &[u8],
        session: &dyn SessionStore,
        remote_ip: &str,
    ) -> NodeResult<AuthnResponse> {
        let stored_request = session
            .get(keys::AUTH_REQUEST)
            .and_then(|v| v.as_request().cloned());

        let skew_millis = stored_request
            .as_ref()
            .and_then(|r| r.citizen_country_code.as_deref())
            .and_then(|c| self.config.peer(c))
            .map_or(0, |p| p.skew_millis);

        let remote = self.config.response_ip_check().then_some(remote_ip);
        let response = self
            .engine
            .validate_response(token, remote, skew_millis)
            .map_err(|e| self.map_validation_error(&e))?;

        let origin_country = stored_request
            .as_ref()
            .and_then(|r| r.citizen_country_code.clone())
            .unwrap_or_default();
        if !self
            .replay
            .check_not_present(&response.saml_id, &origin_country)
        {
            return Err(self.config.security(ErrorId::ReplayAttack));
        }

        let expected_id = session
            .get(keys::SAML_IN_RESPONSE_TO)
            .and_then(|v| v.as_text().map(str::to_string));
        match expected_id {
            Some(expected) if expected == response.in_response_to => {}
            _ => {
                tracing::warn!(target: "security",
                    in_response_to = %response.in_response_to,
                    "response correlation failed, invalidating session");
                session.clear();
                return Err(self.config.invalid_session(ErrorId::SessionError));
            }
        }

        // Error responses carry no assertion, hence no audience to check.
        if !response.failure {
            let expected_audience = session
                .get(keys::AUDIENCE)
                .and_then(|v| v.as_text().map(str::to_string));
            if let Some(expected) = expected_audience {
                if response.audience.as_deref() != Some(expected.as_str()) {
                    tracing::warn!(target: "security", "audience restriction mismatch");
                    session.clear();
                    return Err(self.config.invalid_session(ErrorId::AudienceMismatch));
                }
            }
            self.check_mandatory_attributes(&response)?;
        }

        session.remove(keys::SAML_IN_RESPONSE_TO);
        Ok(response)
    }

    /// SP authorization: certificate alias, QAA/LoA bounds, and the
    /// attribute allow-list. `signer_alias` is absent for selector
    /// submissions that arrive before any message is signed.
    pub fn authorize_sp(
        &self,
        request: &AuthnRequest,
        signer_alias: Option<&str>,
    ) -> NodeResult<()> {
        self.check_sp_access_level(request)?;
        if let Some(alias) = signer_alias {
            self.check_sp_cert_alias(&request.provider_name, alias)?;
        }
        self.check_sp_attributes(request)?;
        Ok(())
    }

    /// QAA/LoA bounds: the requested level must be well-formed and, for
    /// the legacy format, within the global bounds and under the per-SP
    /// cap.
    pub fn check_sp_access_level(&self, request: &AuthnRequest) -> NodeResult<()> {
        match request.message_format {
            MessageFormat::Eidas => {
                if request.eidas_loa.is_none() {
                    return Err(self.config.invalid_parameter(ErrorId::SpQaaInvalid));
                }
            }
            MessageFormat::Stork1 => {
                let qaa = request
                    .qaa_level
                    .ok_or_else(|| self.config.invalid_parameter(ErrorId::SpQaaInvalid))?;
                if qaa < self.config.min_qaa() || qaa > self.config.max_qaa() {
                    return Err(self.config.invalid_parameter(ErrorId::SpQaaInvalid));
                }
                if !self.config.bypass_sp_validation() {
                    let sp_id = sp_identifier(request);
                    if let Some(cap) = self.qaa_cap(sp_id)? {
                        if qaa > cap {
                            return Err(self.config.invalid_parameter(ErrorId::SpQaaInvalid));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn qaa_cap(&self, sp_id: &str) -> NodeResult<Option<QaaLevel>> {
        self.config
            .sp_qaa_cap(sp_id)
            .map_err(|_| self.config.internal(ErrorId::Configuration))
    }

    /// Certificate alias check: the configured alias for the provider
    /// must match the alias of the key that signed the message; the
    /// `NONE` wildcard accepts any signer. An unconfigured provider is a
    /// malformed request, a mismatch is an authorization violation.
    pub fn check_sp_cert_alias(&self, provider_name: &str, signer_alias: &str) -> NodeResult<()> {
        let Some(configured) = self.config.sp_cert_alias(provider_name) else {
            return Err(self.config.invalid_parameter(ErrorId::SpCertAliasMismatch));
        };
        if configured.eq_ignore_ascii_case(eidas_commons::config::PERMISSION_NONE) {
            return Ok(());
        }
        if !configured.eq_ignore_ascii_case(signer_alias) {
            tracing::warn!(target: "security", provider_name, signer_alias,
                "SP certificate alias mismatch");
            return Err(self.config.security(ErrorId::SpCertAliasMismatch));
        }
        Ok(())
    }

    /// Attribute allow-list check for the requesting SP.
    pub fn check_sp_attributes(&self, request: &AuthnRequest) -> NodeResult<()> {
        if self.config.bypass_sp_validation() {
            return Ok(());
        }
        let permission = self.config.sp_attribute_permission(sp_identifier(request));
        if matches!(permission, AttributePermission::Nothing)
            || !permission.allows(request.attributes.names())
        {
            return Err(self.config.invalid_parameter(ErrorId::SpAttributesNotAllowed));
        }
        Ok(())
    }

    /// Mandatory-attribute verification for responses: every required
    /// attribute must have arrived with a value, and the format's minimum
    /// data set must be complete.
    pub fn check_mandatory_attributes(&self, response: &AuthnResponse) -> NodeResult<()> {
        let missing = response.attributes.missing_mandatory();
        if !missing.is_empty() {
            let (code, message) = self.config.error(ErrorId::MandatoryAttributeMissing);
            return Err(NodeError::Service {
                code,
                message: format!("{message}: {}", missing.join(", ")),
                token: None,
            });
        }
        if response.message_format == MessageFormat::Eidas
            && !eidas_commons::vocabulary::check_mandatory_sets(response.attributes.names())
        {
            return Err(self
                .config
                .service_error(ErrorId::MandatoryAttributeMissing, None));
        }
        Ok(())
    }

    /// Validates the asserted response LoA against the requested one.
    pub fn check_response_loa(
        &self,
        request: &AuthnRequest,
        response: &AuthnResponse,
    ) -> NodeResult<()> {
        if request.message_format != MessageFormat::Eidas {
            return Ok(());
        }
        let Some(requested) = request.eidas_loa else {
            return Ok(());
        };
        match response.eidas_loa {
            Some(provided) if request.loa_comparison.satisfies(requested, provided) => Ok(()),
            _ => Err(self.config.service_error(ErrorId::InvalidResponseLoa, None)),
        }
    }

    fn check_format_allowed(&self, format: MessageFormat) -> NodeResult<()> {
        if self.config.eidas_only() && format == MessageFormat::Stork1 {
            return Err(self.config.invalid_parameter(ErrorId::FormatNotSupported));
        }
        Ok(())
    }

    fn map_validation_error(&self, error: &SamlError) -> NodeError {
        if error.is_security() {
            tracing::warn!(target: "security", %error, "message validation failed");
            return self.config.security(ErrorId::UntrustedSigner);
        }
        match error {
            SamlError::FormatNotSupported(_) => {
                self.config.invalid_parameter(ErrorId::FormatNotSupported)
            }
            _ => self.config.invalid_parameter(ErrorId::InvalidSamlToken),
        }
    }

    fn map_generation_error(&self, error: &SamlError) -> NodeError {
        if error.is_internal() {
            self.config.internal(ErrorId::SamlGeneration)
        } else {
            let (code, _) = self.config.error(ErrorId::SamlGeneration);
            NodeError::Internal {
                code,
                message: error.to_string(),
            }
        }
    }
}

fn sp_identifier(request: &AuthnRequest) -> &str {
    request
        .sp_id
        .as_deref()
        .unwrap_or(request.provider_name.as_str())
}
