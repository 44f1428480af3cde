//! ProxyService coordinator (the IdP-facing half of the node).
//!
//! Validates a colleague request from a peer connector, localizes its
//! attribute list for the national identity provider, runs the citizen
//! consent flow, merges the identity provider's answer, derives computed
//! attributes, and produces the signed response (or a protocol-level
//! error response).

use std::collections::HashMap;
use std::sync::Arc;

use eidas_commons::{
    keys, AuthnRequest, AuthnResponse, EidasLoa, ErrorId, MessageFormat, NodeConfig, NodeError,
    NodeResult, PersonalAttributeList, SessionStore, SessionValue,
};

use crate::citizen::CitizenConsentService;
use crate::saml_service::SamlService;
use crate::translator::AttributeTranslator;

/// The proxy-service use-case coordinator.
pub struct ProxyService {
    config: Arc<NodeConfig>,
    saml_service: SamlService,
    translator: AttributeTranslator,
    citizen: CitizenConsentService,
}

impl ProxyService {
    /// Creates the coordinator; all collaborators are constructor-injected.
    #[must_use]
    pub fn new(
        config: Arc<NodeConfig>,
        saml_service: SamlService,
        translator: AttributeTranslator,
        citizen: CitizenConsentService,
    ) -> Self {
        Self {
            config,
            saml_service,
            translator,
            citizen,
        }
    }

    /// Inbound colleague request: full validation pipeline, then ingress
    /// canonicalization into the national vocabulary. The localized copy
    /// replaces the wire form in the session — the whole citizen phase
    /// (consent form, identity provider exchange, derivation) speaks the
    /// national vocabulary, and the response path translates back.
    pub fn process_authentication_request(
        &self,
        session: &dyn SessionStore,
        encoded_token: Option<&str>,
        remote_ip: &str,
    ) -> NodeResult<AuthnRequest> {
        let token = self.saml_service.decode_token(encoded_token)?;
        let request = self
            .saml_service
            .process_authentication_request(&token, session, remote_ip)?;

        let mut localized = request;
        if localized.message_format == MessageFormat::Eidas {
            localized.attributes = self
                .translator
                .normalise_names_from_canonical(&localized.attributes)?;
        }
        session.put(keys::AUTH_REQUEST, SessionValue::Request(localized.clone()));
        Ok(localized)
    }

    /// The attribute list to request from the identity provider: derived
    /// attributes are replaced by the sources they are computed from.
    #[must_use]
    pub fn attributes_for_idp(&self, request: &AuthnRequest) -> PersonalAttributeList {
        self.translator.derive_attributes_from(&request.attributes)
    }

    /// Citizen consent flow: computes consent from the form submission,
    /// rejects missing mandatory consent (wire-reported), and filters the
    /// session request down to the consented subset.
    pub fn process_citizen_consent(
        &self,
        session: &dyn SessionStore,
        parameters: &HashMap<String, String>,
        remote_ip: &str,
    ) -> NodeResult<AuthnRequest> {
        let Some(mut request) = session
            .get(keys::AUTH_REQUEST)
            .and_then(|v| v.as_request().cloned())
        else {
            return Err(self.config.invalid_session(ErrorId::SessionError));
        };

        let consent = self.citizen.citizen_consent(parameters, &request.attributes);
        self.citizen
            .process_citizen_consent(&consent, &request, remote_ip, &self.saml_service)?;
        request.attributes = self
            .citizen
            .update_attribute_list(&consent, &request.attributes);
        session.put(keys::AUTH_REQUEST, SessionValue::Request(request.clone()));
        Ok(request)
    }

    /// Identity-provider answer: merge values into the session request,
    /// compute derived attributes, normalize values and names onto the
    /// wire vocabulary, verify mandatory attributes, and emit the signed
    /// response. Mandatory failures are reported to the peer as a SAML
    /// error response.
    pub fn process_idp_response(
        &self,
        session: &dyn SessionStore,
        idp_attributes: &PersonalAttributeList,
        remote_ip: &str,
    ) -> NodeResult<AuthnResponse> {
        let merged = self.citizen.update_attribute_values(session, idp_attributes)?;

        let Some(request) = session
            .get(keys::AUTH_REQUEST)
            .and_then(|v| v.as_request().cloned())
        else {
            return Err(self.config.invalid_session(ErrorId::SessionError));
        };

        // Keep provider attributes the request never named: they are
        // derivation sources (date of birth behind an age check) and are
        // dropped again before release.
        let mut working = merged;
        for attribute in idp_attributes.iter() {
            if !working.contains(&attribute.name) {
                working.insert(attribute.clone());
            }
        }

        // Values first (the provider speaks the local encodings), then
        // derivation over the normalized data.
        let mut outward = request.clone();
        outward.attributes = working;
        let normalized =
            self.translator
                .normalise_values_to_canonical(&self.saml_service, &outward, remote_ip)?;
        let derived = self.translator.derive_attributes_to(
            &self.saml_service,
            session,
            &normalized,
            remote_ip,
        )?;

        // Release exactly what was requested, in request order.
        let mut released = PersonalAttributeList::new();
        for name in request.attributes.names() {
            if let Some(attribute) = derived.get(name) {
                released.insert(attribute.clone());
            }
        }

        let wire_attributes = if request.message_format == MessageFormat::Eidas {
            self.translator.normalise_names_to_canonical(&released)?
        } else {
            released
        };

        let mut shell = AuthnResponse::success(&request.saml_id, request.message_format);
        shell.attributes = wire_attributes;
        shell.eidas_loa = self.asserted_loa(&request);

        if let Err(error) = self.saml_service.check_mandatory_attributes(&shell) {
            // Post-acceptance failure: the peer gets a protocol-level
            // error response, not an opaque local error.
            let token = self.saml_service.generate_error_token(
                &request,
                ErrorId::MandatoryAttributeMissing,
                AuthnResponse::SUB_STATUS_REQUEST_DENIED,
            );
            return Err(match error {
                NodeError::Service { code, message, .. } => NodeError::Service {
                    code,
                    message,
                    token,
                },
                other => other,
            });
        }

        let hash_values = self.config.get("response.hash.attributes") == Some("true");
        self.saml_service
            .generate_response(&request, &shell, Some(remote_ip), hash_values)
    }

    /// Builds a wire error response for a locally-detected failure, for
    /// the host layer to transport back to the peer.
    #[must_use]
    pub fn error_response_token(
        &self,
        request: &AuthnRequest,
        id: ErrorId,
        sub_status_code: &str,
    ) -> Option<String> {
        self.saml_service
            .generate_error_token(request, id, sub_status_code)
    }

    /// The level of assurance asserted in responses: the configured
    /// service level when set, otherwise the level the request asked for.
    fn asserted_loa(&self, request: &AuthnRequest) -> Option<EidasLoa> {
        if request.message_format != MessageFormat::Eidas {
            return None;
        }
        self.config
            .get("service.loa")
            .and_then(|uri| EidasLoa::from_uri(uri).ok())
            .or(request.eidas_loa)
    }
}
