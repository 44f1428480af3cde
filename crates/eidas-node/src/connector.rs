//! Connector coordinator (the SP-facing half of the node).
//!
//! Takes a validated country-selector submission, builds and signs the
//! colleague request for the chosen country, and later walks the
//! returning response through the validation pipeline before handing the
//! released attributes back toward the service provider.

use std::sync::Arc;

use eidas_commons::{
    keys, AuthnRequest, AuthnResponse, Country, ErrorId, MessageFormat, NodeConfig, NodeResult,
    SessionStore, SessionValue,
};

use crate::country_selector::CountrySelectorService;
use crate::saml_service::SamlService;
use crate::translator::AttributeTranslator;

/// A country-selector form submission from a service provider.
#[derive(Debug, Clone)]
pub struct CountrySelectorParams {
    /// SP identifier.
    pub sp_id: String,
    /// Display name; the SP id stands in when absent.
    pub provider_name: Option<String>,
    /// Legacy QAA level, decimal.
    pub qaa_level: Option<String>,
    /// eIDAS level of assurance URI.
    pub eidas_loa: Option<String>,
    /// Requested attributes in the textual list encoding.
    pub attribute_list: String,
    /// SP return URL.
    pub sp_url: String,
    /// Country the citizen chose.
    pub citizen_country: String,
    /// SP business sector.
    pub sp_sector: Option<String>,
    /// SP institution.
    pub sp_institution: Option<String>,
    /// SP application.
    pub sp_application: Option<String>,
    /// SP country code.
    pub sp_country: Option<String>,
}

/// The connector use-case coordinator.
pub struct Connector {
    config: Arc<NodeConfig>,
    saml_service: SamlService,
    translator: AttributeTranslator,
    country_selector: CountrySelectorService,
}

impl Connector {
    /// Creates the coordinator; all collaborators are constructor-injected.
    #[must_use]
    pub fn new(
        config: Arc<NodeConfig>,
        saml_service: SamlService,
        translator: AttributeTranslator,
        country_selector: CountrySelectorService,
    ) -> Self {
        Self {
            config,
            saml_service,
            translator,
            country_selector,
        }
    }

    /// The selectable peer countries.
    #[must_use]
    pub fn countries(&self) -> Vec<Country> {
        self.country_selector.create_country_selector()
    }

    /// Validates a selector submission and produces the signed colleague
    /// request, binding the correlation state into the session.
    pub fn authentication_request(
        &self,
        session: &dyn SessionStore,
        params: &CountrySelectorParams,
    ) -> NodeResult<AuthnRequest> {
        let mut request = self
            .country_selector
            .check_country_selector_request(params, &self.saml_service)?;

        let peer = self
            .config
            .peer(&params.citizen_country)
            .ok_or_else(|| self.config.invalid_parameter(ErrorId::UnknownCountry))?;
        request.destination = peer.url.clone();
        request.issuer = self.saml_service.issuer().to_string();

        // Egress canonicalization: the eIDAS wire speaks the canonical
        // vocabulary; the legacy wire carries the national names as-is.
        if request.message_format == MessageFormat::Eidas {
            request.attributes = self
                .translator
                .normalise_names_to_canonical(&request.attributes)?;
        }

        let generated = self.saml_service.generate_request(&request)?;
        session.put(keys::AUTH_REQUEST, SessionValue::Request(generated.clone()));
        session.put(
            keys::SAML_IN_RESPONSE_TO,
            SessionValue::Text(generated.saml_id.clone()),
        );
        session.put(
            keys::AUDIENCE,
            SessionValue::Text(generated.issuer.clone()),
        );
        tracing::info!(saml_id = %generated.saml_id, country = %params.citizen_country,
            "colleague request generated");
        Ok(generated)
    }

    /// Walks a colleague response through the validation pipeline and
    /// de-canonicalizes the released attributes for the SP.
    pub fn authentication_response(
        &self,
        session: &dyn SessionStore,
        encoded_token: Option<&str>,
        remote_ip: &str,
    ) -> NodeResult<AuthnResponse> {
        let token = self.saml_service.decode_token(encoded_token)?;
        let mut response =
            self.saml_service
                .process_authentication_response(&token, session, remote_ip)?;

        if !response.failure {
            if let Some(request) = session
                .get(keys::AUTH_REQUEST)
                .and_then(|v| v.as_request().cloned())
            {
                self.saml_service.check_response_loa(&request, &response)?;
            }
        }

        if !response.failure && response.message_format == MessageFormat::Eidas {
            response.attributes = self
                .translator
                .normalise_names_from_canonical(&response.attributes)?;
            response.attributes = self
                .translator
                .normalise_values_from_canonical(&response.attributes)?;
        }
        Ok(response)
    }
}
