//! Citizen consent handling.
//!
//! The consent form echoes one parameter per attribute the citizen agrees
//! to release; an attribute absent from the submission was declined.
//! Mandatory attributes without consent terminate the flow with a SAML
//! error response to the requesting peer.

use std::collections::HashMap;
use std::sync::Arc;

use eidas_commons::{
    keys, vocabulary, AttributeStatus, AuthnRequest, AuthnResponse, CitizenConsent, ErrorId,
    MessageFormat, NodeConfig, NodeResult, PersonalAttributeList, SessionStore, SessionValue,
};

use crate::saml_service::SamlService;

/// Consent computation and attribute-list maintenance.
pub struct CitizenConsentService {
    config: Arc<NodeConfig>,
}

impl CitizenConsentService {
    /// Creates the service.
    #[must_use]
    pub const fn new(config: Arc<NodeConfig>) -> Self {
        Self { config }
    }

    /// Derives the citizen's consent from the form submission: an
    /// attribute is consented when the form carries a (possibly empty)
    /// entry for it, and lands in the mandatory or optional list according
    /// to the request.
    #[must_use]
    pub fn citizen_consent(
        &self,
        parameters: &HashMap<String, String>,
        attributes: &PersonalAttributeList,
    ) -> CitizenConsent {
        let mut consent = CitizenConsent::new();
        for attribute in attributes.iter() {
            if parameters.contains_key(&attribute.name) {
                if attribute.required {
                    consent.add_mandatory(attribute.name.clone());
                } else {
                    consent.add_optional(attribute.name.clone());
                }
            }
        }
        consent
    }

    /// Rejects the flow when a required attribute lacks consent. The
    /// failure is wire-reported: a SAML error response is generated for
    /// the requesting peer and carried in the raised error.
    pub fn process_citizen_consent(
        &self,
        consent: &CitizenConsent,
        request: &AuthnRequest,
        _remote_ip: &str,
        saml_service: &SamlService,
    ) -> NodeResult<()> {
        for attribute in request.attributes.iter() {
            if attribute.required && !consent.mandatory().contains(&attribute.name) {
                tracing::info!(name = %attribute.name, "mandatory attribute without consent");
                let token = saml_service.generate_error_token(
                    request,
                    ErrorId::CitizenConsentMandatory,
                    AuthnResponse::SUB_STATUS_REQUEST_DENIED,
                );
                return Err(self
                    .config
                    .service_error(ErrorId::CitizenConsentMandatory, token));
            }
        }
        Ok(())
    }

    /// Filters the full list down to exactly the consented attributes,
    /// preserving each attribute's complete value from the full list.
    #[must_use]
    pub fn update_attribute_list(
        &self,
        consent: &CitizenConsent,
        attributes: &PersonalAttributeList,
    ) -> PersonalAttributeList {
        attributes
            .iter()
            .filter(|attribute| consent.contains(&attribute.name))
            .cloned()
            .collect()
    }

    /// Merges the identity provider's attribute values into the request
    /// stored in the session: empty values, statuses and complex values
    /// are filled from the provider list; attributes the provider did not
    /// return are left untouched (derived attributes arrive later). eIDAS
    /// attributes that carry a value but no status default to `Available`.
    pub fn update_attribute_values(
        &self,
        session: &dyn SessionStore,
        provided: &PersonalAttributeList,
    ) -> NodeResult<PersonalAttributeList> {
        let Some(mut request) = session
            .get(keys::AUTH_REQUEST)
            .and_then(|v| v.as_request().cloned())
        else {
            return Err(self.config.invalid_session(ErrorId::SessionError));
        };

        let eidas = request.message_format == MessageFormat::Eidas;
        for name in request.attributes.names().map(str::to_string).collect::<Vec<_>>() {
            let attribute = request
                .attributes
                .get_mut(&name)
                .ok_or_else(|| self.config.internal(ErrorId::Configuration))?;
            if attribute.is_empty_value() {
                if let Some(fresh) = provided.get(&name) {
                    if !fresh.is_empty_value() {
                        attribute.values = fresh.values.clone();
                    }
                    if fresh.status.is_some() {
                        attribute.status = fresh.status;
                    }
                    if !fresh.is_empty_complex_value() {
                        attribute.complex_value = fresh.complex_value.clone();
                    }
                }
            } else if attribute.status.is_none() && eidas {
                attribute.status = Some(AttributeStatus::Available);
            }
        }

        if eidas && !vocabulary::check_mandatory_sets(request.attributes.names()) {
            return Err(self
                .config
                .service_error(ErrorId::MandatoryAttributeMissing, None));
        }

        let updated = request.attributes.clone();
        session.put(keys::AUTH_REQUEST, SessionValue::Request(request));
        Ok(updated)
    }
}
