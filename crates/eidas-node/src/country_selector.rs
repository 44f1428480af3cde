//! Country selector handling.
//!
//! Builds the list of selectable peer countries from the numbered
//! configuration slots and validates a service provider's selector
//! submission with the same primitives as the request pipeline's SP
//! authorization step.

use std::sync::Arc;

use eidas_commons::{
    AuthnRequest, Country, EidasLoa, ErrorId, MessageFormat, NodeConfig, NodeResult,
    PersonalAttributeList, QaaLevel, SamlBinding,
};

use crate::connector::CountrySelectorParams;
use crate::saml_service::SamlService;

/// Country selector service of the connector.
pub struct CountrySelectorService {
    config: Arc<NodeConfig>,
    destination: String,
}

impl CountrySelectorService {
    /// Creates the service. `destination` is the connector endpoint the
    /// seeded request will be addressed from.
    #[must_use]
    pub fn new(config: Arc<NodeConfig>, destination: impl Into<String>) -> Self {
        Self {
            config,
            destination: destination.into(),
        }
    }

    /// The selectable countries, one per configured peer slot.
    #[must_use]
    pub fn create_country_selector(&self) -> Vec<Country> {
        self.config.countries()
    }

    /// Validates a selector submission and seeds the authentication
    /// request for the chosen country.
    pub fn check_country_selector_request(
        &self,
        params: &CountrySelectorParams,
        saml_service: &SamlService,
    ) -> NodeResult<AuthnRequest> {
        let attributes = PersonalAttributeList::parse(&params.attribute_list);
        if attributes.is_empty() {
            return Err(self.config.invalid_parameter(ErrorId::InvalidAttributeList));
        }

        let format = match (&params.eidas_loa, &params.qaa_level) {
            (Some(_), _) => MessageFormat::Eidas,
            (None, Some(_)) => MessageFormat::Stork1,
            (None, None) => {
                return Err(self.config.invalid_parameter(ErrorId::SpQaaInvalid));
            }
        };

        let mut request = AuthnRequest::new(format)
            .with_destination(self.destination.clone())
            .with_acs_url(params.sp_url.clone())
            .with_citizen_country(params.citizen_country.clone())
            .with_binding(SamlBinding::HttpPost)
            .with_attributes(attributes);
        request.sp_sector = params.sp_sector.clone();
        request.sp_institution = params.sp_institution.clone();
        request.sp_application = params.sp_application.clone();
        request.sp_country = params.sp_country.clone();

        match &params.provider_name {
            Some(name) if !name.is_empty() => {
                request.sp_id = Some(params.sp_id.clone());
                request.provider_name = name.clone();
            }
            // No display name supplied: the SP identifier stands in.
            _ => request.provider_name = params.sp_id.clone(),
        }

        match format {
            MessageFormat::Stork1 => {
                let raw = params.qaa_level.as_deref().unwrap_or_default();
                request.qaa_level = Some(QaaLevel::parse(raw).map_err(|_| {
                    self.config.invalid_parameter(ErrorId::SpQaaInvalid)
                })?);
            }
            MessageFormat::Eidas => {
                let raw = params.eidas_loa.as_deref().unwrap_or_default();
                request.eidas_loa = Some(EidasLoa::from_uri(raw).map_err(|_| {
                    self.config.invalid_parameter(ErrorId::SpQaaInvalid)
                })?);
            }
        }

        // Same primitives as the inbound pipeline's SP_AUTHORIZED step;
        // no signature exists yet, so the alias check waits.
        saml_service.check_sp_access_level(&request)?;
        saml_service.check_sp_attributes(&request)?;

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use eidas_cache::InMemoryReplayCache;
    use eidas_saml::{EngineConfig, SamlEngine, SigningCredential, TrustStore};

    use super::*;

    fn setup(extra: &[(&str, &str)]) -> (CountrySelectorService, SamlService) {
        let mut pairs = vec![
            ("service.number", "2"),
            ("service.id.1", "PT"),
            ("service.name.1", "Portugal"),
            ("service.url.1", "https://pt.example.eu/ColleagueRequest"),
            ("service.id.2", "ES"),
            ("service.name.2", "Spain"),
            ("default", "ALL"),
        ];
        pairs.extend_from_slice(extra);
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let config = Arc::new(NodeConfig::from_properties(map).unwrap());

        let key = SigningCredential::generate_ed25519("connector-node").unwrap();
        let mut trust = TrustStore::new();
        trust.trust(&key);
        let engine = SamlEngine::new(EngineConfig::default(), key, trust);
        let replay = Arc::new(InMemoryReplayCache::new(Duration::from_secs(60)));
        (
            CountrySelectorService::new(
                Arc::clone(&config),
                "https://connector.example.eu/CountrySelector",
            ),
            SamlService::new(config, engine, replay, "https://connector.example.eu/metadata"),
        )
    }

    fn params() -> CountrySelectorParams {
        CountrySelectorParams {
            sp_id: "SP-OXFORD".to_string(),
            provider_name: Some("University of Oxford".to_string()),
            qaa_level: Some("3".to_string()),
            eidas_loa: None,
            attribute_list: "eIdentifier:true:[]:;dateOfBirth:false:[]:;".to_string(),
            sp_url: "https://sp.ox.ac.uk/acs".to_string(),
            citizen_country: "PT".to_string(),
            sp_sector: Some("EDU".to_string()),
            sp_institution: None,
            sp_application: None,
            sp_country: Some("UK".to_string()),
        }
    }

    #[test]
    fn selector_lists_configured_countries() {
        let (selector, _) = setup(&[]);
        let countries = selector.create_country_selector();
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[0], Country::new("PT", "Portugal"));
        assert_eq!(countries[1], Country::new("ES", "Spain"));
    }

    #[test]
    fn valid_submission_seeds_a_request() {
        let (selector, saml) = setup(&[]);
        let request = selector
            .check_country_selector_request(&params(), &saml)
            .unwrap();
        assert_eq!(request.provider_name, "University of Oxford");
        assert_eq!(request.sp_id.as_deref(), Some("SP-OXFORD"));
        assert_eq!(request.qaa_level, Some(QaaLevel::new(3).unwrap()));
        assert_eq!(request.message_format, MessageFormat::Stork1);
        assert_eq!(request.citizen_country_code.as_deref(), Some("PT"));
        assert!(request.attributes.contains("eIdentifier"));
    }

    #[test]
    fn provider_name_defaults_to_sp_id() {
        let (selector, saml) = setup(&[]);
        let mut submission = params();
        submission.provider_name = None;
        let request = selector
            .check_country_selector_request(&submission, &saml)
            .unwrap();
        assert_eq!(request.provider_name, "SP-OXFORD");
        assert!(request.sp_id.is_none());
    }

    #[test]
    fn empty_attribute_list_is_rejected() {
        let (selector, saml) = setup(&[]);
        let mut submission = params();
        submission.attribute_list = String::new();
        assert!(selector
            .check_country_selector_request(&submission, &saml)
            .is_err());
    }

    #[test]
    fn qaa_outside_bounds_is_rejected() {
        let (selector, saml) = setup(&[("qaa.max", "2")]);
        let err = selector
            .check_country_selector_request(&params(), &saml)
            .unwrap_err();
        assert_eq!(err.code(), ErrorId::SpQaaInvalid.default_code());
    }

    #[test]
    fn attribute_permission_applies_to_selector() {
        let (selector, saml) = setup(&[("SP-OXFORD", "eIdentifier;")]);
        let err = selector
            .check_country_selector_request(&params(), &saml)
            .unwrap_err();
        assert_eq!(err.code(), ErrorId::SpAttributesNotAllowed.default_code());
    }

    #[test]
    fn eidas_submission_uses_loa() {
        let (selector, saml) = setup(&[]);
        let mut submission = params();
        submission.qaa_level = None;
        submission.eidas_loa = Some("http://eidas.europa.eu/LoA/substantial".to_string());
        submission.attribute_list =
            "PersonIdentifier:true:[]:;FamilyName:true:[]:;".to_string();
        let request = selector
            .check_country_selector_request(&submission, &saml)
            .unwrap();
        assert_eq!(request.message_format, MessageFormat::Eidas);
        assert_eq!(request.eidas_loa, Some(EidasLoa::Substantial));
    }
}
