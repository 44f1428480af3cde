//! # eidas-node
//!
//! Orchestration layer of the broker: the SAML request/response pipeline
//! with its fail-closed validation state machine, the attribute
//! translator between the eIDAS and national vocabularies, citizen
//! consent, the country selector, and the two top-level coordinators
//! (Connector facing service providers, ProxyService facing the national
//! identity provider and peer countries).
//!
//! Every component takes its collaborators through its constructor; no
//! globals, no setters.

#![forbid(unsafe_code)]

pub mod citizen;
pub mod connector;
pub mod country_selector;
pub mod proxy_service;
pub mod saml_service;
pub mod translator;

pub use citizen::CitizenConsentService;
pub use connector::{Connector, CountrySelectorParams};
pub use country_selector::CountrySelectorService;
pub use proxy_service::ProxyService;
pub use saml_service::SamlService;
pub use translator::AttributeTranslator;
