//! # eidas-saml
//!
//! The SAML engine of the node: builds, signs, parses and validates
//! authentication requests and responses in the two supported extension
//! vocabularies (eIDAS and legacy STORK 1.0), and implements the POST and
//! Redirect transport encodings.
//!
//! An engine instance is configured with the formats it speaks, a signing
//! credential and a trust store; it is format-exclusive unless explicitly
//! configured for both vocabularies. All cryptographic material is
//! configuration-supplied; the engine itself keeps no mutable state.

#![forbid(unsafe_code)]

pub mod bindings;
pub mod engine;
pub mod error;
pub mod format;
pub mod signature;
mod xml;

pub use engine::{EngineConfig, SamlEngine, ValidatedRequest};
pub use error::{SamlError, SamlResult};
pub use signature::{SignatureAlgorithm, SigningCredential, TrustStore};
