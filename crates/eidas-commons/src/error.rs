//! Node error taxonomy.
//!
//! Every failure in the broker is one of five kinds: a malformed input
//! (`InvalidParameter`), a broken session correlation (`InvalidSession`), a
//! potential attack (`Security`), an operator-facing fault (`Internal`), or
//! a domain-rule violation that travels back to the peer as a SAML error
//! response (`Service`). Callers never see raw source errors; codes and
//! messages are resolved through the configured error table.

use thiserror::Error;

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Structured error carrying a resolved error code and message.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// Malformed or missing required input field. Never retried.
    #[error("invalid parameter [{code}]: {message}")]
    InvalidParameter {
        /// Resolved error code.
        code: String,
        /// Human-readable message from the error table.
        message: String,
    },

    /// Session absent or response correlation failed. The caller must
    /// invalidate the session.
    #[error("invalid session [{code}]: {message}")]
    InvalidSession {
        /// Resolved error code.
        code: String,
        /// Human-readable message from the error table.
        message: String,
    },

    /// Signature failure, replay, or integrity violation. Treated as a
    /// potential attack and logged distinctly.
    #[error("security violation [{code}]: {message}")]
    Security {
        /// Resolved error code.
        code: String,
        /// Human-readable message from the error table.
        message: String,
    },

    /// Engine or configuration fault. Operator-facing, not a validation
    /// message for the end user.
    #[error("internal error [{code}]: {message}")]
    Internal {
        /// Resolved error code.
        code: String,
        /// Human-readable message from the error table.
        message: String,
    },

    /// Domain-rule violation reported to the peer over the wire. Carries
    /// the generated SAML error-response token (base64) when one could be
    /// built.
    #[error("service error [{code}]: {message}")]
    Service {
        /// Resolved error code.
        code: String,
        /// Human-readable message from the error table.
        message: String,
        /// Base64-encoded SAML error response for the requesting peer.
        token: Option<String>,
    },
}

impl NodeError {
    /// The resolved error code, regardless of kind.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidParameter { code, .. }
            | Self::InvalidSession { code, .. }
            | Self::Security { code, .. }
            | Self::Internal { code, .. }
            | Self::Service { code, .. } => code,
        }
    }

    /// True for failures that should be logged as potential attacks.
    #[must_use]
    pub const fn is_security(&self) -> bool {
        matches!(self, Self::Security { .. })
    }

    /// True when the failure is communicated over the wire protocol
    /// instead of thrown locally.
    #[must_use]
    pub const fn is_wire_reported(&self) -> bool {
        matches!(self, Self::Service { .. })
    }
}

/// Identifiers for the configurable error table.
///
/// Each id maps to a `error.<key>.code` / `error.<key>.message` pair in the
/// node configuration; the built-in code and message are used when the
/// deployment does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorId {
    /// SAML token missing, undecodable, or structurally invalid.
    InvalidSamlToken,
    /// SP requested a QAA/LoA outside its configured bounds.
    SpQaaInvalid,
    /// SP is not permitted to request one of the listed attributes.
    SpAttributesNotAllowed,
    /// SP certificate alias does not match the configured alias.
    SpCertAliasMismatch,
    /// Replayed SAML message id.
    ReplayAttack,
    /// Signature invalid or signer untrusted.
    UntrustedSigner,
    /// Citizen did not consent to a mandatory attribute.
    CitizenConsentMandatory,
    /// A mandatory attribute is missing or unavailable in the response.
    MandatoryAttributeMissing,
    /// An attribute value failed normalization.
    InvalidAttributeValue,
    /// An attribute name is unknown to this node.
    InvalidAttributeList,
    /// Session missing or correlation id mismatch.
    SessionError,
    /// Response audience does not match the recorded audience restriction.
    AudienceMismatch,
    /// Response carries an assurance level below the requested one.
    InvalidResponseLoa,
    /// The SAML engine failed to generate a message.
    SamlGeneration,
    /// Legacy message format requested on an eIDAS-only deployment.
    FormatNotSupported,
    /// Selected country is not a configured peer.
    UnknownCountry,
    /// Node configuration is inconsistent.
    Configuration,
}

impl ErrorId {
    /// The key used for configuration overrides.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::InvalidSamlToken => "sProviderAction.invalidSaml",
            Self::SpQaaInvalid => "spCountrySelector.invalidSpQaa",
            Self::SpAttributesNotAllowed => "spCountrySelector.spNotAllowed",
            Self::SpCertAliasMismatch => "sProviderAction.invalidSpAlias",
            Self::ReplayAttack => "sProviderAction.replayAttack",
            Self::UntrustedSigner => "sProviderAction.untrustedSigner",
            Self::CitizenConsentMandatory => "citizenResponse.mandatory",
            Self::MandatoryAttributeMissing => "attVerification.mandatory",
            Self::InvalidAttributeValue => "attrValue.verification",
            Self::InvalidAttributeList => "attrList.verification",
            Self::SessionError => "sessionError",
            Self::AudienceMismatch => "audienceRestrictionError",
            Self::InvalidResponseLoa => "serviceResponse.invalidLoa",
            Self::SamlGeneration => "serviceSAMLResponse.error",
            Self::FormatNotSupported => "messageFormat.unsupported",
            Self::UnknownCountry => "countrySelector.invalidCountry",
            Self::Configuration => "node.configuration",
        }
    }

    /// Built-in error code, used when no override is configured.
    #[must_use]
    pub const fn default_code(self) -> &'static str {
        match self {
            Self::InvalidSamlToken => "203001",
            Self::SpQaaInvalid => "200002",
            Self::SpAttributesNotAllowed => "200003",
            Self::SpCertAliasMismatch => "203003",
            Self::ReplayAttack => "201003",
            Self::UntrustedSigner => "201002",
            Self::CitizenConsentMandatory => "202007",
            Self::MandatoryAttributeMissing => "202010",
            Self::InvalidAttributeValue => "202012",
            Self::InvalidAttributeList => "202005",
            Self::SessionError => "203010",
            Self::AudienceMismatch => "203011",
            Self::InvalidResponseLoa => "202019",
            Self::SamlGeneration => "203006",
            Self::FormatNotSupported => "203013",
            Self::UnknownCountry => "200010",
            Self::Configuration => "203000",
        }
    }

    /// Built-in message, used when no override is configured.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::InvalidSamlToken => "invalid SAML token",
            Self::SpQaaInvalid => "SP QAA or LoA outside permitted bounds",
            Self::SpAttributesNotAllowed => "SP may not request these attributes",
            Self::SpCertAliasMismatch => "SP certificate alias mismatch",
            Self::ReplayAttack => "SAML message id already processed",
            Self::UntrustedSigner => "message signer is not trusted",
            Self::CitizenConsentMandatory => "mandatory attribute without citizen consent",
            Self::MandatoryAttributeMissing => "mandatory attribute missing from response",
            Self::InvalidAttributeValue => "attribute value failed validation",
            Self::InvalidAttributeList => "unknown attribute in list",
            Self::SessionError => "session missing or correlation mismatch",
            Self::AudienceMismatch => "response audience does not match request",
            Self::InvalidResponseLoa => "response assurance level below requested",
            Self::SamlGeneration => "could not generate SAML message",
            Self::FormatNotSupported => "message format not supported by this deployment",
            Self::UnknownCountry => "selected country is not configured",
            Self::Configuration => "invalid node configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_accessor() {
        let err = NodeError::Security {
            code: "201003".to_string(),
            message: "replay".to_string(),
        };
        assert_eq!(err.code(), "201003");
        assert!(err.is_security());
        assert!(!err.is_wire_reported());
    }

    #[test]
    fn service_errors_are_wire_reported() {
        let err = NodeError::Service {
            code: "202007".to_string(),
            message: "consent".to_string(),
            token: None,
        };
        assert!(err.is_wire_reported());
    }

    #[test]
    fn error_ids_have_distinct_keys() {
        let ids = [
            ErrorId::InvalidSamlToken,
            ErrorId::SpQaaInvalid,
            ErrorId::ReplayAttack,
            ErrorId::SessionError,
            ErrorId::AudienceMismatch,
        ];
        let keys: std::collections::HashSet<_> = ids.iter().map(|i| i.key()).collect();
        assert_eq!(keys.len(), ids.len());
    }
}
