//! SAML engine error types.

use thiserror::Error;

/// Result type for engine operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// Engine-level errors.
///
/// Callers in the node pipeline map these onto the node taxonomy:
/// signature and trust failures become `Security`, malformed input becomes
/// `InvalidParameter`, configuration faults become `Internal`.
#[derive(Debug, Error)]
pub enum SamlError {
    /// The token is not parseable XML, or a structural element is wrong.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// A required element or attribute is absent.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// The document signature does not verify.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// A signature could not be produced.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// The signer is not present in the trust store.
    #[error("untrusted signer: {0}")]
    UntrustedSigner(String),

    /// The message format is not enabled on this engine instance.
    #[error("message format {0} not supported by this engine")]
    FormatNotSupported(&'static str),

    /// Strict mode rejected an attribute name outside the vocabulary.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// The attribute list is empty or absent.
    #[error("personal attribute list is empty")]
    EmptyAttributeList,

    /// eIDAS requests must carry the SP metadata provider name.
    #[error("provider name is required")]
    MissingProviderName,

    /// The QAA level or level of assurance is absent or malformed.
    #[error("malformed assurance level: {0}")]
    MalformedAssuranceLevel(String),

    /// No signing credential is configured for this operation.
    #[error("signing credential missing or unusable")]
    MissingSigningKey,

    /// IssueInstant is outside the skew-adjusted freshness window.
    #[error("message outside freshness window: {0}")]
    StaleMessage(String),

    /// The asserted subject-confirmation address does not match the
    /// citizen's remote address.
    #[error("subject confirmation address mismatch: asserted {asserted}, remote {remote}")]
    IpMismatch {
        /// Address in the assertion.
        asserted: String,
        /// Address the citizen connected from.
        remote: String,
    },

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// DEFLATE (de)compression failed.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl SamlError {
    /// SAML status code communicated for this error when it is reported
    /// over the wire.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::XmlParse(_)
            | Self::MissingElement(_)
            | Self::UnknownAttribute(_)
            | Self::EmptyAttributeList
            | Self::MissingProviderName
            | Self::MalformedAssuranceLevel(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::SignatureInvalid(_)
            | Self::UntrustedSigner(_)
            | Self::StaleMessage(_)
            | Self::IpMismatch { .. } => "urn:oasis:names:tc:SAML:2.0:status:Requester",
            Self::FormatNotSupported(_) => "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported",
            Self::SignatureCreation(_) | Self::MissingSigningKey | Self::Crypto(_) => {
                "urn:oasis:names:tc:SAML:2.0:status:Responder"
            }
        }
    }

    /// True when the failure indicates a potential attack rather than a
    /// malformed message.
    #[must_use]
    pub const fn is_security(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid(_) | Self::UntrustedSigner(_) | Self::IpMismatch { .. }
        )
    }

    /// True when the failure is an engine/configuration fault.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::SignatureCreation(_)
                | Self::MissingSigningKey
                | Self::Crypto(_)
                | Self::FormatNotSupported(_)
        )
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}
