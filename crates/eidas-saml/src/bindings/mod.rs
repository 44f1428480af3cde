//! HTTP transport encodings for SAML tokens.
//!
//! POST carries the token base64-encoded in an auto-submitting form field;
//! Redirect carries it DEFLATE-compressed, base64-encoded and
//! URL-escaped in the query string.

pub mod post;
pub mod redirect;

/// Whether a transported message is a request or a response; selects the
/// form/query parameter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// `SAMLRequest` parameter.
    Request,
    /// `SAMLResponse` parameter.
    Response,
}

impl SamlMessageType {
    /// The HTTP parameter name for this message type.
    #[must_use]
    pub const fn param(self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}
