//! Message format and transport binding tags.

use serde::{Deserialize, Serialize};

/// The SAML extension vocabulary a message is expressed in.
///
/// The two formats are wire-incompatible; every message carries exactly
/// one, and an engine instance only accepts the formats it was configured
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Legacy STORK 1.0 extension schema.
    Stork1,
    /// Current eIDAS extension schema.
    Eidas,
}

impl MessageFormat {
    /// Configuration name of the format.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stork1 => "stork1",
            Self::Eidas => "eidas",
        }
    }

    /// Parses the configuration name, case-insensitively. Unknown names
    /// fall back to the legacy format, matching deployed behavior.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("eidas") {
            Self::Eidas
        } else {
            Self::Stork1
        }
    }
}

/// HTTP transport binding for a SAML message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamlBinding {
    /// Auto-submitting form POST with a base64 token.
    #[default]
    HttpPost,
    /// Query-string encoded redirect with DEFLATE compression.
    HttpRedirect,
}

impl SamlBinding {
    /// SAML 2.0 binding URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
        }
    }

    /// Resolves a binding URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(MessageFormat::from_name("eidas"), MessageFormat::Eidas);
        assert_eq!(MessageFormat::from_name("EIDAS"), MessageFormat::Eidas);
        assert_eq!(MessageFormat::from_name("stork1"), MessageFormat::Stork1);
        assert_eq!(MessageFormat::from_name("anything"), MessageFormat::Stork1);
    }

    #[test]
    fn binding_uri_round_trip() {
        for binding in [SamlBinding::HttpPost, SamlBinding::HttpRedirect] {
            assert_eq!(SamlBinding::from_uri(binding.uri()), Some(binding));
        }
        assert_eq!(SamlBinding::from_uri("urn:other"), None);
    }
}
