//! HTTP-POST binding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::SamlResult;

/// Encodes a raw token for the POST form field.
#[must_use]
pub fn encode(token: &[u8]) -> String {
    BASE64.encode(token)
}

/// Decodes a POST form field back into the raw token.
pub fn decode(encoded: &str) -> SamlResult<Vec<u8>> {
    Ok(BASE64.decode(encoded.trim().as_bytes())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamlError;

    #[test]
    fn round_trip() {
        let token = b"<saml2p:AuthnRequest>payload</saml2p:AuthnRequest>";
        assert_eq!(decode(&encode(token)).unwrap(), token);
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(matches!(
            decode("not!!base64").unwrap_err(),
            SamlError::Base64Decode(_)
        ));
    }
}
