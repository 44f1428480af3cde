//! HTTP-Redirect binding.
//!
//! The token is DEFLATE-compressed (raw, no zlib header), base64-encoded
//! and URL-escaped into the query string of the destination URL.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{SamlError, SamlResult};

use super::SamlMessageType;

/// Encodes a token into a redirect URL for the given destination.
pub fn encode(
    token: &[u8],
    destination: &str,
    message_type: SamlMessageType,
    relay_state: Option<&str>,
) -> SamlResult<String> {
    let compressed = deflate_compress(token)?;
    let encoded = BASE64.encode(&compressed);
    let separator = if destination.contains('?') { '&' } else { '?' };

    let mut url = format!(
        "{destination}{separator}{}={}",
        message_type.param(),
        urlencoding::encode(&encoded)
    );
    if let Some(state) = relay_state {
        url.push_str(&format!("&RelayState={}", urlencoding::encode(state)));
    }
    Ok(url)
}

/// Decodes a `SAMLRequest`/`SAMLResponse` query parameter value back into
/// the raw token. The value is expected URL-decoded already (the web
/// layer's query parser does that).
pub fn decode(parameter: &str) -> SamlResult<Vec<u8>> {
    let compressed = BASE64.decode(parameter.trim().as_bytes())?;
    deflate_decompress(&compressed)
}

/// Extracts and decodes the SAML parameter from a full redirect URL.
pub fn decode_url(url: &str) -> SamlResult<(SamlMessageType, Vec<u8>, Option<String>)> {
    let parsed = url::Url::parse(url)
        .map_err(|e| SamlError::XmlParse(format!("invalid redirect URL: {e}")))?;

    let mut message = None;
    let mut relay_state = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "SAMLRequest" => message = Some((SamlMessageType::Request, value.into_owned())),
            "SAMLResponse" => message = Some((SamlMessageType::Response, value.into_owned())),
            "RelayState" => relay_state = Some(value.into_owned()),
            _ => {}
        }
    }

    let (message_type, encoded) = message.ok_or_else(|| {
        SamlError::MissingElement("SAMLRequest or SAMLResponse parameter".to_string())
    })?;
    Ok((message_type, decode(&encoded)?, relay_state))
}

fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_round_trip() {
        let token = b"<saml2p:AuthnRequest ID=\"_r1\">body</saml2p:AuthnRequest>";
        let url = encode(
            token,
            "https://service.example.eu/ColleagueRequest",
            SamlMessageType::Request,
            Some("state-42"),
        )
        .unwrap();
        assert!(url.starts_with("https://service.example.eu/ColleagueRequest?SAMLRequest="));
        assert!(url.contains("RelayState=state-42"));

        let (message_type, decoded, relay_state) = decode_url(&url).unwrap();
        assert_eq!(message_type, SamlMessageType::Request);
        assert_eq!(decoded, token);
        assert_eq!(relay_state.as_deref(), Some("state-42"));
    }

    #[test]
    fn existing_query_string_is_extended() {
        let url = encode(b"x", "https://a.example/sso?tenant=1", SamlMessageType::Response, None)
            .unwrap();
        assert!(url.contains("?tenant=1&SAMLResponse="));
    }

    #[test]
    fn url_without_saml_parameter_is_rejected() {
        assert!(decode_url("https://a.example/sso?foo=bar").is_err());
    }
}
