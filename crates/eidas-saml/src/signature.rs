//! XML signature creation and validation.
//!
//! Messages are signed enveloped: a `ds:Signature` element carrying the
//! document digest, the signature over the `SignedInfo` block, and the
//! signer's key name is inserted after the issuer element. Validation
//! recomputes the digest over the document with the signature element
//! removed and verifies the signature with the trust-store key named in
//! `KeyInfo`; an alias missing from the trust store is an untrusted
//! signer, with no partial trust.

use std::collections::HashMap;
use std::fmt;

use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{self, Ed25519KeyPair, KeyPair, RsaKeyPair};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{SamlError, SamlResult};

const SIGNATURE_START: &str = "<ds:Signature";
const SIGNATURE_END: &str = "</ds:Signature>";
const SIGNED_INFO_START: &str = "<ds:SignedInfo>";
const SIGNED_INFO_END: &str = "</ds:SignedInfo>";

/// Supported signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256, the interop default for SAML 2.0.
    RsaSha256,
    /// Ed25519, used for locally-provisioned credentials.
    Ed25519,
}

impl SignatureAlgorithm {
    /// XML-DSig algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::Ed25519 => "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519",
        }
    }

    /// Resolves an algorithm URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => Some(Self::RsaSha256),
            "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519" => Some(Self::Ed25519),
            _ => None,
        }
    }
}

enum KeyMaterial {
    Rsa(RsaKeyPair),
    Ed25519(Ed25519KeyPair),
}

/// A private signing key bound to the alias peers know it by.
pub struct SigningCredential {
    alias: String,
    key: KeyMaterial,
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("alias", &self.alias)
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

impl SigningCredential {
    /// Loads an RSA credential from a PKCS#8 DER private key.
    pub fn rsa_from_pkcs8(alias: impl Into<String>, pkcs8_der: &[u8]) -> SamlResult<Self> {
        let key_pair = RsaKeyPair::from_pkcs8(pkcs8_der)
            .or_else(|_| RsaKeyPair::from_der(pkcs8_der))
            .map_err(|e| SamlError::Crypto(format!("invalid RSA key: {e}")))?;
        Ok(Self {
            alias: alias.into(),
            key: KeyMaterial::Rsa(key_pair),
        })
    }

    /// Loads an Ed25519 credential from a PKCS#8 DER private key.
    pub fn ed25519_from_pkcs8(alias: impl Into<String>, pkcs8_der: &[u8]) -> SamlResult<Self> {
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8_der)
            .map_err(|e| SamlError::Crypto(format!("invalid Ed25519 key: {e}")))?;
        Ok(Self {
            alias: alias.into(),
            key: KeyMaterial::Ed25519(key_pair),
        })
    }

    /// Generates a fresh Ed25519 credential. Used when a deployment is
    /// provisioned without pre-issued key material, and by tests.
    pub fn generate_ed25519(alias: impl Into<String>) -> SamlResult<Self> {
        let rng = SystemRandom::new();
        let document = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|e| SamlError::Crypto(format!("key generation failed: {e}")))?;
        Self::ed25519_from_pkcs8(alias, document.as_ref())
    }

    /// The alias peers reference this credential by.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The algorithm this credential signs with.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        match self.key {
            KeyMaterial::Rsa(_) => SignatureAlgorithm::RsaSha256,
            KeyMaterial::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    /// The public half, for distribution to peer trust stores.
    #[must_use]
    pub fn public_key(&self) -> Vec<u8> {
        match &self.key {
            KeyMaterial::Rsa(key_pair) => key_pair.public_key().as_ref().to_vec(),
            KeyMaterial::Ed25519(key_pair) => key_pair.public_key().as_ref().to_vec(),
        }
    }

    fn sign(&self, data: &[u8]) -> SamlResult<Vec<u8>> {
        match &self.key {
            KeyMaterial::Rsa(key_pair) => {
                let rng = SystemRandom::new();
                let mut sig = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(&signature::RSA_PKCS1_SHA256, &rng, data, &mut sig)
                    .map_err(|e| SamlError::SignatureCreation(format!("RSA signing: {e}")))?;
                Ok(sig)
            }
            KeyMaterial::Ed25519(key_pair) => Ok(key_pair.sign(data).as_ref().to_vec()),
        }
    }
}

#[derive(Debug, Clone)]
struct TrustedKey {
    algorithm: SignatureAlgorithm,
    public_key: Vec<u8>,
}

/// Trusted signer keys, keyed by alias.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    entries: HashMap<String, TrustedKey>,
}

impl TrustStore {
    /// Creates an empty trust store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trusted public key under an alias.
    pub fn add(
        &mut self,
        alias: impl Into<String>,
        algorithm: SignatureAlgorithm,
        public_key: Vec<u8>,
    ) {
        self.entries.insert(
            alias.into(),
            TrustedKey {
                algorithm,
                public_key,
            },
        );
    }

    /// Registers the public half of a credential under its own alias.
    pub fn trust(&mut self, credential: &SigningCredential) {
        self.add(
            credential.alias().to_string(),
            credential.algorithm(),
            credential.public_key(),
        );
    }

    /// True when the alias is trusted.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    fn verify(&self, alias: &str, data: &[u8], sig: &[u8]) -> SamlResult<()> {
        let entry = self
            .entries
            .get(alias)
            .ok_or_else(|| SamlError::UntrustedSigner(alias.to_string()))?;
        let algorithm: &'static dyn signature::VerificationAlgorithm = match entry.algorithm {
            SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            SignatureAlgorithm::Ed25519 => &signature::ED25519,
        };
        signature::UnparsedPublicKey::new(algorithm, &entry.public_key)
            .verify(data, sig)
            .map_err(|_| SamlError::SignatureInvalid("signature verification failed".to_string()))
    }
}

/// Signs a document, inserting the signature element after the issuer.
pub fn sign_document(
    xml: &str,
    reference_id: &str,
    credential: &SigningCredential,
) -> SamlResult<String> {
    let digest_b64 = BASE64.encode(digest(&SHA256, xml.as_bytes()).as_ref());
    let signed_info = format!(
        "{SIGNED_INFO_START}\
         <ds:CanonicalizationMethod Algorithm=\"http://www.w3.org/2001/10/xml-exc-c14n#\"/>\
         <ds:SignatureMethod Algorithm=\"{}\"/>\
         <ds:Reference URI=\"#{reference_id}\">\
         <ds:DigestMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#sha256\"/>\
         <ds:DigestValue>{digest_b64}</ds:DigestValue>\
         </ds:Reference>\
         {SIGNED_INFO_END}",
        credential.algorithm().uri()
    );
    let signature_b64 = BASE64.encode(credential.sign(signed_info.as_bytes())?);

    let element = format!(
        "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">\
         {signed_info}\
         <ds:SignatureValue>{signature_b64}</ds:SignatureValue>\
         <ds:KeyInfo><ds:KeyName>{}</ds:KeyName></ds:KeyInfo>\
         </ds:Signature>",
        crate::xml::escape(credential.alias())
    );

    let issuer_end = xml
        .find("</saml2:Issuer>")
        .map(|idx| idx + "</saml2:Issuer>".len())
        .ok_or_else(|| SamlError::MissingElement("Issuer".to_string()))?;

    let mut signed = String::with_capacity(xml.len() + element.len());
    signed.push_str(&xml[..issuer_end]);
    signed.push_str(&element);
    signed.push_str(&xml[issuer_end..]);
    Ok(signed)
}

/// Verifies a document signature and returns the signer alias.
pub fn verify_document(xml: &str, trust: &TrustStore) -> SamlResult<String> {
    let (stripped, block) = split_signature(xml)?;

    let signed_info = extract_span(&block, SIGNED_INFO_START, SIGNED_INFO_END)
        .ok_or_else(|| SamlError::MissingElement("SignedInfo".to_string()))?;
    let digest_b64 = extract_between(&block, "<ds:DigestValue>", "</ds:DigestValue>")
        .ok_or_else(|| SamlError::MissingElement("DigestValue".to_string()))?;
    let signature_b64 = extract_between(&block, "<ds:SignatureValue>", "</ds:SignatureValue>")
        .ok_or_else(|| SamlError::MissingElement("SignatureValue".to_string()))?;
    let alias = extract_between(&block, "<ds:KeyName>", "</ds:KeyName>")
        .ok_or_else(|| SamlError::MissingElement("KeyName".to_string()))?;

    let expected = BASE64.encode(digest(&SHA256, stripped.as_bytes()).as_ref());
    if expected != digest_b64 {
        return Err(SamlError::SignatureInvalid(
            "document digest mismatch".to_string(),
        ));
    }

    let sig = BASE64.decode(signature_b64.as_bytes())?;
    trust.verify(&alias, signed_info.as_bytes(), &sig)?;
    Ok(alias)
}

/// Removes the signature element, returning the unsigned document.
pub fn strip_signature(xml: &str) -> SamlResult<String> {
    Ok(split_signature(xml)?.0)
}

fn split_signature(xml: &str) -> SamlResult<(String, String)> {
    let start = xml
        .find(SIGNATURE_START)
        .ok_or_else(|| SamlError::MissingElement("Signature".to_string()))?;
    let end = xml[start..]
        .find(SIGNATURE_END)
        .map(|idx| start + idx + SIGNATURE_END.len())
        .ok_or_else(|| SamlError::XmlParse("unterminated Signature element".to_string()))?;

    let mut stripped = String::with_capacity(xml.len());
    stripped.push_str(&xml[..start]);
    stripped.push_str(&xml[end..]);
    Ok((stripped, xml[start..end].to_string()))
}

fn extract_span(haystack: &str, start_tag: &str, end_tag: &str) -> Option<String> {
    let start = haystack.find(start_tag)?;
    let end = haystack[start..].find(end_tag)? + start + end_tag.len();
    Some(haystack[start..end].to_string())
}

fn extract_between(haystack: &str, start_tag: &str, end_tag: &str) -> Option<String> {
    let start = haystack.find(start_tag)? + start_tag.len();
    let end = haystack[start..].find(end_tag)? + start;
    Some(haystack[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<saml2p:AuthnRequest ID=\"_t1\">\
                       <saml2:Issuer>https://sp.example.eu</saml2:Issuer>\
                       <payload>hello</payload>\
                       </saml2p:AuthnRequest>";

    fn trusted(credential: &SigningCredential) -> TrustStore {
        let mut trust = TrustStore::new();
        trust.trust(credential);
        trust
    }

    #[test]
    fn sign_verify_round_trip() {
        let credential = SigningCredential::generate_ed25519("local-node").unwrap();
        let signed = sign_document(DOC, "_t1", &credential).unwrap();
        let alias = verify_document(&signed, &trusted(&credential)).unwrap();
        assert_eq!(alias, "local-node");
        // Stripping restores the original bytes.
        assert_eq!(strip_signature(&signed).unwrap(), DOC);
    }

    #[test]
    fn tampered_content_fails_digest() {
        let credential = SigningCredential::generate_ed25519("local-node").unwrap();
        let signed = sign_document(DOC, "_t1", &credential).unwrap();
        let tampered = signed.replace("hello", "hullo");
        let err = verify_document(&tampered, &trusted(&credential)).unwrap_err();
        assert!(matches!(err, SamlError::SignatureInvalid(_)));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let credential = SigningCredential::generate_ed25519("local-node").unwrap();
        let signed = sign_document(DOC, "_t1", &credential).unwrap();
        let value = extract_between(&signed, "<ds:SignatureValue>", "</ds:SignatureValue>").unwrap();
        let mut flipped = value.clone().into_bytes();
        // Flip one character of the base64 payload.
        flipped[10] = if flipped[10] == b'A' { b'B' } else { b'A' };
        let tampered = signed.replace(&value, std::str::from_utf8(&flipped).unwrap());
        let err = verify_document(&tampered, &trusted(&credential)).unwrap_err();
        assert!(err.is_security());
    }

    #[test]
    fn unknown_signer_is_untrusted() {
        let credential = SigningCredential::generate_ed25519("rogue").unwrap();
        let signed = sign_document(DOC, "_t1", &credential).unwrap();
        let other = SigningCredential::generate_ed25519("local-node").unwrap();
        let err = verify_document(&signed, &trusted(&other)).unwrap_err();
        assert!(matches!(err, SamlError::UntrustedSigner(alias) if alias == "rogue"));
    }

    #[test]
    fn unsigned_document_is_rejected() {
        let err = verify_document(DOC, &TrustStore::new()).unwrap_err();
        assert!(matches!(err, SamlError::MissingElement(_)));
    }

    #[test]
    fn algorithm_uris_round_trip() {
        for algorithm in [SignatureAlgorithm::RsaSha256, SignatureAlgorithm::Ed25519] {
            assert_eq!(SignatureAlgorithm::from_uri(algorithm.uri()), Some(algorithm));
        }
    }
}
