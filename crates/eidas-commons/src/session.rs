//! Citizen session contract.
//!
//! A session holds the in-flight request awaiting its matching response,
//! keyed by well-known string parameter names. Each session is owned by
//! the single thread handling that citizen's current interaction; the
//! in-memory store only locks to keep the map itself coherent.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::request::AuthnRequest;

/// Well-known session parameter names.
pub mod keys {
    /// The authentication request being processed.
    pub const AUTH_REQUEST: &str = "authRequest";
    /// SAML id of the outgoing request, for response correlation.
    pub const SAML_IN_RESPONSE_TO: &str = "samlInResponseTo";
    /// Audience the response issuer must match.
    pub const AUDIENCE: &str = "audienceRestriction";
    /// Citizen's remote address at request time.
    pub const REMOTE_ADDRESS: &str = "remoteAddress";
    /// Identifier of the requesting service provider.
    pub const SP_ID: &str = "spId";
    /// Assurance level configured for the answering service.
    pub const SERVICE_LOA: &str = "serviceLoA";
}

/// A value stored in the citizen session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    /// An authentication request envelope.
    Request(AuthnRequest),
    /// A plain string parameter.
    Text(String),
}

impl SessionValue {
    /// The request envelope, when this value holds one.
    #[must_use]
    pub fn as_request(&self) -> Option<&AuthnRequest> {
        match self {
            Self::Request(request) => Some(request),
            Self::Text(_) => None,
        }
    }

    /// The string, when this value holds one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Request(_) => None,
        }
    }
}

/// Server-side session keyed by string parameter names.
pub trait SessionStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<SessionValue>;

    /// Writes a value, replacing any previous one.
    fn put(&self, key: &str, value: SessionValue);

    /// Removes a value, returning it when present.
    fn remove(&self, key: &str) -> Option<SessionValue>;

    /// True when the key is present.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Drops every value. Called when correlation fails, as a precaution.
    fn clear(&self);
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    values: Mutex<HashMap<String, SessionValue>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Option<SessionValue> {
        self.values.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: SessionValue) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<SessionValue> {
        self.values.lock().remove(key)
    }

    fn clear(&self) {
        self.values.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MessageFormat;

    #[test]
    fn store_round_trip() {
        let store = InMemorySessionStore::new();
        store.put(keys::SAML_IN_RESPONSE_TO, SessionValue::Text("_abc".into()));
        assert_eq!(
            store.get(keys::SAML_IN_RESPONSE_TO).unwrap().as_text(),
            Some("_abc")
        );

        let request = AuthnRequest::new(MessageFormat::Eidas).with_issuer("issuer");
        store.put(keys::AUTH_REQUEST, SessionValue::Request(request.clone()));
        assert_eq!(
            store.get(keys::AUTH_REQUEST).unwrap().as_request(),
            Some(&request)
        );

        store.clear();
        assert!(!store.contains(keys::AUTH_REQUEST));
        assert!(!store.contains(keys::SAML_IN_RESPONSE_TO));
    }

    #[test]
    fn value_accessors_reject_wrong_kind() {
        let value = SessionValue::Text("x".into());
        assert!(value.as_request().is_none());
        assert_eq!(value.as_text(), Some("x"));
    }
}
