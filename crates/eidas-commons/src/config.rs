//! Typed node configuration.
//!
//! Configuration arrives as a flat `key -> value` map (the property file
//! itself is loaded by the out-of-scope host layer). The constructor
//! validates and types everything it can up front; the raw map stays
//! available for per-SP keys and error-table overrides. The configuration
//! is built once at process start and passed by reference into every
//! component constructor — there is no global state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::country::Country;
use crate::error::{ErrorId, NodeError, NodeResult};
use crate::levels::QaaLevel;

/// Wildcard meaning "every attribute" in an SP permission entry.
pub const PERMISSION_ALL: &str = "ALL";
/// Wildcard meaning "no attribute" in an SP permission entry, and
/// "any alias" in a certificate-alias entry.
pub const PERMISSION_NONE: &str = "NONE";

/// Suffix of the per-provider certificate alias keys.
const VALIDATION_SUFFIX: &str = ".validation";

/// One configured peer node, from the numbered slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerNode {
    /// Country code identifying the peer.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Endpoint URL for colleague requests.
    pub url: String,
    /// Allowed clock skew against this peer, in milliseconds.
    pub skew_millis: i64,
}

/// What a service provider may request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributePermission {
    /// Any attribute.
    All,
    /// No attribute at all.
    Nothing,
    /// Exactly the listed attribute names.
    List(Vec<String>),
}

impl AttributePermission {
    /// True when every name in `requested` is permitted.
    #[must_use]
    pub fn allows<'a, I>(&self, requested: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            Self::All => true,
            Self::Nothing => false,
            Self::List(names) => requested
                .into_iter()
                .all(|r| names.iter().any(|n| n == r)),
        }
    }
}

/// Validated node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    properties: HashMap<String, String>,
    peers: Vec<PeerNode>,
    min_qaa: QaaLevel,
    max_qaa: QaaLevel,
    eidas_only: bool,
    bypass_sp_validation: bool,
    response_ip_check: bool,
    replay_retention_secs: u64,
}

impl NodeConfig {
    /// Validates a flat property map into a typed configuration.
    ///
    /// Fails with a `Configuration`-coded internal error when a typed key
    /// is present but malformed; absent keys take their defaults.
    pub fn from_properties(properties: HashMap<String, String>) -> NodeResult<Self> {
        let min_qaa = parse_qaa(&properties, "qaa.min", QaaLevel::MIN)?;
        let max_qaa = parse_qaa(&properties, "qaa.max", QaaLevel::MAX)?;
        if min_qaa > max_qaa {
            return Err(config_error("qaa.min exceeds qaa.max"));
        }

        let eidas_only = parse_bool(&properties, "eidas.messageFormat.only", false)?;
        let bypass_sp_validation = parse_bool(&properties, "validation.bypass", false)?;
        let response_ip_check = parse_bool(&properties, "response.ip.check", true)?;

        let replay_retention_secs = match properties.get("antireplay.retention.seconds") {
            None => 300,
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| config_error("malformed antireplay.retention.seconds"))?,
        };

        let peers = parse_peers(&properties)?;

        Ok(Self {
            properties,
            peers,
            min_qaa,
            max_qaa,
            eidas_only,
            bypass_sp_validation,
            response_ip_check,
            replay_retention_secs,
        })
    }

    /// Raw property lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Configured peer nodes, in slot order.
    #[must_use]
    pub fn peers(&self) -> &[PeerNode] {
        &self.peers
    }

    /// Looks up a peer by country code.
    #[must_use]
    pub fn peer(&self, id: &str) -> Option<&PeerNode> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// The selectable country list, in slot order.
    #[must_use]
    pub fn countries(&self) -> Vec<Country> {
        self.peers
            .iter()
            .map(|p| Country::new(p.id.clone(), p.name.clone()))
            .collect()
    }

    /// Global minimum QAA accepted by this node.
    #[must_use]
    pub const fn min_qaa(&self) -> QaaLevel {
        self.min_qaa
    }

    /// Global maximum QAA accepted by this node.
    #[must_use]
    pub const fn max_qaa(&self) -> QaaLevel {
        self.max_qaa
    }

    /// True when this deployment only speaks the eIDAS format.
    #[must_use]
    pub const fn eidas_only(&self) -> bool {
        self.eidas_only
    }

    /// True when per-SP validation is bypassed (test deployments only).
    #[must_use]
    pub const fn bypass_sp_validation(&self) -> bool {
        self.bypass_sp_validation
    }

    /// Whether response validation binds the asserted IP to the citizen's.
    #[must_use]
    pub const fn response_ip_check(&self) -> bool {
        self.response_ip_check
    }

    /// Anti-replay retention window, seconds. Must exceed the maximum
    /// skew-adjusted validity window of any message.
    #[must_use]
    pub const fn replay_retention_secs(&self) -> u64 {
        self.replay_retention_secs
    }

    /// Per-SP QAA cap from `<spId>.qaalevel`, when configured.
    pub fn sp_qaa_cap(&self, sp_id: &str) -> NodeResult<Option<QaaLevel>> {
        match self.get(&format!("{sp_id}.qaalevel")) {
            None => Ok(None),
            Some(raw) => QaaLevel::parse(raw).map(Some),
        }
    }

    /// Attribute permission for an SP: the `<spId>` key, falling back to
    /// `default`; no entry at all means nothing is permitted.
    #[must_use]
    pub fn sp_attribute_permission(&self, sp_id: &str) -> AttributePermission {
        let entry = self
            .get(sp_id)
            .filter(|v| !v.is_empty())
            .or_else(|| self.get("default").filter(|v| !v.is_empty()));
        match entry {
            None => AttributePermission::Nothing,
            Some(PERMISSION_ALL) => AttributePermission::All,
            Some(PERMISSION_NONE) => AttributePermission::Nothing,
            Some(list) => AttributePermission::List(
                list.split(';')
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    /// Configured certificate alias for a provider name, from
    /// `<providerName>.validation`. `None` when the provider is unknown;
    /// the `NONE` wildcard accepts any alias.
    #[must_use]
    pub fn sp_cert_alias(&self, provider_name: &str) -> Option<&str> {
        self.get(&format!("{provider_name}{VALIDATION_SUFFIX}"))
            .filter(|v| !v.is_empty())
    }

    /// Resolves an error id through the override table.
    #[must_use]
    pub fn error(&self, id: ErrorId) -> (String, String) {
        let key = id.key();
        let code = self
            .get(&format!("error.{key}.code"))
            .unwrap_or(id.default_code())
            .to_string();
        let message = self
            .get(&format!("error.{key}.message"))
            .unwrap_or(id.default_message())
            .to_string();
        (code, message)
    }

    /// Builds an `InvalidParameter` error from the table.
    #[must_use]
    pub fn invalid_parameter(&self, id: ErrorId) -> NodeError {
        let (code, message) = self.error(id);
        NodeError::InvalidParameter { code, message }
    }

    /// Builds an `InvalidSession` error from the table.
    #[must_use]
    pub fn invalid_session(&self, id: ErrorId) -> NodeError {
        let (code, message) = self.error(id);
        NodeError::InvalidSession { code, message }
    }

    /// Builds a `Security` error from the table.
    #[must_use]
    pub fn security(&self, id: ErrorId) -> NodeError {
        let (code, message) = self.error(id);
        NodeError::Security { code, message }
    }

    /// Builds an `Internal` error from the table.
    #[must_use]
    pub fn internal(&self, id: ErrorId) -> NodeError {
        let (code, message) = self.error(id);
        NodeError::Internal { code, message }
    }

    /// Builds a wire-reported `Service` error from the table.
    #[must_use]
    pub fn service_error(&self, id: ErrorId, token: Option<String>) -> NodeError {
        let (code, message) = self.error(id);
        NodeError::Service {
            code,
            message,
            token,
        }
    }
}

fn config_error(message: &str) -> NodeError {
    NodeError::Internal {
        code: ErrorId::Configuration.default_code().to_string(),
        message: message.to_string(),
    }
}

fn parse_qaa(
    properties: &HashMap<String, String>,
    key: &str,
    default: QaaLevel,
) -> NodeResult<QaaLevel> {
    match properties.get(key) {
        None => Ok(default),
        Some(raw) => QaaLevel::parse(raw).map_err(|_| config_error(&format!("malformed {key}"))),
    }
}

fn parse_bool(
    properties: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> NodeResult<bool> {
    match properties.get(key).map(String::as_str) {
        None | Some("") => Ok(default),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(_) => Err(config_error(&format!("malformed boolean {key}"))),
    }
}

fn parse_peers(properties: &HashMap<String, String>) -> NodeResult<Vec<PeerNode>> {
    let count = match properties.get("service.number") {
        None => 0,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| config_error("malformed service.number"))?,
    };

    let mut peers = Vec::with_capacity(count);
    for slot in 1..=count {
        let id = properties.get(&format!("service.id.{slot}"));
        let name = properties.get(&format!("service.name.{slot}"));
        let (Some(id), Some(name)) = (id, name) else {
            // Gaps in the slot numbering are tolerated.
            tracing::debug!(slot, "peer slot incomplete, skipping");
            continue;
        };
        if id.is_empty() || name.is_empty() {
            continue;
        }
        let url = properties
            .get(&format!("service.url.{slot}"))
            .cloned()
            .unwrap_or_default();
        let skew_millis = match properties.get(&format!("service.skew.{slot}")) {
            None => 0,
            Some(raw) if raw.is_empty() => 0,
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| config_error(&format!("malformed service.skew.{slot}")))?,
        };
        peers.push(PeerNode {
            id: id.clone(),
            name: name.clone(),
            url,
            skew_millis,
        });
    }
    Ok(peers)
}
