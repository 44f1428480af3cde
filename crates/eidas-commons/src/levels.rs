//! Authentication assurance levels.
//!
//! Two vocabularies coexist: the legacy STORK numeric QAA level (1 to 4)
//! and the eIDAS Level of Assurance, a closed set of URIs with a defined
//! ordering. Exactly one of the two is authoritative on a message,
//! depending on its format.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorId, NodeError, NodeResult};

/// Legacy STORK Quality of Authentication Assurance level, 1 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QaaLevel(u8);

impl QaaLevel {
    /// Lowest defined level.
    pub const MIN: Self = Self(1);
    /// Highest defined level.
    pub const MAX: Self = Self(4);

    /// Validates and wraps a raw level.
    pub fn new(level: u8) -> NodeResult<Self> {
        if (1..=4).contains(&level) {
            Ok(Self(level))
        } else {
            Err(NodeError::InvalidParameter {
                code: ErrorId::SpQaaInvalid.default_code().to_string(),
                message: format!("QAA level {level} outside 1..=4"),
            })
        }
    }

    /// Parses the decimal wire form.
    pub fn parse(raw: &str) -> NodeResult<Self> {
        raw.parse::<u8>()
            .map_err(|_| NodeError::InvalidParameter {
                code: ErrorId::SpQaaInvalid.default_code().to_string(),
                message: format!("malformed QAA level {raw:?}"),
            })
            .and_then(Self::new)
    }

    /// The raw numeric level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for QaaLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// eIDAS Level of Assurance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EidasLoa {
    /// `http://eidas.europa.eu/LoA/low`
    Low,
    /// `http://eidas.europa.eu/LoA/substantial`
    Substantial,
    /// `http://eidas.europa.eu/LoA/high`
    High,
}

impl EidasLoa {
    /// The official LoA URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Low => "http://eidas.europa.eu/LoA/low",
            Self::Substantial => "http://eidas.europa.eu/LoA/substantial",
            Self::High => "http://eidas.europa.eu/LoA/high",
        }
    }

    /// Parses a LoA URI; an unknown URI is a validation failure.
    pub fn from_uri(uri: &str) -> NodeResult<Self> {
        match uri {
            "http://eidas.europa.eu/LoA/low" => Ok(Self::Low),
            "http://eidas.europa.eu/LoA/substantial" => Ok(Self::Substantial),
            "http://eidas.europa.eu/LoA/high" => Ok(Self::High),
            _ => Err(NodeError::InvalidParameter {
                code: ErrorId::SpQaaInvalid.default_code().to_string(),
                message: format!("unknown level of assurance {uri:?}"),
            }),
        }
    }
}

/// How a response LoA is matched against the requested one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoaComparison {
    /// Response level must be at least the requested level.
    #[default]
    Minimum,
    /// Response level must equal the requested level.
    Exact,
}

impl LoaComparison {
    /// True when `provided` satisfies `requested` under this comparison.
    #[must_use]
    pub fn satisfies(self, requested: EidasLoa, provided: EidasLoa) -> bool {
        match self {
            Self::Minimum => provided >= requested,
            Self::Exact => provided == requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qaa_bounds() {
        assert!(QaaLevel::new(0).is_err());
        assert!(QaaLevel::new(5).is_err());
        assert_eq!(QaaLevel::new(3).unwrap().value(), 3);
        assert!(QaaLevel::parse("x").is_err());
        assert_eq!(QaaLevel::parse("2").unwrap(), QaaLevel::new(2).unwrap());
    }

    #[test]
    fn loa_uri_round_trip() {
        for loa in [EidasLoa::Low, EidasLoa::Substantial, EidasLoa::High] {
            assert_eq!(EidasLoa::from_uri(loa.uri()).unwrap(), loa);
        }
        assert!(EidasLoa::from_uri("http://eidas.europa.eu/LoA/extreme").is_err());
    }

    #[test]
    fn loa_comparison() {
        assert!(LoaComparison::Minimum.satisfies(EidasLoa::Substantial, EidasLoa::High));
        assert!(!LoaComparison::Minimum.satisfies(EidasLoa::High, EidasLoa::Substantial));
        assert!(LoaComparison::Exact.satisfies(EidasLoa::Low, EidasLoa::Low));
        assert!(!LoaComparison::Exact.satisfies(EidasLoa::Low, EidasLoa::High));
    }
}
