//! Cache error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache setup and operation errors.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Invalid cache configuration. Raised at startup; never worked
    /// around by falling back to another backend.
    #[error("cache configuration error: {0}")]
    Configuration(String),

    /// Internal cache error.
    #[error("internal cache error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CacheError::Configuration("no backing map".to_string());
        assert!(err.to_string().contains("no backing map"));
    }
}
