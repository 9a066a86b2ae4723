//! Registry configuration.

use std::time::Duration;

/// Default inactivity timeout for incomplete groups.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the reassembly registry.
///
/// Both limits are off by default; memory is then bounded only by eviction.
///
/// Note: This is `Copy` for efficient passing to constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Inactivity timeout used by [`Registry::evict_expired`](super::Registry::evict_expired).
    /// Zero evicts every group that has been idle at all.
    pub timeout: Duration,
    /// Maximum number of concurrent incomplete groups, if limited.
    pub max_pending: Option<usize>,
    /// Maximum `total` a chunk may announce, if limited.
    pub max_total: Option<u32>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_pending: None,
            max_total: None,
        }
    }
}

impl RegistryConfig {
    /// Validate configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_pending` is `Some(0)`
    /// - `max_total` is `Some(0)`
    pub fn validate(&self) -> Result<(), RegistryConfigError> {
        if self.max_pending == Some(0) {
            return Err(RegistryConfigError::InvalidConfig(
                "max_pending must be greater than 0",
            ));
        }
        if self.max_total == Some(0) {
            return Err(RegistryConfigError::InvalidConfig(
                "max_total must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Error type for registry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryConfigError {
    /// Invalid configuration parameter.
    InvalidConfig(&'static str),
}

impl std::fmt::Display for RegistryConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for RegistryConfigError {}
