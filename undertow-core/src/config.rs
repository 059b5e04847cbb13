//! Centralized configuration for Undertow.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase. Configuration is immutable once an
//! adapter has been constructed from it.

use std::time::Duration;

/// Default time to wait for swarm metadata before failing the readiness gate.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Errors raised while validating configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Readiness timeout must be greater than zero")]
    InvalidTimeout,
}

/// Central configuration for all Undertow components.
#[derive(Debug, Clone, Default)]
pub struct UndertowConfig {
    pub vfs: VfsConfig,
}

/// File access adapter configuration.
///
/// Controls download prioritization of opened files, how long operations wait
/// for swarm metadata, and which file an unnamed open refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsConfig {
    /// Select every opened file for download immediately
    pub prefetch: bool,
    /// How long to wait for swarm metadata before failing
    pub ready_timeout: Duration,
    /// Path of the main database file, used when an open carries no name
    pub main_file: Option<String>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            prefetch: false,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            main_file: None,
        }
    }
}

impl VfsConfig {
    /// Checks that all values are usable.
    ///
    /// # Errors
    /// - `ConfigError::InvalidTimeout` - Readiness timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ready_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Returns a copy with prefetching enabled.
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Returns a copy with the given readiness timeout.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Returns a copy naming the main database file.
    pub fn with_main_file(mut self, path: impl Into<String>) -> Self {
        self.main_file = Some(path.into());
        self
    }
}

impl UndertowConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(prefetch) = std::env::var("UNDERTOW_PREFETCH") {
            config.vfs.prefetch = prefetch.parse().unwrap_or(false);
        }

        if let Ok(timeout) = std::env::var("UNDERTOW_READY_TIMEOUT_MS")
            && let Ok(millis) = timeout.parse::<u64>()
            && millis > 0
        {
            config.vfs.ready_timeout = Duration::from_millis(millis);
        }

        if let Ok(main_file) = std::env::var("UNDERTOW_MAIN_FILE")
            && !main_file.is_empty()
        {
            config.vfs.main_file = Some(main_file);
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            vfs: VfsConfig {
                ready_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = UndertowConfig::default();

        assert!(!config.vfs.prefetch);
        assert_eq!(config.vfs.ready_timeout, Duration::from_millis(5000));
        assert_eq!(config.vfs.main_file, None);
        assert!(config.vfs.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = VfsConfig::default().with_ready_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout));
    }

    #[test]
    fn test_builder_helpers() {
        let config = VfsConfig::default()
            .with_prefetch(true)
            .with_ready_timeout(Duration::from_millis(50))
            .with_main_file("main.db");

        assert!(config.prefetch);
        assert_eq!(config.ready_timeout, Duration::from_millis(50));
        assert_eq!(config.main_file.as_deref(), Some("main.db"));
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("UNDERTOW_PREFETCH", "true");
            std::env::set_var("UNDERTOW_READY_TIMEOUT_MS", "250");
            std::env::set_var("UNDERTOW_MAIN_FILE", "library/main.db");
        }

        let config = UndertowConfig::from_env();

        assert!(config.vfs.prefetch);
        assert_eq!(config.vfs.ready_timeout, Duration::from_millis(250));
        assert_eq!(config.vfs.main_file.as_deref(), Some("library/main.db"));

        // A zero timeout is not a usable override
        unsafe {
            std::env::set_var("UNDERTOW_READY_TIMEOUT_MS", "0");
        }
        let config = UndertowConfig::from_env();
        assert_eq!(config.vfs.ready_timeout, DEFAULT_READY_TIMEOUT);

        // Cleanup
        unsafe {
            std::env::remove_var("UNDERTOW_PREFETCH");
            std::env::remove_var("UNDERTOW_READY_TIMEOUT_MS");
            std::env::remove_var("UNDERTOW_MAIN_FILE");
        }
    }
}
