//! Custom error types for the multimeter core.
//!
//! This module defines the error taxonomy shared by every layer of the crate.
//! Using the `thiserror` crate, each failure kind stays explicit internally even
//! though the session boundary only logs them.
//!
//! ## Error Hierarchy
//!
//! - **`LinkError`**: transport faults on the instrument link. Opening a resource,
//!   a failed write or query, a timeout, or using a link that is not open. The
//!   underlying transport fault is kept as the error source.
//! - **`ConfigError`**: configuration that cannot be used, whether it failed to
//!   load or failed validation (unset GPIB address, zero poll period, ...).
//! - **`DmmError`**: the top-level type returned by dispatcher, actor and session
//!   operations. It wraps the two above and adds `Parse` for instrument
//!   responses that cannot be decoded, plus `ActorUnavailable` when the
//!   instrument actor has already shut down.

use std::time::Duration;
use thiserror::Error;

/// Boxed transport fault carried inside a [`LinkError`].
pub type TransportFault = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DmmError>;

/// Failures of the instrument link itself.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The resource could not be opened.
    #[error("Failed to open instrument resource '{resource}': {source}")]
    Open {
        /// VISA resource string.
        resource: String,
        /// Transport fault reported by the adapter.
        #[source]
        source: TransportFault,
    },

    /// A write or query failed on an open link.
    #[error("Instrument I/O failed for '{command}': {source}")]
    Io {
        /// Command being sent.
        command: String,
        /// Transport fault reported by the adapter.
        #[source]
        source: TransportFault,
    },

    /// A link call ran past its deadline.
    #[error("Instrument did not answer '{command}' within {timeout:?}")]
    Timeout {
        /// Command being sent.
        command: String,
        /// Deadline that expired.
        timeout: Duration,
    },

    /// The link was used before it was opened.
    #[error("Instrument link is not open")]
    NotConnected,

    /// The adapter needs a cargo feature this build lacks.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl LinkError {
    /// Wrap a transport fault raised while opening `resource`.
    pub fn open(resource: impl Into<String>, source: impl Into<TransportFault>) -> Self {
        Self::Open {
            resource: resource.into(),
            source: source.into(),
        }
    }

    /// Wrap a transport fault raised while sending `command`.
    pub fn io(command: impl Into<String>, source: impl Into<TransportFault>) -> Self {
        Self::Io {
            command: command.into(),
            source: source.into(),
        }
    }
}

/// Configuration that failed to load or validate.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Figment could not load or extract the configuration.
    #[error("Configuration load error: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A loaded value is out of range.
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Top-level error for dispatcher, actor and session operations.
#[derive(Error, Debug)]
pub enum DmmError {
    /// Transport fault on the instrument link.
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// An instrument response could not be decoded.
    #[error("Could not decode instrument response '{response}' as {expected}")]
    Parse {
        /// Response text, trimmed.
        response: String,
        /// What the response should have been.
        expected: &'static str,
    },

    /// Unusable configuration, including an unset address.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The instrument actor has stopped.
    #[error("Instrument actor is not running")]
    ActorUnavailable,
}

impl DmmError {
    /// Build a configuration validation error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(ConfigError::Validation(message.into()))
    }

    /// Short name of the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Link(_) => "link",
            Self::Parse { .. } => "parse",
            Self::Config(_) => "config",
            Self::ActorUnavailable => "actor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = DmmError::Parse {
            response: "garbage".to_string(),
            expected: "a reading",
        };
        assert_eq!(
            err.to_string(),
            "Could not decode instrument response 'garbage' as a reading"
        );
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_link_error_keeps_transport_fault() {
        let fault = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "bus error");
        let err = LinkError::io("FETC?", fault);
        assert!(err.to_string().contains("FETC?"));
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("bus error"));
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err = DmmError::config("GPIB address is unset");
        assert_eq!(
            err.to_string(),
            "Configuration validation error: GPIB address is unset"
        );
        assert_eq!(err.kind(), "config");
    }
}
