//! Error types for the provisioner
//!
//! Two tiers only:
//! - Fatal: any identity, registry, cluster, connection, propagation or
//!   configuration failure. The run stops at the first one.
//! - Non-fatal: image push failures. Logged, and the run continues.
//!
//! Transient and permanent failures are not distinguished.

use std::fmt;

/// Result alias used throughout the provisioner
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

/// How a failure affects the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abandon every later step
    Fatal,
    /// Log and continue with the next step
    NonFatal,
}

/// Identity provider calls, used to tag failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOperation {
    ListKeys,
    DeleteKey,
    DeactivateKey,
    CreateKey,
}

impl fmt::Display for IdentityOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListKeys => "list access keys",
            Self::DeleteKey => "delete access key",
            Self::DeactivateKey => "deactivate access key",
            Self::CreateKey => "create access key",
        };
        f.write_str(name)
    }
}

/// Repository registry calls, used to tag failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    ListRepositories,
    CreateRepository,
}

impl fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListRepositories => "describe repositories",
            Self::CreateRepository => "create repository",
        };
        f.write_str(name)
    }
}

/// Main provisioner error type
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Identity provider call failed
    #[error("identity provider failed to {operation}: {message}")]
    Identity {
        operation: IdentityOperation,
        message: String,
    },

    /// Repository registry call failed
    #[error("repository registry failed to {operation}: {message}")]
    Registry {
        operation: RegistryOperation,
        message: String,
    },

    /// Cluster creation failed
    #[error("failed to create cluster {name}: {message}")]
    Cluster { name: String, message: String },

    /// Image push failed
    #[error("image push failed: {message}")]
    ImagePush { message: String },

    /// Building service clients for the issued credential failed
    #[error("failed to connect with issued credential: {message}")]
    Connect { message: String },

    /// The issued credential never became usable
    #[error("issued credential not usable after {waited_secs}s")]
    PropagationTimeout { waited_secs: u64 },

    /// Configuration error
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl ProvisionError {
    /// Identity provider failure
    pub fn identity(operation: IdentityOperation, message: impl Into<String>) -> Self {
        Self::Identity {
            operation,
            message: message.into(),
        }
    }

    /// Repository registry failure
    pub fn registry(operation: RegistryOperation, message: impl Into<String>) -> Self {
        Self::Registry {
            operation,
            message: message.into(),
        }
    }

    /// Cluster manager failure
    pub fn cluster(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cluster {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Image publisher failure
    pub fn image_push(message: impl Into<String>) -> Self {
        Self::ImagePush {
            message: message.into(),
        }
    }

    /// Connector failure
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Invalid configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify the failure
    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::ImagePush { .. } => Severity::NonFatal,
            _ => Severity::Fatal,
        }
    }

    /// Check if the failure ends the run
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
