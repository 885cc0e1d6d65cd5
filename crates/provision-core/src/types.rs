//! Core types for the provisioner
//!
//! Credentials, resource descriptors, step outcomes and the run report.

use std::fmt;

/// Status of an existing access key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyStatus {
    /// Usable
    Active,
    /// Disabled, eligible for deletion
    Inactive,
}

impl KeyStatus {
    /// Map a provider status string. Anything that is not inactive counts as active.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        if status.eq_ignore_ascii_case("inactive") {
            Self::Inactive
        } else {
            Self::Active
        }
    }
}

/// An access key as listed by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeySummary {
    /// Access key id
    pub key_id: String,
    /// Principal owning the key
    pub principal: String,
    /// Current status
    pub status: KeyStatus,
}

impl AccessKeySummary {
    /// Create a new summary
    pub fn new(key_id: impl Into<String>, principal: impl Into<String>, status: KeyStatus) -> Self {
        Self {
            key_id: key_id.into(),
            principal: principal.into(),
            status,
        }
    }
}

/// A freshly issued credential
///
/// The secret is only available at creation time. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Access key id
    pub key_id: String,
    /// Secret access key
    pub secret: String,
    /// Principal the key was issued for
    pub principal: String,
}

impl IssuedCredential {
    /// Create a new credential
    pub fn new(
        key_id: impl Into<String>,
        secret: impl Into<String>,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
            principal: principal.into(),
        }
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("principal", &self.principal)
            .finish()
    }
}

/// Container image repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    /// Repository name
    pub name: String,
}

impl RepositoryDescriptor {
    /// Create a new descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Compute cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    /// Cluster name
    pub name: String,
    /// Capacity providers requested at creation
    pub capacity_providers: Vec<String>,
}

impl ClusterDescriptor {
    /// Create a new descriptor
    pub fn new(name: impl Into<String>, capacity_providers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            capacity_providers,
        }
    }
}

/// What the rotation step did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RotationSummary {
    /// Previously inactive keys that were deleted
    pub deleted: Vec<String>,
    /// Previously active keys that were deactivated
    pub deactivated: Vec<String>,
    /// Key issued for this run
    pub issued_key_id: String,
}

/// Result of the repository step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryOutcome {
    /// Creation skipped; carries the name of the repository that was found
    AlreadyExists { name: String },
    /// Repository was created
    Created { name: String },
}

/// Result of the cluster step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOutcome {
    /// Cluster was created
    Created { name: String },
}

/// Result of the image push step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePushOutcome {
    /// Nothing was pushed
    Skipped,
    /// Image manifest accepted
    Pushed { digest: String },
    /// Push failed; the run continued
    Failed { message: String },
}

/// Everything a completed run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub rotation: RotationSummary,
    pub repository: RepositoryOutcome,
    pub image: ImagePushOutcome,
    pub cluster: ClusterOutcome,
    /// Whether the issued key was deactivated at the end of the run
    pub issued_key_revoked: bool,
}

/// Human readable progress line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    RepositoryExists { name: String },
    RepositoryCreated { name: String },
    ClusterCreated { name: String },
    ImagePushFailed { message: String },
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepositoryExists { name } => {
                write!(f, "Repository {name} already exists skipping create")
            }
            Self::RepositoryCreated { name } => write!(f, "Repo {name} created"),
            Self::ClusterCreated { name } => write!(f, "Cluster {name} created"),
            Self::ImagePushFailed { message } => {
                write!(f, "Error pushing image manifest: {message}")
            }
        }
    }
}
