//! Collaborator interfaces
//!
//! The sequencer only talks to the outside world through these traits.
//! Cloud backends live in `provision-aws`; in-memory fakes live in
//! `provision-test-utils`.

use crate::error::Result;
use crate::types::{
    AccessKeySummary, ClusterDescriptor, ImagePushOutcome, IssuedCredential,
    RepositoryDescriptor, StatusLine,
};
use async_trait::async_trait;

/// Issues and revokes access keys for a named principal
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// List at most `max_items` keys of the principal
    async fn list_access_keys(&self, principal: &str, max_items: i32)
        -> Result<Vec<AccessKeySummary>>;

    /// Delete a key
    async fn delete_access_key(&self, principal: &str, key_id: &str) -> Result<()>;

    /// Mark a key inactive
    async fn deactivate_access_key(&self, principal: &str, key_id: &str) -> Result<()>;

    /// Issue a new active key
    async fn create_access_key(&self, principal: &str) -> Result<IssuedCredential>;
}

/// Container image repository registry
#[async_trait]
pub trait RepositoryRegistry: Send + Sync {
    /// Every repository visible to the account, unfiltered
    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>>;

    async fn create_repository(&self, name: &str) -> Result<RepositoryDescriptor>;
}

/// Compute cluster manager
#[async_trait]
pub trait ClusterManager: Send + Sync {
    async fn create_cluster(&self, cluster: &ClusterDescriptor) -> Result<ClusterDescriptor>;
}

/// Pushes an image manifest into a repository
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn push_image(&self, repository: &str, tag: &str) -> Result<ImagePushOutcome>;
}

/// Image push stub
///
/// Building and pushing images is not part of provisioning; this publisher
/// keeps the step in the sequence without touching the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopImagePublisher;

#[async_trait]
impl ImagePublisher for NoopImagePublisher {
    async fn push_image(&self, repository: &str, tag: &str) -> Result<ImagePushOutcome> {
        tracing::debug!(repository, tag, "image push not implemented, skipping");
        Ok(ImagePushOutcome::Skipped)
    }
}

/// Service clients bound to one credential
pub struct ConnectedServices {
    /// Identity client acting as the issued key, used for end-of-run revocation
    pub identity: Box<dyn IdentityProvider>,
    pub repositories: Box<dyn RepositoryRegistry>,
    pub clusters: Box<dyn ClusterManager>,
    pub images: Box<dyn ImagePublisher>,
}

impl std::fmt::Debug for ConnectedServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedServices").finish_non_exhaustive()
    }
}

/// Builds service clients from an explicitly passed credential
///
/// Downstream clients get the freshly issued key through here instead of
/// reading it back out of the process environment.
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    /// Cheap authenticated read. `Ok` means the credential is usable.
    async fn probe(&self, credential: &IssuedCredential, region: &str) -> Result<()>;

    async fn connect(&self, credential: &IssuedCredential, region: &str)
        -> Result<ConnectedServices>;
}

/// Receives human readable progress lines
pub trait StatusSink: Send + Sync {
    fn status(&self, line: &StatusLine);
}

/// Prints status lines to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl StatusSink for StdoutSink {
    fn status(&self, line: &StatusLine) {
        println!("{line}");
    }
}
