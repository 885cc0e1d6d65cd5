//! Testing utilities for the provisioner workspace
//!
//! In-memory collaborators that share one ordered journal, so tests can
//! assert on call order and timing as well as on resulting state.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use provision_core::{
    AccessKeySummary, ClusterDescriptor, ClusterManager, ConnectedServices, IdentityOperation,
    IdentityProvider, ImagePublisher, ImagePushOutcome, IssuedCredential, KeyStatus,
    ProvisionConfig, ProvisionError, ProvisioningSequencer, RegistryOperation,
    RepositoryDescriptor, RepositoryRegistry, Result, ServiceConnector, StatusLine, StatusSink,
};
use std::sync::Arc;
use tokio::time::Instant;

/// One collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListKeys { principal: String, max_items: i32 },
    DeleteKey { key_id: String },
    DeactivateKey { key_id: String },
    CreateKey { principal: String },
    Probe { key_id: String },
    Connect { key_id: String, region: String },
    ListRepositories,
    CreateRepository { name: String },
    PushImage { repository: String, tag: String },
    CreateCluster { name: String, capacity_providers: Vec<String> },
}

impl Call {
    /// Calls made against the registry or cluster manager
    #[must_use]
    pub fn is_resource_call(&self) -> bool {
        matches!(
            self,
            Call::ListRepositories
                | Call::CreateRepository { .. }
                | Call::PushImage { .. }
                | Call::CreateCluster { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub call: Call,
    pub at: Instant,
}

/// Ordered record of every call across all fakes
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn record(&self, call: Call) {
        self.entries.lock().push(JournalEntry {
            call,
            at: Instant::now(),
        });
    }

    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.entries.lock().iter().map(|e| e.call.clone()).collect()
    }

    /// Number of calls matching `pred`
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.entries.lock().iter().filter(|e| pred(&e.call)).count()
    }

    /// First entry matching `pred`
    pub fn first(&self, pred: impl Fn(&Call) -> bool) -> Option<JournalEntry> {
        self.entries.lock().iter().find(|e| pred(&e.call)).cloned()
    }
}

#[derive(Debug, Default)]
struct IdentityState {
    keys: Vec<AccessKeySummary>,
    issued: usize,
    fail_on: Option<IdentityOperation>,
}

/// Identity provider holding keys in memory
#[derive(Debug, Clone, Default)]
pub struct FakeIdentityProvider {
    journal: Journal,
    state: Arc<Mutex<IdentityState>>,
}

impl FakeIdentityProvider {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_keys(self, keys: Vec<AccessKeySummary>) -> Self {
        self.state.lock().keys = keys;
        self
    }

    /// Make every call of `operation` fail
    #[must_use]
    pub fn failing_on(self, operation: IdentityOperation) -> Self {
        self.state.lock().fail_on = Some(operation);
        self
    }

    /// Current keys of every principal
    #[must_use]
    pub fn keys(&self) -> Vec<AccessKeySummary> {
        self.state.lock().keys.clone()
    }

    fn check(&self, operation: IdentityOperation) -> Result<()> {
        if self.state.lock().fail_on == Some(operation) {
            return Err(ProvisionError::identity(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn list_access_keys(&self, principal: &str, max_items: i32) -> Result<Vec<AccessKeySummary>> {
        self.journal.record(Call::ListKeys {
            principal: principal.to_string(),
            max_items,
        });
        self.check(IdentityOperation::ListKeys)?;

        let limit = usize::try_from(max_items).unwrap_or(0);
        Ok(self
            .state
            .lock()
            .keys
            .iter()
            .filter(|k| k.principal == principal)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_access_key(&self, _principal: &str, key_id: &str) -> Result<()> {
        self.journal.record(Call::DeleteKey {
            key_id: key_id.to_string(),
        });
        self.check(IdentityOperation::DeleteKey)?;

        self.state.lock().keys.retain(|k| k.key_id != key_id);
        Ok(())
    }

    async fn deactivate_access_key(&self, _principal: &str, key_id: &str) -> Result<()> {
        self.journal.record(Call::DeactivateKey {
            key_id: key_id.to_string(),
        });
        self.check(IdentityOperation::DeactivateKey)?;

        let mut state = self.state.lock();
        match state.keys.iter_mut().find(|k| k.key_id == key_id) {
            Some(key) => {
                key.status = KeyStatus::Inactive;
                Ok(())
            }
            None => Err(ProvisionError::identity(
                IdentityOperation::DeactivateKey,
                format!("no such key {key_id}"),
            )),
        }
    }

    async fn create_access_key(&self, principal: &str) -> Result<IssuedCredential> {
        self.journal.record(Call::CreateKey {
            principal: principal.to_string(),
        });
        self.check(IdentityOperation::CreateKey)?;

        let mut state = self.state.lock();
        state.issued += 1;
        let key_id = format!("AKIAFAKE{:04}", state.issued);
        state
            .keys
            .push(AccessKeySummary::new(&key_id, principal, KeyStatus::Active));
        Ok(IssuedCredential::new(
            key_id,
            format!("secret-{}", state.issued),
            principal,
        ))
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    repositories: Vec<RepositoryDescriptor>,
    fail_on: Option<RegistryOperation>,
}

/// Repository registry holding repositories in memory
#[derive(Debug, Clone, Default)]
pub struct FakeRegistry {
    journal: Journal,
    state: Arc<Mutex<RegistryState>>,
}

impl FakeRegistry {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_repositories(self, names: &[&str]) -> Self {
        self.state.lock().repositories = names.iter().map(|n| RepositoryDescriptor::new(*n)).collect();
        self
    }

    #[must_use]
    pub fn failing_on(self, operation: RegistryOperation) -> Self {
        self.state.lock().fail_on = Some(operation);
        self
    }

    #[must_use]
    pub fn repositories(&self) -> Vec<RepositoryDescriptor> {
        self.state.lock().repositories.clone()
    }
}

#[async_trait]
impl RepositoryRegistry for FakeRegistry {
    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>> {
        self.journal.record(Call::ListRepositories);
        let state = self.state.lock();
        if state.fail_on == Some(RegistryOperation::ListRepositories) {
            return Err(ProvisionError::registry(
                RegistryOperation::ListRepositories,
                "injected failure",
            ));
        }
        Ok(state.repositories.clone())
    }

    async fn create_repository(&self, name: &str) -> Result<RepositoryDescriptor> {
        self.journal.record(Call::CreateRepository {
            name: name.to_string(),
        });
        let mut state = self.state.lock();
        if state.fail_on == Some(RegistryOperation::CreateRepository) {
            return Err(ProvisionError::registry(
                RegistryOperation::CreateRepository,
                "injected failure",
            ));
        }
        if state.repositories.iter().any(|r| r.name == name) {
            return Err(ProvisionError::registry(
                RegistryOperation::CreateRepository,
                format!("RepositoryAlreadyExistsException: {name}"),
            ));
        }
        let repo = RepositoryDescriptor::new(name);
        state.repositories.push(repo.clone());
        Ok(repo)
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    clusters: Vec<ClusterDescriptor>,
    fail: bool,
}

/// Cluster manager; like the real service, creating an existing cluster succeeds
#[derive(Debug, Clone, Default)]
pub struct FakeClusterManager {
    journal: Journal,
    state: Arc<Mutex<ClusterState>>,
}

impl FakeClusterManager {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_clusters(self, names: &[&str]) -> Self {
        self.state.lock().clusters = names
            .iter()
            .map(|n| ClusterDescriptor::new(*n, Vec::new()))
            .collect();
        self
    }

    #[must_use]
    pub fn failing(self) -> Self {
        self.state.lock().fail = true;
        self
    }

    #[must_use]
    pub fn clusters(&self) -> Vec<ClusterDescriptor> {
        self.state.lock().clusters.clone()
    }
}

#[async_trait]
impl ClusterManager for FakeClusterManager {
    async fn create_cluster(&self, cluster: &ClusterDescriptor) -> Result<ClusterDescriptor> {
        self.journal.record(Call::CreateCluster {
            name: cluster.name.clone(),
            capacity_providers: cluster.capacity_providers.clone(),
        });
        let mut state = self.state.lock();
        if state.fail {
            return Err(ProvisionError::cluster(&cluster.name, "injected failure"));
        }
        if !state.clusters.iter().any(|c| c.name == cluster.name) {
            state.clusters.push(cluster.clone());
        }
        Ok(cluster.clone())
    }
}

/// Image publisher with a scripted result
#[derive(Debug, Clone, Default)]
pub struct FakeImagePublisher {
    journal: Journal,
    failure: Arc<Mutex<Option<String>>>,
}

impl FakeImagePublisher {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            failure: Arc::default(),
        }
    }

    #[must_use]
    pub fn failing_with(self, message: &str) -> Self {
        *self.failure.lock() = Some(message.to_string());
        self
    }
}

#[async_trait]
impl ImagePublisher for FakeImagePublisher {
    async fn push_image(&self, repository: &str, tag: &str) -> Result<ImagePushOutcome> {
        self.journal.record(Call::PushImage {
            repository: repository.to_string(),
            tag: tag.to_string(),
        });
        match self.failure.lock().clone() {
            Some(message) => Err(ProvisionError::image_push(message)),
            None => Ok(ImagePushOutcome::Skipped),
        }
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    probe_failures: u32,
    fail_connect: bool,
    connected_with: Vec<IssuedCredential>,
}

/// Hands out the shared fakes for whatever credential it is given
#[derive(Debug, Clone)]
pub struct FakeConnector {
    journal: Journal,
    identity: FakeIdentityProvider,
    registry: FakeRegistry,
    clusters: FakeClusterManager,
    images: FakeImagePublisher,
    state: Arc<Mutex<ConnectorState>>,
}

impl FakeConnector {
    #[must_use]
    pub fn new(
        journal: Journal,
        identity: FakeIdentityProvider,
        registry: FakeRegistry,
        clusters: FakeClusterManager,
        images: FakeImagePublisher,
    ) -> Self {
        Self {
            journal,
            identity,
            registry,
            clusters,
            images,
            state: Arc::default(),
        }
    }

    /// Fail the first `failures` probes
    #[must_use]
    pub fn probe_failures(self, failures: u32) -> Self {
        self.state.lock().probe_failures = failures;
        self
    }

    #[must_use]
    pub fn failing_connect(self) -> Self {
        self.state.lock().fail_connect = true;
        self
    }

    /// Credentials passed to `connect`, in order
    #[must_use]
    pub fn connected_with(&self) -> Vec<IssuedCredential> {
        self.state.lock().connected_with.clone()
    }
}

#[async_trait]
impl ServiceConnector for FakeConnector {
    async fn probe(&self, credential: &IssuedCredential, _region: &str) -> Result<()> {
        self.journal.record(Call::Probe {
            key_id: credential.key_id.clone(),
        });
        let mut state = self.state.lock();
        if state.probe_failures > 0 {
            state.probe_failures -= 1;
            return Err(ProvisionError::connect("InvalidClientTokenId"));
        }
        Ok(())
    }

    async fn connect(&self, credential: &IssuedCredential, region: &str) -> Result<ConnectedServices> {
        self.journal.record(Call::Connect {
            key_id: credential.key_id.clone(),
            region: region.to_string(),
        });
        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(ProvisionError::connect("injected failure"));
        }
        state.connected_with.push(credential.clone());

        Ok(ConnectedServices {
            identity: Box::new(self.identity.clone()),
            repositories: Box::new(self.registry.clone()),
            clusters: Box::new(self.clusters.clone()),
            images: Box::new(self.images.clone()),
        })
    }
}

/// Status sink that keeps every line
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<StatusLine>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.lock().clone()
    }

    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        self.lines.lock().iter().map(ToString::to_string).collect()
    }
}

impl StatusSink for RecordingSink {
    fn status(&self, line: &StatusLine) {
        self.lines.lock().push(line.clone());
    }
}

/// A whole fake account wired to one journal
#[derive(Debug, Clone)]
pub struct FakeCloud {
    pub journal: Journal,
    pub identity: FakeIdentityProvider,
    pub registry: FakeRegistry,
    pub clusters: FakeClusterManager,
    pub images: FakeImagePublisher,
    pub connector: FakeConnector,
    pub status: RecordingSink,
}

impl FakeCloud {
    /// Empty account
    #[must_use]
    pub fn new() -> Self {
        let journal = Journal::default();
        Self::from_parts(
            FakeIdentityProvider::new(journal.clone()),
            FakeRegistry::new(journal.clone()),
            FakeClusterManager::new(journal.clone()),
            FakeImagePublisher::new(journal.clone()),
            journal,
        )
    }

    /// Builder for customising individual fakes before wiring
    #[must_use]
    pub fn builder() -> FakeCloudBuilder {
        FakeCloudBuilder::new()
    }

    fn from_parts(
        identity: FakeIdentityProvider,
        registry: FakeRegistry,
        clusters: FakeClusterManager,
        images: FakeImagePublisher,
        journal: Journal,
    ) -> Self {
        let connector = FakeConnector::new(
            journal.clone(),
            identity.clone(),
            registry.clone(),
            clusters.clone(),
            images.clone(),
        );
        Self {
            journal,
            identity,
            registry,
            clusters,
            images,
            connector,
            status: RecordingSink::default(),
        }
    }

    /// Sequencer over this account
    #[must_use]
    pub fn sequencer(&self, config: ProvisionConfig) -> ProvisioningSequencer {
        ProvisioningSequencer::new(
            config,
            Arc::new(self.identity.clone()),
            Arc::new(self.connector.clone()),
        )
        .with_status_sink(Arc::new(self.status.clone()))
    }
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures the fakes of a [`FakeCloud`] before they are wired together
#[derive(Debug)]
pub struct FakeCloudBuilder {
    journal: Journal,
    identity: FakeIdentityProvider,
    registry: FakeRegistry,
    clusters: FakeClusterManager,
    images: FakeImagePublisher,
    probe_failures: u32,
    fail_connect: bool,
}

impl FakeCloudBuilder {
    fn new() -> Self {
        let journal = Journal::default();
        Self {
            identity: FakeIdentityProvider::new(journal.clone()),
            registry: FakeRegistry::new(journal.clone()),
            clusters: FakeClusterManager::new(journal.clone()),
            images: FakeImagePublisher::new(journal.clone()),
            journal,
            probe_failures: 0,
            fail_connect: false,
        }
    }

    #[must_use]
    pub fn identity(mut self, f: impl FnOnce(FakeIdentityProvider) -> FakeIdentityProvider) -> Self {
        self.identity = f(self.identity);
        self
    }

    #[must_use]
    pub fn registry(mut self, f: impl FnOnce(FakeRegistry) -> FakeRegistry) -> Self {
        self.registry = f(self.registry);
        self
    }

    #[must_use]
    pub fn clusters(mut self, f: impl FnOnce(FakeClusterManager) -> FakeClusterManager) -> Self {
        self.clusters = f(self.clusters);
        self
    }

    #[must_use]
    pub fn images(mut self, f: impl FnOnce(FakeImagePublisher) -> FakeImagePublisher) -> Self {
        self.images = f(self.images);
        self
    }

    #[must_use]
    pub fn probe_failures(mut self, failures: u32) -> Self {
        self.probe_failures = failures;
        self
    }

    #[must_use]
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    #[must_use]
    pub fn build(self) -> FakeCloud {
        let mut cloud = FakeCloud::from_parts(
            self.identity,
            self.registry,
            self.clusters,
            self.images,
            self.journal,
        );
        cloud.connector = cloud.connector.probe_failures(self.probe_failures);
        if self.fail_connect {
            cloud.connector = cloud.connector.failing_connect();
        }
        cloud
    }
}

/// Default configuration that leaves the process environment alone
#[must_use]
pub fn test_config() -> ProvisionConfig {
    ProvisionConfig::new().with_export_environment(false)
}

/// Keys of the default principal with the given statuses
#[must_use]
pub fn keys(statuses: &[KeyStatus]) -> Vec<AccessKeySummary> {
    statuses
        .iter()
        .enumerate()
        .map(|(i, status)| AccessKeySummary::new(format!("AKIAOLD{i:04}"), "infra-admin", *status))
        .collect()
}
