//! Provisioning sequencer
//!
//! Runs the bootstrap in a fixed order:
//! 1. Rotate credentials of the principal
//! 2. Wait for the issued key to propagate
//! 3. Ensure the image repository exists
//! 4. Push the image (best effort, currently a stub)
//! 5. Create the cluster
//!
//! The first fatal error ends the run. Nothing is rolled back: a rotated
//! key stays rotated even if a later step fails.

use crate::api::{ConnectedServices, IdentityProvider, ServiceConnector, StatusSink, StdoutSink};
use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::steps::{
    ensure_cluster, ensure_repository, export_environment, publish_image, rotate_credentials,
    wait_for_propagation,
};
use crate::types::{
    ClusterDescriptor, ClusterOutcome, ImagePushOutcome, IssuedCredential, ProvisionReport,
    RepositoryOutcome,
};
use std::sync::Arc;

/// Orders the provisioning steps over the collaborator traits
pub struct ProvisioningSequencer {
    config: ProvisionConfig,
    identity: Arc<dyn IdentityProvider>,
    connector: Arc<dyn ServiceConnector>,
    status: Arc<dyn StatusSink>,
}

impl std::fmt::Debug for ProvisioningSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningSequencer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProvisioningSequencer {
    /// Create a sequencer reporting status lines on stdout
    #[must_use]
    pub fn new(
        config: ProvisionConfig,
        identity: Arc<dyn IdentityProvider>,
        connector: Arc<dyn ServiceConnector>,
    ) -> Self {
        Self {
            config,
            identity,
            connector,
            status: Arc::new(StdoutSink),
        }
    }

    /// Send status lines somewhere else
    #[must_use]
    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Effective configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Run every step in order
    pub async fn run(&self) -> Result<ProvisionReport> {
        self.config.validate()?;

        tracing::info!(
            principal = %self.config.principal,
            region = %self.config.region,
            "starting provisioning run"
        );

        let (credential, rotation) = rotate_credentials(
            self.identity.as_ref(),
            &self.config.principal,
            self.config.max_keys,
        )
        .await?;

        let mut connected = None;
        let provisioned = self.provision_with(&credential, &mut connected).await;

        let issued_key_revoked = if self.config.revoke_on_exit {
            // The bootstrap key may have been deactivated by the rotation itself
            let identity = connected
                .as_ref()
                .map_or(self.identity.as_ref(), |services| services.identity.as_ref());
            revoke(identity, &credential).await
        } else {
            tracing::warn!(
                key_id = %credential.key_id,
                principal = %credential.principal,
                "issued access key remains active after the run"
            );
            false
        };

        let (repository, image, cluster) = provisioned?;

        tracing::info!("provisioning run complete");
        Ok(ProvisionReport {
            rotation,
            repository,
            image,
            cluster,
            issued_key_revoked,
        })
    }

    /// Everything that depends on the issued credential
    async fn provision_with(
        &self,
        credential: &IssuedCredential,
        connected: &mut Option<ConnectedServices>,
    ) -> Result<(RepositoryOutcome, ImagePushOutcome, ClusterOutcome)> {
        let config = &self.config;

        if config.export_environment {
            export_environment(credential, &config.region);
        }
        wait_for_propagation(
            &config.propagation,
            self.connector.as_ref(),
            credential,
            &config.region,
        )
        .await?;

        let services = self.connector.connect(credential, &config.region).await?;
        let services = connected.insert(services);

        let repository = ensure_repository(
            services.repositories.as_ref(),
            &config.repository,
            config.repository_check,
            self.status.as_ref(),
        )
        .await?;

        let image = publish_image(
            services.images.as_ref(),
            &config.repository,
            &config.image_tag,
            self.status.as_ref(),
        )
        .await?;

        let cluster = ClusterDescriptor::new(&config.cluster, config.capacity_providers.clone());
        let cluster = ensure_cluster(services.clusters.as_ref(), &cluster, self.status.as_ref())
            .await?;

        Ok((repository, image, cluster))
    }
}

/// Deactivate the issued key. Failures are logged, never returned.
async fn revoke(identity: &dyn IdentityProvider, credential: &IssuedCredential) -> bool {
    match identity
        .deactivate_access_key(&credential.principal, &credential.key_id)
        .await
    {
        Ok(()) => {
            tracing::info!(key_id = %credential.key_id, "issued access key deactivated");
            true
        }
        Err(e) => {
            tracing::error!(
                key_id = %credential.key_id,
                error = %e,
                "failed to deactivate issued access key"
            );
            false
        }
    }
}
