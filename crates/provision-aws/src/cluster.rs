use async_trait::async_trait;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::Client;
use provision_core::{ClusterDescriptor, ClusterManager, ProvisionError, Result};

/// ECS cluster manager
#[derive(Debug, Clone)]
pub struct EcsClusterManager {
    client: Client,
}

impl EcsClusterManager {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterManager for EcsClusterManager {
    async fn create_cluster(&self, cluster: &ClusterDescriptor) -> Result<ClusterDescriptor> {
        let output = self
            .client
            .create_cluster()
            .cluster_name(&cluster.name)
            .set_capacity_providers(Some(cluster.capacity_providers.clone()))
            .send()
            .await
            .map_err(|e| ProvisionError::cluster(&cluster.name, DisplayErrorContext(e).to_string()))?;

        let name = output
            .cluster()
            .and_then(|c| c.cluster_name())
            .unwrap_or(cluster.name.as_str());

        Ok(ClusterDescriptor::new(name, cluster.capacity_providers.clone()))
    }
}
