use crate::api::{ClusterManager, StatusSink};
use crate::error::Result;
use crate::types::{ClusterDescriptor, ClusterOutcome, StatusLine};
use tracing::info;

/// Create the cluster. There is no existence check; every run issues one create call.
pub async fn ensure_cluster(
    clusters: &dyn ClusterManager,
    cluster: &ClusterDescriptor,
    status: &dyn StatusSink,
) -> Result<ClusterOutcome> {
    let created = clusters.create_cluster(cluster).await?;
    info!(
        cluster = %created.name,
        capacity_providers = ?cluster.capacity_providers,
        "cluster created"
    );
    status.status(&StatusLine::ClusterCreated {
        name: created.name.clone(),
    });
    Ok(ClusterOutcome::Created { name: created.name })
}
