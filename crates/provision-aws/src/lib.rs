//! AWS backends for the provisioning sequencer
//!
//! - IAM for access key rotation
//! - ECR for the image repository
//! - ECS for the cluster
//! - STS as the propagation probe
//!
//! The bootstrap identity client uses the default credential chain. Every
//! other client is built by [`AwsConnector`] from the key issued during the
//! run, passed explicitly rather than read back from the environment.

#![allow(missing_docs)]

mod cluster;
mod connector;
mod identity;
mod registry;

pub use cluster::EcsClusterManager;
pub use connector::{sdk_config_for, AwsConnector};
pub use identity::IamIdentityProvider;
pub use registry::EcrRegistry;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load the ambient configuration (environment, profile, instance role)
/// pinned to `region`
pub async fn load_default_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}
