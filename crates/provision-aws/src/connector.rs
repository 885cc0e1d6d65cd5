use crate::{EcrRegistry, EcsClusterManager, IamIdentityProvider};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::config::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use provision_core::{
    ConnectedServices, IssuedCredential, NoopImagePublisher, ProvisionError, Result,
    ServiceConnector,
};
use tracing::debug;

const PROVIDER_NAME: &str = "provisioner-issued-key";

/// SDK configuration bound to one issued key and region
pub async fn sdk_config_for(credential: &IssuedCredential, region: &str) -> SdkConfig {
    let credentials = Credentials::new(
        credential.key_id.clone(),
        credential.secret.clone(),
        None,
        None,
        PROVIDER_NAME,
    );

    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(credentials)
        .load()
        .await
}

/// Builds IAM/ECR/ECS clients from the issued key; probes with STS
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsConnector;

#[async_trait]
impl ServiceConnector for AwsConnector {
    async fn probe(&self, credential: &IssuedCredential, region: &str) -> Result<()> {
        let config = sdk_config_for(credential, region).await;
        let identity = aws_sdk_sts::Client::new(&config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| ProvisionError::connect(DisplayErrorContext(e).to_string()))?;

        debug!(
            key_id = %credential.key_id,
            arn = identity.arn().unwrap_or("unknown"),
            "issued key accepted"
        );
        Ok(())
    }

    async fn connect(&self, credential: &IssuedCredential, region: &str) -> Result<ConnectedServices> {
        let config = sdk_config_for(credential, region).await;
        debug!(key_id = %credential.key_id, region, "building service clients");

        Ok(ConnectedServices {
            identity: Box::new(IamIdentityProvider::from_conf(&config)),
            repositories: Box::new(EcrRegistry::new(aws_sdk_ecr::Client::new(&config))),
            clusters: Box::new(EcsClusterManager::new(aws_sdk_ecs::Client::new(&config))),
            images: Box::new(NoopImagePublisher),
        })
    }
}
