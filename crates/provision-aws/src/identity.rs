use async_trait::async_trait;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::{AccessKeyMetadata, StatusType};
use aws_sdk_iam::Client;
use provision_core::{
    AccessKeySummary, IdentityOperation, IdentityProvider, IssuedCredential, KeyStatus,
    ProvisionError, Result,
};
use tracing::warn;

/// IAM access key management
#[derive(Debug, Clone)]
pub struct IamIdentityProvider {
    client: Client,
}

impl IamIdentityProvider {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

fn sdk_error<E>(operation: IdentityOperation, err: E) -> ProvisionError
where
    E: std::error::Error,
{
    ProvisionError::identity(operation, DisplayErrorContext(err).to_string())
}

pub(crate) fn key_status(status: Option<&StatusType>) -> KeyStatus {
    status.map_or(KeyStatus::Active, |s| KeyStatus::from_provider(s.as_str()))
}

/// Listed keys without an id cannot be acted on and are skipped
pub(crate) fn key_summary(meta: &AccessKeyMetadata, principal: &str) -> Option<AccessKeySummary> {
    let key_id = meta.access_key_id()?;
    Some(AccessKeySummary::new(
        key_id,
        meta.user_name().unwrap_or(principal),
        key_status(meta.status()),
    ))
}

#[async_trait]
impl IdentityProvider for IamIdentityProvider {
    async fn list_access_keys(&self, principal: &str, max_items: i32) -> Result<Vec<AccessKeySummary>> {
        let output = self
            .client
            .list_access_keys()
            .user_name(principal)
            .max_items(max_items)
            .send()
            .await
            .map_err(|e| sdk_error(IdentityOperation::ListKeys, e))?;

        let mut keys = Vec::new();
        for meta in output.access_key_metadata() {
            match key_summary(meta, principal) {
                Some(key) => keys.push(key),
                None => warn!(principal, "listed access key has no id, ignoring"),
            }
        }
        Ok(keys)
    }

    async fn delete_access_key(&self, principal: &str, key_id: &str) -> Result<()> {
        self.client
            .delete_access_key()
            .user_name(principal)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| sdk_error(IdentityOperation::DeleteKey, e))?;
        Ok(())
    }

    async fn deactivate_access_key(&self, principal: &str, key_id: &str) -> Result<()> {
        self.client
            .update_access_key()
            .user_name(principal)
            .access_key_id(key_id)
            .status(StatusType::Inactive)
            .send()
            .await
            .map_err(|e| sdk_error(IdentityOperation::DeactivateKey, e))?;
        Ok(())
    }

    async fn create_access_key(&self, principal: &str) -> Result<IssuedCredential> {
        let output = self
            .client
            .create_access_key()
            .user_name(principal)
            .send()
            .await
            .map_err(|e| sdk_error(IdentityOperation::CreateKey, e))?;

        let key = output.access_key().ok_or_else(|| {
            ProvisionError::identity(IdentityOperation::CreateKey, "response carried no access key")
        })?;

        Ok(IssuedCredential::new(
            key.access_key_id(),
            key.secret_access_key(),
            key.user_name(),
        ))
    }
}
