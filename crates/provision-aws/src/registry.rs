use async_trait::async_trait;
use aws_sdk_ecr::error::DisplayErrorContext;
use aws_sdk_ecr::types::Repository;
use aws_sdk_ecr::Client;
use provision_core::{
    ProvisionError, RegistryOperation, RepositoryDescriptor, RepositoryRegistry, Result,
};

/// ECR repository registry
#[derive(Debug, Clone)]
pub struct EcrRegistry {
    client: Client,
}

impl EcrRegistry {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

pub(crate) fn descriptor(repo: &Repository) -> Option<RepositoryDescriptor> {
    repo.repository_name().map(RepositoryDescriptor::new)
}

#[async_trait]
impl RepositoryRegistry for EcrRegistry {
    /// First page only, no name filter
    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>> {
        let output = self
            .client
            .describe_repositories()
            .send()
            .await
            .map_err(|e| {
                ProvisionError::registry(
                    RegistryOperation::ListRepositories,
                    DisplayErrorContext(e).to_string(),
                )
            })?;

        Ok(output.repositories().iter().filter_map(descriptor).collect())
    }

    async fn create_repository(&self, name: &str) -> Result<RepositoryDescriptor> {
        let output = self
            .client
            .create_repository()
            .repository_name(name)
            .send()
            .await
            .map_err(|e| {
                ProvisionError::registry(
                    RegistryOperation::CreateRepository,
                    DisplayErrorContext(e).to_string(),
                )
            })?;

        Ok(output
            .repository()
            .and_then(descriptor)
            .unwrap_or_else(|| RepositoryDescriptor::new(name)))
    }
}
