use crate::api::IdentityProvider;
use crate::error::Result;
use crate::types::{IssuedCredential, KeyStatus, RotationSummary};
use tracing::{debug, info};

/// Retire every listed key of `principal` and issue a new one
///
/// Inactive keys are deleted, anything else is deactivated. The first
/// failing call aborts the rotation; keys already retired stay retired.
pub async fn rotate_credentials(
    identity: &dyn IdentityProvider,
    principal: &str,
    max_keys: i32,
) -> Result<(IssuedCredential, RotationSummary)> {
    let existing = identity.list_access_keys(principal, max_keys).await?;
    info!(principal, keys = existing.len(), "rotating access keys");

    let mut summary = RotationSummary::default();
    for key in existing {
        match key.status {
            KeyStatus::Inactive => {
                debug!(key_id = %key.key_id, "deleting inactive key");
                identity.delete_access_key(&key.principal, &key.key_id).await?;
                summary.deleted.push(key.key_id);
            }
            KeyStatus::Active => {
                debug!(key_id = %key.key_id, "deactivating key");
                identity
                    .deactivate_access_key(&key.principal, &key.key_id)
                    .await?;
                summary.deactivated.push(key.key_id);
            }
        }
    }

    let credential = identity.create_access_key(principal).await?;
    info!(
        principal,
        key_id = %credential.key_id,
        deleted = summary.deleted.len(),
        deactivated = summary.deactivated.len(),
        "issued new access key"
    );
    summary.issued_key_id = credential.key_id.clone();

    Ok((credential, summary))
}
