use crate::api::{RepositoryRegistry, StatusSink};
use crate::config::RepositoryCheck;
use crate::error::Result;
use crate::types::{RepositoryOutcome, StatusLine};
use tracing::info;

/// Create the repository unless the check says it already exists
///
/// With `SingleRepository` the decision is made on the repository count
/// alone: exactly one listed repository means "exists", regardless of
/// its name. Accounts holding several repositories always get a create
/// attempt.
pub async fn ensure_repository(
    registry: &dyn RepositoryRegistry,
    name: &str,
    check: RepositoryCheck,
    status: &dyn StatusSink,
) -> Result<RepositoryOutcome> {
    let existing = registry.list_repositories().await?;

    let found = match check {
        RepositoryCheck::SingleRepository => match existing.as_slice() {
            [only] => Some(only.name.clone()),
            _ => None,
        },
        RepositoryCheck::NameMatch => existing
            .iter()
            .find(|repo| repo.name == name)
            .map(|repo| repo.name.clone()),
    };

    if let Some(found) = found {
        info!(repository = %found, ?check, "repository exists, skipping create");
        status.status(&StatusLine::RepositoryExists {
            name: found.clone(),
        });
        return Ok(RepositoryOutcome::AlreadyExists { name: found });
    }

    let created = registry.create_repository(name).await?;
    info!(repository = %created.name, "repository created");
    status.status(&StatusLine::RepositoryCreated {
        name: created.name.clone(),
    });
    Ok(RepositoryOutcome::Created { name: created.name })
}
