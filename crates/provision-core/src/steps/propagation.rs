use crate::api::ServiceConnector;
use crate::config::PropagationPolicy;
use crate::error::{ProvisionError, Result};
use crate::types::IssuedCredential;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_REGION: &str = "REGION";

/// Publish the credential to tools spawned from this process
///
/// Mutates the process environment, so call it only while no other thread
/// reads the environment. The `provision` binary runs on a current-thread
/// runtime for this reason.
pub fn export_environment(credential: &IssuedCredential, region: &str) {
    std::env::set_var(ENV_ACCESS_KEY_ID, &credential.key_id);
    std::env::set_var(ENV_SECRET_ACCESS_KEY, &credential.secret);
    std::env::set_var(ENV_REGION, region);
    info!(key_id = %credential.key_id, region, "exported credential to environment");
}

/// Block until the issued credential can be relied on
///
/// Returns how long the wait took.
pub async fn wait_for_propagation(
    policy: &PropagationPolicy,
    connector: &dyn ServiceConnector,
    credential: &IssuedCredential,
    region: &str,
) -> Result<Duration> {
    let started = Instant::now();

    match *policy {
        PropagationPolicy::FixedDelay { secs } => {
            info!(secs, "waiting for credential propagation");
            sleep(Duration::from_secs(secs)).await;
        }
        PropagationPolicy::Poll {
            initial_delay_ms,
            max_delay_ms,
            multiplier,
            timeout_secs,
        } => {
            let timeout = Duration::from_secs(timeout_secs);
            let max_delay = Duration::from_millis(max_delay_ms);
            let deadline = started.checked_add(timeout).ok_or_else(|| {
                ProvisionError::config(format!("poll timeout of {timeout_secs}s is out of range"))
            })?;
            let mut delay = Duration::from_millis(initial_delay_ms).min(max_delay);
            let mut attempt = 0u32;

            loop {
                attempt += 1;
                let err = match connector.probe(credential, region).await {
                    Ok(()) => break,
                    Err(e) => e,
                };

                let now = Instant::now();
                if now >= deadline {
                    warn!(attempt, error = %err, "credential never became usable");
                    return Err(ProvisionError::PropagationTimeout {
                        waited_secs: timeout_secs,
                    });
                }

                let pause = delay.min(deadline - now);
                warn!(
                    attempt,
                    error = %err,
                    delay_ms = pause.as_millis(),
                    "credential not usable yet, retrying"
                );
                sleep(pause).await;
                delay = Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier)
                    .map_or(max_delay, |next| next.min(max_delay));
            }
        }
    }

    let waited = started.elapsed();
    info!(waited_ms = waited.as_millis(), "credential propagated");
    Ok(waited)
}
