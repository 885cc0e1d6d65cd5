mod cli;

use anyhow::Result;
use clap::ArgMatches;
use provision_aws::{load_default_config, AwsConnector, IamIdentityProvider};
use provision_core::{logging, ProvisionConfig, ProvisioningSequencer};
use std::sync::Arc;

// Single threaded: the run is sequential and exports into the process environment
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let matches = cli::command().get_matches();

    if let Err(e) = logging::init(cli::log_format(&matches), cli::verbosity(&matches)) {
        eprintln!("{e}");
    }

    let code = match dispatch(&matches).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("provisioning aborted: {e:#}");
            1
        }
    };

    std::process::exit(code);
}

async fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show-config", args)) => {
            let config = cli::effective_config(args)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        _ => {
            let config = cli::effective_config(matches)?;
            provision(config).await
        }
    }
}

async fn provision(config: ProvisionConfig) -> Result<()> {
    // Bootstrap identity client uses whatever credentials the environment provides
    let bootstrap = load_default_config(&config.region).await;
    let identity = Arc::new(IamIdentityProvider::from_conf(&bootstrap));

    let sequencer = ProvisioningSequencer::new(config, identity, Arc::new(AwsConnector));
    let report = sequencer.run().await?;

    tracing::info!(
        deleted = report.rotation.deleted.len(),
        deactivated = report.rotation.deactivated.len(),
        issued_key_id = %report.rotation.issued_key_id,
        issued_key_revoked = report.issued_key_revoked,
        "run report"
    );
    Ok(())
}
