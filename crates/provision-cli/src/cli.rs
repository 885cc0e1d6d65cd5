use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use provision_core::logging::LogFormat;
use provision_core::{PropagationPolicy, ProvisionConfig, RepositoryCheck};
use std::path::PathBuf;

pub(crate) fn command() -> Command {
    Command::new("provision")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rotate bootstrap credentials and ensure the image repository and cluster exist")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("principal")
                .long("principal")
                .global(true)
                .help("Principal whose access keys are rotated"),
        )
        .arg(
            Arg::new("region")
                .long("region")
                .global(true)
                .help("Region for the repository and cluster"),
        )
        .arg(
            Arg::new("repository")
                .long("repository")
                .global(true)
                .help("Image repository name"),
        )
        .arg(
            Arg::new("cluster")
                .long("cluster")
                .global(true)
                .help("Cluster name"),
        )
        .arg(
            Arg::new("poll")
                .long("poll")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Probe the new key until it works instead of sleeping a fixed time"),
        )
        .arg(
            Arg::new("match-repository-name")
                .long("match-repository-name")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Treat the repository as existing only if its name is listed"),
        )
        .arg(
            Arg::new("revoke-on-exit")
                .long("revoke-on-exit")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Deactivate the issued key when the run ends"),
        )
        .arg(
            Arg::new("no-export-env")
                .long("no-export-env")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Do not publish the issued key in the process environment"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Increase log verbosity"),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration"))
}

pub(crate) fn log_format(matches: &ArgMatches) -> LogFormat {
    matches
        .get_one::<String>("log-format")
        .and_then(|f| f.parse().ok())
        .unwrap_or_default()
}

pub(crate) fn verbosity(matches: &ArgMatches) -> u8 {
    matches.get_count("verbose")
}

/// File (or defaults) with command line overrides applied
pub(crate) fn effective_config(matches: &ArgMatches) -> Result<ProvisionConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ProvisionConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ProvisionConfig::default(),
    };

    if let Some(principal) = matches.get_one::<String>("principal") {
        config = config.with_principal(principal);
    }
    if let Some(region) = matches.get_one::<String>("region") {
        config = config.with_region(region);
    }
    if let Some(repository) = matches.get_one::<String>("repository") {
        config = config.with_repository(repository);
    }
    if let Some(cluster) = matches.get_one::<String>("cluster") {
        config = config.with_cluster(cluster);
    }
    if matches.get_flag("poll") {
        config = config.with_propagation(PropagationPolicy::poll());
    }
    if matches.get_flag("match-repository-name") {
        config = config.with_repository_check(RepositoryCheck::NameMatch);
    }
    if matches.get_flag("revoke-on-exit") {
        config = config.with_revoke_on_exit(true);
    }
    if matches.get_flag("no-export-env") {
        config = config.with_export_environment(false);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
