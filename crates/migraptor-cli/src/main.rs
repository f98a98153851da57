//! Migraptor - move GitLab groups and projects along with their container images.
//!
//! Exit codes: 0 success, 1 configuration or nothing to migrate, 99 failure
//! while backing up, transferring or restoring, 321 source group not found.

mod settings;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use migraptor_core::migration::RegistryCleaner;
use migraptor_core::{
    ContainerEngine, DockerEngine, DryRunSource, GitLabClient, MigraptorError, Migrator,
    RegistryCredentials, SourceControl,
};
use settings::{Options, ResolvedConfig, SearchPaths};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "migraptor", version)]
#[command(about = "Migrate GitLab projects with container images between groups")]
struct Cli {
    #[command(flatten)]
    options: Options,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Print the run report as JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete the tags given with --tags from every registry below --old-group
    Clean,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env = |key: &str| std::env::var(key).ok();
    let config = match settings::resolve(
        &cli.options,
        &SearchPaths::from_process(cli.options.config.clone()),
        &env,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    init_logging(config.verbose, cli.log_json);

    let outcome = match cli.command {
        Some(Command::Clean) => clean(&config).await,
        None => migrate(&config, cli.json).await,
    };

    let code = match outcome {
        Ok(code) => code,
        Err(e) => {
            let (code, usage) = failure(&e);
            if usage {
                eprintln!("{}", Cli::command().render_usage());
            }
            error!("{:#}", e);
            code
        }
    };
    std::process::exit(code);
}

/// Exit code for a failed command, and whether the usage text helps.
fn failure(e: &anyhow::Error) -> (i32, bool) {
    match e.downcast_ref::<MigraptorError>() {
        Some(err) => (
            err.exit_code(),
            matches!(
                err.root(),
                MigraptorError::Validation { .. } | MigraptorError::Config { .. }
            ),
        ),
        None => (1, false),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Verify the token and return a client plus the user it belongs to.
async fn connect_gitlab(config: &ResolvedConfig) -> anyhow::Result<(GitLabClient, String)> {
    info!("Creating GitLab client for {}", config.instance);
    let gitlab = GitLabClient::new(&config.instance, &config.token)?;
    let user = gitlab.check_connection().await.map_err(|e| MigraptorError::Config {
        message: format!("Failed to connect to GitLab: {}", e),
    })?;
    Ok((gitlab, user.username))
}

async fn migrate(config: &ResolvedConfig, json: bool) -> anyhow::Result<i32> {
    let settings = config.migration_settings()?;
    info!(
        "Migrating {} to {} on {}{}",
        settings.source_group,
        settings.destination_path(),
        settings.instance,
        if settings.dry_run { " (dry run)" } else { "" }
    );

    let (gitlab, username) = connect_gitlab(config).await?;

    info!("Creating Docker client");
    let docker = DockerEngine::connect()?.with_credentials(RegistryCredentials {
        server: config.registry.clone(),
        username,
        password: config.docker_password.clone(),
    });
    docker
        .ping()
        .await
        .context("Docker is not running, start it and try again")?;
    docker
        .login()
        .await
        .with_context(|| format!("Cannot log in to registry {}", config.registry))?;
    info!("Docker is running, logged in to {}", config.registry);

    let migrator = Migrator::new(Arc::new(gitlab), Arc::new(docker), settings);
    let report = migrator.run().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }

    Ok(if report.has_transfer_failures() { 99 } else { 0 })
}

async fn clean(config: &ResolvedConfig) -> anyhow::Result<i32> {
    config.require_common()?;
    let (gitlab, _) = connect_gitlab(config).await?;

    let source: Arc<dyn SourceControl> = if config.dry_run {
        Arc::new(DryRunSource::new(Arc::new(gitlab)))
    } else {
        Arc::new(gitlab)
    };

    let group = source
        .search_group(&config.old_group)
        .await?
        .ok_or_else(|| MigraptorError::SourceGroupNotFound {
            path: config.old_group.clone(),
        })?;

    let report = RegistryCleaner::new(source.as_ref(), &config.tags)?
        .clean(&group)
        .await?;

    println!(
        "Deleted {} tags below {}, {} failed",
        report.deleted.len(),
        group.full_path,
        report.failed.len()
    );
    for (tag, reason) in &report.failed {
        println!("  failed: {} ({})", tag, reason);
    }
    Ok(0)
}
