use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghmirror::config::Overrides;
use ghmirror::sync::PlannedAction;
use ghmirror::{ArtifactOutcome, Config, MirrorError};

#[derive(Parser)]
#[command(name = "ghmirror")]
#[command(about = "Back up every GitHub repository of an account, with wikis and issues")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where the backup will be stored [default: ~/github/]
    #[arg(long)]
    path: Option<String>,

    /// GitHub username
    #[arg(long)]
    user: Option<String>,

    /// GitHub password or access token (https://github.com/settings/tokens)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    secret: Option<String>,

    /// Path to the repositories: /user, /users/<name> or /orgs/<name> [default: /user]
    #[arg(long)]
    github_path: Option<String>,

    /// API base URL [default: https://api.github.com]
    #[arg(long)]
    api_base: Option<String>,

    /// Show what would be cloned or updated without touching any repository
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(cli.verbose, &config.logging.level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        eprintln!();
        // Usage goes to stderr, like clap's own errors
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::FAILURE;
    }

    info!("Starting ghmirror v{}", env!("CARGO_PKG_VERSION"));

    let result = if cli.dry_run {
        cmd_dry_run(&config).await
    } else {
        cmd_sync(&config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()?;

    Ok(())
}

/// Load the configuration file and apply command line values on top
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    let mut config = config.with_overrides(Overrides {
        backup_path: cli.path.clone(),
        username: cli.user.clone(),
        secret: cli.secret.clone(),
        account_path: cli.github_path.clone(),
        api_base: cli.api_base.clone(),
    });
    config.expand_paths()?;

    Ok(config)
}

/// Mirror all repositories
async fn cmd_sync(config: &Config) -> Result<(), MirrorError> {
    let summary = ghmirror::run(config).await?;

    println!("Backup complete: {}", config.backup_path);
    println!("   Total repositories: {}", summary.total_repositories());
    println!("   Successful operations: {}", summary.succeeded());
    println!("   Unchanged (nothing to do): {}", summary.unchanged());
    println!("   Failed operations: {}", summary.failed());
    println!("   Skipped operations: {}", summary.skipped());
    println!("   Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed() > 0 {
        println!("\nFailed operations:");
        for report in &summary.repositories {
            for (artifact, outcome) in report.outcomes() {
                if let ArtifactOutcome::Failed(reason) = outcome {
                    println!("   {} ({}): {}", report.name, artifact, reason);
                }
            }
        }
    }

    if !summary.sentinel_written {
        println!("\nWarning: the lastupdated timestamp could not be written");
    }

    Ok(())
}

/// List repositories and what a run would do with them
async fn cmd_dry_run(config: &Config) -> Result<(), MirrorError> {
    let plans = ghmirror::driver::dry_run(config).await?;

    println!("Dry run - {} repositories", plans.len());
    for plan in &plans {
        println!("  {}", plan.name);
        println!("     code:   {}", plan.code);
        if plan.wiki != PlannedAction::Skip {
            println!("     wiki:   {}", plan.wiki);
        }
        if plan.issues != PlannedAction::Skip {
            println!("     issues: {}", plan.issues);
        }
    }

    Ok(())
}
