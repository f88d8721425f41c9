use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{self, Overrides, Requirement};
use crate::error::{SyncError, REQUIRED_SCOPES};
use crate::remote::github::GitHubTransport;
use crate::sync::{Migrator, Mode};

/// Migrate a GitHub repository's issues, labels, milestones, git history
/// and Projects board to another owner, and keep them in sync.
#[derive(Parser, Debug)]
#[command(name = "gh-migrate", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: <config dir>/gh-migrate/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingArgs,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Mirror git data, then migrate labels, milestones and new issues
    Repo {
        /// Leave git data alone
        #[arg(long)]
        skip_mirror: bool,

        /// Where the local mirror clone is kept
        #[arg(long, default_value = ".")]
        mirror_dir: PathBuf,
    },
    /// Bring labels, milestones and already-migrated issues in line with the source
    Reconcile,
    /// Migrate the Projects board: fields, items and field values
    Project,
}

impl Commands {
    pub fn requirement(&self) -> Requirement {
        match self {
            Commands::Repo { .. } | Commands::Reconcile => Requirement::Repository,
            Commands::Project => Requirement::Board,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Commands::Repo { .. } => "repo",
            Commands::Reconcile => "reconcile",
            Commands::Project => "project",
        }
    }
}

/// One flag per configuration key. Each beats the environment and the file.
#[derive(Args, Debug, Default, Clone)]
pub struct SettingArgs {
    #[arg(long, global = true)]
    pub source_token: Option<String>,
    #[arg(long, global = true)]
    pub target_token: Option<String>,
    #[arg(long, global = true)]
    pub source_org: Option<String>,
    #[arg(long, global = true)]
    pub source_repo: Option<String>,
    #[arg(long, global = true)]
    pub target_org: Option<String>,
    #[arg(long, global = true)]
    pub target_repo: Option<String>,
    /// Source board title
    #[arg(long, global = true)]
    pub source_project: Option<String>,
    /// Target board title
    #[arg(long, global = true)]
    pub target_project: Option<String>,
}

impl SettingArgs {
    pub fn to_overrides(&self) -> Overrides {
        Overrides {
            source_token: self.source_token.clone(),
            target_token: self.target_token.clone(),
            source_org: self.source_org.clone(),
            source_repo: self.source_repo.clone(),
            target_org: self.target_org.clone(),
            target_repo: self.target_repo.clone(),
            source_project: self.source_project.clone(),
            target_project: self.target_project.clone(),
        }
    }
}

/// Resolve configuration and run the requested action. `Ok(false)` means the
/// action failed as a whole but not fatally.
pub async fn run(cli: &Cli) -> Result<bool> {
    let path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file = config::load_file(&path)?;
    let settings = config::resolve(
        &cli.settings.to_overrides(),
        |key| std::env::var(key).ok(),
        &file,
        &[cli.command.requirement()],
    )?;

    let source = Arc::new(GitHubTransport::new("source", settings.source_token.clone()));
    let target = Arc::new(GitHubTransport::new("target", settings.target_token.clone()));
    let migrator = Migrator::connect(settings, source, target)
        .await
        .context("Failed to authenticate with GitHub")?;

    let action = cli.command.label();
    let result = match &cli.command {
        Commands::Repo { skip_mirror, mirror_dir } => {
            let mirror = (!skip_mirror).then_some(mirror_dir.as_path());
            migrator.run_repository(Mode::CreateOnly, mirror).await
        }
        Commands::Reconcile => migrator.run_repository(Mode::Reconcile, None).await,
        Commands::Project => migrator.run_board().await,
    };

    match result {
        Ok(report) => {
            report.log(action);
            if report.skipped() > 0 {
                warn!("{action}: {} items were skipped; see the log and re-run", report.skipped());
            }
            info!("{action} finished");
            Ok(true)
        }
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            error!("{action} failed: {e}");
            Ok(false)
        }
    }
}

/// Extra guidance for errors that can be fixed by the operator.
pub fn hint(err: &anyhow::Error) -> Option<String> {
    let sync = err.chain().find_map(|e| e.downcast_ref::<SyncError>())?;
    sync.is_fatal().then(|| {
        format!(
            "Both tokens need these scopes: {}",
            REQUIRED_SCOPES.join(", ")
        )
    })
}
