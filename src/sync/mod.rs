pub mod board;
pub mod client;
pub mod entity;
pub mod identity;
pub mod issues;
pub mod mirror;
pub mod paginate;
pub mod retry;

use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{RepoSlug, Settings};
use crate::error::{SyncError, SyncResult};
use crate::remote::{Operation, Transport};
use board::BoardSync;
use client::{string_at, Client};
use issues::IssueSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only issues without a target counterpart are touched.
    CreateOnly,
    /// Migrated issues are also brought back in line with the source.
    Reconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} skipped",
            self.created, self.updated, self.unchanged, self.skipped
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Report {
    entries: Vec<(&'static str, Tally)>,
}

impl Report {
    pub fn push(&mut self, family: &'static str, tally: Tally) {
        self.entries.push((family, tally));
    }

    #[cfg(test)]
    pub fn get(&self, family: &str) -> Tally {
        self.entries
            .iter()
            .find(|(name, _)| *name == family)
            .map(|(_, tally)| *tally)
            .unwrap_or_default()
    }

    pub fn skipped(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.skipped).sum()
    }

    pub fn log(&self, action: &str) {
        for (family, tally) in &self.entries {
            info!("{action}: {family}: {tally}");
        }
    }
}

pub(crate) fn repo_vars(repo: &RepoSlug) -> Value {
    json!({ "owner": repo.owner, "name": repo.name })
}

#[derive(Debug, Clone)]
pub struct Logins {
    pub source: String,
    pub target: String,
}

async fn viewer_login(client: &Client) -> SyncResult<String> {
    let data = client.require(Operation::ViewerLogin, json!({})).await?;
    string_at(Operation::ViewerLogin, &data, "/viewer/login", "the viewer login")
}

/// Runs the migration actions between one source and one target.
pub struct Migrator {
    source: Client,
    target: Client,
    settings: Settings,
    logins: Logins,
}

impl Migrator {
    pub async fn connect(
        settings: Settings,
        source: Arc<dyn Transport>,
        target: Arc<dyn Transport>,
    ) -> SyncResult<Self> {
        let source = Client::new(source, settings.retry.clone());
        let target = Client::new(target, settings.retry.clone());
        let logins = Logins {
            source: viewer_login(&source).await?,
            target: viewer_login(&target).await?,
        };
        info!(
            "authenticated as {} on {} and {} on {}",
            logins.source,
            source.name(),
            logins.target,
            target.name()
        );
        Ok(Self {
            source,
            target,
            settings,
            logins,
        })
    }

    /// Mirror git data (when `mirror_dir` is given), then labels,
    /// milestones and issues.
    pub async fn run_repository(&self, mode: Mode, mirror_dir: Option<&Path>) -> SyncResult<Report> {
        let source_repo = &self.settings.source;
        let target_repo = &self.settings.target;
        info!("migrating {source_repo} to {target_repo} ({mode:?})");

        let repo_id = self.ensure_target_repository().await?;

        if let Some(work_dir) = mirror_dir {
            let source = mirror::Remote {
                slug: source_repo,
                login: &self.logins.source,
                token: &self.settings.source_token,
            };
            let target = mirror::Remote {
                slug: target_repo,
                login: &self.logins.target,
                token: &self.settings.target_token,
            };
            if let Err(e) = mirror::mirror(work_dir, &source, &target).await {
                error!("git mirror failed, continuing with metadata: {e:#}");
            }
        }

        let mut report = Report::default();
        let (labels, tally) = entity::reconcile(
            &entity::LABELS,
            &self.source,
            &self.target,
            source_repo,
            target_repo,
            &repo_id,
        )
        .await?;
        report.push("labels", tally);

        let (milestones, tally) = entity::reconcile(
            &entity::MILESTONES,
            &self.source,
            &self.target,
            source_repo,
            target_repo,
            &repo_id,
        )
        .await?;
        report.push("milestones", tally);

        let label_ids = entity::label_ids(&labels);
        let milestone_ids = entity::milestone_ids(&milestones);
        let tally = IssueSync {
            source: &self.source,
            target: &self.target,
            source_repo,
            target_repo,
            target_repo_id: &repo_id,
            label_ids: &label_ids,
            milestone_ids: &milestone_ids,
        }
        .run(mode)
        .await?;
        report.push("issues", tally);
        Ok(report)
    }

    pub async fn run_board(&self) -> SyncResult<Report> {
        BoardSync {
            source: &self.source,
            target: &self.target,
            source_repo: &self.settings.source,
            target_repo: &self.settings.target,
            source_project: self.settings.source_project.as_deref().unwrap_or_default(),
            target_project: self.settings.target_project.as_deref().unwrap_or_default(),
        }
        .run()
        .await
    }

    /// The target repository's id, creating the repository when absent.
    async fn ensure_target_repository(&self) -> SyncResult<String> {
        let target_repo = &self.settings.target;
        let unavailable = || SyncError::RepositoryUnavailable {
            owner: target_repo.owner.clone(),
            name: target_repo.name.clone(),
        };

        let data = self.target.require(Operation::Repository, repo_vars(target_repo)).await?;
        if let Some(id) = data.pointer("/repository/id").and_then(Value::as_str) {
            info!("target repository {target_repo} exists");
            return Ok(id.to_string());
        }

        let source_data = self
            .source
            .require(Operation::Repository, repo_vars(&self.settings.source))
            .await?;
        let private = source_data
            .pointer("/repository/isPrivate")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        info!("creating target repository {target_repo}");
        let data = self
            .target
            .require(Operation::OwnerId, json!({ "login": target_repo.owner }))
            .await?;
        let owner_id = string_at(Operation::OwnerId, &data, "/repositoryOwner/id", "the owner id")?;
        let vars = json!({
            "ownerId": owner_id,
            "name": target_repo.name,
            "visibility": if private { "PRIVATE" } else { "PUBLIC" },
            "description": format!("Migrated from {}", self.settings.source),
        });
        let what = format!("creating repository {target_repo}");
        let data = self
            .target
            .mutate(Operation::CreateRepository, vars, &what)
            .await?
            .ok_or_else(unavailable)?;
        data.pointer("/createRepository/repository/id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(unavailable)
    }
}
