use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::sync::retry::RetryPolicy;

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub github: Option<GitHubSection>,
    pub source: Option<SideSection>,
    pub target: Option<SideSection>,
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GitHubSection {
    pub source_token: Option<String>,
    pub target_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SideSection {
    pub org: Option<String>,
    pub repo: Option<String>,
    pub project: Option<String>,
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub source_token: Option<String>,
    pub target_token: Option<String>,
    pub source_org: Option<String>,
    pub source_repo: Option<String>,
    pub target_org: Option<String>,
    pub target_repo: Option<String>,
    pub source_project: Option<String>,
    pub target_project: Option<String>,
}

/// What the requested actions need to have configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Repository,
    Board,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Fully resolved configuration handed to the engine.
#[derive(Clone)]
pub struct Settings {
    pub source_token: String,
    pub target_token: String,
    pub source: RepoSlug,
    pub target: RepoSlug,
    pub source_project: Option<String>,
    pub target_project: Option<String>,
    pub retry: RetryPolicy,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("source_token", &"<redacted>")
            .field("target_token", &"<redacted>")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("source_project", &self.source_project)
            .field("target_project", &self.target_project)
            .field("retry", &self.retry)
            .finish()
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gh-migrate")
        .join("config.toml")
}

/// Read the TOML config file. A missing file is an empty config.
pub fn load_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        tracing::info!("config file {} not found, using CLI and environment only", path.display());
        return Ok(FileConfig::default());
    }
    tracing::info!("loading configuration from {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: FileConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// CLI, then environment, then file.
fn pick(
    cli: Option<&String>,
    env: &impl Fn(&str) -> Option<String>,
    env_key: &str,
    file: Option<&String>,
) -> Option<String> {
    non_empty(cli)
        .or_else(|| non_empty(env(env_key).as_ref()))
        .or_else(|| non_empty(file))
}

pub fn resolve(
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
    file: &FileConfig,
    needs: &[Requirement],
) -> Result<Settings> {
    let gh = file.github.as_ref();
    let src = file.source.as_ref();
    let tgt = file.target.as_ref();

    let source_token = pick(
        overrides.source_token.as_ref(),
        &env,
        "GITHUB_SOURCE_TOKEN",
        gh.and_then(|g| g.source_token.as_ref()),
    );
    let target_token = pick(
        overrides.target_token.as_ref(),
        &env,
        "GITHUB_TARGET_TOKEN",
        gh.and_then(|g| g.target_token.as_ref()),
    );
    let source_org = pick(
        overrides.source_org.as_ref(),
        &env,
        "GITHUB_SOURCE_ORG",
        src.and_then(|s| s.org.as_ref()),
    );
    let source_repo = pick(
        overrides.source_repo.as_ref(),
        &env,
        "GITHUB_SOURCE_REPO",
        src.and_then(|s| s.repo.as_ref()),
    );
    let target_org = pick(
        overrides.target_org.as_ref(),
        &env,
        "GITHUB_TARGET_ORG",
        tgt.and_then(|t| t.org.as_ref()),
    );
    let target_repo = pick(
        overrides.target_repo.as_ref(),
        &env,
        "GITHUB_TARGET_REPO",
        tgt.and_then(|t| t.repo.as_ref()),
    );
    let source_project = pick(
        overrides.source_project.as_ref(),
        &env,
        "GITHUB_SOURCE_PROJECT_NAME",
        src.and_then(|s| s.project.as_ref()),
    );
    let target_project = pick(
        overrides.target_project.as_ref(),
        &env,
        "GITHUB_TARGET_PROJECT_NAME",
        tgt.and_then(|t| t.project.as_ref()),
    );

    let mut required: Vec<(&str, &Option<String>)> = Vec::new();
    if needs.contains(&Requirement::Repository) || needs.contains(&Requirement::Board) {
        required.extend([
            ("GITHUB_SOURCE_TOKEN", &source_token),
            ("GITHUB_TARGET_TOKEN", &target_token),
            ("GITHUB_SOURCE_ORG", &source_org),
            ("GITHUB_SOURCE_REPO", &source_repo),
            ("GITHUB_TARGET_ORG", &target_org),
            ("GITHUB_TARGET_REPO", &target_repo),
        ]);
    }
    if needs.contains(&Requirement::Board) {
        required.extend([
            ("GITHUB_SOURCE_PROJECT_NAME", &source_project),
            ("GITHUB_TARGET_PROJECT_NAME", &target_project),
        ]);
    }
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();
    if !missing.is_empty() {
        bail!(
            "Missing required configuration for: {}. Provide it via CLI flags, environment variables, or the config file.",
            missing.join(", ")
        );
    }

    let retry = file.retry.clone().unwrap_or_default();
    retry.validate().context("Invalid [retry] section in the config file")?;

    Ok(Settings {
        source_token: source_token.unwrap_or_default(),
        target_token: target_token.unwrap_or_default(),
        source: RepoSlug::new(source_org.unwrap_or_default(), source_repo.unwrap_or_default()),
        target: RepoSlug::new(target_org.unwrap_or_default(), target_repo.unwrap_or_default()),
        source_project,
        target_project,
        retry,
    })
}
