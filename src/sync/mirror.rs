use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::RepoSlug;

/// One end of the mirror, with the account that authenticates it.
pub struct Remote<'a> {
    pub slug: &'a RepoSlug,
    pub login: &'a str,
    pub token: &'a str,
}

impl Remote<'_> {
    fn url(&self) -> String {
        format!(
            "https://{}:{}@github.com/{}/{}.git",
            urlencoding::encode(self.login),
            urlencoding::encode(self.token),
            self.slug.owner,
            self.slug.name
        )
    }
}

pub fn mirror_dir(work_dir: &Path, source: &RepoSlug) -> PathBuf {
    work_dir.join(format!("{}.git", source.name))
}

fn redact(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, s| acc.replace(s, "***"))
}

/// Run git in `cwd`. `shown` stands in for the arguments in messages so
/// credentials never reach the log.
async fn run_git(cwd: &Path, args: &[&str], shown: &str, secrets: &[&str]) -> Result<()> {
    debug!("git {shown}");
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .with_context(|| format!("Failed to run git {shown}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {shown} failed: {}", redact(stderr.trim(), secrets));
    }
    Ok(())
}

/// Clone or refresh the local mirror of `source`, then push every ref to
/// `target`.
pub async fn mirror(work_dir: &Path, source: &Remote<'_>, target: &Remote<'_>) -> Result<()> {
    let secrets = [source.token, target.token];
    let dir = mirror_dir(work_dir, source.slug);

    if dir.exists() {
        info!("updating local mirror {}", dir.display());
        run_git(&dir, &["remote", "update"], "remote update", &secrets).await?;
    } else {
        info!("cloning {} into {}", source.slug, dir.display());
        let dir_arg = dir.to_string_lossy();
        run_git(
            work_dir,
            &["clone", "--mirror", &source.url(), &dir_arg],
            &format!("clone --mirror {}", source.slug),
            &secrets,
        )
        .await?;
    }

    info!("pushing mirror to {}", target.slug);
    run_git(
        &dir,
        &["push", "--mirror", &target.url()],
        &format!("push --mirror {}", target.slug),
        &secrets,
    )
    .await?;
    info!("git history mirrored to {}", target.slug);
    Ok(())
}
