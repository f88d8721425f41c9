use chrono::SecondsFormat;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use super::client::{created_id, Client};
use super::identity;
use super::{repo_vars, Mode, Outcome, Tally};
use crate::config::RepoSlug;
use crate::error::SyncResult;
use crate::model::repo::{Comment, Issue, IssueState};
use crate::remote::Operation;

/// Body of the target issue: provenance marker, author line, then the
/// original text.
pub fn issue_body(source_repo: &RepoSlug, issue: &Issue) -> String {
    format!(
        "{}\n**Original author: @{}**\n\n---\n\n{}",
        identity::marker(source_repo, issue.number),
        issue.author_login(),
        issue.body.as_deref().unwrap_or_default()
    )
}

pub fn comment_body(comment: &Comment) -> String {
    format!(
        "**Original comment by @{} on {}**\n\n---\n\n{}",
        comment.author_login(),
        comment.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        comment.body
    )
}

/// Everything needed to carry one repository's issues across.
pub struct IssueSync<'a> {
    pub source: &'a Client,
    pub target: &'a Client,
    pub source_repo: &'a RepoSlug,
    pub target_repo: &'a RepoSlug,
    pub target_repo_id: &'a str,
    /// Label name -> target label id.
    pub label_ids: &'a HashMap<String, String>,
    /// Milestone number -> target milestone id.
    pub milestone_ids: &'a HashMap<u64, String>,
}

impl IssueSync<'_> {
    pub async fn run(&self, mode: Mode) -> SyncResult<Tally> {
        info!("fetching issues from {}", self.source_repo);
        let issues: Vec<Issue> = self
            .source
            .fetch_all(Operation::Issues, repo_vars(self.source_repo), "/repository/issues")
            .await?;
        info!("found {} source issues", issues.len());
        let migrated = identity::resolve(self.target, self.target_repo, self.source_repo).await?;

        let mut tally = Tally::default();
        for issue in &issues {
            let outcome = match (migrated.get(&issue.number), mode) {
                (None, _) => self.create(issue).await?,
                (Some(_), Mode::CreateOnly) => {
                    debug!(issue = issue.number, "already migrated");
                    Outcome::Unchanged
                }
                (Some(existing), Mode::Reconcile) => self.update(issue, existing).await?,
            };
            tally.record(outcome);
        }
        Ok(tally)
    }

    /// Target label ids for the issue's labels; names the target lacks are
    /// dropped.
    fn label_ids_for(&self, issue: &Issue) -> Vec<String> {
        issue
            .label_names()
            .filter_map(|name| self.label_ids.get(name).cloned())
            .collect()
    }

    fn milestone_id_for(&self, issue: &Issue) -> Option<String> {
        issue
            .milestone_number()
            .and_then(|n| self.milestone_ids.get(&n).cloned())
    }

    pub async fn create(&self, issue: &Issue) -> SyncResult<Outcome> {
        info!(issue = issue.number, "migrating issue '{}'", issue.title);
        let label_ids = self.label_ids_for(issue);
        let dropped = issue.labels.nodes.len() - label_ids.len();
        if dropped > 0 {
            debug!(issue = issue.number, dropped, "labels missing on target were left off");
        }
        let vars = json!({
            "repoId": self.target_repo_id,
            "title": issue.title,
            "body": issue_body(self.source_repo, issue),
            "labelIds": label_ids,
            "milestoneId": self.milestone_id_for(issue),
        });
        let what = format!("creating issue #{}", issue.number);
        let Some(data) = self.target.mutate(Operation::CreateIssue, vars, &what).await? else {
            return Ok(Outcome::Skipped);
        };
        let Some(new_id) = created_id(Operation::CreateIssue, &data, "/createIssue/issue/id", &what) else {
            return Ok(Outcome::Skipped);
        };

        let mut comments = self.comments(issue).await?;
        comments.sort_by_key(|c| c.created_at);
        for comment in &comments {
            let vars = json!({ "subjectId": new_id, "body": comment_body(comment) });
            let what = format!("replaying a comment on issue #{}", issue.number);
            self.target.mutate(Operation::AddComment, vars, &what).await?;
        }

        if issue.state == IssueState::Closed {
            let what = format!("closing issue #{}", issue.number);
            self.target
                .mutate(Operation::CloseIssue, json!({ "issueId": new_id }), &what)
                .await?;
        }
        Ok(Outcome::Created)
    }

    /// The issue's comments, fetching the rest when the issue listing only
    /// carried the first page.
    async fn comments(&self, issue: &Issue) -> SyncResult<Vec<Comment>> {
        if !issue.comments.page_info.has_next_page {
            return Ok(issue.comments.nodes.clone());
        }
        debug!(issue = issue.number, "fetching remaining comments");
        let mut vars = repo_vars(self.source_repo);
        vars["number"] = json!(issue.number);
        match self
            .source
            .fetch_all(Operation::IssueComments, vars, "/repository/issue/comments")
            .await
        {
            Ok(all) => Ok(all),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(issue = issue.number, "could not fetch all comments, replaying the first page: {e}");
                Ok(issue.comments.nodes.clone())
            }
        }
    }

    pub async fn update(&self, issue: &Issue, existing: &Issue) -> SyncResult<Outcome> {
        let desired_labels: BTreeSet<&str> = issue
            .label_names()
            .filter(|name| self.label_ids.contains_key(*name))
            .collect();
        let current_labels: BTreeSet<&str> = existing.label_names().collect();
        let desired_milestone = self.milestone_id_for(issue);
        let current_milestone = existing.milestone.as_ref().map(|m| m.id.clone());

        let in_sync = issue.state == existing.state
            && issue.title == existing.title
            && desired_labels == current_labels
            && desired_milestone == current_milestone;
        if in_sync {
            return Ok(Outcome::Unchanged);
        }

        info!(issue = issue.number, target_issue = existing.number, "updating migrated issue");
        let label_ids: Vec<&String> = desired_labels
            .iter()
            .filter_map(|name| self.label_ids.get(*name))
            .collect();
        let vars = json!({
            "id": existing.id,
            "title": issue.title,
            "state": issue.state.to_string(),
            "labelIds": label_ids,
            "milestoneId": desired_milestone.map_or(Value::Null, Value::String),
        });
        let what = format!("updating issue #{}", existing.number);
        Ok(match self.target.mutate(Operation::UpdateIssue, vars, &what).await? {
            Some(_) => Outcome::Updated,
            None => Outcome::Skipped,
        })
    }
}
