use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::client::{created_id, Client};
use super::{repo_vars, Tally};
use crate::config::RepoSlug;
use crate::error::SyncResult;
use crate::model::repo::{Label, Milestone, MilestoneState};
use crate::remote::Operation;

pub struct EntityKind<T> {
    pub noun: &'static str,
    pub list: Operation,
    pub connection: &'static str,
    pub create: Operation,
    pub update: Operation,
    /// Where the new entity's id sits in the create payload.
    pub created_id: &'static str,
    pub natural_key: fn(&T) -> &str,
    pub id: fn(&T) -> &str,
    /// Compared attributes, excluding identity fields and the key itself.
    pub attributes: fn(&T) -> Vec<(&'static str, String)>,
    pub create_input: fn(&T) -> Value,
    pub update_input: fn(&T) -> Value,
    /// False when the create input cannot express the whole entity and a
    /// follow-up update is needed.
    pub settled_by_create: fn(&T) -> bool,
}

fn label_name(l: &Label) -> &str {
    &l.name
}

fn label_id(l: &Label) -> &str {
    &l.id
}

fn label_attributes(l: &Label) -> Vec<(&'static str, String)> {
    vec![
        ("color", l.color.clone()),
        ("description", l.description.clone().unwrap_or_default()),
    ]
}

fn label_input(l: &Label) -> Value {
    json!({ "name": l.name, "color": l.color, "description": l.description })
}

fn always(_: &Label) -> bool {
    true
}

pub const LABELS: EntityKind<Label> = EntityKind {
    noun: "label",
    list: Operation::Labels,
    connection: "/repository/labels",
    create: Operation::CreateLabel,
    update: Operation::UpdateLabel,
    created_id: "/createLabel/label/id",
    natural_key: label_name,
    id: label_id,
    attributes: label_attributes,
    create_input: label_input,
    update_input: label_input,
    settled_by_create: always,
};

fn milestone_title(m: &Milestone) -> &str {
    &m.title
}

fn milestone_id(m: &Milestone) -> &str {
    &m.id
}

fn milestone_attributes(m: &Milestone) -> Vec<(&'static str, String)> {
    vec![
        ("state", m.state.as_str().to_string()),
        ("description", m.description.clone().unwrap_or_default()),
        ("dueOn", m.due_on.clone().unwrap_or_default()),
    ]
}

fn milestone_create_input(m: &Milestone) -> Value {
    json!({ "title": m.title, "description": m.description, "dueOn": m.due_on })
}

fn milestone_update_input(m: &Milestone) -> Value {
    json!({
        "title": m.title,
        "description": m.description,
        "dueOn": m.due_on,
        "state": m.state.as_str(),
    })
}

fn created_open(m: &Milestone) -> bool {
    m.state == MilestoneState::Open
}

pub const MILESTONES: EntityKind<Milestone> = EntityKind {
    noun: "milestone",
    list: Operation::Milestones,
    connection: "/repository/milestones",
    create: Operation::CreateMilestone,
    update: Operation::UpdateMilestone,
    created_id: "/createMilestone/milestone/id",
    natural_key: milestone_title,
    id: milestone_id,
    attributes: milestone_attributes,
    create_input: milestone_create_input,
    update_input: milestone_update_input,
    settled_by_create: created_open,
};

fn differing<T>(kind: &EntityKind<T>, source: &T, target: &T) -> Vec<&'static str> {
    let theirs: HashMap<&str, String> = (kind.attributes)(target).into_iter().collect();
    (kind.attributes)(source)
        .into_iter()
        .filter(|(name, value)| theirs.get(name) != Some(value))
        .map(|(name, _)| name)
        .collect()
}

fn with_field(mut input: Value, key: &str, value: &str) -> Value {
    input[key] = json!(value);
    input
}

/// Bring the target's `kind` entities in line with the source's and return
/// the target's entities as they stand afterwards.
pub async fn reconcile<T: DeserializeOwned>(
    kind: &EntityKind<T>,
    source: &Client,
    target: &Client,
    source_repo: &RepoSlug,
    target_repo: &RepoSlug,
    target_repo_id: &str,
) -> SyncResult<(Vec<T>, Tally)> {
    info!("reconciling {}s", kind.noun);
    let source_items: Vec<T> = source
        .fetch_all(kind.list, repo_vars(source_repo), kind.connection)
        .await?;
    let target_items: Vec<T> = target
        .fetch_all(kind.list, repo_vars(target_repo), kind.connection)
        .await?;

    let target_by_key: HashMap<&str, &T> = target_items
        .iter()
        .map(|t| ((kind.natural_key)(t), t))
        .collect();
    let mut seen = HashSet::new();
    let mut tally = Tally::default();

    for item in &source_items {
        let key = (kind.natural_key)(item);
        if !seen.insert(key) {
            continue;
        }
        match target_by_key.get(key) {
            Some(existing) => {
                let diffs = differing(kind, item, existing);
                if diffs.is_empty() {
                    tally.unchanged += 1;
                    continue;
                }
                debug!(key, changed = ?diffs, "updating {}", kind.noun);
                let input = with_field((kind.update_input)(item), "id", (kind.id)(existing));
                let what = format!("updating {} '{key}'", kind.noun);
                match target.mutate(kind.update, input, &what).await? {
                    Some(_) => tally.updated += 1,
                    None => tally.skipped += 1,
                }
            }
            None => {
                debug!(key, "creating {}", kind.noun);
                let input = with_field((kind.create_input)(item), "repoId", target_repo_id);
                let what = format!("creating {} '{key}'", kind.noun);
                let Some(data) = target.mutate(kind.create, input, &what).await? else {
                    tally.skipped += 1;
                    continue;
                };
                if (kind.settled_by_create)(item) {
                    tally.created += 1;
                    continue;
                }
                // the follow-up update needs the new id; a rerun settles it otherwise
                let Some(id) = created_id(kind.create, &data, kind.created_id, &what) else {
                    tally.skipped += 1;
                    continue;
                };
                tally.created += 1;
                let input = with_field((kind.update_input)(item), "id", &id);
                let what = format!("finishing {} '{key}'", kind.noun);
                target.mutate(kind.update, input, &what).await?;
            }
        }
    }

    let refreshed: Vec<T> = target
        .fetch_all(kind.list, repo_vars(target_repo), kind.connection)
        .await?;
    info!(
        created = tally.created,
        updated = tally.updated,
        unchanged = tally.unchanged,
        skipped = tally.skipped,
        "{}s reconciled",
        kind.noun
    );
    Ok((refreshed, tally))
}

pub fn label_ids(labels: &[Label]) -> HashMap<String, String> {
    labels.iter().map(|l| (l.name.clone(), l.id.clone())).collect()
}

/// Target milestone number -> target milestone id.
pub fn milestone_ids(milestones: &[Milestone]) -> HashMap<u64, String> {
    milestones.iter().map(|m| (m.number, m.id.clone())).collect()
}
