use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::{created_id, decode, string_at, Client};
use super::{identity, Outcome, Report, Tally};
use crate::config::RepoSlug;
use crate::error::{SyncError, SyncResult};
use crate::model::board::{Field, FieldDataType, FieldValue, Project, ProjectItem, RawProjectItem};
use crate::model::repo::Issue;
use crate::remote::Operation;

/// Fields every board has; they cannot be created.
pub const STANDARD_FIELDS: &[&str] = &[
    "Title",
    "Assignees",
    "Status",
    "Labels",
    "Repository",
    "Milestone",
    "Linked pull requests",
];

#[derive(Debug, Error, PartialEq)]
pub enum CoerceError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("no option named '{0}'")]
    MissingOption(String),
    #[error("no iteration titled '{0}'")]
    MissingIteration(String),
    #[error("{0} fields cannot be set")]
    Unsupported(&'static str),
}

/// The mutation input that sets `value` on `field`, shaped by the field's
/// own type.
pub fn coerce(field: &Field, value: &FieldValue) -> Result<Value, CoerceError> {
    let raw = value.to_string();
    match field.data_type {
        FieldDataType::Text => Ok(json!({ "text": raw })),
        FieldDataType::Number => raw
            .trim()
            .parse::<f64>()
            .map(|n| json!({ "number": n }))
            .map_err(|_| CoerceError::NotANumber(raw)),
        FieldDataType::Date => Ok(json!({ "date": raw })),
        FieldDataType::SingleSelect => field
            .option_named(&raw)
            .map(|o| json!({ "singleSelectOptionId": o.id }))
            .ok_or(CoerceError::MissingOption(raw)),
        FieldDataType::Iteration => field
            .configuration
            .as_ref()
            .and_then(|c| c.find_by_title(&raw))
            .map(|i| json!({ "iterationId": i.id }))
            .ok_or(CoerceError::MissingIteration(raw)),
        FieldDataType::Unsupported => Err(CoerceError::Unsupported(field.data_type.as_str())),
    }
}

fn field_input(project_id: &str, field: &Field) -> (Operation, Value) {
    let mut input = json!({
        "projectId": project_id,
        "dataType": field.data_type.as_str(),
        "name": field.name,
    });
    match field.data_type {
        FieldDataType::SingleSelect => {
            input["singleSelectOptions"] = field
                .options
                .iter()
                .map(|o| {
                    json!({
                        "name": o.name,
                        "color": o.color,
                        "description": o.description.as_deref().unwrap_or_default(),
                    })
                })
                .collect();
            (Operation::CreateField, input)
        }
        FieldDataType::Iteration => {
            if let Some(config) = &field.configuration {
                input["iterationConfiguration"] = config.to_input();
            }
            (Operation::CreateIterationField, input)
        }
        _ => (Operation::CreateField, input),
    }
}

fn creatable(field: &Field) -> bool {
    field.data_type != FieldDataType::Unsupported && !STANDARD_FIELDS.contains(&field.name.as_str())
}

pub struct BoardSync<'a> {
    pub source: &'a Client,
    pub target: &'a Client,
    pub source_repo: &'a RepoSlug,
    pub target_repo: &'a RepoSlug,
    pub source_project: &'a str,
    pub target_project: &'a str,
}

impl BoardSync<'_> {
    pub async fn run(&self) -> SyncResult<Report> {
        info!(
            "migrating board '{}' ({}) to '{}' ({})",
            self.source_project, self.source_repo.owner, self.target_project, self.target_repo.owner
        );
        let source = find_project(self.source, &self.source_repo.owner, self.source_project)
            .await?
            .ok_or_else(|| SyncError::ProjectNotFound {
                owner: self.source_repo.owner.clone(),
                name: self.source_project.to_string(),
            })?;
        let target = self.ensure_target_project().await?;

        let mut report = Report::default();
        let (target, fields) = self.reconcile_fields(&source, target).await?;
        report.push("board fields", fields);

        let migrated = identity::resolve(self.target, self.target_repo, self.source_repo).await?;
        let (items, values) = self.reconcile_items(&source, &target, &migrated).await?;
        report.push("board items", items);
        report.push("field values", values);

        warn!("board views are not migrated; recreate them by hand on '{}'", target.title);
        Ok(report)
    }

    async fn ensure_target_project(&self) -> SyncResult<Project> {
        let owner = &self.target_repo.owner;
        if let Some(project) = find_project(self.target, owner, self.target_project).await? {
            info!("found target board '{}'", project.title);
            return Ok(project);
        }

        info!("creating target board '{}'", self.target_project);
        let data = self
            .target
            .require(Operation::OwnerId, json!({ "login": owner }))
            .await?;
        let owner_id = string_at(Operation::OwnerId, &data, "/repositoryOwner/id", "the owner id")?;
        self.target
            .require(
                Operation::CreateProject,
                json!({ "ownerId": owner_id, "title": self.target_project }),
            )
            .await?;
        find_project(self.target, owner, self.target_project)
            .await?
            .ok_or_else(|| SyncError::ProjectNotFound {
                owner: owner.clone(),
                name: self.target_project.to_string(),
            })
    }

    /// Create the source's custom fields the target lacks and return the
    /// target as it stands afterwards.
    async fn reconcile_fields(&self, source: &Project, target: Project) -> SyncResult<(Project, Tally)> {
        info!("reconciling board fields");
        let existing: HashMap<&str, &Field> = target
            .fields
            .nodes
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();

        let mut tally = Tally::default();
        for field in &source.fields.nodes {
            if !creatable(field) {
                continue;
            }
            if existing.contains_key(field.name.as_str()) {
                tally.record(Outcome::Unchanged);
                continue;
            }
            debug!(field = %field.name, data_type = field.data_type.as_str(), "creating field");
            let (op, input) = field_input(&target.id, field);
            let what = format!("creating field '{}'", field.name);
            tally.record(match self.target.mutate(op, json!({ "input": input }), &what).await? {
                Some(_) => Outcome::Created,
                None => Outcome::Skipped,
            });
        }

        if tally.created == 0 {
            return Ok((target, tally));
        }
        let refreshed = find_project(self.target, &self.target_repo.owner, &target.title)
            .await?
            .ok_or_else(|| SyncError::ProjectNotFound {
                owner: self.target_repo.owner.clone(),
                name: target.title.clone(),
            })?;
        Ok((refreshed, tally))
    }

    async fn reconcile_items(
        &self,
        source: &Project,
        target: &Project,
        migrated: &BTreeMap<u64, Issue>,
    ) -> SyncResult<(Tally, Tally)> {
        info!("reconciling board items");
        let source_items = items_for_repo(self.source, source, self.source_repo).await?;
        let target_items = items_for_repo(self.target, target, self.target_repo).await?;
        let target_fields: HashMap<&str, &Field> = target
            .fields
            .nodes
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();

        let mut items = Tally::default();
        let mut values = Tally::default();
        for (number, item) in &source_items {
            let Some(issue) = migrated.get(number) else {
                debug!(issue = number, "issue not migrated yet, skipping board item");
                items.record(Outcome::Skipped);
                continue;
            };

            let empty = BTreeMap::new();
            let (item_id, current) = match target_items.get(&issue.number) {
                Some(existing) => {
                    items.record(Outcome::Unchanged);
                    (existing.id.clone(), &existing.values)
                }
                None => {
                    let vars = json!({ "projectId": target.id, "contentId": issue.id });
                    let what = format!("adding issue #{} to the board", issue.number);
                    let Some(data) = self.target.mutate(Operation::AddProjectItem, vars, &what).await? else {
                        items.record(Outcome::Skipped);
                        continue;
                    };
                    let Some(id) =
                        created_id(Operation::AddProjectItem, &data, "/addProjectV2ItemById/item/id", &what)
                    else {
                        items.record(Outcome::Skipped);
                        continue;
                    };
                    items.record(Outcome::Created);
                    (id, &empty)
                }
            };

            for (name, value) in &item.values {
                let Some(field) = target_fields.get(name.as_str()) else {
                    continue;
                };
                if current.get(name).map(ToString::to_string) == Some(value.to_string()) {
                    values.record(Outcome::Unchanged);
                    continue;
                }
                let input = match coerce(field, value) {
                    Ok(input) => input,
                    Err(e) => {
                        warn!(issue = issue.number, field = %name, "cannot set value: {e}");
                        values.record(Outcome::Skipped);
                        continue;
                    }
                };
                let vars = json!({
                    "projectId": target.id,
                    "itemId": item_id,
                    "fieldId": field.id,
                    "value": input,
                });
                let what = format!("setting '{name}' on issue #{}", issue.number);
                values.record(match self.target.mutate(Operation::UpdateItemFieldValue, vars, &what).await? {
                    Some(_) => Outcome::Updated,
                    None => Outcome::Skipped,
                });
            }
        }
        Ok((items, values))
    }
}

/// The owner's board titled exactly `name`.
pub async fn find_project(client: &Client, owner: &str, name: &str) -> SyncResult<Option<Project>> {
    let data = client
        .require(Operation::Project, json!({ "owner": owner, "projectName": name }))
        .await?;
    let candidates: Vec<Project> = match data.pointer("/repositoryOwner/projectsV2/nodes") {
        None | Some(Value::Null) => Vec::new(),
        Some(nodes) => decode(Operation::Project, nodes.clone())?,
    };
    Ok(candidates.into_iter().find(|p| p.title == name))
}

async fn items_for_repo(
    client: &Client,
    project: &Project,
    repo: &RepoSlug,
) -> SyncResult<BTreeMap<u64, ProjectItem>> {
    let raw: Vec<RawProjectItem> = client
        .fetch_all(Operation::ProjectItems, json!({ "projectId": project.id }), "/node/items")
        .await?;
    let full_name = repo.full_name();
    Ok(raw
        .into_iter()
        .filter_map(ProjectItem::from_raw)
        .filter(|item| item.repository == full_name)
        .map(|item| (item.issue_number, item))
        .collect())
}
