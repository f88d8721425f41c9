use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use super::{Operation, Transport};
use crate::error::ApiError;

#[derive(Debug, Clone)]
struct FakeLabel {
    id: String,
    name: String,
    color: String,
    description: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeMilestone {
    id: String,
    number: u64,
    title: String,
    state: String,
    description: Option<String>,
    due_on: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeComment {
    pub author: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct FakeIssue {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub author: Option<String>,
    milestone_id: Option<String>,
    label_ids: Vec<String>,
    pub comments: Vec<FakeComment>,
}

#[derive(Debug, Clone)]
struct FakeRepo {
    id: String,
    owner: String,
    name: String,
    is_private: bool,
    description: Option<String>,
    labels: Vec<FakeLabel>,
    milestones: Vec<FakeMilestone>,
    issues: Vec<FakeIssue>,
}

impl FakeRepo {
    fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
struct FakeField {
    id: String,
    name: String,
    data_type: String,
    options: Vec<(String, String, String, String)>,
    configuration: Option<Value>,
}

#[derive(Debug, Clone)]
struct FakeItem {
    id: String,
    content_id: String,
    /// field id -> value input as sent by `updateProjectV2ItemFieldValue`
    values: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
struct FakeProject {
    id: String,
    owner: String,
    title: String,
    fields: Vec<FakeField>,
    items: Vec<FakeItem>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    clock: u64,
    repos: Vec<FakeRepo>,
    projects: Vec<FakeProject>,
    log: Vec<(Operation, Value)>,
    failures: HashMap<Operation, VecDeque<ApiError>>,
    answers: HashMap<Operation, VecDeque<Value>>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn now(&mut self) -> String {
        self.clock += 1;
        let t = chrono::DateTime::from_timestamp(1_900_000_000 + self.clock as i64, 0)
            .unwrap_or_default();
        t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    fn repo(&self, owner: &str, name: &str) -> Option<&FakeRepo> {
        self.repos.iter().find(|r| r.owner == owner && r.name == name)
    }

    fn repo_by_id(&mut self, id: &str) -> Result<&mut FakeRepo, ApiError> {
        self.repos
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ApiError::Other(format!("Could not resolve to a node with the global id of '{id}'")))
    }

    fn issue_by_id(&mut self, id: &str) -> Result<&mut FakeIssue, ApiError> {
        self.repos
            .iter_mut()
            .flat_map(|r| r.issues.iter_mut())
            .find(|i| i.id == id)
            .ok_or_else(|| ApiError::Other(format!("Could not resolve to an Issue with id '{id}'")))
    }

    fn project_by_id(&mut self, id: &str) -> Result<&mut FakeProject, ApiError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ApiError::Other(format!("Could not resolve to a ProjectV2 with id '{id}'")))
    }
}

fn str_var<'a>(vars: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    vars.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Other(format!("Variable ${key} of type String! was not provided")))
}

fn opt_str(vars: &Value, key: &str) -> Option<String> {
    vars.get(key).and_then(Value::as_str).map(String::from)
}

fn page(nodes: Vec<Value>, cursor: Option<&str>, size: usize) -> Value {
    let start = cursor
        .and_then(|c| c.strip_prefix("cursor:"))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0)
        .min(nodes.len());
    let end = (start + size).min(nodes.len());
    json!({
        "pageInfo": {
            "hasNextPage": end < nodes.len(),
            "endCursor": (end > start).then(|| format!("cursor:{end}")),
        },
        "nodes": nodes[start..end].to_vec(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct IssueSeed<'a> {
    pub title: &'a str,
    pub body: Option<&'a str>,
    pub closed: bool,
    pub author: Option<&'a str>,
    pub labels: Vec<&'a str>,
    pub milestone: Option<u64>,
    pub comments: Vec<(&'a str, &'a str, &'a str)>,
}

pub struct FakeGitHub {
    label: String,
    page_size: usize,
    state: Mutex<State>,
}

impl FakeGitHub {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            page_size: 100,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    fn login(&self) -> String {
        format!("{}-bot", self.label)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // --- seeding ---

    pub fn add_repo(&self, owner: &str, name: &str) -> String {
        let mut st = self.state();
        let id = st.id("R");
        st.repos.push(FakeRepo {
            id: id.clone(),
            owner: owner.into(),
            name: name.into(),
            is_private: true,
            description: None,
            labels: Vec::new(),
            milestones: Vec::new(),
            issues: Vec::new(),
        });
        id
    }

    pub fn add_label(&self, repo_id: &str, name: &str, color: &str, description: Option<&str>) -> String {
        let mut st = self.state();
        let id = st.id("LA");
        let repo = st.repo_by_id(repo_id).unwrap();
        repo.labels.push(FakeLabel {
            id: id.clone(),
            name: name.into(),
            color: color.into(),
            description: description.map(String::from),
        });
        id
    }

    pub fn add_milestone(&self, repo_id: &str, title: &str, closed: bool) -> u64 {
        let mut st = self.state();
        let id = st.id("MI");
        let repo = st.repo_by_id(repo_id).unwrap();
        let number = repo.milestones.iter().map(|m| m.number).max().unwrap_or(0) + 1;
        repo.milestones.push(FakeMilestone {
            id,
            number,
            title: title.into(),
            state: if closed { "CLOSED" } else { "OPEN" }.into(),
            description: None,
            due_on: None,
        });
        number
    }

    /// Returns the new issue's node id and number.
    pub fn add_issue(&self, repo_id: &str, seed: IssueSeed<'_>) -> (String, u64) {
        let mut st = self.state();
        let id = st.id("I");
        let repo = st.repo_by_id(repo_id).unwrap();
        let number = repo.issues.len() as u64 + 1;
        let label_ids = seed
            .labels
            .iter()
            .filter_map(|name| repo.labels.iter().find(|l| l.name == *name))
            .map(|l| l.id.clone())
            .collect();
        let milestone_id = seed.milestone.and_then(|n| {
            repo.milestones
                .iter()
                .find(|m| m.number == n)
                .map(|m| m.id.clone())
        });
        repo.issues.push(FakeIssue {
            id: id.clone(),
            number,
            title: seed.title.into(),
            body: seed.body.map(String::from),
            state: if seed.closed { "CLOSED" } else { "OPEN" }.into(),
            author: seed.author.map(String::from),
            milestone_id,
            label_ids,
            comments: seed
                .comments
                .iter()
                .map(|(author, body, at)| FakeComment {
                    author: author.to_string(),
                    body: body.to_string(),
                    created_at: at.to_string(),
                })
                .collect(),
        });
        (id, number)
    }

    pub fn add_project(&self, owner: &str, title: &str) -> String {
        let mut st = self.state();
        let id = st.id("PVT");
        st.projects.push(FakeProject {
            id: id.clone(),
            owner: owner.into(),
            title: title.into(),
            fields: Vec::new(),
            items: Vec::new(),
        });
        id
    }

    pub fn add_field(&self, project_id: &str, name: &str, data_type: &str, options: &[&str]) -> String {
        let mut st = self.state();
        let id = st.id("PVTF");
        let mut opts = Vec::new();
        for name in options {
            let oid = st.id("OPT");
            opts.push((oid, name.to_string(), "GRAY".to_string(), String::new()));
        }
        let configuration = (data_type == "ITERATION").then(|| {
            json!({
                "duration": 14,
                "iterations": [
                    { "id": "it-a", "title": "Sprint 1", "startDate": "2024-01-01", "duration": 14 },
                    { "id": "it-b", "title": "Sprint 2", "startDate": "2024-01-15", "duration": 14 }
                ],
                "completedIterations": []
            })
        });
        let project = st.project_by_id(project_id).unwrap();
        project.fields.push(FakeField {
            id: id.clone(),
            name: name.into(),
            data_type: data_type.into(),
            options: opts,
            configuration,
        });
        id
    }

    pub fn add_item(&self, project_id: &str, content_id: &str) -> String {
        let mut st = self.state();
        let id = st.id("PVTI");
        let project = st.project_by_id(project_id).unwrap();
        project.items.push(FakeItem {
            id: id.clone(),
            content_id: content_id.into(),
            values: BTreeMap::new(),
        });
        id
    }

    /// Store a value on an item, given in the mutation's input shape
    /// (`{"number": 5.0}`, `{"text": ".."}`). Select values are given by
    /// option name (`{"option": "Done"}`).
    pub fn set_item_value(&self, project_id: &str, item_id: &str, field_name: &str, value: Value) {
        let mut st = self.state();
        let project = st.project_by_id(project_id).unwrap();
        let field = project.fields.iter().find(|f| f.name == field_name).unwrap();
        let field_id = field.id.clone();
        let value = match value.get("option").and_then(Value::as_str) {
            Some(name) => {
                let opt = field.options.iter().find(|o| o.1 == name).unwrap();
                json!({ "singleSelectOptionId": opt.0 })
            }
            None => value,
        };
        let item = project.items.iter_mut().find(|i| i.id == item_id).unwrap();
        item.values.insert(field_id, value);
    }

    pub fn fail_next(&self, op: Operation, err: ApiError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    pub fn answer_next(&self, op: Operation, data: Value) {
        self.state().answers.entry(op).or_default().push_back(data);
    }

    // --- inspection ---

    pub fn calls(&self, op: Operation) -> usize {
        self.state().log.iter().filter(|(o, _)| *o == op).count()
    }

    pub fn mutations(&self) -> Vec<(Operation, Value)> {
        self.state()
            .log
            .iter()
            .filter(|(o, _)| o.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    pub fn issues(&self, owner: &str, name: &str) -> Vec<FakeIssue> {
        self.state()
            .repo(owner, name)
            .map(|r| r.issues.clone())
            .unwrap_or_default()
    }

    pub fn issue_label_names(&self, owner: &str, name: &str, number: u64) -> Vec<String> {
        let st = self.state();
        let Some(repo) = st.repo(owner, name) else {
            return Vec::new();
        };
        let Some(issue) = repo.issues.iter().find(|i| i.number == number) else {
            return Vec::new();
        };
        issue
            .label_ids
            .iter()
            .filter_map(|id| repo.labels.iter().find(|l| &l.id == id))
            .map(|l| l.name.clone())
            .collect()
    }

    pub fn issue_milestone_title(&self, owner: &str, name: &str, number: u64) -> Option<String> {
        let st = self.state();
        let repo = st.repo(owner, name)?;
        let issue = repo.issues.iter().find(|i| i.number == number)?;
        let mid = issue.milestone_id.as_ref()?;
        repo.milestones.iter().find(|m| &m.id == mid).map(|m| m.title.clone())
    }

    pub fn labels(&self, owner: &str, name: &str) -> Vec<(String, String, Option<String>)> {
        self.state()
            .repo(owner, name)
            .map(|r| {
                r.labels
                    .iter()
                    .map(|l| (l.name.clone(), l.color.clone(), l.description.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn milestones(&self, owner: &str, name: &str) -> Vec<(String, String)> {
        self.state()
            .repo(owner, name)
            .map(|r| {
                r.milestones
                    .iter()
                    .map(|m| (m.title.clone(), m.state.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_repo(&self, owner: &str, name: &str) -> bool {
        self.state().repo(owner, name).is_some()
    }

    pub fn project_id(&self, owner: &str, title: &str) -> Option<String> {
        self.state()
            .projects
            .iter()
            .find(|p| p.owner == owner && p.title == title)
            .map(|p| p.id.clone())
    }

    /// `(name, dataType, option names)` for every field on the board.
    pub fn fields(&self, project_id: &str) -> Vec<(String, String, Vec<String>)> {
        let st = self.state();
        st.projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| {
                p.fields
                    .iter()
                    .map(|f| {
                        let opts = f.options.iter().map(|o| o.1.clone()).collect();
                        (f.name.clone(), f.data_type.clone(), opts)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn item_contents(&self, project_id: &str) -> Vec<String> {
        let st = self.state();
        st.projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| p.items.iter().map(|i| i.content_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn item_value(&self, project_id: &str, content_id: &str, field_name: &str) -> Option<String> {
        let st = self.state();
        let project = st.projects.iter().find(|p| p.id == project_id)?;
        let field = project.fields.iter().find(|f| f.name == field_name)?;
        let item = project.items.iter().find(|i| i.content_id == content_id)?;
        let raw = item.values.get(&field.id)?;
        render_value(field, raw)
            .and_then(|v| v.get(value_key(&field.data_type)).cloned())
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
    }

    // --- request handling ---

    fn handle(&self, st: &mut State, op: Operation, vars: &Value) -> Result<Value, ApiError> {
        let size = self.page_size;
        match op {
            Operation::ViewerLogin => Ok(json!({ "viewer": { "login": self.login() } })),
            Operation::Repository => {
                let repo = st.repo(str_var(vars, "owner")?, str_var(vars, "name")?);
                Ok(json!({ "repository": repo.map(|r| json!({
                    "id": r.id, "isPrivate": r.is_private, "description": r.description
                })) }))
            }
            Operation::OwnerId => {
                let login = str_var(vars, "login")?;
                Ok(json!({ "repositoryOwner": { "id": format!("O_{login}") } }))
            }
            Operation::CreateRepository => {
                let owner = str_var(vars, "ownerId")?.trim_start_matches("O_").to_string();
                let name = str_var(vars, "name")?.to_string();
                if st.repo(&owner, &name).is_some() {
                    return Err(ApiError::Other("Name already exists on this account".into()));
                }
                let id = st.id("R");
                st.repos.push(FakeRepo {
                    id: id.clone(),
                    owner,
                    name,
                    is_private: str_var(vars, "visibility")? == "PRIVATE",
                    description: opt_str(vars, "description"),
                    labels: Vec::new(),
                    milestones: Vec::new(),
                    issues: Vec::new(),
                });
                Ok(json!({ "createRepository": { "repository": { "id": id } } }))
            }
            Operation::Labels => {
                let cursor = opt_str(vars, "cursor");
                let repo = st.repo(str_var(vars, "owner")?, str_var(vars, "name")?);
                Ok(json!({ "repository": repo.map(|r| {
                    let nodes = r.labels.iter().map(|l| json!({
                        "id": l.id, "name": l.name, "color": l.color, "description": l.description
                    })).collect();
                    json!({ "labels": page(nodes, cursor.as_deref(), size) })
                }) }))
            }
            Operation::CreateLabel => {
                let id = st.id("LA");
                let repo = st.repo_by_id(str_var(vars, "repoId")?)?;
                let name = str_var(vars, "name")?;
                if repo.labels.iter().any(|l| l.name == name) {
                    return Err(ApiError::Other("Name has already been taken".into()));
                }
                repo.labels.push(FakeLabel {
                    id: id.clone(),
                    name: name.into(),
                    color: str_var(vars, "color")?.into(),
                    description: opt_str(vars, "description"),
                });
                Ok(json!({ "createLabel": { "label": { "id": id } } }))
            }
            Operation::UpdateLabel => {
                let id = str_var(vars, "id")?;
                let label = st
                    .repos
                    .iter_mut()
                    .flat_map(|r| r.labels.iter_mut())
                    .find(|l| l.id == id)
                    .ok_or_else(|| ApiError::Other(format!("Could not resolve label {id}")))?;
                label.name = str_var(vars, "name")?.into();
                label.color = str_var(vars, "color")?.into();
                label.description = opt_str(vars, "description");
                Ok(json!({ "updateLabel": { "label": { "id": id } } }))
            }
            Operation::Milestones => {
                let cursor = opt_str(vars, "cursor");
                let repo = st.repo(str_var(vars, "owner")?, str_var(vars, "name")?);
                Ok(json!({ "repository": repo.map(|r| {
                    let nodes = r.milestones.iter().map(|m| json!({
                        "id": m.id, "number": m.number, "title": m.title, "state": m.state,
                        "description": m.description, "dueOn": m.due_on
                    })).collect();
                    json!({ "milestones": page(nodes, cursor.as_deref(), size) })
                }) }))
            }
            Operation::CreateMilestone => {
                let id = st.id("MI");
                let repo = st.repo_by_id(str_var(vars, "repoId")?)?;
                let title = str_var(vars, "title")?;
                if repo.milestones.iter().any(|m| m.title == title) {
                    return Err(ApiError::Other("Title has already been taken".into()));
                }
                let number = repo.milestones.iter().map(|m| m.number).max().unwrap_or(0) + 1;
                repo.milestones.push(FakeMilestone {
                    id: id.clone(),
                    number,
                    title: title.into(),
                    state: "OPEN".into(),
                    description: opt_str(vars, "description"),
                    due_on: opt_str(vars, "dueOn"),
                });
                Ok(json!({ "createMilestone": { "milestone": { "id": id, "number": number } } }))
            }
            Operation::UpdateMilestone => {
                let id = str_var(vars, "id")?;
                let milestone = st
                    .repos
                    .iter_mut()
                    .flat_map(|r| r.milestones.iter_mut())
                    .find(|m| m.id == id)
                    .ok_or_else(|| ApiError::Other(format!("Could not resolve milestone {id}")))?;
                if let Some(title) = opt_str(vars, "title") {
                    milestone.title = title;
                }
                if let Some(state) = opt_str(vars, "state") {
                    milestone.state = state;
                }
                if vars.get("description").is_some() {
                    milestone.description = opt_str(vars, "description");
                }
                if vars.get("dueOn").is_some() {
                    milestone.due_on = opt_str(vars, "dueOn");
                }
                Ok(json!({ "updateMilestone": { "milestone": { "id": id } } }))
            }
            Operation::Issues => {
                let cursor = opt_str(vars, "cursor");
                let repo = st.repo(str_var(vars, "owner")?, str_var(vars, "name")?);
                Ok(json!({ "repository": repo.map(|r| {
                    let nodes = r.issues.iter().map(|i| issue_json(r, i, size)).collect();
                    json!({ "issues": page(nodes, cursor.as_deref(), size) })
                }) }))
            }
            Operation::IssueComments => {
                let cursor = opt_str(vars, "cursor");
                let number = vars.get("number").and_then(Value::as_u64).unwrap_or(0);
                let repo = st.repo(str_var(vars, "owner")?, str_var(vars, "name")?);
                let issue = repo.and_then(|r| r.issues.iter().find(|i| i.number == number));
                Ok(json!({ "repository": { "issue": issue.map(|i| json!({
                    "comments": page(comments_json(i), cursor.as_deref(), size)
                })) } }))
            }
            Operation::CreateIssue => {
                let id = st.id("I");
                let login = self.login();
                let repo = st.repo_by_id(str_var(vars, "repoId")?)?;
                let label_ids: Vec<String> = vars
                    .get("labelIds")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                if let Some(bad) = label_ids.iter().find(|id| !repo.labels.iter().any(|l| &l.id == *id)) {
                    return Err(ApiError::Other(format!("Could not resolve label {bad}")));
                }
                let number = repo.issues.len() as u64 + 1;
                repo.issues.push(FakeIssue {
                    id: id.clone(),
                    number,
                    title: str_var(vars, "title")?.into(),
                    body: opt_str(vars, "body"),
                    state: "OPEN".into(),
                    author: Some(login),
                    milestone_id: opt_str(vars, "milestoneId"),
                    label_ids,
                    comments: Vec::new(),
                });
                Ok(json!({ "createIssue": { "issue": { "id": id, "number": number } } }))
            }
            Operation::UpdateIssue => {
                let id = str_var(vars, "id")?.to_string();
                let issue = st.issue_by_id(&id)?;
                if let Some(title) = opt_str(vars, "title") {
                    issue.title = title;
                }
                if let Some(state) = opt_str(vars, "state") {
                    issue.state = state;
                }
                if let Some(ids) = vars.get("labelIds").and_then(Value::as_array) {
                    issue.label_ids = ids.iter().filter_map(Value::as_str).map(String::from).collect();
                }
                if vars.get("milestoneId").is_some() {
                    issue.milestone_id = opt_str(vars, "milestoneId");
                }
                Ok(json!({ "updateIssue": { "issue": { "id": id } } }))
            }
            Operation::AddComment => {
                let at = st.now();
                let login = self.login();
                let id = st.id("IC");
                let issue = st.issue_by_id(str_var(vars, "subjectId")?)?;
                issue.comments.push(FakeComment {
                    author: login,
                    body: str_var(vars, "body")?.into(),
                    created_at: at,
                });
                Ok(json!({ "addComment": { "commentEdge": { "node": { "id": id } } } }))
            }
            Operation::CloseIssue => {
                let id = str_var(vars, "issueId")?.to_string();
                st.issue_by_id(&id)?.state = "CLOSED".into();
                Ok(json!({ "closeIssue": { "issue": { "id": id } } }))
            }
            Operation::Project => {
                let owner = str_var(vars, "owner")?;
                let query = str_var(vars, "projectName")?;
                let nodes: Vec<Value> = st
                    .projects
                    .iter()
                    .filter(|p| p.owner == owner && p.title.contains(query))
                    .map(project_json)
                    .collect();
                Ok(json!({ "repositoryOwner": { "projectsV2": { "nodes": nodes } } }))
            }
            Operation::CreateProject => {
                let owner = str_var(vars, "ownerId")?.trim_start_matches("O_").to_string();
                let id = st.id("PVT");
                st.projects.push(FakeProject {
                    id: id.clone(),
                    owner,
                    title: str_var(vars, "title")?.into(),
                    fields: Vec::new(),
                    items: Vec::new(),
                });
                Ok(json!({ "createProjectV2": { "projectV2": { "id": id } } }))
            }
            Operation::CreateField | Operation::CreateIterationField => {
                let input = vars.get("input").cloned().unwrap_or(Value::Null);
                let field_id = st.id("PVTF");
                let mut options = Vec::new();
                for opt in input
                    .get("singleSelectOptions")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default()
                {
                    options.push((
                        st.id("OPT"),
                        opt_str(&opt, "name").unwrap_or_default(),
                        opt_str(&opt, "color").unwrap_or_default(),
                        opt_str(&opt, "description").unwrap_or_default(),
                    ));
                }
                let configuration = input.get("iterationConfiguration").map(|c| {
                    let mut next = 0;
                    let iterations: Vec<Value> = c
                        .get("iterations")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|mut it| {
                            next += 1;
                            it["id"] = json!(format!("{field_id}-it{next}"));
                            it
                        })
                        .collect();
                    json!({ "duration": c["duration"], "iterations": iterations, "completedIterations": [] })
                });
                let project = st.project_by_id(str_var(&input, "projectId")?)?;
                let name = str_var(&input, "name")?;
                if project.fields.iter().any(|f| f.name == name) {
                    return Err(ApiError::Other("Name has already been taken".into()));
                }
                project.fields.push(FakeField {
                    id: field_id.clone(),
                    name: name.into(),
                    data_type: str_var(&input, "dataType")?.into(),
                    options,
                    configuration,
                });
                Ok(json!({ "createProjectV2Field": { "projectV2Field": { "id": field_id } } }))
            }
            Operation::ProjectItems => {
                let cursor = opt_str(vars, "cursor");
                let project_id = str_var(vars, "projectId")?;
                let st: &State = st;
                let Some(project) = st.projects.iter().find(|p| p.id == project_id) else {
                    return Ok(json!({ "node": null }));
                };
                let nodes = project.items.iter().map(|i| item_json(st, project, i)).collect();
                Ok(json!({ "node": { "items": page(nodes, cursor.as_deref(), size) } }))
            }
            Operation::AddProjectItem => {
                let content_id = str_var(vars, "contentId")?.to_string();
                let new_id = st.id("PVTI");
                let project = st.project_by_id(str_var(vars, "projectId")?)?;
                let id = match project.items.iter().find(|i| i.content_id == content_id) {
                    Some(existing) => existing.id.clone(),
                    None => {
                        project.items.push(FakeItem {
                            id: new_id.clone(),
                            content_id,
                            values: BTreeMap::new(),
                        });
                        new_id
                    }
                };
                Ok(json!({ "addProjectV2ItemById": { "item": { "id": id } } }))
            }
            Operation::UpdateItemFieldValue => {
                let item_id = str_var(vars, "itemId")?.to_string();
                let field_id = str_var(vars, "fieldId")?.to_string();
                let value = vars.get("value").cloned().unwrap_or(Value::Null);
                let project = st.project_by_id(str_var(vars, "projectId")?)?;
                let field = project
                    .fields
                    .iter()
                    .find(|f| f.id == field_id)
                    .ok_or_else(|| ApiError::Other(format!("Could not resolve field {field_id}")))?;
                if render_value(field, &value).is_none() {
                    return Err(ApiError::Other(format!("Invalid value for field {}", field.name)));
                }
                let item = project
                    .items
                    .iter_mut()
                    .find(|i| i.id == item_id)
                    .ok_or_else(|| ApiError::Other(format!("Could not resolve item {item_id}")))?;
                item.values.insert(field_id, value);
                Ok(json!({ "updateProjectV2ItemFieldValue": { "projectV2Item": { "id": item_id } } }))
            }
        }
    }
}

fn comments_json(issue: &FakeIssue) -> Vec<Value> {
    issue
        .comments
        .iter()
        .map(|c| json!({ "author": { "login": c.author }, "body": c.body, "createdAt": c.created_at }))
        .collect()
}

fn issue_json(repo: &FakeRepo, issue: &FakeIssue, size: usize) -> Value {
    let labels: Vec<Value> = issue
        .label_ids
        .iter()
        .filter_map(|id| repo.labels.iter().find(|l| &l.id == id))
        .map(|l| json!({ "name": l.name }))
        .collect();
    let milestone = issue
        .milestone_id
        .as_ref()
        .and_then(|id| repo.milestones.iter().find(|m| &m.id == id))
        .map(|m| json!({ "id": m.id, "number": m.number }));
    json!({
        "id": issue.id,
        "number": issue.number,
        "title": issue.title,
        "body": issue.body,
        "state": issue.state,
        "author": issue.author.as_ref().map(|login| json!({ "login": login })),
        "milestone": milestone,
        "labels": { "nodes": labels },
        "comments": page(comments_json(issue), None, size),
    })
}

fn project_json(project: &FakeProject) -> Value {
    let fields: Vec<Value> = project
        .fields
        .iter()
        .map(|f| {
            let mut node = json!({ "id": f.id, "name": f.name, "dataType": f.data_type });
            if f.data_type == "SINGLE_SELECT" {
                node["options"] = f
                    .options
                    .iter()
                    .map(|(id, name, color, description)| {
                        json!({ "id": id, "name": name, "color": color, "description": description })
                    })
                    .collect();
            }
            if let Some(config) = &f.configuration {
                node["configuration"] = config.clone();
            }
            node
        })
        .collect();
    json!({ "id": project.id, "title": project.title, "fields": { "nodes": fields } })
}

fn value_key(data_type: &str) -> &'static str {
    match data_type {
        "NUMBER" => "number",
        "DATE" => "date",
        "SINGLE_SELECT" => "name",
        "ITERATION" => "title",
        _ => "text",
    }
}

/// The field-value node the API would report for a stored input value, or
/// `None` if the input does not fit the field.
fn render_value(field: &FakeField, input: &Value) -> Option<Value> {
    let (typename, key, value) = match field.data_type.as_str() {
        "TEXT" => ("ProjectV2ItemFieldTextValue", "text", input.get("text")?.clone()),
        "NUMBER" => ("ProjectV2ItemFieldNumberValue", "number", json!(input.get("number")?.as_f64()?)),
        "DATE" => ("ProjectV2ItemFieldDateValue", "date", input.get("date")?.clone()),
        "SINGLE_SELECT" => {
            let id = input.get("singleSelectOptionId")?.as_str()?;
            let opt = field.options.iter().find(|o| o.0 == id)?;
            ("ProjectV2ItemFieldSingleSelectValue", "name", json!(opt.1))
        }
        "ITERATION" => {
            let id = input.get("iterationId")?.as_str()?;
            let config = field.configuration.as_ref()?;
            let title = config["iterations"]
                .as_array()?
                .iter()
                .find(|it| it["id"] == id)?["title"]
                .clone();
            ("ProjectV2ItemFieldIterationValue", "title", title)
        }
        _ => return None,
    };
    Some(json!({ "__typename": typename, key: value, "field": { "name": field.name } }))
}

fn item_json(st: &State, project: &FakeProject, item: &FakeItem) -> Value {
    let content = st.repos.iter().find_map(|r| {
        r.issues
            .iter()
            .find(|i| i.id == item.content_id)
            .map(|i| json!({ "id": i.id, "number": i.number, "repository": { "nameWithOwner": r.full_name() } }))
    });
    let values: Vec<Value> = item
        .values
        .iter()
        .filter_map(|(field_id, raw)| {
            let field = project.fields.iter().find(|f| &f.id == field_id)?;
            render_value(field, raw)
        })
        .chain(std::iter::once(json!({ "__typename": "ProjectV2ItemFieldRepositoryValue" })))
        .collect();
    json!({ "id": item.id, "content": content, "fieldValues": { "nodes": values } })
}

#[async_trait]
impl Transport for FakeGitHub {
    fn name(&self) -> &str {
        &self.label
    }

    async fn execute(&self, op: Operation, variables: Value) -> Result<Value, ApiError> {
        let mut st = self.state();
        st.log.push((op, variables.clone()));
        if let Some(err) = st.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if let Some(data) = st.answers.get_mut(&op).and_then(VecDeque::pop_front) {
            return Ok(data);
        }
        self.handle(&mut st, op, &variables)
    }
}
