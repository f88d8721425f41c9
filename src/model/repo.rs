use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A page of results: the node list plus the cursor needed for the next page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
    #[serde(default)]
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneState {
    Open,
    Closed,
}

impl MilestoneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneState::Open => "OPEN",
            MilestoneState::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub state: MilestoneState,
    pub description: Option<String>,
    pub due_on: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueState {
    Open,
    Closed,
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssueState::Open => "OPEN",
            IssueState::Closed => "CLOSED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MilestoneRef {
    pub id: String,
    pub number: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub author: Option<Actor>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn author_login(&self) -> &str {
        self.author.as_ref().map_or(GHOST, |a| a.login.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: String,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: IssueState,
    #[serde(default)]
    pub author: Option<Actor>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    #[serde(default)]
    pub labels: Connection<LabelRef>,
    #[serde(default)]
    pub comments: Connection<Comment>,
}

/// Login shown for content whose author account no longer exists.
pub const GHOST: &str = "ghost";

impl Issue {
    pub fn author_login(&self) -> &str {
        self.author.as_ref().map_or(GHOST, |a| a.login.as_str())
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.nodes.iter().map(|l| l.name.as_str())
    }

    pub fn milestone_number(&self) -> Option<u64> {
        self.milestone.as_ref().map(|m| m.number)
    }
}
