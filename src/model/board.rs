use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::repo::Connection;

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub fields: Connection<Field>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataType {
    Text,
    Number,
    Date,
    SingleSelect,
    Iteration,
    /// Built-in types (assignees, labels, tracks, ...) that cannot be created.
    #[serde(other)]
    Unsupported,
}

impl FieldDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldDataType::Text => "TEXT",
            FieldDataType::Number => "NUMBER",
            FieldDataType::Date => "DATE",
            FieldDataType::SingleSelect => "SINGLE_SELECT",
            FieldDataType::Iteration => "ITERATION",
            FieldDataType::Unsupported => "UNSUPPORTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectOption {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: String,
    pub title: String,
    pub start_date: String,
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationConfiguration {
    pub duration: u32,
    #[serde(default)]
    pub iterations: Vec<Iteration>,
    #[serde(default)]
    pub completed_iterations: Vec<Iteration>,
}

impl IterationConfiguration {
    /// The configuration in the shape the field-creation input expects,
    /// without the source's server-assigned iteration ids.
    pub fn to_input(&self) -> Value {
        let mut all: Vec<&Iteration> = self
            .completed_iterations
            .iter()
            .chain(self.iterations.iter())
            .collect();
        all.sort_by(|a, b| a.start_date.cmp(&b.start_date));

        let start_date = all
            .first()
            .map(|i| i.start_date.clone())
            .unwrap_or_else(|| chrono::Utc::now().date_naive().to_string());
        let iterations: Vec<Value> = all
            .iter()
            .map(|i| json!({ "title": i.title, "startDate": i.start_date, "duration": i.duration }))
            .collect();

        json!({
            "startDate": start_date,
            "duration": self.duration,
            "iterations": iterations,
        })
    }

    pub fn find_by_title(&self, title: &str) -> Option<&Iteration> {
        self.iterations
            .iter()
            .chain(self.completed_iterations.iter())
            .find(|i| i.title == title)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,
    pub data_type: FieldDataType,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub configuration: Option<IterationConfiguration>,
}

impl Field {
    pub fn option_named(&self, name: &str) -> Option<&SelectOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// A field value, resolved from the API's per-type value shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(String),
    SingleSelectOption(String),
    IterationTitle(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s)
            | FieldValue::Date(s)
            | FieldValue::SingleSelectOption(s)
            | FieldValue::IterationTitle(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum RawFieldValue {
    #[serde(rename = "ProjectV2ItemFieldTextValue")]
    Text {
        field: Option<FieldRef>,
        text: Option<String>,
    },
    #[serde(rename = "ProjectV2ItemFieldNumberValue")]
    Number {
        field: Option<FieldRef>,
        number: Option<f64>,
    },
    #[serde(rename = "ProjectV2ItemFieldDateValue")]
    Date {
        field: Option<FieldRef>,
        date: Option<String>,
    },
    #[serde(rename = "ProjectV2ItemFieldSingleSelectValue")]
    SingleSelect {
        field: Option<FieldRef>,
        name: Option<String>,
    },
    #[serde(rename = "ProjectV2ItemFieldIterationValue")]
    Iteration {
        field: Option<FieldRef>,
        title: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl RawFieldValue {
    /// The owning field's name and the typed value, if both are present.
    fn resolve(self) -> Option<(String, FieldValue)> {
        let (field, value) = match self {
            RawFieldValue::Text { field, text } => (field, text.map(FieldValue::Text)),
            RawFieldValue::Number { field, number } => (field, number.map(FieldValue::Number)),
            RawFieldValue::Date { field, date } => (field, date.map(FieldValue::Date)),
            RawFieldValue::SingleSelect { field, name } => {
                (field, name.map(FieldValue::SingleSelectOption))
            }
            RawFieldValue::Iteration { field, title } => {
                (field, title.map(FieldValue::IterationTitle))
            }
            RawFieldValue::Other => return None,
        };
        Some((field?.name?, value?))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    pub name_with_owner: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemContent {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProjectItem {
    pub id: String,
    #[serde(default)]
    pub content: Option<ItemContent>,
    #[serde(default)]
    pub field_values: Connection<RawFieldValue>,
}

/// A board item whose content is an issue or pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectItem {
    pub id: String,
    pub issue_number: u64,
    pub repository: String,
    pub values: BTreeMap<String, FieldValue>,
}

impl ProjectItem {
    /// Drafts and redacted content have no number or repository and are
    /// dropped here.
    pub fn from_raw(raw: RawProjectItem) -> Option<Self> {
        let content = raw.content?;
        let issue_number = content.number?;
        let repository = content.repository?.name_with_owner;
        let values = raw
            .field_values
            .nodes
            .into_iter()
            .filter_map(RawFieldValue::resolve)
            .collect();
        Some(Self {
            id: raw.id,
            issue_number,
            repository,
            values,
        })
    }
}
