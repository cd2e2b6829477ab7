pub mod error;
pub mod projects;
pub mod queries;
pub mod rest;
pub mod transport;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::TransportKind;
use crate::model::field::{FieldSpec, ProjectField};
use crate::model::item::ProjectItem;
use error::ApiError;
use transport::{GhCliTransport, HttpTransport, Transport};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub title: String,
}

/// A value to write into a board field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// Option id, not option name.
    SingleSelect(String),
}

impl FieldInput {
    /// The `ProjectV2FieldValue` input object.
    pub fn to_value(&self) -> Value {
        match self {
            FieldInput::Text(text) => json!({ "text": text }),
            FieldInput::Number(n) => json!({ "number": n }),
            FieldInput::Date(d) => json!({ "date": d.format("%Y-%m-%d").to_string() }),
            FieldInput::SingleSelect(id) => json!({ "singleSelectOptionId": id }),
        }
    }
}

/// Board and issue operations the jobs need.
#[async_trait]
pub trait ProjectsApi: Send + Sync {
    async fn project(&self, owner: &str, number: u64) -> Result<ProjectRef, ApiError>;

    /// Every item on the board, following pagination.
    async fn items(&self, project_id: &str) -> Result<Vec<ProjectItem>, ApiError>;

    async fn fields(&self, project_id: &str) -> Result<Vec<ProjectField>, ApiError>;

    /// Returns the new field's id.
    async fn create_field(&self, project_id: &str, spec: &FieldSpec) -> Result<String, ApiError>;

    /// Returns the board item id for the content.
    async fn add_item(&self, project_id: &str, content_id: &str) -> Result<String, ApiError>;

    async fn set_field_value(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        value: &FieldInput,
    ) -> Result<(), ApiError>;

    async fn add_sub_issue(&self, parent_issue_id: &str, child_issue_id: &str)
        -> Result<(), ApiError>;

    async fn issue_body(&self, owner: &str, repo: &str, number: u64) -> Result<String, ApiError>;

    async fn update_issue_body(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), ApiError>;
}

pub struct GitHubClient {
    transport: Box<dyn Transport>,
}

impl GitHubClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }
}

/// Build a client for the chosen transport. HTTP needs a token; `gh` brings its own.
pub fn connect(kind: TransportKind, token: Option<String>, api_url: &str) -> Result<GitHubClient> {
    let transport: Box<dyn Transport> = match kind {
        TransportKind::Http => {
            let Some(token) = token else {
                bail!("GitHub token is required for the http transport");
            };
            Box::new(HttpTransport::with_api_url(token, api_url)?)
        }
        TransportKind::Gh => Box::new(GhCliTransport::new()),
    };
    Ok(GitHubClient::new(transport))
}

#[cfg(test)]
pub mod tests;
