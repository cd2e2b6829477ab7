use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use serde_json::json;

use super::error::ApiError;
use super::transport::HttpTransport;
use super::{FieldInput, GitHubClient, ProjectRef, ProjectsApi};
use crate::model::field::{FieldSpec, ProjectField};
use crate::model::item::{ContentKind, FieldData, FieldValue, ItemContent, ProjectItem, EPIC_LINK_FIELD};

/// Mutations seen by `RecordingApi`, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateField(String),
    AddItem { project: String, content: String },
    SetFieldValue { item: String, field: String, value: FieldInput },
    AddSubIssue { parent: String, child: String },
    UpdateIssueBody { number: u64, body: String },
}

/// In-memory board backend that records every mutation.
#[derive(Default)]
pub struct RecordingApi {
    projects: HashMap<u64, ProjectRef>,
    items: Mutex<HashMap<String, Vec<ProjectItem>>>,
    fields: Vec<ProjectField>,
    bodies: Mutex<HashMap<u64, String>>,
    field_errors: HashMap<String, String>,
    failing_mutations: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, number: u64, id: &str, title: &str) -> Self {
        self.projects.insert(
            number,
            ProjectRef {
                id: id.to_string(),
                title: title.to_string(),
            },
        );
        self
    }

    pub fn with_items(self, project_id: &str, items: Vec<ProjectItem>) -> Self {
        self.items
            .lock()
            .unwrap()
            .insert(project_id.to_string(), items);
        self
    }

    pub fn with_fields(mut self, fields: Vec<ProjectField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_body(self, number: u64, body: &str) -> Self {
        self.bodies.lock().unwrap().insert(number, body.to_string());
        self
    }

    pub fn with_field_error(mut self, field: &str, message: &str) -> Self {
        self.field_errors
            .insert(field.to_string(), message.to_string());
        self
    }

    /// Every mutation fails.
    pub fn with_failures(mut self) -> Self {
        self.failing_mutations = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        if self.failing_mutations {
            return Err(ApiError::Graphql(vec!["Mock failure".into()]));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectsApi for RecordingApi {
    async fn project(&self, owner: &str, number: u64) -> Result<ProjectRef, ApiError> {
        self.projects
            .get(&number)
            .cloned()
            .ok_or_else(|| ApiError::Unexpected(format!("project #{number} not found for {owner}")))
    }

    async fn items(&self, project_id: &str) -> Result<Vec<ProjectItem>, ApiError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fields(&self, _project_id: &str) -> Result<Vec<ProjectField>, ApiError> {
        Ok(self.fields.clone())
    }

    async fn create_field(&self, _project_id: &str, spec: &FieldSpec) -> Result<String, ApiError> {
        self.record(Call::CreateField(spec.name.clone()))?;
        match self.field_errors.get(&spec.name) {
            Some(message) => Err(ApiError::Graphql(vec![message.clone()])),
            None => Ok(format!("PVTF_{}", spec.name)),
        }
    }

    async fn add_item(&self, project_id: &str, content_id: &str) -> Result<String, ApiError> {
        self.record(Call::AddItem {
            project: project_id.to_string(),
            content: content_id.to_string(),
        })?;
        Ok(format!("PVTI_added_{content_id}"))
    }

    async fn set_field_value(
        &self,
        _project_id: &str,
        item_id: &str,
        field_id: &str,
        value: &FieldInput,
    ) -> Result<(), ApiError> {
        self.record(Call::SetFieldValue {
            item: item_id.to_string(),
            field: field_id.to_string(),
            value: value.clone(),
        })
    }

    async fn add_sub_issue(
        &self,
        parent_issue_id: &str,
        child_issue_id: &str,
    ) -> Result<(), ApiError> {
        self.record(Call::AddSubIssue {
            parent: parent_issue_id.to_string(),
            child: child_issue_id.to_string(),
        })
    }

    async fn issue_body(&self, _owner: &str, _repo: &str, number: u64) -> Result<String, ApiError> {
        self.bodies
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or(ApiError::Status {
                status: 404,
                body: "Not Found".into(),
            })
    }

    async fn update_issue_body(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), ApiError> {
        self.record(Call::UpdateIssueBody {
            number,
            body: body.to_string(),
        })?;
        self.bodies.lock().unwrap().insert(number, body.to_string());
        Ok(())
    }
}

pub fn issue_item(key: &str, number: u64, title: &str) -> ProjectItem {
    ProjectItem {
        id: format!("PVTI_{key}"),
        content: Some(ItemContent {
            id: format!("I_{key}"),
            number: Some(number),
            title: title.to_string(),
            kind: ContentKind::Issue,
        }),
        field_values: vec![],
    }
}

pub fn draft_item(key: &str, title: &str) -> ProjectItem {
    ProjectItem {
        id: format!("PVTI_{key}"),
        content: Some(ItemContent {
            id: format!("DI_{key}"),
            number: None,
            title: title.to_string(),
            kind: ContentKind::DraftIssue,
        }),
        field_values: vec![],
    }
}

pub fn linked(mut item: ProjectItem, epic_link: &str) -> ProjectItem {
    item.field_values.push(FieldValue {
        field: EPIC_LINK_FIELD.to_string(),
        value: FieldData::Text(epic_link.to_string()),
    });
    item
}

pub fn http_client(server: &Server) -> GitHubClient {
    let transport = HttpTransport::with_api_url("test-token".into(), &server.url()).unwrap();
    GitHubClient::new(Box::new(transport))
}

#[tokio::test]
async fn recording_api_tracks_mutations() {
    let api = RecordingApi::new();
    api.add_item("PVT_1", "I_1").await.unwrap();
    api.add_sub_issue("I_epic", "I_1").await.unwrap();
    assert_eq!(
        api.calls(),
        vec![
            Call::AddItem {
                project: "PVT_1".into(),
                content: "I_1".into()
            },
            Call::AddSubIssue {
                parent: "I_epic".into(),
                child: "I_1".into()
            },
        ]
    );
}

#[tokio::test]
async fn graphql_sends_bearer_and_variables() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/graphql")
        .match_header("authorization", "Bearer test-token")
        .match_header("x-github-api-version", "2022-11-28")
        .match_body(Matcher::PartialJson(json!({
            "variables": {"owner": "bromso", "number": 17}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"data": {"repositoryOwner": {"projectV2": {"id": "PVT_17", "title": "Roadmap"}}}})
                .to_string(),
        )
        .create_async()
        .await;

    let client = http_client(&server);
    let project = client.project("bromso", 17).await.unwrap();

    assert_eq!(project.id, "PVT_17");
    assert_eq!(project.title, "Roadmap");
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_project_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(json!({"data": {"repositoryOwner": null}}).to_string())
        .create_async()
        .await;

    let client = http_client(&server);
    let err = client.project("nobody", 1).await.unwrap_err();
    assert!(err.to_string().contains("project #1 not found"));
}

#[tokio::test]
async fn graphql_errors_surface_messages() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(json!({"data": null, "errors": [{"message": "Name has already been taken"}]}).to_string())
        .create_async()
        .await;

    let client = http_client(&server);
    let spec: FieldSpec = serde_json::from_value(json!({"name": "OKR", "type": "text"})).unwrap();
    let err = client.create_field("PVT_1", &spec).await.unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn items_follow_pagination() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/graphql")
        .match_body(Matcher::PartialJson(json!({"variables": {"cursor": null}})))
        .with_status(200)
        .with_body(
            json!({"data": {"node": {"items": {
                "nodes": [{"id": "PVTI_1", "content": {"__typename": "Issue", "id": "I_1", "number": 1, "title": "One"}, "fieldValues": {"nodes": []}}],
                "pageInfo": {"hasNextPage": true, "endCursor": "c1"}
            }}}})
            .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("POST", "/graphql")
        .match_body(Matcher::PartialJson(json!({"variables": {"cursor": "c1"}})))
        .with_status(200)
        .with_body(
            json!({"data": {"node": {"items": {
                "nodes": [{"id": "PVTI_2", "content": {"__typename": "DraftIssue", "id": "DI_2", "title": "Two"}, "fieldValues": {"nodes": []}}],
                "pageInfo": {"hasNextPage": false, "endCursor": null}
            }}}})
            .to_string(),
        )
        .create_async()
        .await;

    let client = http_client(&server);
    let items = client.items("PVT_1").await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title(), Some("One"));
    assert_eq!(items[1].issue_id(), None);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn server_errors_keep_status() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/graphql")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let client = http_client(&server);
    let err = client.fields("PVT_1").await.unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn issue_body_round_trip_over_rest() {
    let mut server = Server::new_async().await;
    let get = server
        .mock("GET", "/repos/o/r/issues/5")
        .with_status(200)
        .with_body(json!({"number": 5, "body": null}).to_string())
        .create_async()
        .await;
    let patch = server
        .mock("PATCH", "/repos/o/r/issues/5")
        .match_body(Matcher::Json(json!({"body": "hello"})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = http_client(&server);
    assert_eq!(client.issue_body("o", "r", 5).await.unwrap(), "");
    client.update_issue_body("o", "r", 5, "hello").await.unwrap();

    get.assert_async().await;
    patch.assert_async().await;
}
