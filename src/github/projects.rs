use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::{queries, FieldInput, GitHubClient, ProjectRef, ProjectsApi};
use crate::model::field::{FieldDataType, FieldSpec, ProjectField, SelectOption};
use crate::model::item::{ContentKind, FieldData, FieldValue, ItemContent, ProjectItem};

#[derive(Deserialize)]
struct ProjectData {
    #[serde(rename = "repositoryOwner")]
    owner: Option<OwnerNode>,
}

#[derive(Deserialize)]
struct OwnerNode {
    #[serde(rename = "projectV2")]
    project: Option<ProjectRef>,
}

#[derive(Deserialize)]
struct NodeData<T> {
    node: Option<T>,
}

#[derive(Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<Option<T>>,
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ItemsNode {
    items: Connection<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    id: String,
    content: Option<RawContent>,
    #[serde(rename = "fieldValues")]
    field_values: Option<Connection<RawFieldValue>>,
}

#[derive(Deserialize)]
struct RawContent {
    #[serde(rename = "__typename")]
    typename: String,
    id: Option<String>,
    number: Option<u64>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct RawFieldValue {
    #[serde(rename = "__typename", default)]
    typename: String,
    text: Option<String>,
    name: Option<String>,
    number: Option<f64>,
    date: Option<String>,
    field: Option<RawFieldRef>,
}

#[derive(Deserialize)]
struct RawFieldRef {
    name: Option<String>,
}

#[derive(Deserialize)]
struct FieldsNode {
    fields: Connection<RawField>,
}

#[derive(Deserialize)]
struct RawField {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "dataType")]
    data_type: Option<FieldDataType>,
    #[serde(default)]
    options: Vec<RawOption>,
}

#[derive(Deserialize)]
struct RawOption {
    id: String,
    name: String,
}

impl RawContent {
    fn into_content(self) -> Option<ItemContent> {
        let kind = match self.typename.as_str() {
            "Issue" => ContentKind::Issue,
            "DraftIssue" => ContentKind::DraftIssue,
            _ => return None,
        };
        Some(ItemContent {
            id: self.id?,
            number: self.number,
            title: self.title.unwrap_or_default(),
            kind,
        })
    }
}

impl RawFieldValue {
    fn into_value(self) -> Option<FieldValue> {
        let field = self.field?.name?;
        let value = match self.typename.as_str() {
            "ProjectV2ItemFieldTextValue" => FieldData::Text(self.text?),
            "ProjectV2ItemFieldSingleSelectValue" => FieldData::SingleSelect(self.name?),
            "ProjectV2ItemFieldNumberValue" => FieldData::Number(self.number?),
            "ProjectV2ItemFieldDateValue" => {
                let raw = self.date?;
                match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                    Ok(date) => FieldData::Date(date),
                    Err(_) => {
                        tracing::warn!(field = %field, value = %raw, "unparseable date value");
                        return None;
                    }
                }
            }
            _ => return None,
        };
        Some(FieldValue { field, value })
    }
}

impl RawItem {
    fn into_item(self) -> ProjectItem {
        let field_values = self
            .field_values
            .map(|c| c.nodes.into_iter().flatten().filter_map(RawFieldValue::into_value).collect())
            .unwrap_or_default();
        ProjectItem {
            id: self.id,
            content: self.content.and_then(RawContent::into_content),
            field_values,
        }
    }
}

/// First day on or after `today` that falls on `weekday`.
pub fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
    today + Duration::days(i64::from(ahead))
}

/// `CreateProjectV2FieldInput` for a configured field.
pub fn create_field_input(
    project_id: &str,
    spec: &FieldSpec,
    today: NaiveDate,
) -> Result<Value, ApiError> {
    let data_type = spec
        .data_type()
        .ok_or_else(|| ApiError::Unexpected(format!("unknown field type: {}", spec.kind)))?;

    let mut input = json!({
        "projectId": project_id,
        "dataType": data_type.as_str(),
        "name": spec.name,
    });

    match data_type {
        FieldDataType::SingleSelect => {
            let options: Vec<Value> = spec
                .options
                .iter()
                .map(|o| {
                    json!({
                        "name": o.name(),
                        "color": o.color(),
                        "description": o.description(),
                    })
                })
                .collect();
            input["singleSelectOptions"] = Value::Array(options);
        }
        FieldDataType::Iteration => {
            let settings = spec.iteration();
            let start = next_weekday(today, settings.start_day());
            input["iterationConfiguration"] = json!({
                "duration": settings.duration_days(),
                "startDate": start.format("%Y-%m-%d").to_string(),
                "iterations": [],
            });
        }
        _ => {}
    }

    Ok(input)
}

fn pointer_str(data: &Value, pointer: &str) -> Result<String, ApiError> {
    data.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unexpected(format!("missing {pointer} in response")))
}

#[derive(Deserialize)]
struct IssueBody {
    body: Option<String>,
}

#[async_trait]
impl ProjectsApi for GitHubClient {
    async fn project(&self, owner: &str, number: u64) -> Result<ProjectRef, ApiError> {
        let data = self
            .transport
            .graphql(queries::PROJECT, json!({ "owner": owner, "number": number }))
            .await?;
        let parsed: ProjectData = serde_json::from_value(data)?;
        parsed
            .owner
            .and_then(|o| o.project)
            .ok_or_else(|| ApiError::Unexpected(format!("project #{number} not found for {owner}")))
    }

    async fn items(&self, project_id: &str) -> Result<Vec<ProjectItem>, ApiError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let data = self
                .transport
                .graphql(
                    queries::ITEMS,
                    json!({ "projectId": project_id, "cursor": cursor }),
                )
                .await?;
            let parsed: NodeData<ItemsNode> = serde_json::from_value(data)?;
            let Some(node) = parsed.node else {
                return Err(ApiError::Unexpected(format!("project {project_id} not found")));
            };

            all.extend(node.items.nodes.into_iter().flatten().map(RawItem::into_item));

            match node.items.page_info {
                Some(PageInfo {
                    has_next_page: true,
                    end_cursor: Some(next),
                }) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(all)
    }

    async fn fields(&self, project_id: &str) -> Result<Vec<ProjectField>, ApiError> {
        let data = self
            .transport
            .graphql(queries::FIELDS, json!({ "projectId": project_id }))
            .await?;
        let parsed: NodeData<FieldsNode> = serde_json::from_value(data)?;
        let node = parsed
            .node
            .ok_or_else(|| ApiError::Unexpected(format!("project {project_id} not found")))?;

        Ok(node
            .fields
            .nodes
            .into_iter()
            .flatten()
            .filter_map(|f| {
                Some(ProjectField {
                    id: f.id?,
                    name: f.name?,
                    data_type: f.data_type.unwrap_or(FieldDataType::Other),
                    options: f
                        .options
                        .into_iter()
                        .map(|o| SelectOption {
                            id: o.id,
                            name: o.name,
                        })
                        .collect(),
                })
            })
            .collect())
    }

    async fn create_field(&self, project_id: &str, spec: &FieldSpec) -> Result<String, ApiError> {
        let today = chrono::Local::now().date_naive();
        let input = create_field_input(project_id, spec, today)?;
        let data = self
            .transport
            .graphql(queries::CREATE_FIELD, json!({ "input": input }))
            .await?;
        pointer_str(&data, "/createProjectV2Field/projectV2Field/id")
    }

    async fn add_item(&self, project_id: &str, content_id: &str) -> Result<String, ApiError> {
        let data = self
            .transport
            .graphql(
                queries::ADD_ITEM,
                json!({ "projectId": project_id, "contentId": content_id }),
            )
            .await?;
        pointer_str(&data, "/addProjectV2ItemById/item/id")
    }

    async fn set_field_value(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        value: &FieldInput,
    ) -> Result<(), ApiError> {
        let data = self
            .transport
            .graphql(
                queries::UPDATE_FIELD_VALUE,
                json!({
                    "projectId": project_id,
                    "itemId": item_id,
                    "fieldId": field_id,
                    "value": value.to_value(),
                }),
            )
            .await?;
        pointer_str(&data, "/updateProjectV2ItemFieldValue/projectV2Item/id").map(|_| ())
    }

    async fn add_sub_issue(
        &self,
        parent_issue_id: &str,
        child_issue_id: &str,
    ) -> Result<(), ApiError> {
        self.transport
            .graphql(
                queries::ADD_SUB_ISSUE,
                json!({ "issueId": parent_issue_id, "subIssueId": child_issue_id }),
            )
            .await?;
        Ok(())
    }

    async fn issue_body(&self, owner: &str, repo: &str, number: u64) -> Result<String, ApiError> {
        let resp = self
            .transport
            .rest(Method::GET, &format!("repos/{owner}/{repo}/issues/{number}"), None)
            .await?
            .into_result()?;
        let issue: IssueBody = resp.json()?;
        Ok(issue.body.unwrap_or_default())
    }

    async fn update_issue_body(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), ApiError> {
        self.transport
            .rest(
                Method::PATCH,
                &format!("repos/{owner}/{repo}/issues/{number}"),
                Some(&json!({ "body": body })),
            )
            .await?
            .into_result()?;
        Ok(())
    }
}
