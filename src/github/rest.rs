use reqwest::Method;
use serde_json::{json, Value};

use super::error::ApiError;
use super::GitHubClient;
use crate::model::label::LabelSpec;
use crate::model::milestone::{ExistingMilestone, MilestoneSpec};

const PAGE_SIZE: usize = 100;

fn label_payload(label: &LabelSpec) -> Value {
    let mut payload = json!({ "name": label.name, "color": label.color() });
    if let Some(description) = label.description() {
        payload["description"] = json!(description);
    }
    payload
}

impl GitHubClient {
    /// POST a label. A 422 comes back as `ApiError::Status` for the caller to
    /// treat as "already exists".
    pub async fn create_label(&self, owner: &str, repo: &str, label: &LabelSpec) -> Result<(), ApiError> {
        self.transport
            .rest(
                Method::POST,
                &format!("repos/{owner}/{repo}/labels"),
                Some(&label_payload(label)),
            )
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn update_label(&self, owner: &str, repo: &str, label: &LabelSpec) -> Result<(), ApiError> {
        let name = urlencoding::encode(&label.name);
        self.transport
            .rest(
                Method::PATCH,
                &format!("repos/{owner}/{repo}/labels/{name}"),
                Some(&label_payload(label)),
            )
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn create_milestone(
        &self,
        owner: &str,
        repo: &str,
        milestone: &MilestoneSpec,
    ) -> Result<(), ApiError> {
        self.transport
            .rest(
                Method::POST,
                &format!("repos/{owner}/{repo}/milestones"),
                Some(&serde_json::to_value(milestone)?),
            )
            .await?
            .into_result()?;
        Ok(())
    }

    /// All milestones, open and closed.
    pub async fn list_milestones(&self, owner: &str, repo: &str) -> Result<Vec<ExistingMilestone>, ApiError> {
        let mut all = Vec::new();
        for page in 1.. {
            let resp = self
                .transport
                .rest(
                    Method::GET,
                    &format!("repos/{owner}/{repo}/milestones?state=all&per_page={PAGE_SIZE}&page={page}"),
                    None,
                )
                .await?
                .into_result()?;
            let batch: Vec<ExistingMilestone> = resp.json()?;
            let done = batch.len() < PAGE_SIZE;
            all.extend(batch);
            if done {
                break;
            }
        }
        Ok(all)
    }

    pub async fn update_milestone(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        milestone: &MilestoneSpec,
    ) -> Result<(), ApiError> {
        self.transport
            .rest(
                Method::PATCH,
                &format!("repos/{owner}/{repo}/milestones/{number}"),
                Some(&serde_json::to_value(milestone)?),
            )
            .await?
            .into_result()?;
        Ok(())
    }
}
