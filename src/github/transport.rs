use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

use super::error::ApiError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: String,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an error, keep the rest.
    pub fn into_result(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// A way of reaching GitHub. Both ends speak the same REST paths and GraphQL
/// documents; only the plumbing differs.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// `path` is relative to the API root, e.g. `repos/o/r/labels`.
    async fn rest(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RestResponse, ApiError>;

    /// Returns the `data` member. GraphQL-level errors become `ApiError::Graphql`.
    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, ApiError>;
}

#[derive(Deserialize)]
struct GqlEnvelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

fn unwrap_envelope(envelope: GqlEnvelope) -> Result<Value, ApiError> {
    if !envelope.errors.is_empty() {
        return Err(ApiError::Graphql(
            envelope.errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::Unexpected("GraphQL response without data".into()))
}

/// Direct HTTPS with a bearer token.
pub struct HttpTransport {
    client: reqwest::Client,
    token: String,
    api_url: String,
}

impl HttpTransport {
    pub fn with_api_url(token: String, api_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("boardops/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            token,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn rest(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RestResponse, ApiError> {
        tracing::debug!(%method, path, "REST request");
        let mut req = self.request(method, path);
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").json(body);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(RestResponse { status, body })
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        tracing::debug!("GraphQL request");
        let payload = serde_json::json!({ "query": query, "variables": variables });
        let resp = self
            .request(Method::POST, "graphql")
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Status { status, body });
        }
        unwrap_envelope(serde_json::from_str(&body)?)
    }
}

/// The `gh` CLI, which carries its own authentication.
pub struct GhCliTransport {
    program: String,
}

impl GhCliTransport {
    pub fn new() -> Self {
        Self::with_program("gh")
    }

    /// Run a different executable with `gh`'s interface.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str], stdin: &[u8]) -> Result<std::process::Output, ApiError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ApiError::Cli(format!("failed to run {}: {e}", self.program)))?;

        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin)
                .await
                .map_err(|e| ApiError::Cli(format!("failed to write request: {e}")))?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| ApiError::Cli(format!("{} did not finish: {e}", self.program)))
    }
}

impl Default for GhCliTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for GhCliTransport {
    fn name(&self) -> &str {
        "gh"
    }

    async fn rest(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RestResponse, ApiError> {
        tracing::debug!(%method, path, "gh api");
        let input = match body {
            Some(body) => serde_json::to_vec(body)?,
            None => Vec::new(),
        };
        let mut args = vec!["api", path, "-X", method.as_str(), "--include"];
        if body.is_some() {
            args.extend(["--input", "-"]);
        }

        // gh exits non-zero on 4xx/5xx but still prints the response.
        let output = self.run(&args, &input).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_included_response(&stdout).ok_or_else(|| {
            ApiError::Cli(String::from_utf8_lossy(&output.stderr).trim().to_string())
        })
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        tracing::debug!("gh api graphql");
        let payload = serde_json::json!({ "query": query, "variables": variables });
        let input = serde_json::to_vec(&payload)?;
        let output = self.run(&["api", "graphql", "--input", "-"], &input).await?;

        match serde_json::from_slice::<GqlEnvelope>(&output.stdout) {
            Ok(envelope) => unwrap_envelope(envelope),
            Err(_) if !output.status.success() => Err(ApiError::Cli(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Split `gh api --include` output into status and body.
/// Expects a status line such as `HTTP/2.0 201 Created`, headers, a blank line, then the body.
pub fn parse_included_response(raw: &str) -> Option<RestResponse> {
    if !raw.starts_with("HTTP/") {
        return None;
    }
    let status_line = raw.lines().next()?;
    let status = status_line.split_whitespace().nth(1)?.parse().ok()?;

    let body = match (raw.find("\r\n\r\n"), raw.find("\n\n")) {
        (Some(crlf), Some(lf)) if lf < crlf => &raw[lf + 2..],
        (Some(crlf), _) => &raw[crlf + 4..],
        (None, Some(lf)) => &raw[lf + 2..],
        (None, None) => "",
    };

    Some(RestResponse {
        status,
        body: body.trim().to_string(),
    })
}

/// The token `gh` is logged in with, if any.
pub async fn gh_auth_token() -> Option<String> {
    let output = tokio::process::Command::new("gh")
        .args(["auth", "token"])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}
