use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::github::transport::DEFAULT_API_URL;

pub const DEFAULT_OWNER: &str = "bromso";
pub const DEFAULT_LABELS_REPO: &str = "connect-the-dots";
pub const DEFAULT_REPO: &str = "uxcel-product-roadmap";
pub const DEFAULT_ISSUES_PROJECT: u64 = 17;
pub const DEFAULT_EPICS_PROJECT: u64 = 18;
pub const DEFAULT_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Direct HTTPS with a bearer token
    #[default]
    Http,
    /// Shell out to the authenticated `gh` CLI
    Gh,
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub github: Option<GitHubConfig>,
    pub projects: Option<ProjectsConfig>,
    pub pacing: Option<PacingConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GitHubConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub transport: Option<TransportKind>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProjectsConfig {
    pub issues: Option<u64>,
    pub epics: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PacingConfig {
    pub delay_ms: Option<u64>,
}

impl AppConfig {
    pub fn owner(&self, arg: Option<String>) -> String {
        arg.or_else(|| self.github.as_ref()?.owner.clone())
            .unwrap_or_else(|| DEFAULT_OWNER.to_string())
    }

    pub fn repo(&self, arg: Option<String>, fallback: &str) -> String {
        arg.or_else(|| self.github.as_ref()?.repo.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn issues_project(&self, arg: Option<u64>) -> u64 {
        arg.or_else(|| self.projects.as_ref()?.issues)
            .unwrap_or(DEFAULT_ISSUES_PROJECT)
    }

    pub fn epics_project(&self, arg: Option<u64>) -> u64 {
        arg.or_else(|| self.projects.as_ref()?.epics)
            .unwrap_or(DEFAULT_EPICS_PROJECT)
    }

    pub fn transport(&self, arg: Option<TransportKind>) -> TransportKind {
        arg.or_else(|| self.github.as_ref()?.transport)
            .unwrap_or_default()
    }

    pub fn api_url(&self) -> &str {
        self.github
            .as_ref()
            .and_then(|g| g.api_url.as_deref())
            .unwrap_or(DEFAULT_API_URL)
    }

    /// Argument, then `env_token` (normally `GITHUB_TOKEN`), then the config file.
    /// Blank values at any level fall through to the next one.
    pub fn token(&self, arg: Option<String>, env_token: Option<String>) -> Option<String> {
        let nonblank = |t: String| {
            let t = t.trim();
            (!t.is_empty()).then(|| t.to_string())
        };
        arg.and_then(nonblank)
            .or_else(|| env_token.and_then(nonblank))
            .or_else(|| self.github.as_ref()?.token.clone().and_then(nonblank))
    }

    pub fn delay(&self) -> Duration {
        let ms = self
            .pacing
            .as_ref()
            .and_then(|p| p.delay_ms)
            .unwrap_or(DEFAULT_DELAY_MS);
        Duration::from_millis(ms)
    }
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".boardops")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    let path = config_path();
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).with_context(|| "Failed to parse config.toml")
}
