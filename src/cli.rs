use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, AppConfig, TransportKind, DEFAULT_LABELS_REPO, DEFAULT_REPO};
use crate::github::transport::gh_auth_token;
use crate::github::{self, GitHubClient};
use crate::jobs;
use crate::jobs::link::{LinkStrategy, LinkTarget};
use crate::model::field::load_project_config;
use crate::model::issue_record::{index_by_title, load_issue_records, IssueRecord};
use crate::model::label::{default_labels, load_labels};
use crate::model::milestone::{default_milestones, load_milestones};
use crate::util::pacing::Pacing;

const DEFAULT_ISSUES_FILE: &str = "issues.jsonl";

#[derive(Parser)]
#[command(name = "boardops")]
#[command(about = "Seed labels, milestones and project fields, and link Epics on GitHub", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// How to reach GitHub
    #[arg(long, global = true, value_enum, env = "BOARDOPS_TRANSPORT")]
    pub transport: Option<TransportKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update repository labels
    Labels {
        owner: Option<String>,
        repo: Option<String>,
        token: Option<String>,

        /// JSON array of labels to use instead of the built-in set
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Create or update repository milestones
    Milestones {
        owner: Option<String>,
        repo: Option<String>,
        token: Option<String>,

        /// JSON array of milestones to use instead of the built-in set
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Create custom fields on a project board
    Fields {
        owner: Option<String>,
        project: Option<u64>,
        token: Option<String>,

        /// Field definitions
        #[arg(short, long, default_value = "project_config.json")]
        config: PathBuf,
    },

    /// Link child issues to their Epics
    Link {
        owner: Option<String>,
        repo: Option<String>,
        epics_project: Option<u64>,
        issues_project: Option<u64>,

        #[arg(short, long, value_enum, default_value_t = LinkStrategy::Checklist)]
        strategy: LinkStrategy,

        /// Epic Links for items whose board field is empty (defaults to ./issues.jsonl when present)
        #[arg(long)]
        issues_file: Option<PathBuf>,

        #[arg(long)]
        token: Option<String>,
    },

    /// Push OKR, story points and dates from issues.jsonl onto a board
    UpdateFields {
        owner: Option<String>,
        project: Option<u64>,

        #[arg(long, default_value = DEFAULT_ISSUES_FILE)]
        issues_file: PathBuf,

        #[arg(long)]
        token: Option<String>,
    },
}

/// Pick a transport and a token. For HTTP the token comes from the argument,
/// `GITHUB_TOKEN`, the config file, then `gh auth token`.
async fn connect(
    config: &AppConfig,
    transport: Option<TransportKind>,
    token: Option<String>,
) -> Result<GitHubClient> {
    let kind = config.transport(transport);
    let mut token = config.token(token, std::env::var("GITHUB_TOKEN").ok());
    if token.is_none() && kind == TransportKind::Http {
        token = gh_auth_token().await;
    }
    if token.is_none() && kind == TransportKind::Http {
        bail!(
            "GitHub token is required.\n\nPass it as an argument, set GITHUB_TOKEN, add it to ~/.boardops/config.toml,\nlog in with `gh auth login`, or use --transport gh."
        );
    }
    let client = github::connect(kind, token, config.api_url())?;
    tracing::debug!(transport = client.transport_name(), "connected");
    Ok(client)
}

fn load_records(path: &Path) -> Result<HashMap<String, IssueRecord>> {
    let records = load_issue_records(path)?;
    println!("Loaded {} issue records from {}", records.len(), path.display());
    Ok(index_by_title(records))
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = config::load_config()?;
    let pacing = Pacing::new(config.delay());
    let mut out = io::stdout();

    match cli.command {
        Commands::Labels {
            owner,
            repo,
            token,
            file,
        } => {
            let labels = match file {
                Some(path) => load_labels(&path)?,
                None => default_labels()?,
            };
            let owner = config.owner(owner);
            let repo = config.repo(repo, DEFAULT_LABELS_REPO);
            let client = connect(&config, cli.transport, token).await?;
            jobs::labels::seed_labels(&client, &owner, &repo, &labels, pacing, &mut out).await?;
        }
        Commands::Milestones {
            owner,
            repo,
            token,
            file,
        } => {
            let milestones = match file {
                Some(path) => load_milestones(&path)?,
                None => default_milestones()?,
            };
            let owner = config.owner(owner);
            let repo = config.repo(repo, DEFAULT_REPO);
            let client = connect(&config, cli.transport, token).await?;
            jobs::milestones::seed_milestones(&client, &owner, &repo, &milestones, pacing, &mut out)
                .await?;
        }
        Commands::Fields {
            owner,
            project,
            token,
            config: config_file,
        } => {
            let project_config = load_project_config(&config_file)?;
            let owner = config.owner(owner);
            let project = config.issues_project(project);
            let client = connect(&config, cli.transport, token).await?;
            jobs::fields::configure_fields(
                &client,
                &owner,
                project,
                &project_config.project.fields,
                pacing,
                &mut out,
            )
            .await?;
        }
        Commands::Link {
            owner,
            repo,
            epics_project,
            issues_project,
            strategy,
            issues_file,
            token,
        } => {
            let issues_file = issues_file.or_else(|| {
                let default = PathBuf::from(DEFAULT_ISSUES_FILE);
                default.exists().then_some(default)
            });
            let records = match issues_file {
                Some(path) => load_records(&path)?,
                None => HashMap::new(),
            };
            let owner = config.owner(owner);
            let repo = config.repo(repo, DEFAULT_REPO);
            let target = LinkTarget {
                owner: &owner,
                repo: &repo,
                epics_project: config.epics_project(epics_project),
                issues_project: config.issues_project(issues_project),
            };
            let client = connect(&config, cli.transport, token).await?;
            jobs::link::link_epics(&client, target, strategy, &records, pacing, &mut out).await?;
        }
        Commands::UpdateFields {
            owner,
            project,
            issues_file,
            token,
        } => {
            let records = load_records(&issues_file)?;
            let owner = config.owner(owner);
            let project = config.issues_project(project);
            let client = connect(&config, cli.transport, token).await?;
            jobs::update_fields::update_fields(&client, &owner, project, &records, pacing, &mut out)
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_arguments_are_optional() {
        let cli = Cli::try_parse_from(["boardops", "labels"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Labels {
                owner: None,
                repo: None,
                token: None,
                file: None
            }
        ));
    }

    #[test]
    fn labels_take_owner_repo_token() {
        let cli = Cli::try_parse_from(["boardops", "labels", "acme", "site", "ghp_x"]).unwrap();
        match cli.command {
            Commands::Labels {
                owner, repo, token, ..
            } => {
                assert_eq!(owner.as_deref(), Some("acme"));
                assert_eq!(repo.as_deref(), Some("site"));
                assert_eq!(token.as_deref(), Some("ghp_x"));
            }
            _ => panic!("expected labels"),
        }
    }

    #[test]
    fn link_defaults_to_checklist() {
        let cli = Cli::try_parse_from(["boardops", "link", "acme", "roadmap", "18", "17"]).unwrap();
        match cli.command {
            Commands::Link {
                strategy,
                epics_project,
                issues_project,
                issues_file,
                ..
            } => {
                assert_eq!(strategy, LinkStrategy::Checklist);
                assert_eq!(epics_project, Some(18));
                assert_eq!(issues_project, Some(17));
                assert_eq!(issues_file, None);
            }
            _ => panic!("expected link"),
        }
    }

    #[test]
    fn strategy_and_transport_parse() {
        let cli = Cli::try_parse_from([
            "boardops",
            "link",
            "--strategy",
            "parent-issue",
            "--transport",
            "gh",
        ])
        .unwrap();
        assert_eq!(cli.transport, Some(TransportKind::Gh));
        assert!(matches!(
            cli.command,
            Commands::Link {
                strategy: LinkStrategy::ParentIssue,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["boardops", "link", "--strategy", "magic"]).is_err());
    }

    #[test]
    fn update_fields_defaults_issues_file() {
        let cli = Cli::try_parse_from(["boardops", "update-fields"]).unwrap();
        match cli.command {
            Commands::UpdateFields { issues_file, .. } => {
                assert_eq!(issues_file, PathBuf::from("issues.jsonl"));
            }
            _ => panic!("expected update-fields"),
        }
    }

    #[test]
    fn project_number_must_be_numeric() {
        assert!(Cli::try_parse_from(["boardops", "fields", "acme", "seventeen"]).is_err());
    }
}
