//! Split configuration: the `Change` document, its settings and domains.
//!
//! A configuration is loaded once, validated, and then only the per-domain
//! `branch` / `pull_request` slots are filled in during a run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::utils::io;

pub const DEFAULT_CONFIG_PATH: &str = "bit_config.json";

pub const DEFAULT_BRANCH_NAME_TEMPLATE: &str = "split/{{change_id}}/{{domain_id}}";
pub const DEFAULT_COMMIT_MSG_TEMPLATE: &str = "[{{change_id}}] {{domain_name}}";
pub const DEFAULT_PR_NAME_TEMPLATE: &str = "[{{change_id}}] {{domain_name}}";
pub const DEFAULT_RESULT_TEMPLATE: &str = "[{{branch_name}}]({{pr_url}})";

const CHANGE_ID_TOKEN: &str = "{{change_id}}";
const DOMAIN_ID_TOKEN: &str = "{{domain_id}}";

/// One top-level split operation covering every configured domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Settings")]
    pub settings: Settings,
    #[serde(rename = "Domains")]
    pub domains: Vec<Domain>,
}

/// On-disk shape; required sections stay optional until validated.
#[derive(Debug, Deserialize)]
struct ChangeDocument {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Settings")]
    settings: Option<Settings>,
    #[serde(rename = "Domains", default)]
    domains: Vec<Domain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(default)]
    pub main_branch: String,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub branch_to_split: String,
    #[serde(default)]
    pub is_draft_prs: bool,
    #[serde(default)]
    pub allow_deletions: bool,
    #[serde(default = "default_repo_path")]
    pub repo_path: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default = "default_branch_name_template")]
    pub branch_name_template: String,
    #[serde(default = "default_commit_msg_template")]
    pub commit_msg_template: String,
    #[serde(default = "default_pr_name_template")]
    pub pr_name_template: String,
    #[serde(default)]
    pub pr_desc_template: String,
    #[serde(default = "default_result_template")]
    pub result_template: String,
}

fn default_repo_path() -> String {
    ".".to_string()
}

fn default_branch_name_template() -> String {
    DEFAULT_BRANCH_NAME_TEMPLATE.to_string()
}

fn default_commit_msg_template() -> String {
    DEFAULT_COMMIT_MSG_TEMPLATE.to_string()
}

fn default_pr_name_template() -> String {
    DEFAULT_PR_NAME_TEMPLATE.to_string()
}

fn default_result_template() -> String {
    DEFAULT_RESULT_TEMPLATE.to_string()
}

impl Settings {
    /// Working tree every VCS command runs in, with `~` expanded.
    pub fn repo_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.repo_path).to_string())
    }
}

/// A path-scoped slice of the repository that becomes one branch and PR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Domain {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequest>,
}

impl Domain {
    /// Affected iff some changed path starts with this domain's path.
    pub fn is_affected(&self, changed_files: &[String]) -> bool {
        changed_files.iter().any(|file| file.starts_with(&self.path))
    }

    /// Branch name assigned at initialization, if any.
    pub fn branch_name(&self) -> Option<&str> {
        self.branch
            .as_ref()
            .map(|b| b.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Team {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Branch {
    pub name: String,
}

/// Rendered pull request. An empty `url` means it was never created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PullRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub url: String,
}

impl PullRequest {
    pub fn is_created(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

/// Read and validate a configuration file (JSON, or YAML by extension).
pub fn load(path: &str) -> Result<Change> {
    let expanded = shellexpand::tilde(path).to_string();
    let file = Path::new(&expanded);
    let content = io::read_file(file, "read config").map_err(|e| {
        let reason = e.details["error"].as_str().unwrap_or_default().to_string();
        Error::config_read_failed(path, reason)
    })?;

    let change = match Format::from_path(file) {
        Format::Json => parse(&content, path)?,
        Format::Yaml => parse_yaml(&content, path)?,
    };
    tracing::debug!(path, change = ?change, "config extracted from config file");
    Ok(change)
}

/// Parse and validate a JSON configuration document.
pub fn parse(content: &str, source: &str) -> Result<Change> {
    let document: ChangeDocument = serde_json::from_str(content)
        .map_err(|e| Error::config_invalid_document(source, "JSON", e.to_string()))?;
    into_change(document)
}

fn parse_yaml(content: &str, source: &str) -> Result<Change> {
    let document: ChangeDocument = serde_yml::from_str(content)
        .map_err(|e| Error::config_invalid_document(source, "YAML", e.to_string()))?;
    into_change(document)
}

fn into_change(document: ChangeDocument) -> Result<Change> {
    let settings = document
        .settings
        .ok_or_else(|| Error::config_missing_key("Settings"))?;
    let change = Change {
        id: document.id,
        settings,
        domains: document.domains,
    };
    validate(&change)?;
    Ok(change)
}

/// Check required fields and reject ambiguous domain layouts.
pub fn validate(change: &Change) -> Result<()> {
    let settings = &change.settings;
    if change.domains.is_empty() {
        return Err(Error::config_missing_key("Domains"));
    }
    if settings.main_branch.trim().is_empty() {
        return Err(Error::config_missing_key("Settings.MainBranch"));
    }
    if settings.remote.trim().is_empty() {
        return Err(Error::config_missing_key("Settings.Remote"));
    }
    if settings.branch_to_split.trim().is_empty() {
        return Err(Error::config_missing_key("Settings.BranchToSplit"));
    }

    let names_use_change_id = settings.branch_name_template.contains(CHANGE_ID_TOKEN);
    if names_use_change_id && change.id.trim().is_empty() {
        return Err(Error::config_missing_key("Id")
            .with_hint("Settings.BranchNameTemplate uses {{change_id}}"));
    }

    let names_use_domain_id = settings.branch_name_template.contains(DOMAIN_ID_TOKEN);
    for (index, domain) in change.domains.iter().enumerate() {
        if domain.path.is_empty() {
            return Err(Error::config_missing_key(format!(
                "Domains[{}].Path",
                index
            )));
        }
        if names_use_domain_id && domain.id.trim().is_empty() {
            return Err(Error::config_missing_key(format!("Domains[{}].Id", index))
                .with_hint("Settings.BranchNameTemplate uses {{domain_id}}"));
        }
    }

    for (i, a) in change.domains.iter().enumerate() {
        for b in change.domains.iter().skip(i + 1) {
            if a.path.starts_with(&b.path) || b.path.starts_with(&a.path) {
                return Err(Error::config_invalid_value(
                    "Domains.Path",
                    Some(format!("{}, {}", a.path, b.path)),
                    format!(
                        "domain paths '{}' and '{}' overlap; every changed file must belong to at most one domain",
                        a.path, b.path
                    ),
                ));
            }
        }
    }

    Ok(())
}
