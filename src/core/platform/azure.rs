use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::utils::command;

use super::PullRequestHost;

/// Azure DevOps backend driven through the `az repos` CLI.
#[derive(Debug, Clone)]
pub struct AzureCli {
    repo_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPullRequest {
    base_url: String,
    code_review_id: u64,
}

impl AzureCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn az(&self, operation: &str, args: &[&str]) -> Result<String> {
        command::run_in(&self.repo_dir, "az", args)
            .map_err(|f| Error::platform_command_failed(operation, f.command, f.output))
    }
}

fn create_args<'a>(settings: &'a Settings, head: &'a str, title: &'a str, body: &'a str) -> Vec<&'a str> {
    let mut args = vec![
        "repos",
        "pr",
        "create",
        "--source-branch",
        head,
        "--title",
        title,
        "--description",
        body,
        "--target-branch",
        settings.main_branch.as_str(),
        "--output",
        "json",
        "--query",
        "{baseUrl:repository.webUrl, codeReviewId:codeReviewId}",
    ];
    if settings.is_draft_prs {
        args.push("--draft");
    }
    args
}

fn pull_request_url(raw: &str) -> Result<String> {
    let created: CreatedPullRequest = serde_json::from_str(raw)
        .map_err(|e| Error::platform_invalid_response("create", e.to_string()))?;
    Ok(format!(
        "{}/pullrequest/{}",
        created.base_url.trim_end_matches('/'),
        created.code_review_id
    ))
}

fn parse_pull_request_ids(raw: &str) -> Result<Vec<u64>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| Error::platform_invalid_response("list", e.to_string()))
}

impl PullRequestHost for AzureCli {
    fn create_pull_request(
        &self,
        settings: &Settings,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let raw = self.az("create", &create_args(settings, head, title, body))?;
        pull_request_url(&raw)
    }

    fn abandon_pull_request(&self, branch: &str) -> Result<()> {
        let raw = self.az(
            "list",
            &[
                "repos",
                "pr",
                "list",
                "--source-branch",
                branch,
                "--status",
                "active",
                "--output",
                "json",
                "--query",
                "[].pullRequestId",
            ],
        )?;

        for id in parse_pull_request_ids(&raw)? {
            let id = id.to_string();
            self.az(
                "abandon",
                &[
                    "repos", "pr", "update", "--id", &id, "--status", "abandoned", "--output",
                    "none",
                ],
            )?;
            tracing::info!(branch, pull_request = %id, "abandoned pull request");
        }
        Ok(())
    }
}
