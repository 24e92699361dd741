use std::path::PathBuf;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::utils::command;

use super::PullRequestHost;

/// GitHub backend driven through the `gh` CLI.
#[derive(Debug, Clone)]
pub struct GitHubCli {
    repo_dir: PathBuf,
}

impl GitHubCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn gh(&self, operation: &str, args: &[&str]) -> Result<String> {
        command::run_in(&self.repo_dir, "gh", args)
            .map_err(|f| Error::platform_command_failed(operation, f.command, f.output))
    }
}

fn create_args<'a>(settings: &'a Settings, head: &'a str, title: &'a str, body: &'a str) -> Vec<&'a str> {
    let mut args = vec![
        "pr",
        "create",
        "-H",
        head,
        "-t",
        title,
        "-b",
        body,
        "-B",
        settings.main_branch.as_str(),
    ];
    if settings.is_draft_prs {
        args.push("-d");
    }
    args
}

fn parse_url(raw: &str) -> Result<String> {
    let url = raw.trim().trim_matches(|c| c == '\'' || c == '"');
    if url.is_empty() {
        return Err(Error::platform_invalid_response(
            "view",
            "gh pr view returned no URL",
        ));
    }
    Ok(url.to_string())
}

impl PullRequestHost for GitHubCli {
    fn create_pull_request(
        &self,
        settings: &Settings,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        self.gh("create", &create_args(settings, head, title, body))?;
        let raw = self.gh("view", &["pr", "view", head, "--json", "url", "--jq", ".url"])?;
        parse_url(&raw)
    }

    fn abandon_pull_request(&self, branch: &str) -> Result<()> {
        // GitHub closes a pull request once its head branch is deleted.
        tracing::debug!(branch, "GitHub closes the pull request with its branch");
        Ok(())
    }
}
