//! Hosting-platform backends that open and abandon pull requests.
//!
//! The platform is picked once at startup; everything downstream talks to a
//! `PullRequestHost` trait object.

mod azure;
mod github;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{Error, Result};

pub use azure::AzureCli;
pub use github::GitHubCli;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    #[serde(rename = "GitHub", alias = "github", alias = "Github")]
    GitHub,
    #[serde(rename = "Azure", alias = "azure")]
    Azure,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GitHub => "GitHub",
            Platform::Azure => "Azure",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Platform::GitHub),
            "azure" => Ok(Platform::Azure),
            _ => Err(Error::validation_invalid_argument(
                "platform",
                format!("platform '{}' is not supported (expected github or azure)", s),
            )),
        }
    }
}

/// Pull-request operations on a hosting platform.
pub trait PullRequestHost: Send + Sync {
    /// Open a pull request from `head` into the main branch and return its URL.
    fn create_pull_request(
        &self,
        settings: &Settings,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<String>;

    /// Abandon open pull requests whose head is `branch`. Idempotent.
    fn abandon_pull_request(&self, branch: &str) -> Result<()>;
}

/// Build the backend for `platform`, running its CLI inside `repo_dir`.
pub fn host_for(platform: Platform, repo_dir: impl Into<PathBuf>) -> Box<dyn PullRequestHost> {
    match platform {
        Platform::GitHub => Box::new(GitHubCli::new(repo_dir)),
        Platform::Azure => Box::new(AzureCli::new(repo_dir)),
    }
}
