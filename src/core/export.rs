//! Result export: what was created, as JSON or one templated line per domain.

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Change;
use crate::error::{Error, Result};
use crate::template::{self, TemplateContext};
use crate::utils::io as file_io;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPullRequest {
    pub branch: String,
    #[serde(rename = "prUrl")]
    pub pr_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedBranch {
    pub domain: String,
    pub branch: String,
    pub title: String,
}

/// Receives the finished change (or the dry-run plan) from the orchestrator.
pub trait ResultExporter: Send + Sync {
    fn export(&self, change: &Change) -> Result<()>;
    fn export_plan(&self, change: &Change) -> Result<()>;
}

/// Domains whose pull request was actually created, in config order.
pub fn created_pull_requests(change: &Change) -> Vec<CreatedPullRequest> {
    change
        .domains
        .iter()
        .filter_map(|domain| {
            let pr = domain.pull_request.as_ref().filter(|pr| pr.is_created())?;
            let branch = domain.branch_name()?;
            Some(CreatedPullRequest {
                branch: branch.to_string(),
                pr_url: pr.url.clone(),
            })
        })
        .collect()
}

pub fn planned_branches(change: &Change) -> Vec<PlannedBranch> {
    change
        .domains
        .iter()
        .filter_map(|domain| {
            let branch = domain.branch_name()?;
            Some(PlannedBranch {
                domain: domain.name.clone(),
                branch: branch.to_string(),
                title: domain
                    .pull_request
                    .as_ref()
                    .map(|pr| pr.title.clone())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

pub fn render(change: &Change, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => {
            let json = serde_json::to_string_pretty(&created_pull_requests(change)).map_err(|e| {
                Error::internal_json(e.to_string(), Some("serialize results".to_string()))
            })?;
            Ok(format!("{}\n", json))
        }
        ExportFormat::Markdown => {
            let mut out = String::new();
            for domain in &change.domains {
                let (Some(pr), Some(branch)) = (
                    domain.pull_request.as_ref().filter(|pr| pr.is_created()),
                    domain.branch_name(),
                ) else {
                    continue;
                };
                let context = TemplateContext::new(&change.id, domain).with_pull_request(pr, branch);
                out.push_str(&template::render(&change.settings.result_template, &context));
                out.push('\n');
            }
            Ok(out)
        }
    }
}

pub fn render_plan(change: &Change) -> Result<String> {
    let json = serde_json::to_string_pretty(&planned_branches(change))
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize plan".to_string())))?;
    Ok(format!("{}\n", json))
}

/// Writes results to stdout or to a file.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    format: ExportFormat,
    target: Option<PathBuf>,
}

impl Exporter {
    pub fn new(format: ExportFormat, target: Option<PathBuf>) -> Self {
        Self { format, target }
    }

    fn write(&self, content: &str) -> Result<()> {
        if let Some(path) = &self.target {
            file_io::write_file(path, content, "write results")?;
            tracing::info!(path = %path.display(), "results written");
            return Ok(());
        }

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = handle.write_all(content.as_bytes()) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                return Ok(());
            }
            return Err(Error::internal_io(e.to_string(), Some("write stdout".to_string())));
        }
        Ok(())
    }
}

impl ResultExporter for Exporter {
    fn export(&self, change: &Change) -> Result<()> {
        self.write(&render(change, self.format)?)
    }

    fn export_plan(&self, change: &Change) -> Result<()> {
        self.write(&render_plan(change)?)
    }
}
