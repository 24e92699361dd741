//! Placeholder rendering for branch names, commit messages and PR text.
//!
//! Placeholders look like `{{name}}`. Substitution is a single pass over the
//! template: values inserted for a placeholder are never re-scanned, and
//! placeholders without a value are left verbatim so typos stay visible.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::{Domain, PullRequest};

pub struct TemplateVars;

impl TemplateVars {
    pub const CHANGE_ID: &'static str = "change_id";
    pub const DOMAIN_ID: &'static str = "domain_id";
    pub const DOMAIN_NAME: &'static str = "domain_name";
    pub const DOMAIN_PATH: &'static str = "domain_path";
    pub const TEAM_NAME_PREFIX: &'static str = "team_name_";
    pub const TEAM_URL_PREFIX: &'static str = "team_url_";
    pub const PR_TITLE: &'static str = "pr_title";
    pub const PR_URL: &'static str = "pr_url";
    pub const BRANCH_NAME: &'static str = "branch_name";
}

/// Inputs a template can draw from.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub change_id: &'a str,
    pub domain: &'a Domain,
    pub pull_request: Option<&'a PullRequest>,
    pub branch_name: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(change_id: &'a str, domain: &'a Domain) -> Self {
        Self {
            change_id,
            domain,
            pull_request: None,
            branch_name: None,
        }
    }

    /// Context for output produced after the pull request exists.
    pub fn with_pull_request(mut self, pull_request: &'a PullRequest, branch_name: &'a str) -> Self {
        self.pull_request = Some(pull_request);
        self.branch_name = Some(branch_name);
        self
    }

    pub fn variables(&self) -> HashMap<String, String> {
        let domain = self.domain;
        let mut vars = HashMap::new();
        vars.insert(TemplateVars::CHANGE_ID.to_string(), self.change_id.to_string());
        vars.insert(TemplateVars::DOMAIN_ID.to_string(), domain.id.clone());
        vars.insert(TemplateVars::DOMAIN_NAME.to_string(), domain.name.clone());
        vars.insert(TemplateVars::DOMAIN_PATH.to_string(), domain.path.clone());

        for (index, team) in domain.teams.iter().enumerate() {
            let position = index + 1;
            vars.insert(
                format!("{}{}", TemplateVars::TEAM_NAME_PREFIX, position),
                team.name.clone(),
            );
            vars.insert(
                format!("{}{}", TemplateVars::TEAM_URL_PREFIX, position),
                team.url.clone(),
            );
        }

        if let Some(pr) = self.pull_request {
            vars.insert(TemplateVars::PR_TITLE.to_string(), pr.title.clone());
            vars.insert(TemplateVars::PR_URL.to_string(), pr.url.clone());
        }
        if let Some(branch) = self.branch_name {
            vars.insert(TemplateVars::BRANCH_NAME.to_string(), branch.to_string());
        }

        vars
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("Invalid regex pattern"))
}

pub fn render(template: &str, context: &TemplateContext<'_>) -> String {
    render_map(template, &context.variables())
}

/// Replace every known `{{key}}` in one pass; unknown keys stay as written.
pub fn render_map(template: &str, variables: &HashMap<String, String>) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
