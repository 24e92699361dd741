//! Per-domain publishing: branch, stage, commit, push, open the pull request.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::config::{Domain, Settings};
use crate::error::{Error, Result};
use crate::git::Vcs;
use crate::platform::PullRequestHost;
use crate::template::{self, TemplateContext};

/// How far a domain got. `Failed` is reported alongside the last state reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Pending,
    Branched,
    Committed,
    Pushed,
    PrCreated,
    Failed,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishState::Pending => "pending",
            PublishState::Branched => "branched",
            PublishState::Committed => "committed",
            PublishState::Pushed => "pushed",
            PublishState::PrCreated => "pr_created",
            PublishState::Failed => "failed",
        }
    }
}

/// Lock a mutex, recovering the guard if another holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publishes one domain at a time; shared by all workers of a run.
pub struct DomainPublisher<'a> {
    vcs: &'a dyn Vcs,
    host: &'a dyn PullRequestHost,
    settings: &'a Settings,
    change_id: &'a str,
    checkout_lock: &'a Mutex<()>,
}

impl<'a> DomainPublisher<'a> {
    pub fn new(
        vcs: &'a dyn Vcs,
        host: &'a dyn PullRequestHost,
        settings: &'a Settings,
        change_id: &'a str,
        checkout_lock: &'a Mutex<()>,
    ) -> Self {
        Self {
            vcs,
            host,
            settings,
            change_id,
            checkout_lock,
        }
    }

    /// Publish `domain` and return the URL of its new pull request.
    ///
    /// Errors carry the domain name and the last state reached.
    pub fn publish(&self, domain: &Domain) -> Result<String> {
        let mut state = PublishState::Pending;
        match self.run_steps(domain, &mut state) {
            Ok(url) => Ok(url),
            Err(err) => {
                tracing::error!(
                    domain = %domain.name,
                    reached = state.as_str(),
                    error = %err,
                    "domain publishing failed"
                );
                Err(err
                    .with_domain(&domain.name)
                    .with_detail("state", PublishState::Failed.as_str())
                    .with_detail("reached", state.as_str()))
            }
        }
    }

    fn run_steps(&self, domain: &Domain, state: &mut PublishState) -> Result<String> {
        let branch = domain.branch_name().ok_or_else(|| {
            Error::internal_unexpected(format!("domain '{}' has no branch name", domain.name))
        })?;
        let pull_request = domain.pull_request.as_ref().ok_or_else(|| {
            Error::internal_unexpected(format!("domain '{}' has no pull request", domain.name))
        })?;

        {
            // Branch switching mutates the single working tree.
            let _checkout = lock(self.checkout_lock);

            self.vcs.checkout_new_branch(branch)?;
            self.advance(state, PublishState::Branched);

            let committed = self.stage_and_commit(domain);
            let restored = self.vcs.checkout(&self.settings.main_branch);
            committed?;
            self.advance(state, PublishState::Committed);
            restored?;
        }

        self.vcs.push_set_upstream(&self.settings.remote, branch)?;
        self.advance(state, PublishState::Pushed);

        let url = self.host.create_pull_request(
            self.settings,
            branch,
            &pull_request.title,
            &pull_request.body,
        )?;
        self.advance(state, PublishState::PrCreated);
        tracing::info!(branch, url = %url, "pull request created");

        Ok(url)
    }

    fn stage_and_commit(&self, domain: &Domain) -> Result<()> {
        self.vcs.add(&domain.path)?;
        let context = TemplateContext::new(self.change_id, domain);
        let message = template::render(&self.settings.commit_msg_template, &context);
        self.vcs.commit(&message)
    }

    fn advance(&self, state: &mut PublishState, next: PublishState) {
        tracing::debug!(from = state.as_str(), to = next.as_str(), "domain state");
        *state = next;
    }
}
