//! Split orchestration: prepare the working tree, publish every affected
//! domain with bounded concurrency, export the result, and roll everything
//! back when any step fails or when cleanup is requested.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use serde::Serialize;

use crate::changes;
use crate::config::{Branch, Change, PullRequest};
use crate::error::{Error, Result};
use crate::export::ResultExporter;
use crate::git::{self, Vcs};
use crate::platform::PullRequestHost;
use crate::publish::{lock, DomainPublisher};
use crate::template::{self, TemplateContext};

pub const DEFAULT_JOBS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Split, push and open pull requests.
    #[default]
    Publish,
    /// Only delete what a previous run created.
    Cleanup,
    /// Only compute branch names and titles.
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions {
    pub mode: Mode,
    /// Upper bound on domains published at the same time.
    pub jobs: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Publish,
            jobs: DEFAULT_JOBS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub domains: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SplitOutcome {
    Published { pull_requests: usize },
    CleanedUp(RollbackSummary),
    Planned { branches: usize },
}

pub struct Splitter<'a> {
    vcs: &'a dyn Vcs,
    host: &'a dyn PullRequestHost,
    exporter: &'a dyn ResultExporter,
    options: SplitOptions,
}

impl<'a> Splitter<'a> {
    pub fn new(
        vcs: &'a dyn Vcs,
        host: &'a dyn PullRequestHost,
        exporter: &'a dyn ResultExporter,
        options: SplitOptions,
    ) -> Self {
        Self {
            vcs,
            host,
            exporter,
            options,
        }
    }

    pub fn run(&self, change: &mut Change) -> Result<SplitOutcome> {
        initialize(change)?;
        tracing::info!(
            change = %change.id,
            domains = change.domains.len(),
            mode = ?self.options.mode,
            "branch and pull request names generated"
        );

        match self.options.mode {
            Mode::Cleanup => {
                let summary = self.rollback(change);
                Ok(SplitOutcome::CleanedUp(summary))
            }
            Mode::DryRun => {
                self.exporter.export_plan(change)?;
                Ok(SplitOutcome::Planned {
                    branches: change.domains.len(),
                })
            }
            Mode::Publish => self.publish(change),
        }
    }

    fn publish(&self, change: &mut Change) -> Result<SplitOutcome> {
        let affected = self.detect_affected(change)?;
        if affected.is_empty() {
            tracing::info!("no domain has changed files");
        }

        if let Err(err) = self.fan_out(change, &affected) {
            tracing::error!(error = %err, domain = err.domain().unwrap_or(""), "split failed, rolling back");
            self.rollback(change);
            return Err(err);
        }

        self.exporter.export(change)?;
        Ok(SplitOutcome::Published {
            pull_requests: affected.len(),
        })
    }

    /// Repository-wide steps; these share the working tree and run in order.
    fn detect_affected(&self, change: &Change) -> Result<Vec<usize>> {
        let settings = &change.settings;
        self.vcs.checkout(&settings.main_branch)?;
        self.vcs.checkout_files(
            &settings.remote,
            &settings.branch_to_split,
            settings.allow_deletions,
        )?;
        self.vcs.reset()?;

        let files = changes::list_changed_files(self.vcs)?;
        let affected = changes::affected_domains(&change.domains, &files);
        tracing::info!(
            affected = ?affected
                .iter()
                .map(|&i| change.domains[i].name.as_str())
                .collect::<Vec<_>>(),
            "affected domains"
        );
        Ok(affected)
    }

    fn fan_out(&self, change: &mut Change, affected: &[usize]) -> Result<()> {
        if affected.is_empty() {
            return Ok(());
        }

        let jobs = self.options.jobs.max(1).min(affected.len());
        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<Error>> = Mutex::new(None);
        let created: Mutex<Vec<(usize, String)>> = Mutex::new(Vec::new());
        let checkout_lock = Mutex::new(());

        let record_failure = |err: Error| {
            failed.store(true, Ordering::SeqCst);
            let mut slot = lock(&first_error);
            if slot.is_none() {
                *slot = Some(err);
            }
        };

        {
            let change: &Change = change;
            let publisher = DomainPublisher::new(
                self.vcs,
                self.host,
                &change.settings,
                &change.id,
                &checkout_lock,
            );

            thread::scope(|scope| {
                let mut handles = Vec::with_capacity(jobs);
                for worker in 0..jobs {
                    let spawned = thread::Builder::new()
                        .name(format!("publisher-{}", worker))
                        .spawn_scoped(scope, || loop {
                            if failed.load(Ordering::SeqCst) {
                                break;
                            }
                            let slot = next.fetch_add(1, Ordering::SeqCst);
                            let Some(&index) = affected.get(slot) else {
                                break;
                            };
                            let domain = &change.domains[index];
                            let span = tracing::info_span!(
                                "domain",
                                name = %domain.name,
                                branch = domain.branch_name().unwrap_or("")
                            );
                            let _entered = span.enter();

                            match publisher.publish(domain) {
                                Ok(url) => lock(&created).push((index, url)),
                                Err(err) => record_failure(err),
                            }
                        });

                    match spawned {
                        Ok(handle) => handles.push(handle),
                        Err(e) => {
                            record_failure(Error::internal_io(
                                e.to_string(),
                                Some("start publisher worker".to_string()),
                            ));
                            break;
                        }
                    }
                }

                for handle in handles {
                    if handle.join().is_err() {
                        record_failure(Error::internal_unexpected("publisher worker panicked"));
                    }
                }
            });
        }

        for (index, url) in created.into_inner().unwrap_or_else(|e| e.into_inner()) {
            if let Some(pr) = change.domains[index].pull_request.as_mut() {
                pr.url = url;
            }
        }

        match first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Best-effort removal of every branch and pull request the change names.
    ///
    /// Failures are logged and counted, never returned.
    pub fn rollback(&self, change: &Change) -> RollbackSummary {
        let settings = &change.settings;
        let mut summary = RollbackSummary::default();

        for domain in &change.domains {
            let Some(branch) = domain.branch_name() else {
                continue;
            };
            let span = tracing::info_span!("rollback", domain = %domain.name, branch);
            let _entered = span.enter();

            summary.domains += 1;
            let mut ok = true;
            ok &= attempt("checkout", self.vcs.checkout(&settings.main_branch));
            ok &= attempt("delete-branch", self.vcs.delete_branch(branch));
            ok &= attempt(
                "delete-remote-branch",
                self.vcs.delete_remote_branch(&settings.remote, branch),
            );
            ok &= attempt(
                "abandon-pull-request",
                self.host.abandon_pull_request(branch),
            );
            if !ok {
                summary.failures += 1;
            }
        }

        tracing::info!(
            domains = summary.domains,
            failures = summary.failures,
            "rollback finished"
        );
        summary
    }
}

fn attempt(step: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(step, error = %err, details = %err.details, "cleanup step failed");
            false
        }
    }
}

/// Render and attach every domain's branch name and pull request text.
///
/// Runs before any mode-specific work so cleanup can target the same names.
pub fn initialize(change: &mut Change) -> Result<()> {
    let settings = &change.settings;
    let mut seen: HashMap<String, String> = HashMap::new();

    for domain in change.domains.iter_mut() {
        let context = TemplateContext::new(&change.id, domain);
        let branch = template::render(&settings.branch_name_template, &context);
        let title = template::render(&settings.pr_name_template, &context);
        let body = template::render(&settings.pr_desc_template, &context);

        if let Some(problem) = git::invalid_branch_name(&branch) {
            return Err(Error::config_invalid_value(
                "Settings.BranchNameTemplate",
                Some(branch),
                format!("branch name for domain '{}' {}", domain.name, problem),
            ));
        }
        if let Some(other) = seen.insert(branch.clone(), domain.name.clone()) {
            return Err(Error::config_invalid_value(
                "Settings.BranchNameTemplate",
                Some(branch),
                format!(
                    "domains '{}' and '{}' render the same branch name",
                    other, domain.name
                ),
            ));
        }

        domain.branch = Some(Branch { name: branch });
        domain.pull_request = Some(PullRequest {
            title,
            body,
            url: String::new(),
        });
    }

    Ok(())
}
