use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::utils::command::{self, CommandFailure};

/// Version-control primitives the splitter drives.
///
/// Every method runs against one working tree, so implementations share a
/// single checked-out branch pointer. Callers serialize checkout-class calls.
pub trait Vcs: Send + Sync {
    fn checkout(&self, branch: &str) -> Result<()>;
    fn checkout_new_branch(&self, name: &str) -> Result<()>;
    /// Delete a local branch. A branch that does not exist is not an error.
    fn delete_branch(&self, name: &str) -> Result<()>;
    /// Delete a remote branch. A branch that was never pushed is not an error.
    fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<()>;
    /// Raw porcelain status listing.
    fn status(&self) -> Result<String>;
    fn add(&self, path: &str) -> Result<()>;
    fn commit(&self, message: &str) -> Result<()>;
    /// Bring the remote branch's files into the working tree. With
    /// `allow_deletions`, files missing from that branch are removed too.
    fn checkout_files(&self, remote: &str, branch_to_split: &str, allow_deletions: bool)
        -> Result<()>;
    /// Unstage everything without touching the working tree.
    fn reset(&self) -> Result<()>;
    fn push_set_upstream(&self, remote: &str, branch: &str) -> Result<()>;
}

/// `Vcs` backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

/// Git messages are matched below, so they must not be translated.
const GIT_ENV: &[(&str, &str)] = &[("LC_ALL", "C")];

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn git(&self, operation: &str, args: &[&str]) -> Result<String> {
        self.run_git(args).map_err(|f| into_error(operation, f))
    }

    fn run_git(&self, args: &[&str]) -> std::result::Result<String, CommandFailure> {
        command::run_in_env(&self.repo_dir, "git", args, GIT_ENV)
    }
}

fn into_error(operation: &str, failure: CommandFailure) -> Error {
    Error::git_command_failed(operation, failure.command, failure.output)
}

fn is_missing_local_branch(output: &str) -> bool {
    output.contains("not found")
}

fn is_missing_remote_ref(output: &str) -> bool {
    output.contains("remote ref does not exist")
}

/// Why `name` cannot be a branch name, following `git check-ref-format`.
pub fn invalid_branch_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return Some("is empty");
    }
    if name == "@" {
        return Some("is '@'");
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Some("starts or ends with '/'");
    }
    if name.contains("//") {
        return Some("has an empty path segment");
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return Some("ends with '.' or '.lock'");
    }
    if name.contains("..") || name.contains("@{") {
        return Some("contains '..' or '@{'");
    }
    if name.split('/').any(|segment| segment.starts_with('.')) {
        return Some("has a segment starting with '.'");
    }
    if name
        .chars()
        .any(|c| c.is_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return Some("contains a space, control or special character");
    }
    None
}

impl Vcs for GitCli {
    fn checkout(&self, branch: &str) -> Result<()> {
        self.git("checkout", &["checkout", branch]).map(|_| ())
    }

    fn checkout_new_branch(&self, name: &str) -> Result<()> {
        self.git("checkout-new-branch", &["checkout", "-b", name])
            .map(|_| ())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        match self.run_git(&["branch", "-D", name]) {
            Ok(_) => Ok(()),
            Err(f) if is_missing_local_branch(&f.output) => {
                tracing::debug!(branch = name, "local branch already absent");
                Ok(())
            }
            Err(f) => Err(into_error("delete-branch", f)),
        }
    }

    fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<()> {
        match self.run_git(&["push", remote, "--delete", name]) {
            Ok(_) => Ok(()),
            Err(f) if is_missing_remote_ref(&f.output) => {
                tracing::debug!(remote, branch = name, "remote branch already absent");
                Ok(())
            }
            Err(f) => Err(into_error("delete-remote-branch", f)),
        }
    }

    fn status(&self) -> Result<String> {
        command::run_in_raw(
            &self.repo_dir,
            "git",
            &[
                "-c",
                "core.quotePath=false",
                "status",
                "--porcelain=v1",
                "--untracked-files=all",
            ],
            GIT_ENV,
        )
        .map_err(|f| into_error("status", f))
    }

    fn add(&self, path: &str) -> Result<()> {
        self.git("add", &["add", "--", path]).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.git("commit", &["commit", "-m", message]).map(|_| ())
    }

    fn checkout_files(
        &self,
        remote: &str,
        branch_to_split: &str,
        allow_deletions: bool,
    ) -> Result<()> {
        self.git("fetch", &["fetch", remote, branch_to_split])?;

        let source = format!("{}/{}", remote, branch_to_split);
        let mut args = vec!["checkout"];
        if allow_deletions {
            args.push("--no-overlay");
        }
        args.extend([source.as_str(), "--", "."]);
        self.git("checkout-files", &args).map(|_| ())
    }

    fn reset(&self) -> Result<()> {
        self.git("reset", &["reset"]).map(|_| ())
    }

    fn push_set_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        self.git("push", &["push", "--set-upstream", remote, branch])
            .map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn sh(dir: &Path, args: &[&str]) {
        let out = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Scratch repository with a bare `origin`, a `main` branch and a pushed
    /// `big-change` branch touching `domains/dom1/` and `domains/dom2/`.
    pub(crate) struct ScratchRepo {
        _root: TempDir,
        pub(crate) work: PathBuf,
        pub(crate) remote: PathBuf,
    }

    pub(crate) fn scratch_repo() -> ScratchRepo {
        let root = TempDir::new().unwrap();
        let remote = root.path().join("remote.git");
        let work = root.path().join("work");
        fs::create_dir_all(&remote).unwrap();
        fs::create_dir_all(&work).unwrap();

        sh(&remote, &["init", "--bare", "-q"]);
        sh(&work, &["init", "-q"]);
        sh(&work, &["config", "user.email", "splitter@example.com"]);
        sh(&work, &["config", "user.name", "Splitter"]);
        sh(&work, &["checkout", "-q", "-b", "main"]);

        write(&work, "domains/dom1/a.txt", "one\n");
        write(&work, "domains/dom2/b.txt", "two\n");
        write(&work, "domains/dom3/c.txt", "three\n");
        write(&work, "domains/dom3/obsolete.txt", "old\n");
        sh(&work, &["add", "."]);
        sh(&work, &["commit", "-q", "-m", "initial"]);
        sh(&work, &["remote", "add", "origin", &remote.to_string_lossy()]);
        sh(&work, &["push", "-q", "-u", "origin", "main"]);

        sh(&work, &["checkout", "-q", "-b", "big-change"]);
        write(&work, "domains/dom1/a.txt", "one, edited\n");
        write(&work, "domains/dom2/new.txt", "brand new\n");
        sh(&work, &["rm", "-q", "domains/dom3/obsolete.txt"]);
        sh(&work, &["commit", "-q", "-am", "big change"]);
        sh(&work, &["add", "."]);
        sh(&work, &["commit", "-q", "-m", "big change, new files"]);
        sh(&work, &["push", "-q", "origin", "big-change"]);
        sh(&work, &["checkout", "-q", "main"]);

        ScratchRepo {
            _root: root,
            work,
            remote,
        }
    }

    pub(crate) fn remote_has_branch(repo: &ScratchRepo, branch: &str) -> bool {
        std::process::Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
            .current_dir(&repo.remote)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn checkout_files_brings_source_changes_into_tree() {
        let repo = scratch_repo();
        let git = GitCli::new(&repo.work);

        git.checkout("main").unwrap();
        git.checkout_files("origin", "big-change", false).unwrap();
        git.reset().unwrap();

        let files = crate::changes::parse_status(&git.status().unwrap());
        assert!(files.contains(&"domains/dom1/a.txt".to_string()));
        assert!(files.contains(&"domains/dom2/new.txt".to_string()));
        assert!(!files.iter().any(|f| f.starts_with("domains/dom3/")));
    }

    #[test]
    fn checkout_files_with_deletions_removes_missing_files() {
        let repo = scratch_repo();
        let git = GitCli::new(&repo.work);

        git.checkout_files("origin", "big-change", true).unwrap();
        git.reset().unwrap();

        let files = crate::changes::parse_status(&git.status().unwrap());
        assert!(files.contains(&"domains/dom3/obsolete.txt".to_string()));
        assert!(!repo.work.join("domains/dom3/obsolete.txt").exists());
    }

    #[test]
    fn status_reports_non_ascii_paths_verbatim() {
        let repo = scratch_repo();
        sh(&repo.work, &["checkout", "-q", "big-change"]);
        write(&repo.work, "domains/café/f.txt", "accented\n");
        sh(&repo.work, &["add", "."]);
        sh(&repo.work, &["commit", "-q", "-m", "accented domain"]);
        sh(&repo.work, &["push", "-q", "origin", "big-change"]);
        sh(&repo.work, &["checkout", "-q", "main"]);
        let git = GitCli::new(&repo.work);

        git.checkout_files("origin", "big-change", false).unwrap();
        git.reset().unwrap();

        let files = crate::changes::parse_status(&git.status().unwrap());
        assert!(files.contains(&"domains/café/f.txt".to_string()), "{:?}", files);
        let domains = vec![crate::config::tests::fixture_domain("cafe", "C", "domains/café/")];
        assert_eq!(crate::changes::affected_domains(&domains, &files), vec![0]);
    }

    #[test]
    fn invalid_branch_name_follows_ref_rules() {
        assert_eq!(invalid_branch_name("split/BIT001/D1"), None);
        assert_eq!(invalid_branch_name("bit-BIT001-café"), None);
        assert!(invalid_branch_name("").is_some());
        assert!(invalid_branch_name("split//D1").is_some());
        assert!(invalid_branch_name("split/X/").is_some());
        assert!(invalid_branch_name("/split").is_some());
        assert!(invalid_branch_name("a..b").is_some());
        assert!(invalid_branch_name("split/.hidden").is_some());
        assert!(invalid_branch_name("topic.lock").is_some());
        assert!(invalid_branch_name("has space").is_some());
        assert!(invalid_branch_name("what?").is_some());
        assert!(invalid_branch_name("a@{b").is_some());
    }

    #[test]
    fn status_is_empty_on_clean_tree() {
        let repo = scratch_repo();
        let git = GitCli::new(&repo.work);
        assert!(crate::changes::parse_status(&git.status().unwrap()).is_empty());
    }

    #[test]
    fn delete_branch_tolerates_missing_branch() {
        let repo = scratch_repo();
        let git = GitCli::new(&repo.work);
        assert!(git.delete_branch("never-created").is_ok());
    }

    #[test]
    fn delete_remote_branch_tolerates_unpushed_branch() {
        let repo = scratch_repo();
        let git = GitCli::new(&repo.work);
        assert!(git.delete_remote_branch("origin", "never-pushed").is_ok());
    }

    #[test]
    fn checkout_reports_git_failure() {
        let repo = scratch_repo();
        let git = GitCli::new(&repo.work);
        let err = git.checkout("no-such-branch").unwrap_err();
        assert_eq!(err.code.as_str(), "git.command_failed");
        assert_eq!(err.operation(), Some("checkout"));
        assert!(err.details["command"]
            .as_str()
            .unwrap()
            .contains("checkout no-such-branch"));
    }
}
