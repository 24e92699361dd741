use std::path::PathBuf;

use clap::Args;

use bit::config::{self, Settings, DEFAULT_CONFIG_PATH};
use bit::export::{ExportFormat, Exporter};
use bit::git::GitCli;
use bit::platform::{self, Platform};
use bit::split::{Mode, SplitOptions, SplitOutcome, Splitter, DEFAULT_JOBS};

use super::CmdResult;

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Configuration file (JSON, or YAML by extension)
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Delete the branches and pull requests a previous run created
    #[arg(long, conflicts_with = "dry_run")]
    pub cleanup: bool,

    /// Only generate branch names and titles; touch nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Pull request platform: github or azure (overrides Settings.Platform)
    #[arg(short, long, value_parser = parse_platform)]
    pub platform: Option<Platform>,

    /// Export results as templated markdown lines instead of JSON
    #[arg(long)]
    pub markdown: bool,

    /// Write results to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Also carry over files deleted on the branch to split
    #[arg(long)]
    pub allow_deletions: bool,

    /// Maximum number of domains published concurrently
    #[arg(short, long, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    value.parse::<Platform>().map_err(|e| e.message)
}

impl SplitArgs {
    fn mode(&self) -> Mode {
        if self.cleanup {
            Mode::Cleanup
        } else if self.dry_run {
            Mode::DryRun
        } else {
            Mode::Publish
        }
    }

    fn export_format(&self) -> ExportFormat {
        if self.markdown {
            ExportFormat::Markdown
        } else {
            ExportFormat::Json
        }
    }

    fn output_path(&self) -> Option<PathBuf> {
        self.output
            .as_deref()
            .map(|path| PathBuf::from(shellexpand::tilde(path).to_string()))
    }

    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(platform) = self.platform {
            settings.platform = platform;
        }
        settings.allow_deletions |= self.allow_deletions;
    }
}

pub fn run(args: SplitArgs) -> CmdResult<SplitOutcome> {
    if args.jobs == 0 {
        return Err(bit::Error::validation_invalid_argument(
            "jobs",
            "at least one concurrent job is required",
        ));
    }

    let mut change = config::load(&args.config)?;
    args.apply_overrides(&mut change.settings);

    let repo_dir = change.settings.repo_dir();
    tracing::info!(
        change = %change.id,
        repo = %repo_dir.display(),
        platform = %change.settings.platform,
        "configuration loaded"
    );

    let vcs = GitCli::new(repo_dir.clone());
    let host = platform::host_for(change.settings.platform, repo_dir);
    let exporter = Exporter::new(args.export_format(), args.output_path());
    let options = SplitOptions {
        mode: args.mode(),
        jobs: args.jobs,
    };

    let outcome = Splitter::new(&vcs, host.as_ref(), &exporter, options).run(&mut change)?;
    Ok((outcome, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SplitArgs,
    }

    fn parse(argv: &[&str]) -> SplitArgs {
        TestCli::try_parse_from(std::iter::once("bit").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn defaults_publish_with_json_to_stdout() {
        let args = parse(&[]);
        assert_eq!(args.config, DEFAULT_CONFIG_PATH);
        assert_eq!(args.mode(), Mode::Publish);
        assert_eq!(args.export_format(), ExportFormat::Json);
        assert_eq!(args.jobs, DEFAULT_JOBS);
        assert!(args.output_path().is_none());
    }

    #[test]
    fn flags_select_mode_and_format() {
        assert_eq!(parse(&["--cleanup"]).mode(), Mode::Cleanup);
        assert_eq!(parse(&["--dry-run"]).mode(), Mode::DryRun);
        assert_eq!(parse(&["--markdown"]).export_format(), ExportFormat::Markdown);
        assert_eq!(parse(&["-j", "2", "cfg.yaml"]).jobs, 2);
    }

    #[test]
    fn cleanup_and_dry_run_conflict() {
        assert!(
            TestCli::try_parse_from(["bit", "--cleanup", "--dry-run"]).is_err()
        );
    }

    #[test]
    fn unknown_platform_is_rejected() {
        assert!(TestCli::try_parse_from(["bit", "-p", "gitlab"]).is_err());
    }

    #[test]
    fn overrides_replace_platform_and_widen_deletions() {
        let mut change = bit::config::parse(
            r#"{"Id":"X","Settings":{"MainBranch":"main","Remote":"origin","BranchToSplit":"big","Platform":"GitHub"},
                "Domains":[{"Name":"a","Id":"A","Path":"a/"}]}"#,
            "inline",
        )
        .unwrap();

        parse(&["-p", "azure", "--allow-deletions"]).apply_overrides(&mut change.settings);
        assert_eq!(change.settings.platform, Platform::Azure);
        assert!(change.settings.allow_deletions);

        change.settings.platform = Platform::GitHub;
        parse(&[]).apply_overrides(&mut change.settings);
        assert_eq!(change.settings.platform, Platform::GitHub);
        assert!(change.settings.allow_deletions);
    }

    #[test]
    fn zero_jobs_is_a_validation_error() {
        let err = run(parse(&["-j", "0"])).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }
}
