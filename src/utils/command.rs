//! Command execution primitives with consistent error handling.

use std::path::Path;
use std::process::{Command, Output};

/// A command that could not be spawned or exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Printable command line.
    pub command: String,
    /// Diagnostic output: stderr, stdout fallback, or the spawn error.
    pub output: String,
}

/// Run a command in a specific directory.
///
/// Returns trimmed stdout if the command succeeds.
/// Returns the command line and its stderr (or stdout fallback) if it fails.
pub fn run_in(dir: &Path, program: &str, args: &[&str]) -> Result<String, CommandFailure> {
    run_in_env(dir, program, args, &[])
}

/// Like `run_in`, with extra environment variables set for the child.
pub fn run_in_env(
    dir: &Path,
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
) -> Result<String, CommandFailure> {
    let command = display_command(program, args);
    let output = execute(dir, program, args, envs, &command)?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    tracing::debug!(command = %command, output = %stdout, "ran command");
    Ok(stdout)
}

/// Like `run_in_env`, but keeps stdout untrimmed.
///
/// Porcelain formats carry meaning in leading whitespace.
pub fn run_in_raw(
    dir: &Path,
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
) -> Result<String, CommandFailure> {
    let command = display_command(program, args);
    let output = execute(dir, program, args, envs, &command)?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    tracing::debug!(command = %command, output = %stdout, "ran command");
    Ok(stdout)
}

fn execute(
    dir: &Path,
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    command: &str,
) -> Result<Output, CommandFailure> {
    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .current_dir(dir)
        .output()
        .map_err(|e| {
            tracing::error!(command = %command, error = %e, "failed to spawn command");
            CommandFailure {
                command: command.to_string(),
                output: e.to_string(),
            }
        })?;

    if !output.status.success() {
        let text = error_text(&output);
        tracing::error!(
            command = %command,
            exit_code = output.status.code().unwrap_or(-1),
            output = %text,
            "failed to run command"
        );
        return Err(CommandFailure {
            command: command.to_string(),
            output: text,
        });
    }

    Ok(output)
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}

/// Render a command line for logs and error details.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_in_succeeds_with_valid_command() {
        let result = run_in(Path::new("/tmp"), "echo", &["hello"]);
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn run_in_fails_with_invalid_command() {
        let result = run_in(Path::new("/tmp"), "nonexistent_command_xyz", &[]);
        let failure = result.unwrap_err();
        assert_eq!(failure.command, "nonexistent_command_xyz");
    }

    #[test]
    fn run_in_raw_keeps_leading_whitespace() {
        let result = run_in_raw(Path::new("/tmp"), "printf", &["  x\n"], &[]);
        assert_eq!(result.unwrap(), "  x\n");
    }

    #[test]
    fn run_in_env_passes_variables_to_child() {
        let result = run_in_env(
            Path::new("/tmp"),
            "sh",
            &["-c", "printf %s \"$LC_ALL\""],
            &[("LC_ALL", "C")],
        );
        assert_eq!(result.unwrap(), "C");
    }

    #[test]
    fn run_in_reports_non_zero_exit() {
        let result = run_in(Path::new("/tmp"), "false", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn error_text_prefers_stderr() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"stderr content".to_vec(),
        };
        assert_eq!(error_text(&output), "stderr content");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = Output {
            status: std::process::ExitStatus::default(),
            stdout: b"stdout content".to_vec(),
            stderr: b"".to_vec(),
        };
        assert_eq!(error_text(&output), "stdout content");
    }

    #[test]
    fn display_command_quotes_arguments_with_spaces() {
        assert_eq!(
            display_command("git", &["commit", "-m", "split dom1"]),
            "git commit -m 'split dom1'"
        );
    }
}
