use std::ffi::OsStr;
use std::fmt::Display;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use tokio::process::Command as BaseCommand;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn command: {command}")]
    Spawn {
        command: String,
        #[source]
        error: tokio::io::Error,
    },

    #[error("command failed: {command}\n{stderr}")]
    Failure { command: String, stderr: String },
}

#[derive(Debug)]
pub struct Command {
    cmd: BaseCommand,
    stdout: bool,
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cmd = self.cmd.as_std();
        let program = cmd.get_program().to_string_lossy();
        let args = cmd
            .get_args()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        if args.is_empty() {
            write!(f, "{program}",)
        } else {
            write!(f, "{program} {args}",)
        }
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            cmd: BaseCommand::new(program),
            stdout: false,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.cmd.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.cmd.args(args);
        self
    }

    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Command {
        self.cmd.current_dir(dir);
        self
    }

    /// Pass stdout through to the terminal instead of capturing it.
    pub fn stdout(&mut self, stdout: bool) -> &mut Command {
        self.stdout = stdout;
        self
    }

    pub async fn output(&mut self) -> Result<Output, CommandError> {
        self.cmd
            .stdin(Stdio::null())
            .stdout(if self.stdout {
                Stdio::inherit()
            } else {
                Stdio::piped()
            })
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|error| CommandError::Spawn {
                command: self.to_string(),
                error,
            })
    }

    pub async fn run(&mut self) -> Result<Output, CommandError> {
        self.output().await.and_then(|out| {
            if out.status.success() {
                Ok(out)
            } else {
                Err(CommandError::Failure {
                    command: self.to_string(),
                    stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                })
            }
        })
    }

    /// Like [`Command::run`], but exit codes in `allowed` also count as success.
    ///
    /// Useful for tools such as `diff` that signal results through the exit code.
    pub async fn run_allowing(&mut self, allowed: &[i32]) -> Result<ExitStatus, CommandError> {
        let out = self.output().await?;
        let accepted = out.status.success()
            || out
                .status
                .code()
                .is_some_and(|code| allowed.contains(&code));
        if accepted {
            Ok(out.status)
        } else {
            Err(CommandError::Failure {
                command: self.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_command() {
        assert_eq!(Command::new("git").to_string(), "git")
    }

    #[test]
    fn test_get_command_with_one_arg() {
        assert_eq!(Command::new("git").arg("diff").to_string(), "git diff")
    }

    #[test]
    fn test_get_command_with_two_args() {
        assert_eq!(
            Command::new("git")
                .args(["diff", "--no-index"])
                .to_string(),
            "git diff --no-index"
        )
    }

    #[tokio::test]
    async fn test_spawn_failure_names_command() {
        let err = Command::new("kmt-definitely-not-a-program")
            .arg("x")
            .run()
            .await
            .unwrap_err();
        assert!(
            matches!(err, CommandError::Spawn { command, .. } if command == "kmt-definitely-not-a-program x")
        );
    }
}
