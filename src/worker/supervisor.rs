//! Runs a worker process to completion and captures its output

use super::backend::WorkerCommand;
use crate::error::{Error, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Everything a finished worker left behind
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct WorkerOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    /// Whether the process exited with status 0
    pub success: bool,
    /// Standard output, one entry per line
    pub stdout: Vec<String>,
    /// Standard error, one entry per line
    pub stderr: Vec<String>,
}

impl WorkerOutput {
    /// Standard error joined back into a single block
    pub fn stderr_text(&self) -> String {
        self.stderr.join("\n")
    }
}

/// Owns worker child processes for their whole lifetime
///
/// A non-zero exit is returned as data; only a failure to start the process is
/// an error. Children are spawned with `kill_on_drop` so a job task that is torn
/// down never leaves an orphan behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Supervisor {
    merge_stderr: bool,
}

impl Supervisor {
    /// Create a supervisor
    ///
    /// With `merge_stderr`, streaming mode hands stderr lines to the line
    /// handler too (they are still captured separately).
    pub fn new(merge_stderr: bool) -> Self {
        Self { merge_stderr }
    }

    /// Run to completion and return the buffered output (batch mode)
    pub async fn run(&self, command: &WorkerCommand) -> Result<WorkerOutput> {
        let output = base_command(command)
            .output()
            .await
            .map_err(|e| launch_error(command, e))?;

        Ok(WorkerOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
        })
    }

    /// Run to completion, handing each output line to `on_line` as it arrives
    /// (streaming mode)
    pub async fn run_streaming<F>(&self, command: &WorkerCommand, mut on_line: F) -> Result<WorkerOutput>
    where
        F: FnMut(&str) + Send,
    {
        let mut child = base_command(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| launch_error(command, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other("worker stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Other("worker stderr was not captured".into()))?;

        let mut stdout = segments(stdout);
        let mut stderr = segments(stderr);
        let mut output = WorkerOutput::default();
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                segment = stdout.next_segment(), if stdout_open => match segment? {
                    Some(bytes) => {
                        let line = decode_line(&bytes);
                        on_line(&line);
                        output.stdout.push(line);
                    }
                    None => stdout_open = false,
                },
                segment = stderr.next_segment(), if stderr_open => match segment? {
                    Some(bytes) => {
                        let line = decode_line(&bytes);
                        if self.merge_stderr {
                            on_line(&line);
                        }
                        output.stderr.push(line);
                    }
                    None => stderr_open = false,
                },
            }
        }

        let status = child.wait().await?;
        output.code = status.code();
        output.success = status.success();
        Ok(output)
    }
}

fn base_command(command: &WorkerCommand) -> Command {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

fn launch_error(command: &WorkerCommand, e: std::io::Error) -> Error {
    Error::WorkerLaunch {
        program: command.program.clone(),
        reason: e.to_string(),
    }
}

fn segments<R: AsyncRead + Unpin>(reader: R) -> tokio::io::Split<BufReader<R>> {
    BufReader::new(reader).split(b'\n')
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn sh(script: &str) -> WorkerCommand {
        WorkerCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec![
                OsString::from("-c"),
                OsString::from(script),
                OsString::from("worker"),
            ],
        }
    }

    #[tokio::test]
    async fn batch_mode_captures_both_streams() {
        let output = Supervisor::default()
            .run(&sh("echo one; echo two; echo oops >&2"))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.code, Some(0));
        assert_eq!(output.stdout, vec!["one", "two"]);
        assert_eq!(output.stderr_text(), "oops");
    }

    #[tokio::test]
    async fn nonzero_exit_is_data_not_error() {
        let output = Supervisor::default()
            .run(&sh("echo failing >&2; exit 3"))
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stderr, vec!["failing"]);
    }

    #[tokio::test]
    async fn missing_executable_is_launch_error() {
        let command = WorkerCommand {
            program: PathBuf::from("/nonexistent/path/to/worker"),
            args: vec![],
        };

        match Supervisor::default().run(&command).await {
            Err(Error::WorkerLaunch { program, .. }) => {
                assert_eq!(program, PathBuf::from("/nonexistent/path/to/worker"))
            }
            other => panic!("expected WorkerLaunch, got {other:?}"),
        }

        let streaming = Supervisor::default()
            .run_streaming(&command, |_| {})
            .await;
        assert!(matches!(streaming, Err(Error::WorkerLaunch { .. })));
    }

    #[tokio::test]
    async fn streaming_mode_delivers_lines_in_order() {
        let mut seen = Vec::new();
        let output = Supervisor::default()
            .run_streaming(
                &sh("printf 'a\\nb\\r\\n'; echo diag >&2; echo c"),
                |line| seen.push(line.to_string()),
            )
            .await
            .unwrap();

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(output.stdout, seen);
        assert_eq!(output.stderr, vec!["diag"]);
        assert!(output.success);
    }

    #[tokio::test]
    async fn streaming_mode_can_merge_stderr() {
        let mut seen = Vec::new();
        let output = Supervisor::new(true)
            .run_streaming(&sh("echo diag >&2; exit 1"), |line| {
                seen.push(line.to_string())
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["diag"]);
        assert_eq!(output.code, Some(1));
    }

    #[tokio::test]
    async fn streaming_mode_passes_arguments_through() {
        let mut seen = Vec::new();
        let mut command = sh("echo \"$1-$2\"");
        command.args.push("https://youtu.be/x".into());
        command.args.push("720".into());

        let _ = Supervisor::default()
            .run_streaming(&command, |line| seen.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["https://youtu.be/x-720"]);
    }
}
