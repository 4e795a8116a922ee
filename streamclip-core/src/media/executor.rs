use std::path::Path;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::error::{MediaError, MediaResult};

/// Lines of stderr kept in error messages; ffmpeg is chatty.
const STDERR_TAIL_LINES: usize = 20;

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, program: &Path, args: &[String]) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
    }
}

pub(crate) fn describe(program: &Path, args: &[String]) -> String {
    format!("{} {}", program.display(), args.join(" "))
}

/// Runs a tool and turns a spawn error, timeout or non-zero exit into a `MediaError`.
pub(crate) async fn run_checked(
    executor: &dyn CommandExecutor,
    program: &Path,
    args: &[String],
    limit: Option<Duration>,
) -> MediaResult<Output> {
    let execution = executor.run(program, args);
    let result = match limit {
        Some(limit) => timeout(limit, execution)
            .await
            .map_err(|_| MediaError::Timeout {
                command: describe(program, args),
                seconds: limit.as_secs(),
            })?,
        None => execution.await,
    };
    let output = result.map_err(|source| MediaError::Spawn {
        program: program.display().to_string(),
        source,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        warn!(
            program = %program.display(),
            status = ?output.status.code(),
            stderr = %stderr,
            "external tool failed"
        );
        return Err(MediaError::CommandFailure {
            command: describe(program, args),
            status: output.status.code(),
            stderr: stderr_tail(&stderr),
        });
    }
    debug!(program = %program.display(), stderr = %stderr, "external tool finished");
    Ok(output)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
