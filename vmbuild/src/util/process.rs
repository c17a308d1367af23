//! External command execution for tasks.

use std::process::Stdio;

use tokio::process::Command;
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

/// Run a command to completion and return its stdout.
///
/// A single-element command is handed to `sh -c`, so it may contain shell syntax.
/// Longer commands run the first element directly with the rest as arguments.
///
/// # Errors
/// * [`VmbuildError::Config`] - the command is empty
/// * [`VmbuildError::Io`] - the program could not be spawned
/// * [`VmbuildError::Command`] - the program exited unsuccessfully
pub async fn run_command(command: &[String]) -> VmbuildResult<String> {
    let mut cmd = match command {
        [] => return Err(VmbuildError::Config("empty command".into())),
        [script] => {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(script);
            cmd
        }
        [program, args @ ..] => {
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        }
    };

    let rendered = command.join(" ");
    tracing::debug!(command = %rendered, "Executing command");

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    for line in stdout.lines() {
        tracing::trace!(command = %rendered, "{}", line);
    }

    if !output.status.success() {
        return Err(VmbuildError::Command {
            command: rendered,
            status: output.status.to_string(),
            stderr,
        });
    }

    if !stderr.is_empty() {
        tracing::debug!(command = %rendered, stderr = %stderr, "Command wrote to stderr");
    }

    Ok(stdout)
}
