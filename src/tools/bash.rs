//! Shell tool: runs one command under the platform shell with a wall-clock
//! timeout.
//!
//! The child is placed in its own process group on unix so that a timeout
//! kills the whole tree, not just the shell. Output reading happens
//! concurrently with the wait so timeout enforcement stays responsive even
//! when the child floods its pipes.

use crate::error::ToolError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// Run `command` under the platform shell in `cwd`, merging stderr into the
/// combined output.
///
/// Non-zero exit becomes `ToolError::NonZeroExit` whose text begins
/// `Exit code <n>`; exceeding `timeout` force-kills the child and returns
/// `ToolError::Timeout`.
pub async fn run_command(command: &str, cwd: &Path, timeout: Duration) -> Result<String, ToolError> {
    debug!(command = %command, timeout_secs = timeout.as_secs(), "running shell command");

    let mut cmd = shell_command(command);
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            // New process group so the timeout path can kill the tree.
            libc::setpgid(0, 0);
            Ok(())
        });
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| ToolError::io(format!("failed to spawn shell for {command:?}"), e))?;
    let child_id = child.id();

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| ToolError::io("stdout", pipe_gone()))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| ToolError::io("stderr", pipe_gone()))?;

    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let read_until_exit = async {
        let (out, err, status) = tokio::join!(
            stdout_pipe.read_to_end(&mut stdout_buf),
            stderr_pipe.read_to_end(&mut stderr_buf),
            child.wait(),
        );
        out.map_err(|e| ToolError::io("reading stdout", e))?;
        err.map_err(|e| ToolError::io("reading stderr", e))?;
        status.map_err(|e| ToolError::io("waiting for child", e))
    };

    let status = match tokio::time::timeout(timeout, read_until_exit).await {
        Ok(result) => result?,
        Err(_) => {
            terminate(child_id);
            return Err(ToolError::Timeout(timeout.as_secs()));
        }
    };

    let mut output = String::from_utf8_lossy(&stdout_buf).into_owned();
    output.push_str(&String::from_utf8_lossy(&stderr_buf));

    if status.success() {
        Ok(output)
    } else {
        Err(ToolError::NonZeroExit {
            code: status.code().unwrap_or(-1),
            output,
        })
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

fn pipe_gone() -> std::io::Error {
    std::io::Error::other("child pipe was not captured")
}

/// Force-kill the child after a timeout. On unix the whole process group
/// receives SIGKILL, so children the shell spawned die too.
fn terminate(child_id: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = child_id {
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
    #[cfg(windows)]
    if let Some(pid) = child_id {
        let _ = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .output();
    }
}
