//! Fire-and-forget execution of deployment scripts.
//!
//! A dispatched script runs as `sh <script>` on its own tokio task. The
//! caller gets control back immediately; nothing waits on the script, times
//! it out or retries it. Output is logged line by line under the
//! `user_script` target as it arrives.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::DeployError;

pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Number of trailing lines per stream kept in a [`DispatchReport`].
pub const MAX_CAPTURED_LINES: usize = 200;

pub trait Dispatcher: Send + Sync {
    /// Starts `script` and returns without waiting for it.
    fn dispatch(&self, script: &str);
}

/// What happened to one script run, available to whoever awaits
/// [`ShellDispatcher::launch`].
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub id: String,
    pub script: String,
    /// `None` when the script never started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout_tail: Vec<String>,
    pub stderr_tail: Vec<String>,
    pub spawn_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShellDispatcher {
    shell: PathBuf,
}

impl Default for ShellDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl ShellDispatcher {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Spawns the script on a new task and hands back its handle.
    pub fn launch(&self, script: &str) -> JoinHandle<DispatchReport> {
        let id = Uuid::now_v7().to_string();
        let mut command = Command::new(&self.shell);
        command
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let script = script.to_string();
        tokio::spawn(run_script(id, script, command))
    }
}

impl Dispatcher for ShellDispatcher {
    fn dispatch(&self, script: &str) {
        // Dropping the handle detaches the task.
        drop(self.launch(script));
    }
}

async fn run_script(id: String, script: String, mut command: Command) -> DispatchReport {
    info!(target: "user_script", dispatch_id = %id, "Running script '{}'", script);

    let mut report = DispatchReport {
        id,
        script,
        exit_code: None,
        stdout_tail: Vec::new(),
        stderr_tail: Vec::new(),
        spawn_error: None,
    };

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(source) => {
            let e = DeployError::SpawnFailed {
                script: report.script.clone(),
                source,
            };
            error!(target: "user_script", dispatch_id = %report.id, "{}", e);
            report.spawn_error = Some(e.to_string());
            return report;
        }
    };

    let id = report.id.as_str();
    // Both pipes are drained together so a chatty stderr cannot stall the script
    let (stdout_tail, stderr_tail) = tokio::join!(
        drain_lines(child.stdout.take(), |line| {
            info!(target: "user_script", dispatch_id = %id, "{}", line)
        }),
        drain_lines(child.stderr.take(), |line| {
            warn!(target: "user_script", dispatch_id = %id, "{}", line)
        }),
    );
    report.stdout_tail = stdout_tail;
    report.stderr_tail = stderr_tail;

    match child.wait().await {
        Ok(status) if status.success() => {
            info!(target: "user_script", dispatch_id = %report.id, "Script '{}' finished", report.script);
            report.exit_code = status.code();
        }
        Ok(status) => {
            warn!(
                target: "user_script",
                dispatch_id = %report.id,
                "Script '{}' exited with {}",
                report.script,
                status
            );
            report.exit_code = status.code();
        }
        Err(e) => {
            error!(target: "user_script", dispatch_id = %report.id, "Failed to wait on script '{}': {}", report.script, e);
        }
    }

    report
}

/// Reads `reader` to EOF one line at a time, passing each line to `on_line`.
/// Returns the last [`MAX_CAPTURED_LINES`] lines.
async fn drain_lines<R, F>(reader: Option<R>, mut on_line: F) -> Vec<String>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let Some(reader) = reader else {
        return Vec::new();
    };

    let mut reader = BufReader::new(reader);
    let mut tail = VecDeque::with_capacity(MAX_CAPTURED_LINES);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                on_line(&line);
                if tail.len() == MAX_CAPTURED_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                warn!(target: "user_script", "Stopped reading script output: {}", e);
                break;
            }
        }
    }
    tail.into()
}

/// Logs and records scripts instead of running them.
#[derive(Debug, Default)]
pub struct DryRunDispatcher {
    invocations: Mutex<Vec<String>>,
}

impl DryRunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts passed to `dispatch`, oldest first.
    pub fn invocations(&self) -> Vec<String> {
        match self.invocations.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Dispatcher for DryRunDispatcher {
    fn dispatch(&self, script: &str) {
        info!("[DRY_RUN] Would run script '{}'", script);
        match self.invocations.lock() {
            Ok(mut guard) => guard.push(script.to_string()),
            Err(poisoned) => poisoned.into_inner().push(script.to_string()),
        }
    }
}
