//! One server process per scenario.
//!
//! [`run_request`] owns the whole lifecycle of a spawned server: it writes
//! the request, drains both output streams, enforces the timeout and makes
//! sure nothing from the server's process group is left running.
//! [`run_suite`] chains scenarios strictly one after another.

use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tracing::{debug, warn};

use crate::launch::LaunchSpec;
use crate::rpc::{Request, initialize_request, initialized_notification};
use crate::scenario::Scenario;
use crate::verdict::{self, Verdict};

/// Ceiling on one scenario's exchange with the server.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a timed-out server gets between SIGTERM and SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

#[cfg(unix)]
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Knobs for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub timeout: Duration,
    pub kill_grace: Duration,
    /// Send the MCP `initialize` handshake before each scenario's request.
    pub handshake: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
            handshake: false,
        }
    }
}

/// Everything the server printed before it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Captured standard output (lossily decoded).
    pub stdout: String,
    /// Captured standard error (lossily decoded).
    pub stderr: String,
    /// The exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// How one invocation of the server ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The server exited; its output was captured.
    Success(CapturedOutput),
    /// The server did not exit in time and was terminated.
    Timeout { after: Duration },
    /// The server could not be started.
    LaunchError(String),
    /// Encoding the request, writing it, or collecting output failed.
    CommunicationError(String),
}

impl InvocationOutcome {
    /// Captured output, if the server exited on its own.
    pub fn output(&self) -> Option<&CapturedOutput> {
        match self {
            InvocationOutcome::Success(output) => Some(output),
            _ => None,
        }
    }
}

impl fmt::Display for InvocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationOutcome::Success(output) => match output.exit_code {
                Some(code) => write!(f, "server exited with code {code}"),
                None => write!(f, "server terminated by signal"),
            },
            InvocationOutcome::Timeout { after } => {
                write!(f, "server did not exit within {after:?}; terminated")
            }
            InvocationOutcome::LaunchError(reason) => write!(f, "launch failed: {reason}"),
            InvocationOutcome::CommunicationError(reason) => {
                write!(f, "communication failed: {reason}")
            }
        }
    }
}

/// The result of running one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub outcome: InvocationOutcome,
    pub verdict: Verdict,
    /// Wall-clock duration in milliseconds, including spawn and teardown.
    pub duration_ms: i64,
}

/// Send one request to a freshly spawned server and collect its reply.
///
/// The request is serialized before the process is spawned. The payload
/// is written to stdin, which is then closed; stdout and stderr are
/// drained concurrently while waiting for exit, all bounded by
/// `options.timeout`. A server still running at the deadline is
/// terminated and reaped before this returns. On Unix the server runs in
/// its own process group; processes it started are stopped with it, and
/// any still holding its pipes after it exits are stopped too.
///
/// Never fails: every problem is reported as an [`InvocationOutcome`].
pub async fn run_request(
    spec: &LaunchSpec,
    request: &Request,
    options: &RunOptions,
) -> InvocationOutcome {
    let payload = match encode_payload(request, options.handshake) {
        Ok(payload) => payload,
        Err(e) => {
            return InvocationOutcome::CommunicationError(format!(
                "failed to encode request {}: {e}",
                request.id
            ));
        }
    };

    let mut child = match spec.to_command().spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %spec.display_command(), error = %e, "failed to launch server");
            return InvocationOutcome::LaunchError(format!(
                "failed to launch `{}`: {e}",
                spec.display_command()
            ));
        }
    };
    let pid = child.id();
    // The child leads its own group, so the group outlives its pid handle.
    let pgid = pid;
    debug!(?pid, command = %spec.display_command(), id = %request.id, "spawned server");

    let stdin = child.stdin.take();
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    // Dropping the pipe at the end of this block closes the server's stdin.
    let write_request = async move {
        let Some(mut pipe) = stdin else {
            return Ok(());
        };
        tolerate_broken_pipe(pipe.write_all(payload.as_bytes()).await, pid)?;
        tolerate_broken_pipe(pipe.flush().await, pid)
    };

    let read_stdout = async {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, io::Error>(String::from_utf8_lossy(&buf).into_owned())
    };

    let read_stderr = async {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, io::Error>(String::from_utf8_lossy(&buf).into_owned())
    };

    let wait_for_exit = async {
        let status = child.wait().await;
        // Leftover descendants would hold the pipes open until the deadline.
        #[cfg(unix)]
        {
            if let (Ok(_), Some(pgid)) = (&status, pgid) {
                stop_group(pgid, options.kill_grace, &mut child).await;
            }
        }
        status
    };

    let exchange = tokio::time::timeout(options.timeout, async {
        tokio::join!(write_request, wait_for_exit, read_stdout, read_stderr)
    })
    .await;

    match exchange {
        Ok((written, status, stdout, stderr)) => {
            if let Err(e) = written {
                return communication_error(pid, format!("failed to write request to stdin: {e}"));
            }
            let status = match status {
                Ok(status) => status,
                Err(e) => {
                    return communication_error(pid, format!("failed to wait on server: {e}"));
                }
            };
            let (stdout, stderr) = match (stdout, stderr) {
                (Ok(stdout), Ok(stderr)) => (stdout, stderr),
                (Err(e), _) => {
                    return communication_error(pid, format!("failed to read stdout: {e}"));
                }
                (_, Err(e)) => {
                    return communication_error(pid, format!("failed to read stderr: {e}"));
                }
            };

            debug!(?pid, exit_code = ?status.code(), "server exited");
            InvocationOutcome::Success(CapturedOutput {
                stdout,
                stderr,
                exit_code: status.code(),
            })
        }
        Err(_) => {
            warn!(?pid, timeout = ?options.timeout, "server did not exit in time, terminating");
            terminate(&mut child, pgid, options.kill_grace).await;
            InvocationOutcome::Timeout {
                after: options.timeout,
            }
        }
    }
}

/// Run one scenario and judge its reply.
pub async fn run_scenario(
    spec: &LaunchSpec,
    scenario: &Scenario,
    options: &RunOptions,
) -> ScenarioReport {
    let start = Instant::now();
    let outcome = run_request(spec, &scenario.request, options).await;
    let duration_ms = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);
    let verdict = verdict::evaluate(&scenario.request.id, scenario.expect, &outcome);
    debug!(scenario = %scenario.name, duration_ms, %verdict, "scenario finished");

    ScenarioReport {
        scenario: scenario.clone(),
        outcome,
        verdict,
        duration_ms,
    }
}

/// Run scenarios one after another, each against its own server process.
///
/// `on_report` is called as soon as each scenario finishes, so callers can
/// print progressively. A failing scenario never stops the ones after it.
pub async fn run_suite<F>(
    spec: &LaunchSpec,
    scenarios: &[Scenario],
    options: &RunOptions,
    mut on_report: F,
) -> Vec<ScenarioReport>
where
    F: FnMut(usize, &ScenarioReport),
{
    let mut reports = Vec::with_capacity(scenarios.len());
    for (index, scenario) in scenarios.iter().enumerate() {
        debug!(scenario = %scenario.name, "running scenario");
        let report = run_scenario(spec, scenario, options).await;
        on_report(index, &report);
        reports.push(report);
    }
    reports
}

fn encode_payload(request: &Request, handshake: bool) -> Result<String, serde_json::Error> {
    let mut payload = String::new();
    if handshake {
        payload.push_str(&initialize_request().to_line()?);
        payload.push_str(&initialized_notification().to_line()?);
    }
    payload.push_str(&request.to_line()?);
    Ok(payload)
}

/// A server that exits without reading stdin is not an error: whatever it
/// printed is still reported.
fn tolerate_broken_pipe(result: io::Result<()>, pid: Option<u32>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!(?pid, "server closed stdin before reading the request");
            Ok(())
        }
        other => other,
    }
}

fn communication_error(pid: Option<u32>, reason: String) -> InvocationOutcome {
    warn!(?pid, %reason, "server communication failed");
    InvocationOutcome::CommunicationError(reason)
}

/// Stop the server and its process group: SIGTERM, wait up to `grace`,
/// then SIGKILL. Always reaps the child.
async fn terminate(child: &mut Child, pgid: Option<u32>, grace: Duration) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pgid {
            stop_group(pgid, grace, child).await;
            if matches!(child.try_wait(), Ok(Some(_))) {
                return;
            }
            warn!(pgid, "server still running after signalling its process group");
        }
    }
    #[cfg(not(unix))]
    let _ = (pgid, grace);

    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill server");
    }
}

/// SIGTERM every process in the group, give the group `grace` to empty
/// while reaping `child`, then SIGKILL whatever is left.
///
/// Does nothing if the group is already gone.
#[cfg(unix)]
async fn stop_group(pgid: u32, grace: Duration, child: &mut Child) {
    if !signal_group(pgid, libc::SIGTERM) {
        return;
    }
    debug!(pgid, "sent SIGTERM to server process group");

    let emptied = tokio::time::timeout(grace, async {
        let _ = child.wait().await;
        while signal_group(pgid, 0) {
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }
    })
    .await;

    match emptied {
        Ok(()) => debug!(pgid, "server process group exited after SIGTERM"),
        Err(_) => {
            debug!(pgid, "server process group still running after SIGTERM, sending SIGKILL");
            signal_group(pgid, libc::SIGKILL);
            // Bounded: a child that left the group is not hit by killpg.
            let _ = tokio::time::timeout(grace, child.wait()).await;
        }
    }
}

/// Send `signal` to every process in the group. Returns whether any
/// process received it; signal 0 only checks that the group exists.
#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    // SAFETY: killpg has no memory-safety preconditions.
    unsafe { libc::killpg(pgid, signal) == 0 }
}
