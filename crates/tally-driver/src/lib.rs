//! # tally-driver
//!
//! Launches an external interactive program, feeds it a [`CommandScript`]
//! line by line with pacing, and captures its merged stdout and stderr.
//!
//! The whole interaction is bounded by a timeout. On expiry the child is
//! killed and reaped and the partial output is returned. Children are spawned
//! with `kill_on_drop`, so none outlives [`Driver::run`].
//!
//! [`CommandScript`]: tally_core::CommandScript

pub mod capture;
pub mod error;
pub mod outcome;
pub mod request;

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub use capture::Capture;
pub use error::DriverError;
pub use outcome::{DriveOutcome, Termination};
pub use request::DriveRequest;

/// How long output drainers may keep reading after the child is gone.
/// Grandchildren can hold the pipes open; past this they are abandoned.
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct Driver {
    drain_grace: Duration,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    #[must_use]
    pub const fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Run one scripted interaction to completion or timeout.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Launch` if the program cannot be started, and
    /// `DriverError::Io` if writing to the child fails for a reason other
    /// than the child closing its input.
    pub async fn run(&self, request: &DriveRequest) -> Result<DriveOutcome, DriverError> {
        let started = Instant::now();

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .envs(request.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| DriverError::Launch {
            program: request.program.clone(),
            source,
        })?;
        tracing::info!(
            program = %request.program,
            pid = child.id(),
            lines = request.script.len(),
            "driven process started"
        );

        let capture = Capture::new(request.max_output_bytes);
        let mut drainers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drainers.push(tokio::spawn(capture.clone().drain(stdout, "stdout")));
        }
        if let Some(stderr) = child.stderr.take() {
            drainers.push(tokio::spawn(capture.clone().drain(stderr, "stderr")));
        }
        let stdin = child.stdin.take();

        let mut lines_sent = 0;
        let result = tokio::time::timeout(
            request.timeout,
            interact(&mut child, stdin, request, &mut lines_sent),
        )
        .await;

        let termination = match result {
            Ok(status) => Termination::Exited {
                code: status?.code(),
            },
            Err(_) => {
                tracing::warn!(
                    program = %request.program,
                    timeout_secs = request.timeout.as_secs_f64(),
                    "driven process timed out, killing"
                );
                kill_and_reap(&mut child).await;
                Termination::TimedOut
            }
        };

        self.join_drainers(drainers).await;
        let (output, truncated) = capture.snapshot();
        let elapsed = started.elapsed();

        tracing::info!(
            program = %request.program,
            %termination,
            lines_sent,
            output_bytes = output.len(),
            truncated,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "driven process finished"
        );

        Ok(DriveOutcome {
            output,
            termination,
            lines_sent,
            elapsed,
            truncated,
        })
    }

    async fn join_drainers(&self, drainers: Vec<JoinHandle<()>>) {
        let deadline = Instant::now() + self.drain_grace;
        for drainer in drainers {
            let abort = drainer.abort_handle();
            if tokio::time::timeout_at(deadline, drainer).await.is_err() {
                tracing::debug!("output pipe still open after exit, abandoning drain");
                abort.abort();
            }
        }
    }
}

/// Startup delay, paced feeding, then wait for exit.
async fn interact(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    request: &DriveRequest,
    lines_sent: &mut usize,
) -> Result<ExitStatus, DriverError> {
    if !request.startup_delay.is_zero() {
        tracing::debug!(
            secs = request.startup_delay.as_secs_f64(),
            "waiting for target startup"
        );
        tokio::time::sleep(request.startup_delay).await;
    }

    if let Some(mut stdin) = stdin {
        for line in request.script.lines() {
            match write_line(&mut stdin, line).await {
                Ok(()) => *lines_sent += 1,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(
                        lines_sent = *lines_sent,
                        "target closed its input, stopping feed"
                    );
                    break;
                }
                Err(e) => return Err(DriverError::Io(e)),
            }
            if !request.step_delay.is_zero() {
                tokio::time::sleep(request.step_delay).await;
            }
        }
        // EOF on the child's stdin.
        drop(stdin);
    }

    Ok(child.wait().await?)
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

async fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "kill failed, process may have exited");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(error = %e, "failed to reap killed process");
    }
}
