//! Child process execution for the generation backend.
//!
//! The prompt is written to the child's stdin on one thread while two more
//! drain stdout and stderr, so neither a chatty nor a deaf backend can block
//! past the timeout.

use std::io::{ErrorKind, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes kept from one output stream, plus how many were dropped past the limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl Captured {
    pub fn lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Last non-empty stderr line, for error messages.
    pub fn stderr_tail(&self) -> String {
        self.stderr
            .lossy()
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .to_string()
    }
}

/// Spawn `cmd`, feed it `input` on stdin, and wait at most `timeout`.
///
/// At most `limit` bytes per stream are kept; the rest is read and discarded.
/// A child still running at the deadline is killed and reported with
/// `timed_out = true`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), limit, input_bytes = input.len()))]
pub fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    limit: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning backend process");
    let mut child = cmd.spawn().map_err(|err| {
        error!(%err, "failed to spawn backend");
        anyhow!(err).context("spawn command")
    })?;

    let stdout = spawn_reader(child.stdout.take(), limit, "stdout")?;
    let stderr = spawn_reader(child.stderr.take(), limit, "stderr")?;
    let stdin = spawn_writer(child.stdin.take(), input.to_vec())?;

    let (status, timed_out) = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => (status, false),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "backend timed out, killing");
            child.kill().context("kill command")?;
            (child.wait().context("wait command after kill")?, true)
        }
    };

    join_worker(stdin, "stdin")?;
    let stdout = join_worker(stdout, "stdout")?;
    let stderr = join_worker(stderr, "stderr")?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "backend output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "backend process finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Option<R>,
    limit: usize,
    label: &str,
) -> Result<JoinHandle<Result<Captured>>> {
    let stream = stream.ok_or_else(|| anyhow!("{label} was not piped"))?;
    Ok(thread::spawn(move || capture(stream, limit)))
}

/// Feed `input` on its own thread so a child that never reads cannot stall the timeout.
fn spawn_writer<W: Write + Send + 'static>(
    stream: Option<W>,
    input: Vec<u8>,
) -> Result<JoinHandle<Result<()>>> {
    let mut stream = stream.ok_or_else(|| anyhow!("stdin was not piped"))?;
    Ok(thread::spawn(move || {
        // A child that exits (or is killed) without reading its input is judged by its status.
        match stream.write_all(&input) {
            Err(err) if err.kind() != ErrorKind::BrokenPipe => Err(err).context("write input"),
            _ => Ok(()),
        }
    }))
}

fn join_worker<T>(handle: JoinHandle<Result<T>>, label: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("{label} thread panicked"))?
        .with_context(|| format!("pipe {label}"))
}

fn capture<R: Read>(mut reader: R, limit: usize) -> Result<Captured> {
    let mut captured = Captured::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(captured);
        }
        let keep = n.min(limit.saturating_sub(captured.bytes.len()));
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.dropped += n - keep;
    }
}
