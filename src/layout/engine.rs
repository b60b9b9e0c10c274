//! The seam to the external layout engine.
//!
//! The engine assigns `x`/`y`/`width`/`height` and edge routes to an annotated
//! request. The bundled transport pipes the request as JSON into a child
//! process (for example a small `elkjs` script) and reads the laid-out graph
//! back from its stdout.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;

use super::LayoutGraph;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_DETAIL_LEN: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum LayoutEngineError {
    #[error("failed to start layout engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("layout engine i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("layout engine timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("layout engine exited with status {code:?}: {detail}")]
    Status { code: Option<i32>, detail: String },
    #[error("layout engine returned an invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl LayoutEngineError {
    /// Failures worth another attempt; the engine is idempotent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::Io(_) | Self::Timeout { .. }
        )
    }
}

pub trait LayoutEngine {
    fn layout(&self, request: &LayoutGraph) -> Result<LayoutGraph, LayoutEngineError>;
}

impl<T: LayoutEngine + ?Sized> LayoutEngine for &T {
    fn layout(&self, request: &LayoutGraph) -> Result<LayoutGraph, LayoutEngineError> {
        (**self).layout(request)
    }
}

impl<T: LayoutEngine + ?Sized> LayoutEngine for Box<T> {
    fn layout(&self, request: &LayoutGraph) -> Result<LayoutGraph, LayoutEngineError> {
        (**self).layout(request)
    }
}

/// Returns a response computed elsewhere, regardless of the request.
#[derive(Debug, Clone)]
pub struct PrecomputedLayout(pub LayoutGraph);

impl LayoutEngine for PrecomputedLayout {
    fn layout(&self, _request: &LayoutGraph) -> Result<LayoutGraph, LayoutEngineError> {
        Ok(self.0.clone())
    }
}

/// Runs an external program per request: JSON on stdin, JSON on stdout.
#[derive(Debug, Clone)]
pub struct CommandLayoutEngine {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandLayoutEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl LayoutEngine for CommandLayoutEngine {
    fn layout(&self, request: &LayoutGraph) -> Result<LayoutGraph, LayoutEngineError> {
        let payload = serde_json::to_vec(request)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LayoutEngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| broken_pipe("stdin"))?;
        let mut stdout = child.stdout.take().ok_or_else(|| broken_pipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| broken_pipe("stderr"))?;
        // Pipe threads report over a channel so collecting output shares the
        // deadline. A grandchild can hold a pipe open after the child exits.
        let (tx, rx) = mpsc::channel();
        let stdin_tx = tx.clone();
        thread::spawn(move || {
            let _ = stdin_tx.send(Pipe::Stdin(stdin.write_all(&payload)));
        });
        let stdout_tx = tx.clone();
        thread::spawn(move || {
            let _ = stdout_tx.send(Pipe::Stdout(read_all(&mut stdout)));
        });
        thread::spawn(move || {
            let _ = tx.send(Pipe::Stderr(read_all(&mut stderr)));
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(LayoutEngineError::Timeout {
                    after: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut write_result = None;
        let mut stdout = None;
        let mut stderr = None;
        while write_result.is_none() || stdout.is_none() || stderr.is_none() {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            match rx.recv_timeout(remaining) {
                Ok(Pipe::Stdin(result)) => write_result = Some(result),
                Ok(Pipe::Stdout(result)) => stdout = Some(result?),
                Ok(Pipe::Stderr(result)) => stderr = Some(result?),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(LayoutEngineError::Timeout {
                        after: self.timeout,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(LayoutEngineError::Io(io::Error::other(
                        "layout engine pipe thread panicked",
                    )));
                }
            }
        }
        let stdout = stdout.unwrap_or_default();
        let stderr = stderr.unwrap_or_default();

        if !status.success() {
            let mut detail = String::from_utf8_lossy(&stderr).trim().to_string();
            if detail.len() > MAX_DETAIL_LEN {
                let cut = (0..=MAX_DETAIL_LEN)
                    .rev()
                    .find(|&idx| detail.is_char_boundary(idx))
                    .unwrap_or(0);
                detail.truncate(cut);
            }
            return Err(LayoutEngineError::Status {
                code: status.code(),
                detail,
            });
        }
        // A child that exits without draining stdin is fine as long as it answered.
        if let Some(Err(err)) = write_result {
            if err.kind() != io::ErrorKind::BrokenPipe {
                return Err(err.into());
            }
        }
        Ok(serde_json::from_slice(&stdout)?)
    }
}

fn broken_pipe(stream: &str) -> LayoutEngineError {
    LayoutEngineError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("layout engine {stream} unavailable"),
    ))
}

enum Pipe {
    Stdin(io::Result<()>),
    Stdout(io::Result<Vec<u8>>),
    Stderr(io::Result<Vec<u8>>),
}

fn read_all(stream: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Retries transient failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryingEngine<E> {
    inner: E,
    attempts: u32,
    backoff: Duration,
}

impl<E: LayoutEngine> RetryingEngine<E> {
    pub fn new(inner: E, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl<E: LayoutEngine> LayoutEngine for RetryingEngine<E> {
    fn layout(&self, request: &LayoutGraph) -> Result<LayoutGraph, LayoutEngineError> {
        let mut attempt = 1;
        loop {
            match self.inner.layout(request) {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    let delay = self.backoff.saturating_mul(1 << (attempt - 1).min(16));
                    tracing::info!(attempt, ?delay, "layout engine failed, retrying: {err}");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Builds the configured command transport, if a command is set.
pub fn engine_from_config(config: &EngineConfig) -> Option<RetryingEngine<CommandLayoutEngine>> {
    let program = config.command.as_deref()?;
    let command = CommandLayoutEngine::new(program)
        .args(config.args.iter().cloned())
        .timeout(Duration::from_millis(config.timeout_ms));
    Some(RetryingEngine::new(
        command,
        config.retry_attempts,
        Duration::from_millis(config.retry_backoff_ms),
    ))
}
