//! Front-end compiler run as a subprocess.
//!
//! The command receives the source on stdin and must print one JSON document
//! on stdout:
//!
//! ```json
//! { "compiledCode": "...", "compilationErrors": [ ... ] }
//! ```
//!
//! Diagnostics may be plain strings or objects with `message` (or
//! `messageText`), `line` and `column`.

use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use super::{Compilation, FrontEnd, FrontEndError};
use crate::types::Diagnostic;

/// Default compile budget
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 10_000;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCompilation {
    #[serde(default)]
    compiled_code: String,
    #[serde(default)]
    compilation_errors: Vec<WireDiagnostic>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireDiagnostic {
    Text(String),
    Detailed(Diagnostic),
}

impl From<WireDiagnostic> for Diagnostic {
    fn from(wire: WireDiagnostic) -> Self {
        match wire {
            WireDiagnostic::Text(message) => Self::new(message),
            WireDiagnostic::Detailed(diagnostic) => diagnostic,
        }
    }
}

/// Compiler invoked as an external command
#[derive(Clone, Debug)]
pub struct ExternalCompiler {
    program: String,
    args: Vec<String>,
    timeout_ms: u64,
}

impl ExternalCompiler {
    /// Create a compiler that runs `program` with `args`
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
        }
    }

    /// Parse a whitespace-separated command line such as `node tsc-bridge.js`
    #[must_use]
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self::new(program, words.collect()))
    }

    /// Override the compile budget
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn spawn_error(&self, reason: impl ToString) -> FrontEndError {
        FrontEndError::Spawn {
            command: self.program.clone(),
            reason: reason.to_string(),
        }
    }

    /// Polls until the child exits or `deadline` passes. The child is killed
    /// and reaped on every error return.
    fn wait(&self, child: &mut Child, deadline: Instant) -> Result<bool, FrontEndError> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status.success()),
                Ok(None) => {}
                Err(e) => {
                    abandon(child);
                    return Err(self.spawn_error(e));
                }
            }
            if Instant::now() >= deadline {
                abandon(child);
                return Err(FrontEndError::Timeout(self.timeout_ms));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn feed(
    stdin: Option<impl Write + Send + 'static>,
    source: String,
) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || match stdin {
        // Dropping the handle closes the pipe so the compiler sees EOF
        Some(mut stdin) => stdin.write_all(source.as_bytes()),
        None => Ok(()),
    })
}

fn drain(stream: Option<impl Read + Send + 'static>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut buffer);
        }
        buffer
    })
}

impl FrontEnd for ExternalCompiler {
    fn compile(&self, source: &str) -> Result<Compilation, FrontEndError> {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.timeout_ms);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Every pipe gets its own thread; only `wait` blocks this one
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let writer = feed(child.stdin.take(), source.to_owned());

        // On error the killed child closes its pipes, so the helper threads
        // finish on their own and are left detached.
        let success = self.wait(&mut child, deadline)?;

        match writer.join() {
            Ok(Ok(())) => {}
            // A compiler may exit without consuming all of its input
            Ok(Err(e)) => debug!(compiler = %self.program, error = %e, "stdin closed early"),
            Err(_) => debug!(compiler = %self.program, "stdin writer panicked"),
        }
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        debug!(
            compiler = %self.program,
            success,
            duration_ms = start.elapsed().as_millis() as u64,
            "front-end compilation finished"
        );

        let wire: WireCompilation = serde_json::from_str(stdout.trim()).map_err(|e| {
            if success {
                FrontEndError::InvalidOutput(e.to_string())
            } else {
                FrontEndError::InvalidOutput(format!("exited with failure: {}", stderr.trim()))
            }
        })?;

        Ok(Compilation {
            compiled_code: wire.compiled_code,
            compilation_errors: wire
                .compilation_errors
                .into_iter()
                .map(Diagnostic::from)
                .collect(),
        })
    }

    fn name(&self) -> &'static str {
        "external"
    }
}
