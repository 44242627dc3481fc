//! # External Programs
//!
//! Runs `external` implementations as child processes. The payload is an
//! executable path and `parameters.args` its arguments. The child gets an
//! empty environment, reads the inputs document on stdin and writes the
//! outputs document to stdout.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use super::errors::{FunctionError, FunctionResult};
use super::function::FunctionDef;
use super::invoker::{parse_outputs, Invokable};
use super::runtime::RuntimeConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bytes of stderr kept for error messages
const STDERR_LIMIT: usize = 4096;

/// Captured stream and whether it overran its limit
type Captured = (Vec<u8>, bool);

/// An executable implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProgram {
    path: PathBuf,
    args: Vec<String>,
}

impl ExternalProgram {
    /// Resolve the executable and its arguments from a function definition
    pub fn from_function(function: &FunctionDef) -> FunctionResult<Self> {
        let path = PathBuf::from(function.implementation.trim());
        if path.as_os_str().is_empty() {
            return Err(FunctionError::CompilationError(
                "external implementation must name an executable".into(),
            ));
        }
        if !path.is_file() {
            return Err(FunctionError::CompilationError(format!(
                "executable {} does not exist",
                path.display()
            )));
        }

        let args = match function.parameters.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        FunctionError::CompilationError(
                            "parameters.args must be an array of strings".into(),
                        )
                    })
                })
                .collect::<FunctionResult<_>>()?,
            Some(_) => {
                return Err(FunctionError::CompilationError(
                    "parameters.args must be an array of strings".into(),
                ))
            }
        };

        Ok(Self { path, args })
    }

    fn spawn(&self) -> FunctionResult<Child> {
        Command::new(&self.path)
            .args(&self.args)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FunctionError::InvocationFailure(format!(
                    "failed to start {}: {}",
                    self.path.display(),
                    e
                ))
            })
    }
}

impl Invokable for ExternalProgram {
    fn call(
        &self,
        inputs: &BTreeMap<String, Value>,
        config: &RuntimeConfig,
    ) -> FunctionResult<Map<String, Value>> {
        let input = serde_json::to_vec(inputs)
            .map_err(|e| FunctionError::Internal(format!("encode inputs: {}", e)))?;

        let mut child = self.spawn()?;
        let writer = child.stdin.take().map(|stdin| feed(stdin, input));
        let stdout = child
            .stdout
            .take()
            .map(|out| capture(out, config.max_memory_bytes));
        let stderr = child.stderr.take().map(|err| capture(err, STDERR_LIMIT));

        let deadline = Instant::now() + config.timeout();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(FunctionError::Timeout(config.timeout_ms));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(FunctionError::InvocationFailure(format!(
                        "waiting for {}: {}",
                        self.path.display(),
                        e
                    )));
                }
            }
        };

        if let Some(writer) = writer {
            join(writer)?.map_err(|e| {
                FunctionError::InvocationFailure(format!("writing inputs: {}", e))
            })?;
        }
        let (output, overflow) = match stdout {
            Some(handle) => join(handle)?,
            None => (Vec::new(), false),
        };
        let (errors, _) = match stderr {
            Some(handle) => join(handle)?,
            None => (Vec::new(), false),
        };

        if overflow {
            return Err(FunctionError::ResourceExhausted(format!(
                "output exceeded {} bytes",
                config.max_memory_bytes
            )));
        }
        if !status.success() {
            let stderr = String::from_utf8_lossy(&errors);
            return Err(FunctionError::InvocationFailure(format!(
                "{} exited with {}: {}",
                self.path.display(),
                status,
                stderr.trim()
            )));
        }

        parse_outputs(&output)
    }
}

fn feed(mut stdin: ChildStdin, input: Vec<u8>) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || match stdin.write_all(&input) {
        // The program may exit without reading its inputs
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    })
}

fn capture<R: Read + Send + 'static>(reader: R, limit: usize) -> JoinHandle<Captured> {
    thread::spawn(move || {
        let mut reader = reader;
        let mut buffer = Vec::new();
        let _ = (&mut reader)
            .take(limit as u64 + 1)
            .read_to_end(&mut buffer);
        let overflow = buffer.len() > limit;
        buffer.truncate(limit);
        // Keep draining so the child never blocks on a full pipe
        let _ = io::copy(&mut reader, &mut io::sink());
        (buffer, overflow)
    })
}

fn join<T>(handle: JoinHandle<T>) -> FunctionResult<T> {
    handle
        .join()
        .map_err(|_| FunctionError::Internal("I/O thread panicked".into()))
}
