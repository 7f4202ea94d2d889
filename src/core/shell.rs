//! External command invocation.
//!
//! [`Shell::execute`] runs one external process to completion, capturing its
//! stdout and stderr into a [`ProcessResult`]. Output is streamed line by line
//! to an optional [`ShellMonitor`], which can also request an abort. Every
//! invocation carries its own timeout; a timeout is reported as a failed result
//! with a synthetic error message rather than as an `Err`.

use crossbeam_channel::{unbounded, RecvTimeoutError};
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const GRACEFUL_EXIT_WINDOW: Duration = Duration::from_millis(500);
const STREAM_DRAIN_LIMIT: Duration = Duration::from_secs(1);

/// How a process invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    /// The executable could not be found
    NotFound,
    /// Spawning failed for another reason
    SpawnFailed,
    TimedOut,
    Aborted,
}

/// Captured output of one external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Command line, for logs and error messages
    pub command: String,
    pub output: String,
    pub error: String,
    pub outcome: ProcessOutcome,
}

impl ProcessResult {
    pub fn has_errors(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Abort levels a monitor can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbortRequest {
    #[default]
    None,
    /// Close the process input and give it a short window to exit
    Graceful,
    /// Kill the process immediately
    Kill,
}

/// Observer of a running command. Called from the thread running `execute`.
pub trait ShellMonitor: Send + Sync {
    fn abort_request(&self) -> AbortRequest {
        AbortRequest::None
    }

    fn on_output_line(&self, _line: &str) {}

    fn on_error_line(&self, _line: &str) {}
}

enum StreamLine {
    Output(String),
    Error(String),
}

/// Synchronous process runner
#[derive(Debug, Clone, Default)]
pub struct Shell {
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir`
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Run `command` with `args`, waiting at most `timeout` for it to finish.
    pub fn execute<S: AsRef<OsStr>>(
        &self,
        command: impl AsRef<OsStr>,
        args: &[S],
        timeout: Duration,
        monitor: Option<&dyn ShellMonitor>,
    ) -> ProcessResult {
        let command = command.as_ref();
        let command_line = describe(command, args);
        log::debug!("Executing: {command_line}");

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let outcome = if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessOutcome::NotFound
                } else {
                    ProcessOutcome::SpawnFailed
                };
                log::debug!("Failed to start '{command_line}': {e}");
                return ProcessResult {
                    error: format!("Failed to start '{command_line}': {e}"),
                    command: command_line,
                    output: String::new(),
                    outcome,
                };
            }
        };

        let (line_tx, line_rx) = unbounded::<StreamLine>();
        if let Some(stdout) = child.stdout.take() {
            let tx = line_tx.clone();
            thread::spawn(move || forward_lines(stdout, |line| tx.send(StreamLine::Output(line))));
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = line_tx.clone();
            thread::spawn(move || forward_lines(stderr, |line| tx.send(StreamLine::Error(line))));
        }
        drop(line_tx);

        let mut output = String::new();
        let mut error = String::new();
        let mut collect = |line: StreamLine| match line {
            StreamLine::Output(line) => {
                if let Some(monitor) = monitor {
                    monitor.on_output_line(&line);
                }
                output.push_str(&line);
                output.push('\n');
            }
            StreamLine::Error(line) => {
                if let Some(monitor) = monitor {
                    monitor.on_error_line(&line);
                }
                error.push_str(&line);
                error.push('\n');
            }
        };

        let start = Instant::now();
        let mut outcome = ProcessOutcome::Completed;
        loop {
            match line_rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => collect(line),
                Err(RecvTimeoutError::Timeout) => {}
                // Both streams closed, the process is about to exit
                Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
            }

            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Failed to poll '{command_line}': {e}");
                    terminate(&mut child);
                    break;
                }
            }

            let request = monitor
                .map(|m| m.abort_request())
                .unwrap_or(AbortRequest::None);
            if request != AbortRequest::None {
                log::debug!("Aborting '{command_line}' ({request:?})");
                if request == AbortRequest::Graceful {
                    close_gracefully(&mut child);
                } else {
                    terminate(&mut child);
                }
                outcome = ProcessOutcome::Aborted;
                break;
            }

            if start.elapsed() >= timeout {
                log::warn!(
                    "Timeout of {}ms reached for '{command_line}'",
                    timeout.as_millis()
                );
                terminate(&mut child);
                outcome = ProcessOutcome::TimedOut;
                break;
            }
        }

        // A grandchild may keep the pipes open; stop once the streams go quiet
        let mut last_line = Instant::now();
        loop {
            match line_rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    collect(line);
                    last_line = Instant::now();
                }
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if last_line.elapsed() >= STREAM_DRAIN_LIMIT {
                        break;
                    }
                }
            }
        }

        match outcome {
            ProcessOutcome::TimedOut => {
                error.push_str(&format!(
                    "Timeout of {}ms reached for command: {command_line}\n",
                    timeout.as_millis()
                ));
            }
            ProcessOutcome::Aborted => {
                error.push_str(&format!("Command aborted: {command_line}\n"));
            }
            _ => {}
        }

        ProcessResult {
            command: command_line,
            output,
            error,
            outcome,
        }
    }
}

fn forward_lines<R: Read, F>(stream: R, mut send: F)
where
    F: FnMut(String) -> std::result::Result<(), crossbeam_channel::SendError<StreamLine>>,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("Stopped reading process output: {e}");
                break;
            }
        }
        // Non-UTF-8 file names still produce a line
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        if send(line).is_err() {
            break;
        }
    }
}

fn close_gracefully(child: &mut Child) {
    drop(child.stdin.take());
    let start = Instant::now();
    while start.elapsed() < GRACEFUL_EXIT_WINDOW {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
    terminate(child);
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn describe<S: AsRef<OsStr>>(command: &OsStr, args: &[S]) -> String {
    let mut line = command.to_string_lossy().into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}
