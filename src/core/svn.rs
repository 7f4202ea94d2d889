//! Status queries against a working copy through the `svn` command line.
//!
//! [`SvnClient`] runs `svn` with English messages, applies the configured
//! timeouts and turns the captured [`ProcessResult`] into either the report
//! text or a classified [`SvnCacheError`]. Informational failures (not a
//! working copy, node not found, no `svn` installed) are absorbed into empty
//! results by the status queries.

use crate::core::config::CacheConfig;
use crate::core::error::{ErrorCategory, Result, SvnCacheError};
use crate::core::operation::{AsyncOperation, TickLoop};
use crate::core::shell::{ProcessOutcome, ProcessResult, Shell, ShellMonitor};
use crate::core::status_parser::{Depth, StatusOptions, StatusParser};
use crate::core::svn_status::{FileState, StatusRecord};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CLI: &str = "svn";

const NOT_A_WORKING_COPY: [&str; 2] = ["W155007", "E155007"];
const NODE_NOT_FOUND: [&str; 2] = ["W155010", "E155010"];
const CONNECTION_FAILURES: [&str; 4] = ["E170013", "E175002", "E670002", "E731001"];
const AUTHENTICATION_FAILURES: [&str; 3] = ["E170001", "E215004", "E175013"];

/// Synchronous `svn` invocations for one working copy
#[derive(Debug, Clone)]
pub struct SvnClient {
    shell: Shell,
    cli_path: PathBuf,
    /// The user configured `cli_path` explicitly
    explicit_cli: bool,
    working_copy: PathBuf,
    local_timeout: Duration,
    online_timeout: Duration,
}

impl SvnClient {
    pub fn new(working_copy: impl Into<PathBuf>) -> Self {
        let working_copy = working_copy.into();
        let defaults = CacheConfig::default();
        Self {
            shell: Shell::new()
                .in_dir(working_copy.clone())
                .with_env("LC_MESSAGES", "C"),
            cli_path: PathBuf::from(DEFAULT_CLI),
            explicit_cli: false,
            working_copy,
            local_timeout: defaults.local_timeout(),
            online_timeout: defaults.online_timeout(),
        }
    }

    pub fn from_config(working_copy: impl Into<PathBuf>, config: &CacheConfig) -> Self {
        let client = Self::new(working_copy)
            .with_timeouts(config.local_timeout(), config.online_timeout());
        match &config.svn_cli_path {
            Some(path) => client.with_cli_path(path),
            None => client,
        }
    }

    /// Use an explicit executable instead of `svn` from PATH
    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = path.into();
        self.explicit_cli = true;
        self
    }

    pub fn with_timeouts(mut self, local: Duration, online: Duration) -> Self {
        self.local_timeout = local;
        self.online_timeout = online;
        self
    }

    pub fn working_copy(&self) -> &Path {
        &self.working_copy
    }

    pub fn cli_path(&self) -> &Path {
        &self.cli_path
    }

    /// Run `svn` with `args` and return stdout, or the classified failure
    pub fn run(
        &self,
        args: &[String],
        timeout: Duration,
        monitor: Option<&dyn ShellMonitor>,
    ) -> Result<String> {
        let target = args.last().map(String::as_str).unwrap_or(".");
        let result = self.shell.execute(&self.cli_path, args, timeout, monitor);
        self.check(result, timeout, target)
    }

    fn check(&self, result: ProcessResult, timeout: Duration, target: &str) -> Result<String> {
        match result.outcome {
            ProcessOutcome::Completed => {}
            ProcessOutcome::NotFound if self.explicit_cli => {
                return Err(SvnCacheError::CliNotFound {
                    path: self.cli_path.clone(),
                })
            }
            ProcessOutcome::NotFound => return Err(SvnCacheError::CliNotInstalled),
            ProcessOutcome::TimedOut => {
                return Err(SvnCacheError::timeout(
                    result.command,
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
            ProcessOutcome::Aborted => return Err(SvnCacheError::aborted(result.command)),
            ProcessOutcome::SpawnFailed => {
                return Err(SvnCacheError::command_failed(result.command, result.error))
            }
        }

        if !result.has_errors() {
            return Ok(result.output);
        }

        let stderr = result.error.trim().to_string();
        if contains_any(&stderr, &NOT_A_WORKING_COPY) {
            return Err(SvnCacheError::NotAWorkingCopy {
                path: target.to_string(),
            });
        }
        if contains_any(&stderr, &NODE_NOT_FOUND) {
            return Err(SvnCacheError::NodeNotFound {
                path: target.to_string(),
            });
        }
        if contains_any(&stderr, &AUTHENTICATION_FAILURES) {
            return Err(SvnCacheError::Authentication { message: stderr });
        }
        if contains_any(&stderr, &CONNECTION_FAILURES) {
            return Err(SvnCacheError::Connection { message: stderr });
        }
        Err(SvnCacheError::command_failed(result.command, stderr))
    }

    /// Status of `path` alone. A path without changes reports `Normal`; one
    /// svn knows nothing about reports `FileState::None`.
    pub fn get_status(&self, path: &str) -> Result<StatusRecord> {
        let options = StatusOptions {
            depth: Depth::Empty,
            ..StatusOptions::default()
        };
        let records = self.get_statuses(path, options, None)?;
        Ok(records
            .into_iter()
            .next()
            .unwrap_or_else(|| StatusRecord::new(path, FileState::None)))
    }

    /// All records of a status query for `path`
    pub fn get_statuses(
        &self,
        path: &str,
        options: StatusOptions,
        monitor: Option<&dyn ShellMonitor>,
    ) -> Result<Vec<StatusRecord>> {
        let report = match self.status_report(path, &options, monitor) {
            Ok(report) => report,
            Err(e) if e.category() == ErrorCategory::Recoverable => {
                log::debug!("Status of '{path}' treated as empty: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut records = StatusParser::for_target(&report, options, path)
            .collect::<Result<Vec<_>>>()?;

        if !options.offline && options.fetch_lock_details {
            for record in records
                .iter_mut()
                .filter(|record| record.lock_state.has_resolvable_lock())
            {
                if let Err(e) = self.fetch_lock_details(record, monitor) {
                    log::warn!("Failed to fetch lock details of '{}': {e}", record.path);
                }
            }
        }

        log::debug!("Status of '{path}': {} record(s)", records.len());
        Ok(records)
    }

    /// Run [`get_statuses`](Self::get_statuses) on a worker thread and deliver
    /// the records on `tick_loop`. Failures arrive as error lines and an empty
    /// result.
    pub fn get_statuses_async(
        &self,
        tick_loop: &TickLoop,
        path: impl Into<String>,
        options: StatusOptions,
    ) -> AsyncOperation<Vec<StatusRecord>> {
        let client = self.clone();
        let path = path.into();
        AsyncOperation::start(tick_loop, move |handle| {
            client
                .get_statuses(&path, options, Some(handle))
                .unwrap_or_else(|e| {
                    handle.error(e.to_string());
                    Vec::new()
                })
        })
    }

    fn status_report(
        &self,
        path: &str,
        options: &StatusOptions,
        monitor: Option<&dyn ShellMonitor>,
    ) -> Result<String> {
        let mut args = vec![
            "status".to_string(),
            format!("--depth={}", options.depth.as_arg()),
        ];
        let timeout = if options.offline {
            self.local_timeout
        } else {
            args.push("--show-updates".to_string());
            self.online_timeout
        };
        args.push(path.to_string());
        self.run(&args, timeout, monitor)
    }

    /// Fill owner, date and comment of the lock on `record` from the repository
    pub fn fetch_lock_details(
        &self,
        record: &mut StatusRecord,
        monitor: Option<&dyn ShellMonitor>,
    ) -> Result<()> {
        let args = [
            "info".to_string(),
            "-r".to_string(),
            "HEAD".to_string(),
            record.path.clone(),
        ];
        let output = self.run(&args, self.online_timeout, monitor)?;
        let details = parse_lock_details(&output);
        record.lock_owner = details.owner;
        record.lock_date = details.date;
        record.lock_message = details.message;
        Ok(())
    }

    /// Value of `svn info --show-item <item> <target>`
    pub fn info_item(&self, item: &str, target: &str) -> Result<String> {
        let args = [
            "info".to_string(),
            "--show-item".to_string(),
            item.to_string(),
            target.to_string(),
        ];
        Ok(self.run(&args, self.local_timeout, None)?.trim().to_string())
    }

    /// Entries of a repository folder. Folders keep their trailing `/`.
    pub fn list(&self, url: &str, monitor: Option<&dyn ShellMonitor>) -> Result<Vec<String>> {
        let args = ["list".to_string(), url.to_string()];
        let output = self.run(&args, self.online_timeout, monitor)?;
        Ok(output
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn contains_any(text: &str, codes: &[&str]) -> bool {
    codes.iter().any(|code| text.contains(code))
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LockDetails {
    pub owner: Option<String>,
    pub date: Option<String>,
    pub message: Option<String>,
}

/// Extract the lock fields of an `svn info` report
pub fn parse_lock_details(report: &str) -> LockDetails {
    let mut details = LockDetails::default();
    let mut lines = report.lines();
    while let Some(line) = lines.next() {
        if let Some(owner) = line.strip_prefix("Lock Owner:") {
            details.owner = Some(owner.trim().to_string());
        } else if let Some(date) = line.strip_prefix("Lock Created:") {
            details.date = Some(date.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Lock Comment (") {
            // "Lock Comment (2 lines):" followed by exactly that many lines
            let count = rest
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0);
            let comment: Vec<&str> = lines.by_ref().take(count).collect();
            details.message = Some(comment.join("\n"));
        }
    }
    details
}
