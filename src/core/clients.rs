//! Fire-and-forget dispatch to external SVN clients.
//!
//! The cache never performs working copy operations itself. Commits, updates,
//! locks and the like are handed to a GUI client (or a plain `svn` command) as
//! a detached process. The client is chosen once from [`ClientKind`] in the
//! configuration; callers only see the [`ExternalClient`] capability trait.

use crate::core::error::{Result, SvnCacheError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};

/// Which external client handles user actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    TortoiseSvn,
    SnailSvn,
    CommandLine,
}

impl Default for ClientKind {
    fn default() -> Self {
        if cfg!(windows) {
            ClientKind::TortoiseSvn
        } else if cfg!(target_os = "macos") {
            ClientKind::SnailSvn
        } else {
            ClientKind::CommandLine
        }
    }
}

/// User action forwarded to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClientAction {
    CheckChanges,
    Update,
    Commit,
    Add,
    Revert,
    Lock,
    Unlock,
    Log,
    Blame,
    Cleanup,
    Switch,
}

/// Program and arguments of one client launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Start the process detached from this one. Nothing waits for it.
    pub fn spawn_detached(&self, working_dir: Option<&Path>) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        log::debug!("Launching: {}", self.command_line());
        let mut child = cmd
            .spawn()
            .map_err(|e| SvnCacheError::command_failed(self.command_line(), e.to_string()))?;
        // Reap in the background so the exited client does not linger as a zombie
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Capability interface of an external client
pub trait ExternalClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// How `action` on `paths` is expressed for this client
    fn invocation(&self, action: ClientAction, paths: &[String]) -> Invocation;

    fn run(
        &self,
        action: ClientAction,
        paths: &[String],
        working_dir: Option<&Path>,
    ) -> Result<()> {
        self.invocation(action, paths).spawn_detached(working_dir)
    }

    fn check_changes(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::CheckChanges, paths, None)
    }

    fn update(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Update, paths, None)
    }

    fn commit(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Commit, paths, None)
    }

    fn add(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Add, paths, None)
    }

    fn revert(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Revert, paths, None)
    }

    fn lock(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Lock, paths, None)
    }

    fn unlock(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Unlock, paths, None)
    }

    fn log(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Log, paths, None)
    }

    fn blame(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Blame, paths, None)
    }

    fn cleanup(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Cleanup, paths, None)
    }

    fn switch(&self, paths: &[String]) -> Result<()> {
        self.run(ClientAction::Switch, paths, None)
    }
}

/// TortoiseSVN through `TortoiseProc.exe /command:..`
#[derive(Debug, Default)]
pub struct TortoiseSvn;

impl ExternalClient for TortoiseSvn {
    fn name(&self) -> &'static str {
        "TortoiseSVN"
    }

    fn invocation(&self, action: ClientAction, paths: &[String]) -> Invocation {
        let command = match action {
            ClientAction::CheckChanges => "repostatus",
            ClientAction::Update => "update",
            ClientAction::Commit => "commit",
            ClientAction::Add => "add",
            ClientAction::Revert => "revert",
            ClientAction::Lock => "lock",
            ClientAction::Unlock => "unlock",
            ClientAction::Log => "log",
            ClientAction::Blame => "blame",
            ClientAction::Cleanup => "cleanup",
            ClientAction::Switch => "switch",
        };
        // Multiple paths are joined with '*'
        let joined = paths
            .iter()
            .map(|p| p.replace('/', "\\"))
            .collect::<Vec<_>>()
            .join("*");
        Invocation::new(
            "TortoiseProc.exe",
            vec![format!("/command:{command}"), format!("/path:{joined}")],
        )
    }
}

/// SnailSVN through its URL scheme, opened with `open`
#[derive(Debug, Default)]
pub struct SnailSvn;

impl ExternalClient for SnailSvn {
    fn name(&self) -> &'static str {
        "SnailSVN"
    }

    fn invocation(&self, action: ClientAction, paths: &[String]) -> Invocation {
        let command = match action {
            ClientAction::CheckChanges => "svn-check-for-modifications",
            ClientAction::Update => "svn-update",
            ClientAction::Commit => "svn-commit",
            ClientAction::Add => "svn-add",
            ClientAction::Revert => "svn-revert",
            ClientAction::Lock => "svn-lock",
            ClientAction::Unlock => "svn-unlock",
            ClientAction::Log => "svn-log",
            ClientAction::Blame => "svn-blame",
            ClientAction::Cleanup => "svn-cleanup",
            ClientAction::Switch => "svn-switch",
        };
        let urls = paths
            .iter()
            .map(|path| format!("snailsvnfree://{command}/{}", path.trim_start_matches('/')))
            .collect();
        Invocation::new("open", urls)
    }
}

/// Plain `svn` subcommands for systems without a GUI client
#[derive(Debug)]
pub struct CommandLine {
    svn: String,
}

impl CommandLine {
    pub fn new(svn: impl Into<String>) -> Self {
        Self { svn: svn.into() }
    }
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::new("svn")
    }
}

impl ExternalClient for CommandLine {
    fn name(&self) -> &'static str {
        "svn"
    }

    fn invocation(&self, action: ClientAction, paths: &[String]) -> Invocation {
        let subcommand = match action {
            ClientAction::CheckChanges => "status",
            ClientAction::Update => "update",
            ClientAction::Commit => "commit",
            ClientAction::Add => "add",
            ClientAction::Revert => "revert",
            ClientAction::Lock => "lock",
            ClientAction::Unlock => "unlock",
            ClientAction::Log => "log",
            ClientAction::Blame => "blame",
            ClientAction::Cleanup => "cleanup",
            ClientAction::Switch => "switch",
        };
        let mut args = vec![subcommand.to_string()];
        if action == ClientAction::Add {
            args.push("--parents".to_string());
        }
        args.extend(paths.iter().cloned());
        Invocation::new(self.svn.clone(), args)
    }
}

/// The client configured by `kind`
pub fn client_for(kind: ClientKind) -> Box<dyn ExternalClient> {
    match kind {
        ClientKind::TortoiseSvn => Box::new(TortoiseSvn),
        ClientKind::SnailSvn => Box::new(SnailSvn),
        ClientKind::CommandLine => Box::new(CommandLine::default()),
    }
}
