//! Temporary working copies backed by a scripted fake `svn`
//!
//! The fake executable logs its arguments to `calls.log` and replays canned
//! output. A response registered for the exact argument line wins; otherwise
//! for a subcommand `cmd` it prints `cmd.out` to stdout, or prints `cmd.err`
//! to stderr and exits 1. Online queries (`--show-updates`) look
//! for `online-cmd.out` / `online-cmd.err` instead. A `delay` file makes every
//! call sleep that many seconds first.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A working copy directory plus private config/cache homes. The TempDir
/// must be kept alive for the duration of the test.
pub struct TestWorkingCopy {
    pub temp_dir: TempDir,
    /// Working copy root
    pub path: PathBuf,
    /// Holds the fake `svn` and its canned responses
    pub fake_dir: PathBuf,
    /// Used as HOME / XDG_CONFIG_HOME / XDG_CACHE_HOME for spawned binaries
    pub home: PathBuf,
}

impl TestWorkingCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fake_svn(&self) -> PathBuf {
        self.fake_dir.join("svn")
    }

    /// Canned stdout for `svn <subcommand>`
    pub fn respond(&self, subcommand: &str, output: &str) -> anyhow::Result<()> {
        fs::write(self.fake_dir.join(format!("{subcommand}.out")), output)?;
        Ok(())
    }

    /// Canned stdout for the exact invocation `svn <args>`
    pub fn respond_to(&self, args: &str, output: &str) -> anyhow::Result<()> {
        fs::write(self.fake_dir.join(format!("args-{}.out", args_key(args))), output)?;
        Ok(())
    }

    /// Canned failure for `svn <subcommand>`
    pub fn fail(&self, subcommand: &str, stderr: &str) -> anyhow::Result<()> {
        fs::write(self.fake_dir.join(format!("{subcommand}.err")), stderr)?;
        Ok(())
    }

    /// Make every fake call take `seconds`
    pub fn set_delay(&self, seconds: f32) -> anyhow::Result<()> {
        fs::write(self.fake_dir.join("delay"), seconds.to_string())?;
        Ok(())
    }

    /// Argument lines of every fake call so far
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.fake_dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn config_dir(&self) -> PathBuf {
        self.home.join("config").join("svn-status-cache")
    }

    /// Write a config.json pointing at the fake `svn`
    pub fn write_config(&self, extra: serde_json::Value) -> anyhow::Result<()> {
        let mut config = serde_json::json!({
            "svn_cli_path": self.fake_svn(),
            "auto_refresh_interval_secs": 0,
            "local_timeout_ms": 5000,
            "online_timeout_ms": 5000,
        });
        if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        fs::create_dir_all(self.config_dir())?;
        fs::write(
            self.config_dir().join("config.json"),
            serde_json::to_string_pretty(&config)?,
        )?;
        Ok(())
    }

    /// Command for the binary, isolated from the user's config and cache
    pub fn command(&self) -> anyhow::Result<std::process::Command> {
        use assert_cmd::prelude::*;
        let mut cmd = std::process::Command::cargo_bin("svn-status-cache")?;
        cmd.current_dir(&self.path)
            .env("HOME", &self.home)
            .env("XDG_CONFIG_HOME", self.home.join("config"))
            .env("XDG_CACHE_HOME", self.home.join("cache"))
            .env("NO_COLOR", "1");
        Ok(cmd)
    }
}

/// Same mapping as the `tr` call in the fake script
fn args_key(args: &str) -> String {
    args.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

const FAKE_SVN: &str = r#"#!/bin/sh
DIR='@DIR@'
echo "$*" >> "$DIR/calls.log"
key=$(printf '%s' "$*" | tr -c 'A-Za-z0-9.-' '_')
if [ -f "$DIR/args-$key.out" ]; then
    cat "$DIR/args-$key.out"
    exit 0
fi
cmd="$1"
prefix=""
for arg in "$@"; do
    if [ "$arg" = "--show-updates" ]; then prefix="online-"; fi
done
if [ -f "$DIR/delay" ]; then sleep "$(cat "$DIR/delay")"; fi
if [ -f "$DIR/$prefix$cmd.err" ]; then
    cat "$DIR/$prefix$cmd.err" >&2
    exit 1
fi
if [ -f "$DIR/$prefix$cmd.out" ]; then
    cat "$DIR/$prefix$cmd.out"
fi
exit 0
"#;

/// Creates a working copy directory with a fake `svn` installed next to it
#[cfg(unix)]
pub fn setup_working_copy() -> anyhow::Result<TestWorkingCopy> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("wc");
    let fake_dir = temp_dir.path().join("fake");
    let home = temp_dir.path().join("home");
    fs::create_dir_all(path.join("Assets"))?;
    fs::create_dir_all(&fake_dir)?;
    fs::create_dir_all(&home)?;

    let script = FAKE_SVN.replace("@DIR@", &fake_dir.to_string_lossy());
    let svn = fake_dir.join("svn");
    fs::write(&svn, script)?;
    fs::set_permissions(&svn, fs::Permissions::from_mode(0o755))?;

    Ok(TestWorkingCopy {
        temp_dir,
        path,
        fake_dir,
        home,
    })
}
