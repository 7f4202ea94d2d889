use assert_cmd::Command;
use predicates::prelude::*;
use svn_status_cache::core::{FileState, LockState, RemoteState, StatusEntry};

mod common;
use common::{assertions::*, fixtures::*};

fn parse_cmd() -> anyhow::Result<Command> {
    let mut cmd = Command::cargo_bin("svn-status-cache")?;
    cmd.arg("parse").env("NO_COLOR", "1");
    Ok(cmd)
}

#[cfg(test)]
mod parse_command_tests {
    use super::*;

    #[test]
    fn test_mixed_report_yields_one_record_per_status_line() -> anyhow::Result<()> {
        let output = parse_cmd()?
            .arg("--json")
            .write_stdin(MIXED_REPORT)
            .output()?;
        assert!(output.status.success());

        let records = parse_records(&output.stdout)?;
        assert_states(
            &records,
            &[FileState::Modified, FileState::Unversioned, FileState::Conflicted],
        );
        assert_eq!(records[2].path, "Assets/Scenes/Main.unity");
        assert!(records[2].is_conflicted());
        Ok(())
    }

    #[test]
    fn test_moved_pair_skips_continuation_lines() -> anyhow::Result<()> {
        let output = parse_cmd()?
            .arg("--json")
            .write_stdin(MOVED_REPORT)
            .output()?;
        let records = parse_records(&output.stdout)?;
        assert_states(&records, &[FileState::Deleted, FileState::Added]);
        assert_eq!(records[1].path, "Assets/New.cs");
        Ok(())
    }

    #[test]
    fn test_empty_depth_report_means_no_changes() -> anyhow::Result<()> {
        let output = parse_cmd()?
            .args(["--json", "--depth", "empty", "--target", "Assets/Foo.cs"])
            .write_stdin("")
            .output()?;
        let records = parse_records(&output.stdout)?;
        assert_states(&records, &[FileState::Normal]);
        assert_eq!(records[0].path, "Assets/Foo.cs");
        Ok(())
    }

    #[test]
    fn test_empty_report_without_target_has_no_records() -> anyhow::Result<()> {
        parse_cmd()?
            .write_stdin("")
            .assert()
            .success()
            .stdout(predicate::str::contains("No entries."));
        Ok(())
    }

    #[test]
    fn test_online_report_decodes_remote_and_lock_columns() -> anyhow::Result<()> {
        let output = parse_cmd()?
            .args(["--json", "--online"])
            .write_stdin(ONLINE_REPORT)
            .output()?;
        let records = parse_records(&output.stdout)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].path, "Assets/Hero.prefab");
        assert_eq!(records[1].lock_state, LockState::LockedByOther);
        assert_eq!(records[1].remote_state, RemoteState::ModifiedOnServer);
        assert_eq!(records[1].revision, Some(1200));
        Ok(())
    }

    #[test]
    fn test_merge_propagates_to_parent_folder() -> anyhow::Result<()> {
        let output = parse_cmd()?
            .args(["--json", "--merge"])
            .write_stdin(TERMINATED_REPORT)
            .output()?;
        let entries: Vec<StatusEntry> = serde_json::from_slice(&output.stdout)?;
        let merged: Vec<(&str, FileState)> = entries
            .iter()
            .map(|e| (e.merged.path.as_str(), e.merged.file_state))
            .collect();
        assert_eq!(
            merged,
            vec![
                ("Assets", FileState::Modified),
                ("Assets/Foo.cs", FileState::Modified),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_merge_combines_sidecar_lock() -> anyhow::Result<()> {
        let output = parse_cmd()?
            .args(["--json", "--merge"])
            .write_stdin(SIDECAR_REPORT)
            .output()?;
        let entries: Vec<StatusEntry> = serde_json::from_slice(&output.stdout)?;
        let foo = entries
            .iter()
            .find(|e| e.merged.path == "Assets/Foo.cs")
            .expect("merged entry for Assets/Foo.cs");
        assert_eq!(foo.merged.file_state, FileState::Modified);
        assert_eq!(foo.merged.lock_state, LockState::LockedHere);
        assert!(foo.asset.is_some());
        assert!(foo.meta.is_some());
        Ok(())
    }

    #[test]
    fn test_plain_output_lists_paths() -> anyhow::Result<()> {
        parse_cmd()?
            .write_stdin(MIXED_REPORT)
            .assert()
            .success()
            .stdout(has_status_line('M', "Assets/Scripts/Player.cs"))
            .stdout(has_status_line('?', "Assets/Textures/new.png"))
            .stdout(predicate::str::contains("local file edit").not());
        Ok(())
    }

    #[test]
    fn test_report_from_file() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let report = dir.path().join("status.txt");
        std::fs::write(&report, TERMINATED_REPORT)?;

        parse_cmd()?
            .arg(&report)
            .assert()
            .success()
            .stdout(predicate::str::contains("Assets/Foo.cs"))
            .stdout(predicate::str::contains("Assets/Foo.cs@").not());
        Ok(())
    }

    #[test]
    fn test_unknown_status_code_fails() -> anyhow::Result<()> {
        parse_cmd()?
            .write_stdin(MALFORMED_REPORT)
            .assert()
            .failure()
            .stdout(is_error())
            .stdout(predicate::str::contains("Unknown status code 'Z'"));
        Ok(())
    }
}
