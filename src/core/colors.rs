//! Color mapping for status codes.
//!
//! Every place that prints a status code or a path takes its color from
//! [`status_color`], so a state looks the same in every command.
//!
//! # Color Scheme
//! - **Modified / Replaced**: Yellow
//! - **Added**: Green
//! - **Deleted / Missing**: Red
//! - **Conflicted / Obstructed**: Red bold
//! - **Unversioned**: Cyan
//! - **Ignored / External / Normal**: Bright black

use crate::core::svn_status::{FileState, LockState, RemoteState, StatusRecord};
use colored::*;

/// Color function for a file state
pub fn status_color(state: FileState) -> fn(&str) -> ColoredString {
    match state {
        FileState::Modified | FileState::Replaced => |text| text.yellow(),
        FileState::Added => |text| text.green(),
        FileState::Deleted | FileState::Missing => |text| text.red(),
        FileState::Conflicted | FileState::Obstructed => |text| text.red().bold(),
        FileState::Unversioned => |text| text.cyan(),
        FileState::Ignored | FileState::External | FileState::Normal | FileState::None => {
            |text| text.bright_black()
        }
    }
}

/// Lock column marker, blank without a lock
pub fn lock_marker(state: LockState) -> ColoredString {
    match state {
        LockState::NoLock => " ".normal(),
        LockState::LockedHere => "K".green(),
        LockState::LockedByOther => "O".magenta(),
        LockState::LockedButStolen => "T".red(),
        LockState::BrokenLock => "B".red(),
    }
}

/// `*` for entries that changed in the repository
pub fn remote_marker(state: RemoteState) -> ColoredString {
    match state {
        RemoteState::None => " ".normal(),
        RemoteState::ModifiedOnServer => "*".blue().bold(),
    }
}

/// One record as `<code><lock><remote> <path>`, colored by state
pub fn format_record(record: &StatusRecord) -> String {
    let color = status_color(record.file_state);
    let code = color(&record.file_state.as_code().to_string());
    format!(
        "{code}{}{} {}",
        lock_marker(record.lock_state),
        remote_marker(record.remote_state),
        color(&record.path)
    )
}
