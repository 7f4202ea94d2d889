//! Common assertion helpers for command output

#![allow(dead_code)]

use predicates::prelude::*;
use svn_status_cache::core::{FileState, StatusRecord};

/// Checks for the formatted error prefix
pub fn is_error() -> impl Predicate<str> {
    predicates::str::contains("Error:")
}

/// Checks that a section header is printed
pub fn has_section(title: &str) -> impl Predicate<str> {
    predicates::str::contains(format!("{title}:"))
}

/// Checks for a status line `<code>   <path>` as printed without colors
pub fn has_status_line(code: char, path: &str) -> impl Predicate<str> {
    let pattern = format!(
        r"(?m)^\s*{}.{{2}} {}$",
        regex_escape(code),
        regex_escape_str(path)
    );
    predicates::str::is_match(pattern).expect("valid status line pattern")
}

fn regex_escape(c: char) -> String {
    regex_escape_str(&c.to_string())
}

fn regex_escape_str(s: &str) -> String {
    s.chars()
        .map(|c| {
            if "\\.+*?()|[]{}^$".contains(c) {
                format!("\\{c}")
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// Decode `--json` output of the parse command
pub fn parse_records(stdout: &[u8]) -> anyhow::Result<Vec<StatusRecord>> {
    Ok(serde_json::from_slice(stdout)?)
}

/// Assert the file states of `records`, in order
pub fn assert_states(records: &[StatusRecord], expected: &[FileState]) {
    let states: Vec<FileState> = records.iter().map(|r| r.file_state).collect();
    assert_eq!(states, expected);
}
