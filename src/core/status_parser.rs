//! Decoder for the text report printed by `svn status`.
//!
//! [`StatusParser`] walks a captured report line by line and yields one
//! [`StatusRecord`] per status line. It never looks ahead: each line is either a
//! status line, a continuation line annotating the previous record, a section
//! header, or blank.
//!
//! # Report layout
//! ```text
//! M       Assets/Foo.cs                       offline: path at column 8
//! M       *     1234   Assets/Foo.cs          online: remote marker, revision, path at 21
//!         > moved to Assets/Bar.cs            continuation, skipped
//!       >   local edit, incoming delete       tree-conflict annotation, skipped
//! Performing status on external item at 'Ext':  nested section, parsed
//! Summary of conflicts:                       trailer, skipped
//! ```

use crate::core::error::{Result, SvnCacheError};
use crate::core::svn_status::{
    FileState, LockState, PropertiesState, RemoteState, StatusRecord, TreeConflict,
};
use serde::{Deserialize, Serialize};
use std::str::Lines;

/// Column where the path starts in an offline report
pub const OFFLINE_PATH_COLUMN: usize = 8;
/// Column where the path starts in an online (`--show-updates`) report
pub const ONLINE_PATH_COLUMN: usize = 21;

const REMOTE_COLUMN: usize = 8;
const REVISION_COLUMNS: std::ops::Range<usize> = 10..18;
const MOVED_MARKER_COLUMN: usize = 8;
const TREE_CONFLICT_MARKER_COLUMN: usize = 6;
const PATH_TERMINATOR: char = '@';

const CONFLICT_SUMMARY_HEADER: &str = "Summary of conflicts:";
const REVISION_FOOTER: &str = "Status against revision:";
const CHANGELIST_HEADER: &str = "--- Changelist";
const EXTERNAL_HEADER: &str = "Performing status on external item at";

/// How deep a status query descends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Depth {
    /// Only the queried path itself
    Empty,
    #[default]
    Infinity,
}

impl Depth {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Depth::Empty => "empty",
            Depth::Infinity => "infinity",
        }
    }
}

/// Options of a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOptions {
    pub depth: Depth,
    /// When false the query contacts the repository (`--show-updates`)
    pub offline: bool,
    /// Look up owner, message and date of active locks (online only)
    pub fetch_lock_details: bool,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self {
            depth: Depth::Infinity,
            offline: true,
            fetch_lock_details: false,
        }
    }
}

impl StatusOptions {
    /// Path start column for this query's report layout
    pub fn path_column(&self) -> usize {
        if self.offline {
            OFFLINE_PATH_COLUMN
        } else {
            ONLINE_PATH_COLUMN
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Status lines of the working copy or of an external
    Records,
    /// Everything up to the next externals header is ignored
    Trailer,
}

/// Lazy, single-pass iterator over the records of a status report
pub struct StatusParser<'a> {
    lines: Lines<'a>,
    options: StatusOptions,
    section: Section,
    target: Option<&'a str>,
    yielded_any: bool,
    finished: bool,
}

impl<'a> StatusParser<'a> {
    pub fn new(report: &'a str, options: StatusOptions) -> Self {
        Self {
            lines: report.lines(),
            options,
            section: Section::Records,
            target: None,
            yielded_any: false,
            finished: false,
        }
    }

    /// Parse the report of a query for `target`. With `Depth::Empty` a report
    /// without status lines means "no changes" and yields one `Normal` record
    /// for `target`.
    pub fn for_target(report: &'a str, options: StatusOptions, target: &'a str) -> Self {
        Self {
            target: Some(target),
            ..Self::new(report, options)
        }
    }

    fn synthesized_record(&mut self) -> Option<Result<StatusRecord>> {
        self.finished = true;
        match self.target {
            Some(target) if !self.yielded_any && self.options.depth == Depth::Empty => {
                Some(Ok(StatusRecord::normal(normalize_path(target))))
            }
            _ => None,
        }
    }
}

impl<'a> Iterator for StatusParser<'a> {
    type Item = Result<StatusRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let Some(line) = self.lines.next() else {
                return self.synthesized_record();
            };
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with(EXTERNAL_HEADER) {
                self.section = Section::Records;
                continue;
            }
            if line.starts_with(CONFLICT_SUMMARY_HEADER)
                || line.starts_with(REVISION_FOOTER)
                || line.starts_with(CHANGELIST_HEADER)
            {
                self.section = Section::Trailer;
                continue;
            }
            if self.section == Section::Trailer || is_continuation_line(line) {
                continue;
            }

            match parse_status_line(line, &self.options) {
                Ok(record) if is_hidden(below_target(&record.path, self.target)) => continue,
                Ok(record) => {
                    self.yielded_any = true;
                    return Some(Ok(record));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// `> moved to/from` and tree-conflict description lines annotate the previous
/// record and carry no path of their own.
fn is_continuation_line(line: &str) -> bool {
    marker_at(line, MOVED_MARKER_COLUMN) || marker_at(line, TREE_CONFLICT_MARKER_COLUMN)
}

fn marker_at(line: &str, column: usize) -> bool {
    let bytes = line.as_bytes();
    bytes.len() > column && bytes[column] == b'>' && bytes[..column].iter().all(|b| *b == b' ')
}

/// Decode one status line
pub fn parse_status_line(line: &str, options: &StatusOptions) -> Result<StatusRecord> {
    let path_column = options.path_column();
    if line.len() <= path_column || !line.is_char_boundary(path_column) {
        return Err(SvnCacheError::malformed_line(line));
    }

    let header: Vec<char> = line[..path_column].chars().collect();
    if header.len() != path_column {
        return Err(SvnCacheError::malformed_line(line));
    }

    let file_state = decode(&header, 0, line, FileState::from_code)?;
    let properties_state = decode(&header, 1, line, PropertiesState::from_code)?;
    let lock_state = decode(&header, 5, line, LockState::from_code)?;
    let tree_conflict = decode(&header, 6, line, TreeConflict::from_code)?;

    let (remote_state, revision) = if options.offline {
        (RemoteState::None, None)
    } else {
        let remote_state = if header[REMOTE_COLUMN] == '*' {
            RemoteState::ModifiedOnServer
        } else {
            RemoteState::None
        };
        let revision: String = header[REVISION_COLUMNS].iter().collect();
        (remote_state, revision.trim().parse::<u64>().ok())
    };

    let raw_path = &line[path_column..];
    let raw_path = raw_path.strip_suffix(PATH_TERMINATOR).unwrap_or(raw_path);
    let path = normalize_path(raw_path);
    if path.is_empty() {
        return Err(SvnCacheError::malformed_line(line));
    }

    Ok(StatusRecord {
        path,
        file_state,
        properties_state,
        tree_conflict,
        lock_state,
        remote_state,
        revision,
        ..Default::default()
    })
}

fn decode<T>(header: &[char], column: usize, line: &str, f: fn(char) -> Option<T>) -> Result<T> {
    let code = header[column];
    f(code).ok_or_else(|| SvnCacheError::unknown_code(code, column, line))
}

/// Convert to `/` separators and drop a leading `./`
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.strip_prefix("./").unwrap_or(&path);
    path.trim_end_matches('/').to_string()
}

/// Any segment starting with `.` hides the path
pub fn is_hidden(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.'))
}

/// The part of `path` below the queried `target`. Folders named by the caller
/// are never treated as hidden.
fn below_target<'p>(path: &'p str, target: Option<&str>) -> &'p str {
    let Some(target) = target.map(normalize_path) else {
        return path;
    };
    if target.is_empty() || target == "." {
        return path;
    }
    match path.strip_prefix(target.as_str()) {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => path,
    }
}
