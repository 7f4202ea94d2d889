use crate::core::{
    colors::format_record,
    error::Result,
    identity::PathIdentity,
    print_info,
    status_merge::merge_statuses,
    status_parser::{Depth, StatusOptions, StatusParser},
    svn_status::StatusRecord,
};
use std::io::Read;
use std::path::PathBuf;

/// Options of the `parse` command
#[derive(Debug, Clone, Default)]
pub struct ParseArgs {
    /// Captured report; stdin when absent
    pub file: Option<PathBuf>,
    pub online: bool,
    pub depth: Depth,
    /// Queried path, enables the empty-depth "no changes" record
    pub target: Option<String>,
    pub merge: bool,
    pub json: bool,
}

pub fn execute_parse(args: ParseArgs) -> Result<()> {
    let report = match &args.file {
        Some(file) => std::fs::read_to_string(file)?,
        None => {
            let mut report = String::new();
            std::io::stdin().read_to_string(&mut report)?;
            report
        }
    };

    let options = StatusOptions {
        depth: args.depth,
        offline: !args.online,
        fetch_lock_details: false,
    };
    let records = parse_report(&report, options, args.target.as_deref())?;
    log::debug!("Decoded {} record(s)", records.len());

    if args.merge {
        let entries = merge_statuses(records, &PathIdentity);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else if entries.is_empty() {
            print_info("No entries.");
        } else {
            for entry in &entries {
                println!("{}", format_record(&entry.merged));
            }
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        print_info("No entries.");
    } else {
        for record in &records {
            println!("{}", format_record(record));
        }
    }
    Ok(())
}

fn parse_report(
    report: &str,
    options: StatusOptions,
    target: Option<&str>,
) -> Result<Vec<StatusRecord>> {
    match target {
        Some(target) => StatusParser::for_target(report, options, target).collect(),
        None => StatusParser::new(report, options).collect(),
    }
}
