use crate::commands::load_config;
use crate::core::{
    colors::format_record,
    error::Result,
    print_info, print_section_header,
    status_parser::{Depth, StatusOptions},
    svn::SvnClient,
    svn_status::{FileState, StatusRecord},
};
use colored::*;
use std::env;

pub fn execute_status(path: Option<String>, online: bool, depth: Depth, locks: bool) -> Result<()> {
    let config = load_config();
    let working_copy = env::current_dir()?;
    let client = SvnClient::from_config(&working_copy, &config);

    let options = StatusOptions {
        depth,
        offline: !(online || config.online_mode),
        fetch_lock_details: locks || config.fetch_lock_details,
    };
    let target = path.unwrap_or_else(|| ".".to_string());
    log::debug!("Querying status of '{target}' with {options:?}");

    let records = client.get_statuses(&target, options, None)?;
    let changed: Vec<&StatusRecord> = records
        .iter()
        .filter(|record| {
            record.file_state != FileState::Normal
                || record.lock_state.has_resolvable_lock()
                || record.is_conflicted()
        })
        .collect();

    if changed.is_empty() {
        print_info("No local changes.");
        return Ok(());
    }

    print_grouped_status_sections(&changed);
    Ok(())
}

const SECTIONS: [(&str, &[FileState]); 6] = [
    ("Conflicts", &[FileState::Conflicted, FileState::Obstructed]),
    ("Modified", &[FileState::Modified, FileState::Replaced]),
    ("Added", &[FileState::Added]),
    ("Deleted", &[FileState::Deleted, FileState::Missing]),
    ("Unversioned", &[FileState::Unversioned]),
    (
        "Other",
        &[
            FileState::Normal,
            FileState::Ignored,
            FileState::External,
            FileState::None,
        ],
    ),
];

fn print_grouped_status_sections(records: &[&StatusRecord]) {
    for (title, states) in SECTIONS {
        let section: Vec<&&StatusRecord> = records
            .iter()
            .filter(|record| {
                // Conflicts on properties or tree show up under Conflicts
                if title == "Conflicts" {
                    record.is_conflicted() || states.contains(&record.file_state)
                } else {
                    !record.is_conflicted() && states.contains(&record.file_state)
                }
            })
            .collect();
        if section.is_empty() {
            continue;
        }

        print_section_header(title);
        for record in section {
            println!("  {}", format_record(record));
            if let Some(owner) = &record.lock_owner {
                let message = record.lock_message.as_deref().unwrap_or("");
                println!(
                    "      {} {} {}",
                    "locked by".bright_black(),
                    owner.white(),
                    message.bright_black()
                );
            }
        }
    }
    println!();
}
