use crate::commands::load_config;
use crate::core::{
    branch_cache::{BranchCache, BranchInfo, BranchKind, BranchSource},
    error::{Result, SvnCacheError},
    print_error, print_info, print_section_header,
    reporter::ErrorReporter,
    svn::SvnClient,
};
use colored::*;
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn execute_branches() -> Result<()> {
    let config = load_config();
    let working_copy = env::current_dir()?;
    let client = SvnClient::from_config(&working_copy, &config);

    let reporter = Arc::new(ErrorReporter::with_sink(print_error));
    let mut cache = BranchCache::new(BranchSource::new(client, config.branches.clone()))
        .with_reporter(reporter);
    cache.initialize(true);

    // One walk lists every folder, so it gets the online budget per level
    let budget = config.online_timeout() * (config.branches.max_depth as u32 + 2);
    let start = Instant::now();
    while !cache.is_ready() {
        if start.elapsed() > budget {
            cache.before_shutdown();
            return Err(SvnCacheError::timeout(
                "svn list",
                u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            ));
        }
        thread::sleep(POLL_INTERVAL);
        cache.tick();
    }

    list_branches(&cache.table().branches);
    Ok(())
}

fn list_branches(branches: &[BranchInfo]) {
    if branches.is_empty() {
        print_info("No branches found.");
        return;
    }

    let mut projects: Vec<&str> = branches.iter().map(|b| b.project.as_str()).collect();
    projects.dedup();

    for project in projects {
        let title = if project.is_empty() { "/" } else { project };
        print_section_header(title);
        for branch in branches.iter().filter(|b| b.project == project) {
            let label = format!("{:<6}", branch.kind);
            let kind = match branch.kind {
                BranchKind::Trunk => label.green(),
                BranchKind::Branch => label.yellow(),
                BranchKind::Tag => label.cyan(),
            };
            if branch.is_current {
                println!(
                    "  {} {} {}",
                    "[*]".green().bold(),
                    kind,
                    branch.name.green().bold()
                );
            } else {
                println!("      {} {}", kind, branch.name.white());
            }
        }
    }
    println!();
}
