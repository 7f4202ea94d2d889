use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use svn_status_cache::commands::*;
use svn_status_cache::core::{
    clients::ClientAction,
    error::Result,
    print_error, Depth,
};

#[derive(Parser)]
#[command(name = "svn-status-cache")]
#[command(about = "Background-refreshed cache of Subversion working copy status")]
#[command(version = "0.1.0")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the status of the working copy, grouped by state
    Status {
        /// Path to query (defaults to the current directory)
        path: Option<String>,
        /// Contact the repository for out-of-date and lock information
        #[arg(long)]
        online: bool,
        #[arg(long, value_enum, default_value_t = Depth::Infinity)]
        depth: Depth,
        /// Look up owner and comment of locks (implies --online)
        #[arg(long)]
        locks: bool,
    },
    /// Decode a captured `svn status` report
    Parse {
        /// Report file (reads stdin when omitted)
        file: Option<PathBuf>,
        /// The report was produced with --show-updates
        #[arg(long)]
        online: bool,
        #[arg(long, value_enum, default_value_t = Depth::Infinity)]
        depth: Depth,
        /// Queried path; with --depth empty an empty report means "no changes"
        #[arg(long)]
        target: Option<String>,
        /// Merge sidecars and propagate changes to parent folders
        #[arg(long)]
        merge: bool,
        /// Print JSON instead of status lines
        #[arg(long)]
        json: bool,
    },
    /// Keep the status cache refreshed and report every change
    Watch {
        /// Run for this many seconds (default: until the first refresh)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// List trunks, branches and tags of the repository
    Branches,
    /// Open the configured SVN client for an action
    Open {
        #[arg(value_enum)]
        action: ClientAction,
        /// Paths to act on (defaults to the working copy)
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configure logging based on --debug flag
    if cli.debug {
        env::set_var("RUST_LOG", "debug");
    } else {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let result = match cli.command {
        Commands::Status {
            path,
            online,
            depth,
            locks,
        } => execute_status(path, online || locks, depth, locks),
        Commands::Parse {
            file,
            online,
            depth,
            target,
            merge,
            json,
        } => execute_parse(ParseArgs {
            file,
            online,
            depth,
            target,
            merge,
            json,
        }),
        Commands::Watch { seconds } => execute_watch(seconds),
        Commands::Branches => execute_branches(),
        Commands::Open { action, paths } => execute_open(action, paths),
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        std::process::exit(1);
    }

    Ok(())
}
