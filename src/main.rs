use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stacked::{init, land, sync, trailer, Session};

#[derive(Parser)]
#[command(name = "stacked", version, about = "Stacked diffs on plain git 📚")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync a diff and everything stacked above it.
    Sync {
        /// The commit to sync (any revision).
        #[arg(default_value = "HEAD")]
        commit: String,
    },
    /// Land a diff into trunk and re-sync its dependants.
    Land {
        /// The commit to land (any revision).
        #[arg(default_value = "HEAD")]
        commit: String,
    },
    /// Prepare the repository: config, diff store, commit-msg hook.
    Init,
    /// Print a fresh diff id.
    GenerateId,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stacked=info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> stacked::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Command::Sync { commit } => {
            let mut session = Session::open(&cwd)?;
            let diff = session.diff_from_rev(&commit)?;
            sync::sync_with_dependants(&mut session, &diff)?;
        }
        Command::Land { commit } => {
            let mut session = Session::open(&cwd)?;
            let diff = session.diff_from_rev(&commit)?;
            land::land(&mut session, &diff)?;
        }
        Command::Init => init::run(&cwd)?,
        Command::GenerateId => println!("{}", trailer::generate_diff_id()),
    }
    Ok(())
}
