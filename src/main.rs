use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gitdrill::actions::CliActions;
use gitdrill::cli::{ActArgs, Cli, CliCommand, MarkerCommand, VerifyArgs};
use gitdrill::config::Config;
use gitdrill::process::SystemRunner;
use gitdrill::roles::{extract_role, format_marker, has_marker, strip_marker};
use gitdrill::rules::verify_config;
use gitdrill::store::ConfigStore;

/// Exit code when the persisted setup configuration is missing or unreadable.
const EXIT_CANNOT_GRADE: i32 = 3;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    debug!(?cli, "gitdrill starting");

    let code = match cli.command {
        CliCommand::Verify(args) => verify(&args),
        CliCommand::Act(args) => match act(args) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        },
        CliCommand::Marker { command } => marker(command),
    };
    std::process::exit(code);
}

fn verify(args: &VerifyArgs) -> i32 {
    let config = match Config::load(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    info!(
        repo = %config.repo_dir.display(),
        store = %config.store_path.display(),
        remote = %config.remote,
        "config loaded"
    );

    match verify_config(&config) {
        Ok(result) => {
            if config.json {
                println!("{}", result.to_json());
            } else {
                print!("{result}");
            }
            if result.is_successful() { 0 } else { 1 }
        }
        Err(e) if e.is_cannot_grade() => {
            eprintln!("cannot grade: {e}");
            EXIT_CANNOT_GRADE
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn act(args: ActArgs) -> gitdrill::error::Result<()> {
    let repo_dir = args
        .repo
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let store_path = args
        .store
        .map(PathBuf::from)
        .unwrap_or_else(|| ConfigStore::default_path(&repo_dir));
    let runner = SystemRunner::new(&repo_dir);
    let actions = CliActions::new(&runner);
    let store = ConfigStore::new(store_path);
    if let Some(url) = args.action.perform(&actions, args.role, &store)? {
        println!("{url}");
    }
    Ok(())
}

fn marker(command: MarkerCommand) -> i32 {
    match command {
        MarkerCommand::Format { role, text } => {
            println!("{}", format_marker(&role, &text));
            0
        }
        MarkerCommand::Strip { text } => {
            println!("{}", strip_marker(&text));
            0
        }
        MarkerCommand::Extract { text } => match extract_role(&text) {
            Some(role) => {
                println!("{role}");
                0
            }
            None => 1,
        },
        MarkerCommand::Check { text } => {
            if has_marker(&text) { 0 } else { 1 }
        }
    }
}
