use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "focusflow", version, about = "FocusFlow study-time tracker")]
pub struct Cli {
    /// Account whose ledger to use (defaults to `account.user` in the config)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Control the live timer (stopwatch or focus cycle)
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Focus-cycle specific commands
    Cycle {
        #[command(subcommand)]
        action: commands::cycle::CycleAction,
    },
    /// Select the project, topic or sub-topic to track
    Select(commands::select::SelectArgs),
    /// Project hierarchy management
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },
    /// Session history and statistics
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOCUSFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let user = cli.user;
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action, user),
        Commands::Cycle { action } => commands::cycle::run(action, user),
        Commands::Select(args) => commands::select::run(args, user),
        Commands::Project { action } => commands::project::run(action, user),
        Commands::History { action } => commands::history::run(action, user),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
