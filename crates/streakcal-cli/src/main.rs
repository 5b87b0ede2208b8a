use clap::{Parser, Subcommand};
use streakcal_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "streakcal", version, about = "Habit streaks on your calendar")]
pub struct Cli {
    /// Debug logging (RUST_LOG still wins)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write today's tracking event for every enabled habit
    Run(commands::run::RunArgs),
    /// Build and send the weekly digest
    Digest(commands::digest::DigestArgs),
    /// Run scheduled jobs that are due
    Tick,
    /// Scheduled job management
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Inspect or override habit counters
    Counter {
        #[command(subcommand)]
        action: commands::counter::CounterAction,
    },
    /// Habit overview and statistics
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Calendar inspection and control events
    Calendar {
        #[command(subcommand)]
        action: commands::calendar::CalendarAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Authentication management for integrations
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let config = Config::load_or_default();
    if !config.logging.enabled {
        return;
    }
    let fallback = if verbose {
        "debug".to_string()
    } else {
        config.logging.level
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Digest(args) => commands::digest::run(args),
        Commands::Tick => commands::tick::run(),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Counter { action } => commands::counter::run(action),
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Calendar { action } => commands::calendar::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
