use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::avatar::AvatarCommands;
use commands::health::HealthArgs;
use commands::pattern::PatternCommands;
use commands::scenario::ScenarioCommands;
use commands::speech::SpeechCommands;

#[derive(Parser)]
#[command(
    name = "pixelpeak",
    version,
    about = "PixelPeak CLI: drive the BCI demo API from the terminal"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "PIXELPEAK_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API and vendor health
    Health(HealthArgs),
    /// Scenario generation and the full workflow
    Scenario {
        #[command(subcommand)]
        command: ScenarioCommands,
    },
    /// Speech synthesis
    Speech {
        #[command(subcommand)]
        command: SpeechCommands,
    },
    /// Stored EEG pattern operations
    Pattern {
        #[command(subcommand)]
        command: PatternCommands,
    },
    /// Avatar operations
    Avatar {
        #[command(subcommand)]
        command: AvatarCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health(args) => commands::health::run(&cli.api_url, args).await,
        Commands::Scenario { command } => commands::scenario::run(&cli.api_url, command).await,
        Commands::Speech { command } => commands::speech::run(&cli.api_url, command).await,
        Commands::Pattern { command } => commands::pattern::run(&cli.api_url, command).await,
        Commands::Avatar { command } => commands::avatar::run(&cli.api_url, command).await,
    };

    std::process::exit(code);
}
