mod commands;

use clap::Parser;
use commands::{execute_command, utils::build_config, utils::open_recommender, Commands};

/// Track recommendations from what you're playing on Last.fm
#[derive(Parser)]
#[command(
    name = "lastfm-recommender",
    about = "Track recommendations from what you're playing on Last.fm",
    long_about = None
)]
struct Cli {
    /// Show detailed debug information
    #[arg(long, global = true)]
    verbose: bool,

    /// Last.fm API key (defaults to LASTFM_API_KEY, then the saved key)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Recommendations shown per page
    #[arg(long, global = true, default_value = "5")]
    page_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if args.verbose {
        println!("🔍 Verbose mode enabled");
    }

    let config = build_config(args.api_key.as_deref(), args.page_size);

    let recommender = match open_recommender(config) {
        Ok(recommender) => recommender,
        Err(e) => {
            eprintln!("❌ Failed to open storage: {e}");
            std::process::exit(1);
        }
    };

    if args.verbose {
        let session = recommender.session();
        if session.is_connected() {
            println!("🔐 Saved user: {}", session.identity);
        } else {
            println!("🔐 No saved user");
        }
    }

    if let Err(e) = execute_command(args.command, &recommender).await {
        eprintln!("❌ Command failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
