pub mod output;
pub mod utils;
pub mod watch;

use clap::Subcommand;
use utils::{ensure_connected, CliRecommender};

#[derive(Subcommand)]
pub enum Commands {
    /// Verify and save your Last.fm username
    ///
    /// The username is checked against Last.fm before anything is saved.
    /// An API key given here replaces the saved one.
    ///
    /// Usage examples:
    /// # Connect with the built-in API key
    /// lastfm-recommender connect rj
    ///
    /// # Connect with your own API key
    /// lastfm-recommender connect rj --key 0123456789abcdef
    Connect {
        /// Last.fm username
        username: String,

        /// API key to save alongside the username
        #[arg(long)]
        key: Option<String>,
    },

    /// Show the track you're playing, or the last one you played
    NowPlaying,

    /// Show recommendations based on what you're playing
    ///
    /// Usage examples:
    /// # First page
    /// lastfm-recommender recommend
    ///
    /// # Third page, ten per page
    /// lastfm-recommender --page-size 10 recommend --page 3
    Recommend {
        /// Page to show (1-based)
        #[arg(long, default_value = "1")]
        page: usize,
    },

    /// Interactive mode: browse, like and pass, with periodic refresh
    Watch,

    /// Show liked / passed / discovered counts
    Stats,
}

pub async fn execute_command(
    command: Commands,
    recommender: &CliRecommender,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Connect { username, key } => {
            let profile = recommender
                .connect(&username, key.as_deref().unwrap_or(""))
                .await?;
            println!("✅ Connected as {} ({} scrobbles)", profile.name, profile.playcount);
            output::print_now_playing(recommender.now_playing().as_ref());
            output::print_page(&recommender.queue());
        }
        Commands::NowPlaying => {
            ensure_connected(recommender).await?;
            let now_playing = recommender.fetch_now_playing().await?;
            output::print_now_playing(now_playing.as_ref());
        }
        Commands::Recommend { page } => {
            if !ensure_connected(recommender).await? {
                recommender.refresh().await;
            }
            output::print_now_playing(recommender.now_playing().as_ref());

            for _ in 1..page {
                if !recommender.next_page() {
                    break;
                }
            }
            if page > 1 && recommender.current_page() < page {
                println!(
                    "⚠️  Only {} page(s) available",
                    recommender.total_pages()
                );
            }
            output::print_page(&recommender.queue());
        }
        Commands::Watch => {
            if !ensure_connected(recommender).await? {
                recommender.refresh().await;
            }
            watch::run(recommender).await?;
        }
        Commands::Stats => {
            output::print_stats(&recommender.session());
        }
    }

    Ok(())
}
