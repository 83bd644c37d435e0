use super::output;
use super::utils::{parse_position, CliRecommender};
use lastfm_recommender::cancel::CancellationState;
use lastfm_recommender::{ClientEvent, RefreshOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

enum Flow {
    Continue,
    Quit,
}

/// Interactive loop: stdin commands alongside the periodic now-playing refresh.
///
/// Both run on the current task. Re-rendering is driven by recommender
/// events, so ticks and manual refreshes print the same way.
pub async fn run(recommender: &CliRecommender) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationState::new();
    let mut events = recommender.subscribe();

    output::print_now_playing(recommender.now_playing().as_ref());
    output::print_page(&recommender.queue());
    output::print_watch_help();

    let auto_refresh = recommender.run_auto_refresh(cancel.subscribe());

    let input = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let result = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Flow::Quit = handle_line(recommender, &line).await {
                            break Ok(());
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                },
                event = events.recv() => match event {
                    Ok(ClientEvent::NowPlayingUpdated { now_playing }) => {
                        output::print_now_playing(Some(&now_playing));
                    }
                    Ok(ClientEvent::RecommendationsRebuilt { .. }) => {
                        output::print_page(&recommender.queue());
                    }
                    Ok(_) => {}
                    Err(e) => log::debug!("Event stream: {e}"),
                },
            }
        };
        cancel.cancel();
        result
    };

    let ((), result) = tokio::join!(auto_refresh, input);
    result?;
    println!("👋 Bye");
    Ok(())
}

async fn handle_line(recommender: &CliRecommender, line: &str) -> Flow {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Flow::Continue;
    };

    match command {
        "q" | "quit" => return Flow::Quit,
        "n" => {
            if recommender.next_page() {
                output::print_page(&recommender.queue());
            } else {
                println!("Already on the last page");
            }
        }
        "p" => {
            if recommender.previous_page() {
                output::print_page(&recommender.queue());
            } else {
                println!("Already on the first page");
            }
        }
        "a" | "r" => {
            let index = match parse_position(words.next(), recommender) {
                Ok(index) => index,
                Err(e) => {
                    println!("⚠️  {e}");
                    return Flow::Continue;
                }
            };
            let result = if command == "a" {
                recommender.accept(index)
            } else {
                recommender.reject(index)
            };
            match result {
                Ok(Some(rec)) => {
                    let verb = if command == "a" { "👍 Liked" } else { "👎 Passed" };
                    println!("{verb}: {} - {}", rec.track.artist, rec.track.name);
                    output::print_page(&recommender.queue());
                }
                Ok(None) => println!("⚠️  Nothing at that position"),
                Err(e) => println!("⚠️  Could not save stats: {e}"),
            }
        }
        "refresh" => {
            if recommender.refresh().await == RefreshOutcome::Skipped {
                println!("⏳ A refresh is already running");
            }
        }
        "settings" => {
            let identity = recommender.open_settings();
            if identity.is_empty() {
                println!("⚙️  No user connected. Use `connect <user> [api key]`");
            } else {
                println!("⚙️  Connected as '{identity}'. Use `connect <user> [api key]` to change");
            }
        }
        "connect" => {
            let Some(username) = words.next() else {
                println!("⚠️  Usage: connect <user> [api key]");
                return Flow::Continue;
            };
            let key = words.next().unwrap_or("");
            match recommender.connect(username, key).await {
                Ok(profile) => println!("✅ Connected as {}", profile.name),
                Err(e) => println!("❌ {e}"),
            }
        }
        "h" | "help" | "?" => output::print_watch_help(),
        other => println!("Unknown command '{other}', type `help`"),
    }

    Flow::Continue
}
