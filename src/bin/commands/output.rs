use lastfm_recommender::{NowPlaying, RecommendationQueue, Session};

pub fn print_now_playing(now_playing: Option<&NowPlaying>) {
    let Some(now) = now_playing else {
        println!("🎧 Nothing played yet");
        return;
    };

    let track = &now.track;
    let album = track
        .album
        .as_deref()
        .map(|album| format!(" [{album}]"))
        .unwrap_or_default();

    if now.is_live {
        println!("🎧 Now playing: {} - {}{album}", track.artist, track.name);
    } else {
        let when = now
            .played_at
            .map(|at| format!(" ({})", at.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default();
        println!("🎧 Last played: {} - {}{album}{when}", track.artist, track.name);
    }
}

/// Print the current page, numbered from 1.
pub fn print_page(queue: &RecommendationQueue) {
    if queue.is_empty() {
        println!("💭 No recommendations yet");
        return;
    }

    println!(
        "✨ Recommendations (page {}/{}, {} total)",
        queue.current_page(),
        queue.total_pages(),
        queue.len()
    );
    for (i, rec) in queue.current_items().iter().enumerate() {
        println!(
            "  {}. {} - {}  ({}% match, similar to {})",
            i + 1,
            rec.track.artist,
            rec.track.name,
            rec.match_score,
            rec.similar_to
        );
    }
}

pub fn print_stats(session: &Session) {
    let user = if session.is_connected() {
        session.identity.as_str()
    } else {
        "(not connected)"
    };
    println!("👤 User: {user}");
    println!("👍 Liked: {}", session.tally.accepted);
    println!("👎 Passed: {}", session.tally.rejected);
    println!("🔎 Discovered: {}", session.tally.discovered);
}

pub fn print_watch_help() {
    println!("Commands:");
    println!("  n / p             next / previous page");
    println!("  a <i> / r <i>     like / pass recommendation <i> on this page");
    println!("  refresh           fetch now playing and rebuild recommendations");
    println!("  settings          show the connected user");
    println!("  connect <user> [api key]");
    println!("  q                 quit");
}
