//! User-facing message text.

use std::fmt::Write;

use reelbot_pipeline::{Candidate, Metadata, QualityLink};

/// `12` → `1️⃣2️⃣`.
#[must_use]
pub fn keycap(n: usize) -> String {
    n.to_string()
        .chars()
        .map(|d| format!("{d}\u{fe0f}\u{20e3}"))
        .collect()
}

/// Numbered search results, ending with the reply prompt.
#[must_use]
pub fn candidate_list(query: &str, candidates: &[Candidate]) -> String {
    let mut out = format!("🎬 *Results for \"{}\"*\n\n", query.trim());
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(out, "{} *{}*", keycap(i + 1), candidate.title.trim());
        if let Some(hints) = candidate.hints.summary() {
            let _ = writeln!(out, "      {hints}");
        }
    }
    out.push_str("\n❤️ *Reply with the movie number*");
    out
}

/// Details of the selected movie followed by its numbered quality choices.
#[must_use]
pub fn quality_list(title: &str, metadata: &Metadata, links: &[QualityLink]) -> String {
    let mut out = format!("🎬 *{}*\n", metadata.title_or(title));
    let _ = writeln!(out, "⭐ IMDb: {}", metadata.rating());
    let _ = writeln!(out, "📅 Year: {}", metadata.year());
    let _ = writeln!(out, "⏱️ Duration: {}", metadata.duration());
    let _ = writeln!(out, "🎭 Genres: {}", metadata.genres());
    let _ = writeln!(out, "📝 {}", metadata.description());
    out.push_str("\n📍 *Choose a quality*\n\n");

    for (i, link) in links.iter().enumerate() {
        let _ = write!(out, "{} *{}*", keycap(i + 1), link.tier);
        if let Some(size) = link.size.as_deref().filter(|s| !s.trim().is_empty()) {
            let _ = write!(out, " - {}", size.trim());
        }
        if let Some(server) = link.server.as_deref().filter(|s| !s.trim().is_empty()) {
            let _ = write!(out, " ({})", server.trim());
        }
        out.push('\n');
    }
    out
}
