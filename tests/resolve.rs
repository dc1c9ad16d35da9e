use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use game_poll_board::aggregate::RankedEntry;
use game_poll_board::image_cache::ImageCache;
use game_poll_board::resolve::{
    DEFAULT_IMAGE, DefaultImagePolicy, PLACEHOLDER_NAME, ResolveOutcome, known_image, pad_to_board,
    resolve,
};
use game_poll_board::wiki_fetch::{SummaryLookup, parse_summary_thumbnail};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[derive(Default)]
struct MockSummaries {
    thumbnails: HashMap<String, String>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockSummaries {
    fn with_thumbnail(mut self, title: &str, url: &str) -> Self {
        self.thumbnails.insert(title.to_string(), url.to_string());
        self
    }

    fn failing_on(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn calls_for(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|title| title.to_lowercase().starts_with(&prefix.to_lowercase()))
            .count()
    }
}

impl SummaryLookup for MockSummaries {
    fn thumbnail(&self, title: &str) -> Result<Option<String>> {
        self.calls.lock().expect("calls lock").push(title.to_string());
        if self.failing.contains(title) {
            return Err(anyhow!("connection reset"));
        }
        Ok(self.thumbnails.get(title).cloned())
    }
}

fn remember(
    names: &[(&str, u32)],
    cache: &mut ImageCache,
    lookup: &MockSummaries,
) -> ResolveOutcome {
    resolve(&ranked(names), cache, lookup, DefaultImagePolicy::Remember)
}

fn ranked(names: &[(&str, u32)]) -> Vec<RankedEntry> {
    names
        .iter()
        .map(|(name, votes)| RankedEntry {
            name: name.to_string(),
            votes: *votes,
        })
        .collect()
}

#[test]
fn override_wins_over_cache_and_remote() {
    let lookup =
        MockSummaries::default().with_thumbnail("Roblox (video game)", "https://wiki/roblox.png");
    let mut cache = ImageCache::in_memory();
    cache.insert("Roblox", "https://stale/roblox.png");

    let outcome = remember(&[("Roblox", 4)], &mut cache, &lookup);

    let expected = known_image("Roblox").expect("override");
    assert_eq!(outcome.entries[0].image_url, expected);
    assert_eq!(cache.get("Roblox"), Some(expected));
    assert!(lookup.calls().is_empty());
}

#[test]
fn cached_name_never_hits_remote() {
    let lookup = MockSummaries::default();
    let mut cache = ImageCache::in_memory();
    cache.insert("Among Us", "https://cached/among.png");

    let outcome = remember(&[("Among Us", 2)], &mut cache, &lookup);

    assert_eq!(outcome.entries[0].image_url, "https://cached/among.png");
    assert_eq!(lookup.calls().len(), 0);
}

#[test]
fn remote_lookup_stops_at_first_thumbnail() {
    let lookup = MockSummaries::default()
        .with_thumbnail("among us (game)", "https://wiki/among-lower.png")
        .with_thumbnail("Among Us", "https://wiki/among-plain.png");
    let mut cache = ImageCache::in_memory();

    let outcome = remember(&[("Among Us", 1)], &mut cache, &lookup);

    assert_eq!(outcome.entries[0].image_url, "https://wiki/among-lower.png");
    assert_eq!(
        lookup.calls(),
        vec![
            "Among Us (video game)",
            "AMONG US (video game)",
            "among us (video game)",
            "Among Us (game)",
            "AMONG US (game)",
            "among us (game)",
        ]
    );
    assert_eq!(cache.get("Among Us"), Some("https://wiki/among-lower.png"));
}

#[test]
fn exhausted_lookup_falls_back_to_default_image() {
    let lookup = MockSummaries::default();
    let mut cache = ImageCache::in_memory();

    let outcome = remember(&[("Obscure Jam Game", 1)], &mut cache, &lookup);

    assert_eq!(outcome.entries[0].image_url, DEFAULT_IMAGE);
    assert_eq!(lookup.calls().len(), 9);
    assert_eq!(cache.get("Obscure Jam Game"), Some(DEFAULT_IMAGE));
}

#[test]
fn skip_policy_leaves_default_out_of_cache() {
    let lookup = MockSummaries::default();
    let mut cache = ImageCache::in_memory();

    let names = [("Obscure Jam Game", 1)];
    let outcome = resolve(&ranked(&names), &mut cache, &lookup, DefaultImagePolicy::Skip);

    assert_eq!(outcome.entries[0].image_url, DEFAULT_IMAGE);
    assert!(!cache.contains("Obscure Jam Game"));

    resolve(&ranked(&names), &mut cache, &lookup, DefaultImagePolicy::Skip);
    assert_eq!(lookup.calls().len(), 18);
}

#[test]
fn lookup_errors_are_absorbed_per_candidate() {
    let lookup = MockSummaries::default()
        .failing_on("Lethal Company (video game)")
        .with_thumbnail("LETHAL COMPANY (video game)", "https://wiki/lethal.png");
    let mut cache = ImageCache::in_memory();

    let outcome = remember(&[("Lethal Company", 1)], &mut cache, &lookup);

    assert_eq!(outcome.entries[0].image_url, "https://wiki/lethal.png");
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("Lethal Company (video game)"));
}

#[test]
fn output_matches_input_length_and_order() {
    let lookup = MockSummaries::default()
        .with_thumbnail("Among Us (video game)", "https://wiki/among.png")
        .failing_on("Broken")
        .failing_on("BROKEN")
        .failing_on("broken");
    let mut cache = ImageCache::in_memory();
    cache.insert("Cached Game", "https://cached/game.png");
    let input = ranked(&[
        ("Among Us", 5),
        ("Misery", 4),
        ("Broken", 3),
        ("Cached Game", 2),
        ("Nothing Here", 1),
    ]);

    let outcome = resolve(&input, &mut cache, &lookup, DefaultImagePolicy::Remember);

    assert_eq!(outcome.entries.len(), input.len());
    for (entry, display) in input.iter().zip(&outcome.entries) {
        assert_eq!(display.name, entry.name);
        assert_eq!(display.votes, entry.votes);
        assert!(!display.image_url.is_empty());
        assert!(!display.is_placeholder);
    }
    assert_eq!(outcome.entries[0].image_url, "https://wiki/among.png");
    assert_eq!(outcome.entries[1].image_url, known_image("Misery").expect("override"));
    assert_eq!(outcome.entries[2].image_url, DEFAULT_IMAGE);
    assert_eq!(outcome.entries[3].image_url, "https://cached/game.png");
    assert_eq!(outcome.entries[4].image_url, DEFAULT_IMAGE);
    assert_eq!(outcome.warnings.len(), 3);
    assert_eq!(lookup.calls_for("Nothing Here"), 9);
    assert_eq!(lookup.calls_for("Misery"), 0);
}

#[test]
fn board_is_padded_with_placeholders() {
    let lookup = MockSummaries::default();
    let mut cache = ImageCache::in_memory();
    let outcome = remember(&[("Roblox", 2), ("Mimesis", 1)], &mut cache, &lookup);

    let board = pad_to_board(outcome.entries, 10);
    assert_eq!(board.len(), 10);
    assert!(!board[1].is_placeholder);
    for slot in &board[2..] {
        assert!(slot.is_placeholder);
        assert_eq!(slot.votes, 0);
        assert_eq!(slot.name, PLACEHOLDER_NAME);
        assert_eq!(slot.image_url, DEFAULT_IMAGE);
    }
}

#[test]
fn summary_fixtures_parse_thumbnail() {
    let among =
        parse_summary_thumbnail(&read_fixture("wiki_summary_among_us.json")).expect("json");
    assert!(among.expect("thumbnail").ends_with("320px-Among_Us_cover_art.jpg"));
    let misery =
        parse_summary_thumbnail(&read_fixture("wiki_summary_disambiguation.json")).expect("json");
    assert_eq!(misery, None);
}

#[test]
fn blank_cached_url_is_resolved_again() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("image_cache.json");
    fs::write(&path, r#"{"version":1,"entries":[["Among Us",""]]}"#).expect("write");
    let mut cache = ImageCache::load(&path);
    let lookup = MockSummaries::default();

    let outcome = remember(&[("Among Us", 3)], &mut cache, &lookup);

    assert!(!outcome.entries[0].image_url.is_empty());
    assert_eq!(outcome.entries[0].image_url, DEFAULT_IMAGE);
    assert_eq!(lookup.calls().len(), 9);
    assert_eq!(cache.get("Among Us"), Some(DEFAULT_IMAGE));
}
