use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::RankedEntry;
use crate::image_cache::ImageCache;
use crate::wiki_fetch::SummaryLookup;

pub const DEFAULT_IMAGE: &str =
    "https://upload.wikimedia.org/wikipedia/commons/f/f8/Question_mark_alternate.svg";

pub const PLACEHOLDER_NAME: &str = "waiting";

/// Hand-picked images that always win over cache and remote lookup.
pub const KNOWN_IMAGES: &[(&str, &str)] = &[
    (
        "Roblox",
        "https://logos-world.net/wp-content/uploads/2020/11/Roblox-Logo.png",
    ),
    (
        "Phasmophobia",
        "https://upload.wikimedia.org/wikipedia/commons/thumb/4/47/Phasmophobia_cover.jpg/256px-Phasmophobia_cover.jpg",
    ),
    (
        "Misery",
        "https://shared.fastly.steamstatic.com/store_item_assets/steam/apps/2119830/f4aa2f3b4b352f7f373026fe592d32eef2c72fce/header.jpg?t=1763600148",
    ),
    (
        "Neighbors Suburban Warfare",
        "https://shared.fastly.steamstatic.com/store_item_assets/steam/apps/1732430/80b8baec5e77c8338c3931182b631fbde5c5a083/header.jpg?t=1760704191",
    ),
    (
        "Mimesis",
        "https://encrypted-tbn0.gstatic.com/images?q=tbn:ANd9GcRKLSqcFrpF_OJqPExclC2stRGJTKo1jnb3F-CyIYklHktOuIV2xajJibU_mh_cCApnc0jeoU_uH3WBqSmvKKiR8_sJ5ZGxe0pi-xn0q7F9HQ&s=10",
    ),
];

// Title suffixes in priority order; each is tried with the name as
// submitted, upper-cased and lower-cased before moving on.
const TITLE_SUFFIXES: [&str; 3] = [" (video game)", " (game)", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameCase {
    AsIs,
    Upper,
    Lower,
}

const NAME_CASES: [NameCase; 3] = [NameCase::AsIs, NameCase::Upper, NameCase::Lower];

impl NameCase {
    fn apply(self, name: &str) -> String {
        match self {
            NameCase::AsIs => name.to_string(),
            NameCase::Upper => name.to_uppercase(),
            NameCase::Lower => name.to_lowercase(),
        }
    }
}

/// Whether a name that fell through to the default image is remembered in
/// the cache. Remembering avoids re-querying hopeless names every poll, at
/// the cost of pinning names whose lookup only failed transiently until the
/// cache is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultImagePolicy {
    #[default]
    Remember,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub name: String,
    pub votes: u32,
    pub image_url: String,
    pub is_placeholder: bool,
}

impl DisplayEntry {
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_NAME.to_string(),
            votes: 0,
            image_url: DEFAULT_IMAGE.to_string(),
            is_placeholder: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    pub entries: Vec<DisplayEntry>,
    /// Lookup errors that were absorbed by the fallback chain.
    pub warnings: Vec<String>,
}

pub fn known_image(name: &str) -> Option<&'static str> {
    KNOWN_IMAGES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, url)| *url)
}

/// The nine page titles tried for `name`, generated lazily in priority order.
pub fn candidate_titles(name: &str) -> impl Iterator<Item = String> + '_ {
    TITLE_SUFFIXES.iter().flat_map(move |suffix| {
        NAME_CASES
            .iter()
            .map(move |case| format!("{}{suffix}", case.apply(name)))
    })
}

/// Attaches an image URL to every ranked entry, preserving order.
///
/// Overrides first, then the cache, then remote lookups (run in parallel on
/// the current rayon pool), then the default image. Never fails.
pub fn resolve<L>(
    entries: &[RankedEntry],
    cache: &mut ImageCache,
    lookup: &L,
    policy: DefaultImagePolicy,
) -> ResolveOutcome
where
    L: SummaryLookup + ?Sized,
{
    let mut images = entries
        .iter()
        .map(|entry| {
            if let Some(url) = known_image(&entry.name) {
                cache.insert(entry.name.as_str(), url);
                return Some(url.to_string());
            }
            cache.get(&entry.name).map(str::to_string)
        })
        .collect::<Vec<_>>();

    let pending = images
        .iter()
        .enumerate()
        .filter(|(_, image)| image.is_none())
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();

    let remote = pending
        .par_iter()
        .map(|&idx| {
            let mut warnings = Vec::new();
            let image = remote_image(&entries[idx].name, lookup, &mut warnings);
            (idx, image, warnings)
        })
        .collect::<Vec<_>>();

    let mut all_warnings = Vec::new();
    for (idx, image, warnings) in remote {
        all_warnings.extend(warnings);
        let name = entries[idx].name.as_str();
        let url = match image {
            Some(url) => {
                cache.insert(name, url.as_str());
                url
            }
            None => match known_image(name) {
                Some(url) => url.to_string(),
                None => {
                    if policy == DefaultImagePolicy::Remember {
                        cache.insert(name, DEFAULT_IMAGE);
                    }
                    DEFAULT_IMAGE.to_string()
                }
            },
        };
        images[idx] = Some(url);
    }

    let entries = entries
        .iter()
        .zip(images)
        .map(|(entry, image)| DisplayEntry {
            name: entry.name.clone(),
            votes: entry.votes,
            image_url: image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            is_placeholder: false,
        })
        .collect();

    ResolveOutcome {
        entries,
        warnings: all_warnings,
    }
}

fn remote_image<L>(name: &str, lookup: &L, warnings: &mut Vec<String>) -> Option<String>
where
    L: SummaryLookup + ?Sized,
{
    for title in candidate_titles(name) {
        match lookup.thumbnail(&title) {
            Ok(Some(url)) => return Some(url),
            Ok(None) => {}
            Err(err) => warnings.push(format!("Image lookup '{title}': {err:#}")),
        }
    }
    None
}

/// Pads with placeholder rows so the board always shows `size` entries.
pub fn pad_to_board(mut entries: Vec<DisplayEntry>, size: usize) -> Vec<DisplayEntry> {
    while entries.len() < size {
        entries.push(DisplayEntry::placeholder());
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::{candidate_titles, known_image};

    #[test]
    fn candidates_follow_group_order() {
        let titles = candidate_titles("Among Us").collect::<Vec<_>>();
        assert_eq!(
            titles,
            vec![
                "Among Us (video game)",
                "AMONG US (video game)",
                "among us (video game)",
                "Among Us (game)",
                "AMONG US (game)",
                "among us (game)",
                "Among Us",
                "AMONG US",
                "among us",
            ]
        );
    }

    #[test]
    fn candidates_are_lazy() {
        let mut titles = candidate_titles("Misery");
        assert_eq!(titles.next().as_deref(), Some("Misery (video game)"));
    }

    #[test]
    fn known_images_match_exact_case() {
        assert!(known_image("Roblox").is_some());
        assert!(known_image("roblox").is_none());
    }
}
