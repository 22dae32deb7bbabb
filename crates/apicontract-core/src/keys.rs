//! Object key conventions and fuzzy key suggestions
//!
//! Pattern keys ending in `?` are optional. Fuzzy suggestions use the skim
//! matcher in both directions plus a same-letters check, so dropped
//! characters (`b` → `ab`), extra ones (`namee` → `name`) and swapped ones
//! (`nmae` → `name`) are caught. The reverse direction only applies when
//! the declared key covers at least half of the unexpected one.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Suffix marking an optional key.
pub const OPTIONAL_SUFFIX: char = '?';

#[must_use]
pub fn is_optional(key: &str) -> bool {
    key.ends_with(OPTIONAL_SUFFIX)
}

/// Key without the optional marker.
#[must_use]
pub fn key_name(key: &str) -> &str {
    key.strip_suffix(OPTIONAL_SUFFIX).unwrap_or(key)
}

#[must_use]
pub fn optional_key(name: &str) -> String {
    format!("{}{OPTIONAL_SUFFIX}", key_name(name))
}

/// Best declared key that `unexpected` looks like a misspelling of.
pub fn suggest<'a>(unexpected: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let matcher = SkimMatcherV2::default();
    let lowered = unexpected.to_lowercase();
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let other = candidate.to_lowercase();
            if other == lowered || same_letters(&other, &lowered) {
                return Some((i64::MAX, candidate));
            }
            matcher
                .fuzzy_match(&other, &lowered)
                .or_else(|| {
                    (other.chars().count() * 2 >= lowered.chars().count())
                        .then(|| matcher.fuzzy_match(&lowered, &other))
                        .flatten()
                })
                .map(|score| (score, candidate))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, candidate)| candidate)
}

fn same_letters(a: &str, b: &str) -> bool {
    if a.len() != b.len() || a.len() < 2 {
        return false;
    }
    let mut left: Vec<char> = a.chars().collect();
    let mut right: Vec<char> = b.chars().collect();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}
