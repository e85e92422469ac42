//! Display-name → record resolution.
//!
//! The library page and the license list name the same game differently often
//! enough that exact lookup alone misses. Two prefix relations are accepted:
//!
//! - the display name is a prefix of a longer backend key (the license list
//!   appended something like `" - Gift"`); always allowed.
//! - a backend key is a prefix of a longer display name (the page appended a
//!   subtitle); only allowed when the key has at least `min_match_length`
//!   characters, since very short keys prefix-match unrelated titles.
//!
//! The longest qualifying key wins.

use std::collections::HashMap;

use crate::record::AcquisitionRecord;

pub const DEFAULT_MIN_MATCH_LENGTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Cache key that matched.
    pub key: &'a str,
    pub record: &'a AcquisitionRecord,
    pub exact: bool,
}

pub fn resolve<'a>(
    entries: &'a HashMap<String, AcquisitionRecord>,
    name: &str,
    min_match_length: usize,
) -> Option<Resolution<'a>> {
    if name.is_empty() {
        return None;
    }

    if let Some((key, record)) = entries.get_key_value(name) {
        return Some(Resolution {
            key,
            record,
            exact: true,
        });
    }

    let mut best: Option<(&'a String, &'a AcquisitionRecord, usize)> = None;

    for (key, record) in entries {
        let key_len = key.chars().count();
        let qualifies = key.starts_with(name)
            || (key_len >= min_match_length && name.starts_with(key.as_str()));
        if !qualifies {
            continue;
        }

        // Equal lengths fall back to key order so the pick does not depend on
        // hash iteration order.
        let better = match best {
            None => true,
            Some((best_key, _, best_len)) => {
                key_len > best_len || (key_len == best_len && key < best_key)
            }
        };
        if better {
            best = Some((key, record, key_len));
        }
    }

    best.map(|(key, record, _)| Resolution {
        key,
        record,
        exact: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(keys: &[&str]) -> HashMap<String, AcquisitionRecord> {
        keys.iter()
            .map(|key| {
                (
                    key.to_string(),
                    AcquisitionRecord::new("1 Jan, 2020", format!("source for {key}")),
                )
            })
            .collect()
    }

    fn resolved_key(entries: &HashMap<String, AcquisitionRecord>, name: &str) -> Option<String> {
        resolve(entries, name, DEFAULT_MIN_MATCH_LENGTH).map(|r| r.key.to_string())
    }

    #[test]
    fn display_name_prefix_of_backend_key() {
        let entries = cache(&["Dota 2 - Gift"]);

        assert_eq!(resolved_key(&entries, "Dota 2").as_deref(), Some("Dota 2 - Gift"));
    }

    #[test]
    fn short_display_name_has_no_floor() {
        let entries = cache(&["Deadlock - Closed Beta Access"]);

        let resolution = resolve(&entries, "Deadlock", DEFAULT_MIN_MATCH_LENGTH)
            .expect("name-is-prefix branch has no floor");

        assert_eq!(resolution.key, "Deadlock - Closed Beta Access");
        assert!(!resolution.exact);
    }

    #[test]
    fn exact_match_wins_without_prefix_logic() {
        let entries = cache(&["Bad North", "Bad North - Deluxe"]);

        let resolution = resolve(&entries, "Bad North", DEFAULT_MIN_MATCH_LENGTH).expect("match");

        assert_eq!(resolution.key, "Bad North");
        assert!(resolution.exact);
    }

    #[test]
    fn exact_match_beats_longer_prefix_candidates() {
        let entries = cache(&["Bad North", "Bad North: Jotunn Edition"]);

        let resolution =
            resolve(&entries, "Bad North: Jotunn Edition", DEFAULT_MIN_MATCH_LENGTH).expect("match");

        assert_eq!(resolution.key, "Bad North: Jotunn Edition");
        assert!(resolution.exact);
    }

    #[test]
    fn short_backend_key_needs_minimum_length() {
        let entries = cache(&["Ba"]);

        assert_eq!(resolved_key(&entries, "Bad North"), None);
        assert_eq!(resolved_key(&entries, "Bastion"), None);
        // A two character key is still reachable by exact lookup.
        assert_eq!(resolved_key(&entries, "Ba").as_deref(), Some("Ba"));
    }

    #[test]
    fn backend_key_prefix_of_display_name_at_floor() {
        let entries = cache(&["Hades"]);

        assert_eq!(resolved_key(&entries, "Hades II").as_deref(), Some("Hades"));
        assert_eq!(resolve(&entries, "Hades II", 6).map(|r| r.key), None);
    }

    #[test]
    fn longest_candidate_is_most_specific() {
        let entries = cache(&["Portal", "Portal 2 - Gift", "Portal 2"]);

        assert_eq!(
            resolved_key(&entries, "Portal 2: Peer Review").as_deref(),
            Some("Portal 2")
        );
        assert_eq!(resolved_key(&entries, "Porta").as_deref(), Some("Portal 2 - Gift"));
    }

    #[test]
    fn equal_length_ties_are_deterministic() {
        let entries = cache(&["Game - Beta", "Game - Gift"]);

        for _ in 0..8 {
            assert_eq!(resolved_key(&entries, "Game").as_deref(), Some("Game - Beta"));
        }
    }

    #[test]
    fn empty_name_and_unrelated_keys_do_not_match() {
        let entries = cache(&["Celeste", "Hollow Knight"]);

        assert_eq!(resolved_key(&entries, ""), None);
        assert_eq!(resolved_key(&entries, "Terraria"), None);
    }

    #[test]
    fn floor_counts_characters_not_bytes() {
        let entries = cache(&["Ōkami"]);

        assert_eq!(resolved_key(&entries, "Ōkami HD").as_deref(), Some("Ōkami"));
        assert_eq!(resolve(&entries, "Ōkami HD", 6).map(|r| r.key), None);
    }
}
