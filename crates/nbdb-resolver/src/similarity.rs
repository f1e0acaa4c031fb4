//! Gestalt (Ratcliff/Obershelp) string similarity and the duplicate test.
//!
//! `ratio` is `2·M / T`, where `M` counts characters in recursively found
//! longest common blocks and `T` is the combined length. Scores lie in
//! `[0, 1]`.

use crate::config::ResolverConfig;
use crate::normalize::fuzzy_normalize;

/// Similarity ratio of two strings, compared char by char. Symmetric: the
/// block search always runs from the lexicographically smaller string.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(a: &str, b: &str) -> f64 {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    // Lengths are string lengths; far below f64's exact integer range.
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Characters covered by longest common blocks, found left and right of
/// each block in turn. Pending slices live on an explicit stack.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(a, b)];
    while let Some((a, b)) = pending.pop() {
        let (i, j, size) = longest_common_block(a, b);
        if size == 0 {
            continue;
        }
        matched += size;
        pending.push((&a[..i], &b[..j]));
        pending.push((&a[i + size..], &b[j + size..]));
    }
    matched
}

/// Longest common contiguous block as `(start_a, start_b, len)`. Ties go to
/// the block starting earliest in `a`, then earliest in `b`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        let mut curr = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                curr[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = curr;
    }

    best
}

/// Similarity of two names or addresses after [`fuzzy_normalize`].
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    ratio(&fuzzy_normalize(a), &fuzzy_normalize(b))
}

/// The duplicate test: both scores at or above their thresholds.
#[must_use]
pub fn is_duplicate(name_similarity: f64, address_similarity: f64, config: &ResolverConfig) -> bool {
    name_similarity >= config.name_threshold && address_similarity >= config.address_threshold
}

/// Score a candidate pair given as `(name, address)`. Address similarity is
/// only computed when the names already pass. Returns both scores when the
/// pair is a duplicate.
#[must_use]
pub fn compare(
    (name_a, address_a): (&str, &str),
    (name_b, address_b): (&str, &str),
    config: &ResolverConfig,
) -> Option<(f64, f64)> {
    let name_similarity = similarity(name_a, name_b);
    if name_similarity < config.name_threshold {
        return None;
    }
    let address_similarity = similarity(address_a, address_b);
    is_duplicate(name_similarity, address_similarity, config)
        .then_some((name_similarity, address_similarity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn identical_and_disjoint() {
        assert!(close(ratio("diner", "diner"), 1.0));
        assert!(close(ratio("abc", "xyz"), 0.0));
        assert!(close(ratio("", ""), 1.0));
        assert!(close(ratio("abc", ""), 0.0));
    }

    #[test]
    fn known_ratios() {
        assert!(close(ratio("abcd", "bcde"), 0.75));
        // "main st" + " diner" = 13 of 30 chars
        assert!(close(ratio("main st diner", "main street diner"), 26.0 / 30.0));
    }

    #[test]
    fn long_interleaved_strings_score_without_deep_recursion() {
        // Every other character matches, so each block is one char long and
        // the block search splits once per pair.
        let a: String = "ab".repeat(300);
        let b: String = "ac".repeat(300);
        assert!(close(ratio(&a, &b), 0.5));
    }

    #[test]
    fn ratio_is_symmetric() {
        for (a, b) in [("abxcd", "abcd"), ("tonys", "tony s pasta"), ("qabxcd", "abycdf")] {
            assert!(close(ratio(a, b), ratio(b, a)));
        }
    }

    #[test]
    fn abbreviated_street_names_match() {
        let name = similarity("Main St Diner", "Main Street Diner");
        let address = similarity("5 Main St", "5 Main Street");
        assert!(name >= 0.85, "name similarity {name}");
        assert!(address >= 0.85, "address similarity {address}");
    }

    #[test]
    fn different_restaurants_on_same_street_score_low() {
        let name = similarity("Main St Pizza", "Main St Diner");
        assert!(name < 0.85, "name similarity {name}");
    }

    #[test]
    fn punctuation_does_not_count() {
        assert!(close(
            similarity("Tony's Pasta Shop & Trattoria", "Tonys Pasta Shop and Trattoria"),
            1.0
        ));
    }

    #[test]
    fn threshold_is_inclusive() {
        let config = ResolverConfig::default();
        assert!(is_duplicate(0.85, 0.85, &config));
        assert!(!is_duplicate(0.84, 0.85, &config));
        assert!(!is_duplicate(0.85, 0.84, &config));
    }

    #[test]
    fn compare_short_circuits_on_name() {
        let config = ResolverConfig::default();
        assert!(compare(
            ("Sushi Nabe", "1 Main St"),
            ("Taco Mamacita", "1 Main St"),
            &config
        )
        .is_none());
        let scores = compare(
            ("Main St Diner", "5 Main St"),
            ("Main Street Diner", "5 Main Street"),
            &config,
        );
        assert!(scores.is_some());
    }
}
