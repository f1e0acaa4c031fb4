//! String normalization for identity keys and similarity scoring.

use nbdb_core::BucketStrategy;

/// Name given to canonical records whose observations carried no name.
/// Never participates in name/address matching.
pub const PLACEHOLDER_NAME: &str = "Unknown";

const LEADING_ARTICLES: [&str; 3] = ["the ", "an ", "a "];

const STREET_ABBREVIATIONS: [(&str, &str); 16] = [
    ("street", "st"),
    ("avenue", "ave"),
    ("road", "rd"),
    ("drive", "dr"),
    ("boulevard", "blvd"),
    ("highway", "hwy"),
    ("lane", "ln"),
    ("court", "ct"),
    ("place", "pl"),
    ("parkway", "pkwy"),
    ("suite", "ste"),
    ("circle", "cir"),
    ("north", "n"),
    ("south", "s"),
    ("east", "e"),
    ("west", "w"),
];

/// Lower-case, trim, and collapse internal whitespace. Punctuation is kept.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The looser form compared by the similarity test: [`normalize`], then
/// `&` spelled out, apostrophes dropped, remaining punctuation turned into
/// spaces, and common street words abbreviated.
#[must_use]
pub fn fuzzy_normalize(s: &str) -> String {
    let spelled = normalize(s).replace('&', " and ");
    let cleaned: String = spelled
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .map(abbreviate)
        .collect::<Vec<_>>()
        .join(" ")
}

fn abbreviate(word: &str) -> &str {
    STREET_ABBREVIATIONS
        .iter()
        .find(|(long, _)| *long == word)
        .map_or(word, |(_, short)| short)
}

/// Whether a name is empty or the placeholder, i.e. unusable for matching.
#[must_use]
pub fn is_placeholder_name(name: &str) -> bool {
    let normalized = normalize(name);
    normalized.is_empty() || normalized == PLACEHOLDER_NAME.to_lowercase()
}

/// `normalize(name) + "|" + normalize(address)`, or `None` when either part
/// is missing and the record therefore cannot be matched on name/address.
#[must_use]
pub fn exact_key(name: &str, address: Option<&str>) -> Option<String> {
    if is_placeholder_name(name) {
        return None;
    }
    let address = normalize(address.unwrap_or(""));
    if address.is_empty() {
        return None;
    }
    Some(format!("{}|{address}", normalize(name)))
}

/// `name|address` key used to compare against an existing dataset, where
/// blank parts are allowed.
#[must_use]
pub fn lookup_key(name: &str, address: Option<&str>) -> String {
    format!("{}|{}", normalize(name), normalize(address.unwrap_or("")))
}

/// The bucket a name falls into for fuzzy comparison.
#[must_use]
pub fn bucket_key(name: &str, strategy: BucketStrategy) -> Option<char> {
    let normalized = normalize(name);
    let trimmed = match strategy {
        BucketStrategy::FirstChar => normalized.as_str(),
        BucketStrategy::SkipArticles => LEADING_ARTICLES
            .iter()
            .find_map(|article| normalized.strip_prefix(article))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(normalized.as_str()),
    };
    trimmed.chars().next()
}
