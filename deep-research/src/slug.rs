//! Deterministic name normalization and slug derivation
//!
//! Every function here is pure and idempotent: feeding a slug back
//! through its own derivation returns it unchanged. Record file names,
//! report anchors, and dedup keys all flow through this module so the
//! same item name always maps to the same identifiers.

const TOPIC_SLUG_MAX: usize = 64;

/// Comparison key for item and field names: trimmed, lowercased, internal
/// whitespace collapsed. Two names are duplicates exactly when their
/// normalized forms match.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical token form for field names: lowercase, words joined by
/// underscores. "Release Date" and "release_date" collapse to the same
/// token.
pub fn field_token(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Slug for report file names, derived from the research topic.
///
/// Lowercased, whitespace runs become single hyphens, everything outside
/// `[a-z0-9-]` is dropped, then the result is cut to 64 chars and stripped
/// of leading and trailing hyphens.
pub fn topic_slug(topic: &str) -> String {
    let mut slug = topic
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    slug.retain(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    // All remaining chars are ASCII, so the cut cannot split a char
    slug.truncate(TOPIC_SLUG_MAX);
    slug.trim_matches('-').to_string()
}

/// File stem of an item's result record under the output directory.
pub fn item_file_slug(name: &str) -> String {
    let mut slug = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    slug.retain(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    slug
}

/// Intra-document anchor for an item's report section. Matches the anchor
/// a Markdown renderer derives from the `## <item name>` heading.
pub fn anchor_slug(name: &str) -> String {
    let mut slug = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    slug.retain(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    slug
}
