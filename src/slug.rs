//! Human-readable project identifiers derived from titles.

use crate::storage::Storage;
use eyre::Result;

/// Maximum slug length, suffix included.
pub const MAX_SLUG_LEN: usize = 60;

/// Slug used when a title has no usable characters.
pub const FALLBACK_SLUG: &str = "project";

/// Turn a title into a slug.
///
/// Lowercases, keeps ASCII letters, digits, whitespace and hyphens, turns
/// whitespace runs into single hyphens, collapses repeated hyphens and trims
/// them from both ends. The result is cut to [`MAX_SLUG_LEN`]; an empty result
/// becomes [`FALLBACK_SLUG`].
///
/// A cut that lands just after a separator drops that trailing hyphen too, so
/// such a slug is one character shorter than a plain 60-character prefix.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    let slug = truncate(&slug, MAX_SLUG_LEN);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Make `base` unique among stored projects by appending `-2`, `-3`, ...
pub(crate) fn unique_slug(storage: &Storage, base: &str) -> Result<String> {
    if !storage.slug_exists(base)? {
        return Ok(base.to_string());
    }

    let mut n = 2u32;
    loop {
        let suffix = format!("-{}", n);
        let stem = truncate(base, MAX_SLUG_LEN - suffix.len());
        let candidate = format!("{}{}", stem, suffix);
        if !storage.slug_exists(&candidate)? {
            log::debug!("Slug '{}' taken, using '{}'", base, candidate);
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Cut to at most `max` characters without leaving a trailing hyphen.
fn truncate(slug: &str, max: usize) -> String {
    let cut: String = slug.chars().take(max).collect();
    cut.trim_end_matches('-').to_string()
}
