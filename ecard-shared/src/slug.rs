/// Slug derivation for card URLs
///
/// Every card gets a unique, URL-safe, human-readable identifier the first
/// time it is persisted. The slug is write-once: once a card has a non-empty
/// slug it never changes, which keeps printed QR codes valid.
///
/// Collision handling is deterministic: the slugified base is probed first,
/// then `base-2`, `base-3`, ... until a free value is found. The database
/// UNIQUE constraint on `cards.slug` remains the authoritative backstop for
/// concurrent creations; this module is the best-effort pre-check.
///
/// # Example
///
/// ```
/// use ecard_shared::slug::{allocate, slugify};
///
/// assert_eq!(slugify("Test User"), "test-user");
///
/// let taken = ["test"];
/// let slug = allocate("Test", |candidate| taken.contains(&candidate));
/// assert_eq!(slug, "test-2");
/// ```

/// Fallback base used when the candidate slugifies to nothing.
pub const FALLBACK_BASE: &str = "card";

/// Converts a free-form value into a URL-safe slug.
///
/// Lowercases, keeps ASCII alphanumerics, collapses every other run of
/// characters into a single hyphen, and trims leading/trailing hyphens.
/// Returns an empty string when nothing usable remains; callers fall back
/// to [`FALLBACK_BASE`].
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Allocates a unique slug for a new card.
///
/// `taken` is the set-membership probe (for the live system, an EXISTS query
/// that excludes the card's own row; for tests, a closure over a set). The
/// search space is unbounded and the probe is monotonic, so this always
/// terminates.
pub fn allocate<F>(base_candidate: &str, mut taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut candidates = candidates(base_candidate);
    loop {
        // The iterator is infinite; unwrap is unreachable.
        let candidate = candidates.next().expect("candidate stream is infinite");
        if !taken(&candidate) {
            return candidate;
        }
    }
}

/// Returns the infinite candidate sequence for a base value:
/// `base`, `base-2`, `base-3`, ...
///
/// The async persistence path iterates this directly so each candidate can be
/// probed with a database query.
pub fn candidates(base_candidate: &str) -> impl Iterator<Item = String> {
    let base = {
        let slug = slugify(base_candidate);
        if slug.is_empty() {
            FALLBACK_BASE.to_string()
        } else {
            slug
        }
    };

    let mut index = 0u64;
    std::iter::from_fn(move || {
        index += 1;
        if index == 1 {
            Some(base.clone())
        } else {
            Some(format!("{}-{}", base, index))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Test"), "test");
        assert_eq!(slugify("Test User"), "test-user");
        assert_eq!(slugify("  Jane   Doe  "), "jane-doe");
    }

    #[test]
    fn test_slugify_strips_non_ascii() {
        assert_eq!(slugify("Café Noir"), "caf-noir");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_allocate_free_base() {
        let slug = allocate("Test", |_| false);
        assert_eq!(slug, "test");
    }

    #[test]
    fn test_allocate_appends_incrementing_suffix() {
        let mut taken: HashSet<String> = HashSet::new();

        let first = allocate("Test", |c| taken.contains(c));
        taken.insert(first.clone());
        let second = allocate("Test", |c| taken.contains(c));
        taken.insert(second.clone());
        let third = allocate("Test", |c| taken.contains(c));

        assert_eq!(first, "test");
        assert_eq!(second, "test-2");
        assert_eq!(third, "test-3");
    }

    #[test]
    fn test_allocate_empty_base_falls_back() {
        let slug = allocate("", |_| false);
        assert_eq!(slug, "card");

        let taken = ["card", "card-2"];
        let slug = allocate("???", |c| taken.contains(&c));
        assert_eq!(slug, "card-3");
    }

    #[test]
    fn test_allocate_never_returns_taken_value() {
        let taken: HashSet<String> = (1..=50)
            .map(|i| if i == 1 { "jane".to_string() } else { format!("jane-{}", i) })
            .collect();

        let slug = allocate("Jane", |c| taken.contains(c));
        assert_eq!(slug, "jane-51");
        assert!(!taken.contains(&slug));
    }
}
