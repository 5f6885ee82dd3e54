//! Slug generation for public event URLs.

use rand::Rng;

/// Maximum length of a generated slug (before any collision suffix).
pub const MAX_SLUG_LENGTH: usize = 100;

const SUFFIX_CHARS: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

lazy_static::lazy_static! {
    pub static ref SLUG_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$").unwrap();
}

/// Returns true if `s` has the shape of a generated slug.
pub fn is_valid_slug(s: &str) -> bool {
    s.len() <= MAX_SLUG_LENGTH + 7 && SLUG_REGEX.is_match(s)
}

/// Converts a title into a URL slug.
///
/// Lowercases ASCII letters, collapses every run of other characters into a
/// single `-`, trims leading/trailing dashes and truncates to
/// [`MAX_SLUG_LENGTH`]. Returns `"event"` when nothing usable remains.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug.truncate(MAX_SLUG_LENGTH);
    let slug = slug.trim_end_matches('-').to_string();

    if slug.is_empty() {
        "event".to_string()
    } else {
        slug
    }
}

/// Appends a random 6 character suffix, used when a slug is already taken.
pub fn with_random_suffix(slug: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| SUFFIX_CHARS[rng.gen_range(0..SUFFIX_CHARS.len())] as char)
        .collect();
    format!("{}-{}", slug, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Tech Meetup 2024"), "tech-meetup-2024");
    }

    #[test]
    fn test_slugify_collapses_symbols() {
        assert_eq!(slugify("  Next.js 14 -- Workshop!! "), "next-js-14-workshop");
    }

    #[test]
    fn test_slugify_non_ascii_only() {
        assert_eq!(slugify("Встреча"), "event");
        assert_eq!(slugify(""), "event");
    }

    #[test]
    fn test_slugify_truncates() {
        let title = "a".repeat(250);
        assert_eq!(slugify(&title).len(), MAX_SLUG_LENGTH);
    }

    #[test]
    fn test_slugify_truncation_does_not_end_with_dash() {
        let title = format!("{} b", "a".repeat(99));
        let slug = slugify(&title);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug.len(), 99);
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("tech-meetup-2024"));
        assert!(is_valid_slug("a"));
        assert!(!is_valid_slug("Tech-Meetup"));
        assert!(!is_valid_slug("-meetup"));
        assert!(!is_valid_slug("meetup-"));
        assert!(!is_valid_slug("meet up"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_generated_slugs_are_valid() {
        for title in ["Tech Meetup 2024", "!!!", "  Next.js 14 -- Workshop!! "] {
            let slug = slugify(title);
            assert!(is_valid_slug(&slug), "{}", slug);
            assert!(is_valid_slug(&with_random_suffix(&slug)));
        }
    }

    #[test]
    fn test_with_random_suffix() {
        let slug = with_random_suffix("tech-meetup");
        assert!(slug.starts_with("tech-meetup-"));
        assert_eq!(slug.len(), "tech-meetup-".len() + 6);
        assert_ne!(with_random_suffix("x"), with_random_suffix("x"));
    }
}
