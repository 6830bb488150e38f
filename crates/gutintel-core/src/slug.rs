//! Slug derivation.
//!
//! A slug is the canonical, URL-safe identifier of an ingredient. When a
//! submission omits one, it is derived from the name: lowercase, every run of
//! characters outside `[a-z0-9]` collapsed into one hyphen, hyphens trimmed
//! from both ends. Derivation is deterministic, so re-submitting an unchanged
//! name always yields the same slug.

/// The name contains nothing a slug can be built from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot derive a slug from {name:?}: it has no ASCII letters or digits")]
pub struct SlugError {
    pub name: String,
}

/// Derives the canonical slug for `name`.
///
/// ```
/// use gutintel_core::slug::derive_slug;
///
/// assert_eq!(derive_slug("Green Tea Extract!!").unwrap(), "green-tea-extract");
/// assert_eq!(derive_slug("Omega-3 (EPA/DHA)").unwrap(), "omega-3-epa-dha");
/// assert!(derive_slug("!!!").is_err());
/// ```
pub fn derive_slug(name: &str) -> Result<String, SlugError> {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        return Err(SlugError {
            name: name.to_string(),
        });
    }
    Ok(slug)
}

/// True if `slug` matches `^[a-z0-9]+(-[a-z0-9]+)*$`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_and_trims() {
        assert_eq!(derive_slug("  Inulin  ").unwrap(), "inulin");
        assert_eq!(
            derive_slug("--Lactobacillus   rhamnosus GG--").unwrap(),
            "lactobacillus-rhamnosus-gg"
        );
        assert_eq!(derive_slug("Vitamin D3").unwrap(), "vitamin-d3");
        assert_eq!(derive_slug("a_b.c").unwrap(), "a-b-c");
    }

    #[test]
    fn non_ascii_letters_become_separators() {
        assert_eq!(derive_slug("Açaí berry").unwrap(), "a-a-berry");
    }

    #[test]
    fn empty_results_fail() {
        assert_eq!(
            derive_slug("").unwrap_err(),
            SlugError {
                name: String::new()
            }
        );
        assert!(derive_slug("   --- ").is_err());
    }

    #[test]
    fn derivation_is_idempotent() {
        for name in ["Green Tea Extract!!", "Omega-3", "Psyllium Husk (Plantago ovata)", "x"] {
            let once = derive_slug(name).unwrap();
            assert_eq!(derive_slug(&once).unwrap(), once);
            assert_eq!(derive_slug(name).unwrap(), once);
            assert!(is_valid_slug(&once));
        }
    }

    #[test]
    fn validity() {
        assert!(is_valid_slug("inulin"));
        assert!(is_valid_slug("omega-3"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("omega--3"));
        assert!(!is_valid_slug("omega-3-"));
        assert!(!is_valid_slug("Omega"));
        assert!(!is_valid_slug("omega_3"));
    }
}
