//! Property-based tests for generation and parsing invariants.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use arcane_updater::application::services::self_update::{
    self, TEMP_NAME_PREFIX, TEMP_SUFFIX_LEN,
};
use arcane_updater::domain::ImageRef;

// ── generate_temp_name() invariants ───────────────────────────────────────────

proptest! {
    /// Temporary names always have the fixed prefix plus 8 chars from
    /// [a-z0-9] — the Docker name grammar never rejects them.
    #[test]
    fn prop_temp_name_format(seed in 0u64..1000) {
        let _ = seed;
        let name = self_update::generate_temp_name();
        prop_assert!(name.starts_with(TEMP_NAME_PREFIX), "missing prefix: {name}");
        let suffix = &name[TEMP_NAME_PREFIX.len()..];
        prop_assert_eq!(suffix.len(), TEMP_SUFFIX_LEN);
        prop_assert!(
            suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
            "bad suffix chars: {}", name
        );
    }
}

#[test]
fn temp_name_collision_batch() {
    // 36^8 possible suffixes; 100 draws colliding would mean the randomness
    // source is broken.
    let names: std::collections::HashSet<_> =
        (0..100).map(|_| self_update::generate_temp_name()).collect();
    assert_eq!(names.len(), 100, "duplicate temp names generated");
}

// ── ImageRef::parse() invariants ──────────────────────────────────────────────

proptest! {
    /// Parsing never panics and always yields a non-empty tag.
    #[test]
    fn prop_parse_total(reference in "[a-zA-Z0-9./:@-]{0,40}") {
        let parsed = ImageRef::parse(&reference);
        prop_assert!(!parsed.tag.is_empty());
        prop_assert!(!parsed.registry.is_empty());
    }

    /// A bare single-segment name lands in the default registry's library
    /// namespace with the `latest` tag.
    #[test]
    fn prop_bare_names_normalize(name in "[a-z][a-z0-9]{0,15}") {
        let parsed = ImageRef::parse(&name);
        prop_assert_eq!(parsed.registry.as_str(), "docker.io");
        prop_assert_eq!(parsed.repository, format!("library/{name}"));
        prop_assert_eq!(parsed.tag.as_str(), "latest");
    }

    /// An explicit tag round-trips regardless of registry and repository.
    #[test]
    fn prop_explicit_tag_preserved(
        repo in "[a-z][a-z0-9]{0,10}/[a-z][a-z0-9]{0,10}",
        tag in "[a-zA-Z0-9][a-zA-Z0-9._-]{0,15}",
    ) {
        let parsed = ImageRef::parse(&format!("example.com/{repo}:{tag}"));
        prop_assert_eq!(parsed.registry.as_str(), "example.com");
        prop_assert_eq!(parsed.repository, repo);
        prop_assert_eq!(parsed.tag, tag);
    }

    /// A digest suffix never leaks into the parsed triple.
    #[test]
    fn prop_digest_suffix_stripped(digest in "[a-f0-9]{8,64}") {
        let parsed = ImageRef::parse(&format!("redis:7@sha256:{digest}"));
        prop_assert_eq!(parsed.repository.as_str(), "library/redis");
        prop_assert_eq!(parsed.tag.as_str(), "7");
    }
}
