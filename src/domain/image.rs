//! Image reference parsing and normalization.
//!
//! A reference like `myregistry.io:5000/team/app:v2@sha256:...` is split into
//! a (registry, repository, tag) triple. The digest suffix is dropped — the
//! digest checker resolves digests itself. Bare names (`redis`) resolve to the
//! public default registry under the `library/` namespace.

/// Canonical host of the public default registry.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Registry aliases that resolve to [`DEFAULT_REGISTRY`] for comparison.
const DEFAULT_REGISTRY_ALIASES: [&str; 2] = ["index.docker.io", "registry-1.docker.io"];

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Parse an image reference string.
    ///
    /// The first path segment is treated as a registry host only when it
    /// contains a dot, a colon, or equals `localhost`; otherwise the whole
    /// reference is a repository on the default registry.
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        // Strip a trailing @digest; tag-based comparison handles the rest.
        let reference = reference
            .split_once('@')
            .map_or(reference, |(before, _)| before);

        // The tag is whatever follows the last ':' after the last '/'.
        let (name, tag) = match reference.rsplit_once(':') {
            Some((before, after)) if !after.is_empty() && !after.contains('/') => (before, after),
            _ => (reference, "latest"),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if looks_like_registry(first) => {
                (first.to_owned(), rest.to_owned())
            }
            _ => {
                let repo = if name.contains('/') {
                    name.to_owned()
                } else {
                    format!("library/{name}")
                };
                (DEFAULT_REGISTRY.to_owned(), repo)
            }
        };

        Self {
            registry,
            repository,
            tag: tag.to_owned(),
        }
    }

    /// Registry host with well-known default-registry aliases folded to the
    /// canonical host.
    #[must_use]
    pub fn canonical_registry(&self) -> String {
        let host = self.registry.to_ascii_lowercase();
        if DEFAULT_REGISTRY_ALIASES.contains(&host.as_str()) {
            DEFAULT_REGISTRY.to_owned()
        } else {
            host
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

fn looks_like_registry(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

/// Whether two references point at the same (registry, repository, tag)
/// triple, case-insensitively, after digest stripping and alias folding.
#[must_use]
pub fn same_image(a: &str, b: &str) -> bool {
    let a = ImageRef::parse(a);
    let b = ImageRef::parse(b);
    a.canonical_registry() == b.canonical_registry()
        && a.repository.eq_ignore_ascii_case(&b.repository)
        && a.tag.eq_ignore_ascii_case(&b.tag)
}
