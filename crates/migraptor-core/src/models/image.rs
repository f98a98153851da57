//! Container image references.

use super::RegistryTag;
use serde::{Deserialize, Serialize};

/// An image found in a source registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Tag name, e.g. `latest`.
    pub name: String,
    /// Repository path plus tag, e.g. `eng/app:latest`.
    pub path: String,
    /// Fully qualified pull string, e.g. `registry.gitlab.com/eng/app:latest`.
    pub location: String,
}

impl From<RegistryTag> for ImageReference {
    fn from(tag: RegistryTag) -> Self {
        Self {
            name: tag.name,
            path: tag.path,
            location: tag.location,
        }
    }
}

/// Move an image reference from one namespace root to another.
///
/// The registry host (everything before the first `/`) is kept. The rest of
/// the reference must start with `old_root` followed by `/`, `:` or nothing;
/// that prefix is replaced by `new_root`. Returns `None` when the reference
/// does not live under `old_root`.
pub fn rewrite_reference(reference: &str, old_root: &str, new_root: &str) -> Option<String> {
    let old_root = old_root.trim_matches('/');
    let new_root = new_root.trim_matches('/');
    if old_root.is_empty() || new_root.is_empty() {
        return None;
    }

    let (host, path) = reference.split_once('/')?;
    let rest = path.strip_prefix(old_root)?;
    if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with(':')) {
        return None;
    }

    Some(format!("{}/{}{}", host, new_root, rest))
}

/// Split a reference into repository and tag.
///
/// A `:` only separates a tag when it comes after the last `/`, so registry
/// ports survive. References without a tag resolve to `latest`.
pub fn split_reference(reference: &str) -> (&str, &str) {
    let last_slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[last_slash..].rfind(':') {
        Some(i) => {
            let split = last_slash + i;
            (&reference[..split], &reference[split + 1..])
        }
        None => (reference, "latest"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF: &str = "registry.gitlab.com/eng/team/app/web:v1.2";

    #[test]
    fn test_rewrite_replaces_root_prefix() {
        assert_eq!(
            rewrite_reference(REF, "eng/team", "platform/team").as_deref(),
            Some("registry.gitlab.com/platform/team/app/web:v1.2")
        );
    }

    #[test]
    fn test_rewrite_round_trips() {
        let pairs = [
            ("eng", "platform"),
            ("eng/team", "platform/team"),
            ("eng/team/app", "dest"),
        ];
        for (old, new) in pairs {
            let moved = rewrite_reference(REF, old, new).unwrap();
            assert_eq!(rewrite_reference(&moved, new, old).as_deref(), Some(REF));
        }
    }

    #[test]
    fn test_rewrite_ignores_host_and_partial_segments() {
        // "gitlab" appears in the host but is not a path prefix.
        assert_eq!(rewrite_reference(REF, "gitlab", "x"), None);
        // "en" is a prefix of "eng" but not a whole segment.
        assert_eq!(rewrite_reference(REF, "en", "x"), None);
    }

    #[test]
    fn test_rewrite_image_named_after_project() {
        assert_eq!(
            rewrite_reference("registry.example.com:5050/eng/app:latest", "eng/app", "dest/app")
                .as_deref(),
            Some("registry.example.com:5050/dest/app:latest")
        );
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference(REF), ("registry.gitlab.com/eng/team/app/web", "v1.2"));
        assert_eq!(
            split_reference("registry.example.com:5050/eng/app"),
            ("registry.example.com:5050/eng/app", "latest")
        );
        assert_eq!(
            split_reference("registry.example.com:5050/eng/app:1"),
            ("registry.example.com:5050/eng/app", "1")
        );
    }

    #[test]
    fn test_reference_from_tag() {
        let tag = RegistryTag {
            name: "latest".into(),
            path: "eng/app:latest".into(),
            location: "registry.gitlab.com/eng/app:latest".into(),
        };
        let image = ImageReference::from(tag);
        assert_eq!(image.location, "registry.gitlab.com/eng/app:latest");
    }
}
