use std::collections::HashMap;

use async_recursion::async_recursion;
use futures::future::try_join_all;
use node_semver::{Range, Version};

use crate::archive::ArchiveReader;
use crate::error::{Result, SpmError};
use crate::fetcher::Fetcher;
use crate::manifest::Manifest;
use crate::progress::ProgressTracker;
use crate::reference::{Reference, ReferenceKind};

/// A `(name, reference)` pair as it appears in a manifest's `dependencies`.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    pub reference: Reference,
}

/// A descriptor plus its resolved children. The root node's
/// `reference` is the empty-string sentinel: "this is the project itself,
/// do not fetch or extract".
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub name: String,
    pub reference: Reference,
    pub children: Vec<ResolvedNode>,
}

impl ResolvedNode {
    pub fn is_root(&self) -> bool {
        self.reference.as_str().is_empty()
    }

    pub fn root(children: Vec<ResolvedNode>) -> Self {
        ResolvedNode {
            name: String::new(),
            reference: Reference::new(""),
            children,
        }
    }
}

/// Name -> currently-chosen reference, threaded down through resolution to
/// prune already-satisfied subtrees.
pub type Available = HashMap<String, Reference>;

pub struct Resolver<'a> {
    fetcher: &'a Fetcher,
    progress: &'a ProgressTracker,
}

impl<'a> Resolver<'a> {
    pub fn new(fetcher: &'a Fetcher, progress: &'a ProgressTracker) -> Self {
        Resolver { fetcher, progress }
    }

    /// Resolves the root manifest's direct dependencies into a tree whose
    /// root is the empty-reference sentinel node.
    pub async fn resolve_root(&self, manifest: &Manifest) -> Result<ResolvedNode> {
        let descriptors: Vec<Descriptor> = manifest
            .dependency_descriptors()
            .into_iter()
            .map(|(name, reference)| Descriptor { name, reference })
            .collect();

        let available: Available = HashMap::new();

        let children = try_join_all(descriptors.into_iter().map(|d| {
            let available = available.clone();
            async move { self.build_tree(d, available).await }
        }))
        .await?;

        Ok(ResolvedNode::root(children))
    }

    /// If `reference` is a valid range but not an exact version, fetches the
    /// version list and returns the highest version satisfying the range
    /// under semver precedence. URLs and paths pass through untouched.
    pub async fn pin_reference(&self, name: &str, reference: &Reference) -> Result<Reference> {
        let range_str = match reference.kind() {
            ReferenceKind::Range(r) => r,
            _ => return Ok(reference.clone()),
        };

        let range = Range::parse(&range_str).map_err(|_| SpmError::UnsatisfiedRange {
            name: name.to_string(),
            range: range_str.clone(),
        })?;

        let versions = self.fetcher.fetch_versions(name).await?;

        let best = versions
            .iter()
            .filter_map(|v| Version::parse(v).ok())
            .filter(|v| range.satisfies(v))
            .max();

        match best {
            Some(version) => Ok(Reference::new(version.to_string())),
            None => Err(SpmError::UnsatisfiedRange {
                name: name.to_string(),
                range: range_str,
            }),
        }
    }

    /// Fetches the tarball, extracts `package.json` (stripN=1, registry
    /// tarballs wrap contents in a `package/` directory), and flattens its
    /// `dependencies` into descriptors. A missing `dependencies` key yields
    /// the empty list.
    pub async fn read_dependencies(&self, name: &str, reference: &Reference) -> Result<Vec<Descriptor>> {
        let tarball = self.fetcher.fetch_tarball(name, reference).await?;
        let bytes = ArchiveReader::read_one_file(&tarball, "package.json", 1)?;
        let manifest = Manifest::from_bytes(&bytes)?;

        Ok(manifest
            .dependency_descriptors()
            .into_iter()
            .map(|(name, reference)| Descriptor { name, reference })
            .collect())
    }

    /// `available[d.name]` equal to `d.reference` exactly satisfies it;
    /// otherwise a range `d.reference` satisfied by the pinned version
    /// already in `available` also satisfies it.
    fn is_satisfied(descriptor: &Descriptor, available: &Available) -> bool {
        let Some(chosen) = available.get(&descriptor.name) else {
            return false;
        };

        if chosen == &descriptor.reference {
            return true;
        }

        match (descriptor.reference.kind(), chosen.kind()) {
            (ReferenceKind::Range(range_str), ReferenceKind::Exact(version_str)) => {
                match (Range::parse(&range_str), Version::parse(&version_str)) {
                    (Ok(range), Ok(version)) => range.satisfies(&version),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Pins, reads transitive dependencies, and recurses over a single
    /// node's children concurrently. Each child receives its own copy of
    /// `available` so concurrent siblings never observe each other's pins.
    #[async_recursion]
    async fn build_tree(&self, descriptor: Descriptor, available: Available) -> Result<ResolvedNode> {
        self.progress.add_work(1);

        let pinned = self.pin_reference(&descriptor.name, &descriptor.reference).await?;
        let deps = self.read_dependencies(&descriptor.name, &pinned).await?;

        let mut child_available = available.clone();
        child_available.insert(descriptor.name.clone(), pinned.clone());

        let pending: Vec<Descriptor> = deps
            .into_iter()
            .filter(|d| !Self::is_satisfied(d, &child_available))
            .collect();

        let children = try_join_all(pending.into_iter().map(|d| {
            let child_available = child_available.clone();
            async move { self.build_tree(d, child_available).await }
        }))
        .await?;

        self.progress.tick(descriptor.name.clone());

        Ok(ResolvedNode {
            name: descriptor.name,
            reference: pinned,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_node_is_recognized_by_empty_reference() {
        let root = ResolvedNode::root(vec![]);
        assert!(root.is_root());
    }

    #[test]
    fn exact_match_is_satisfied() {
        let mut available = Available::new();
        available.insert("a".to_string(), Reference::new("1.2.3"));
        let descriptor = Descriptor {
            name: "a".to_string(),
            reference: Reference::new("1.2.3"),
        };
        assert!(Resolver::is_satisfied(&descriptor, &available));
    }

    #[test]
    fn range_satisfied_by_already_pinned_version() {
        let mut available = Available::new();
        available.insert("a".to_string(), Reference::new("1.5.0"));
        let descriptor = Descriptor {
            name: "a".to_string(),
            reference: Reference::new("^1.2.0"),
        };
        assert!(Resolver::is_satisfied(&descriptor, &available));
    }

    #[test]
    fn range_not_satisfied_by_incompatible_pinned_version() {
        let mut available = Available::new();
        available.insert("a".to_string(), Reference::new("2.0.0"));
        let descriptor = Descriptor {
            name: "a".to_string(),
            reference: Reference::new("^1.2.0"),
        };
        assert!(!Resolver::is_satisfied(&descriptor, &available));
    }

    #[test]
    fn absent_from_available_is_not_satisfied() {
        let available = Available::new();
        let descriptor = Descriptor {
            name: "a".to_string(),
            reference: Reference::new("^1.2.0"),
        };
        assert!(!Resolver::is_satisfied(&descriptor, &available));
    }
}
