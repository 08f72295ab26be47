use node_semver::{Range, Version};
use serde::{Deserialize, Serialize};

/// A dependency descriptor's reference, parsed once at ingestion time
/// instead of re-checked by string prefix at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// An exact, already-pinned semantic version.
    Exact(String),
    /// A semver range still needing a registry lookup to pin.
    Range(String),
    /// An absolute `http(s)://` URL.
    Url(String),
    /// A filesystem path (`/`, `./`, or `../` prefixed).
    Path(String),
}

impl Reference {
    pub fn new(raw: impl Into<String>) -> Self {
        Reference(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify this reference's shape. `npm:<name>@<range>` aliases are
    /// normalized here before classification.
    pub fn kind(&self) -> ReferenceKind {
        let normalized = Self::strip_npm_alias(&self.0);

        if normalized.starts_with("http://") || normalized.starts_with("https://") {
            ReferenceKind::Url(normalized.to_string())
        } else if normalized.starts_with('/')
            || normalized.starts_with("./")
            || normalized.starts_with("../")
        {
            ReferenceKind::Path(normalized.to_string())
        } else if Version::parse(normalized).is_ok() {
            ReferenceKind::Exact(normalized.to_string())
        } else {
            ReferenceKind::Range(normalized.to_string())
        }
    }

    /// `npm:foo@^1.0.0` -> `^1.0.0`; `npm:foo` -> `foo` is left untouched
    /// (no range present means "latest", which is out of scope here and
    /// simply falls through to range parsing of the bare alias target).
    fn strip_npm_alias(raw: &str) -> &str {
        match raw.strip_prefix("npm:") {
            Some(rest) => match rest.rsplit_once('@') {
                Some((_, range)) if !range.is_empty() => range,
                _ => rest,
            },
            None => raw,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self.kind(), ReferenceKind::Exact(_))
    }

    pub fn as_range(&self) -> Option<Range> {
        match self.kind() {
            ReferenceKind::Range(r) => Range::parse(r).ok(),
            _ => None,
        }
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        match self.kind() {
            ReferenceKind::Exact(v) => Version::parse(&v).map(|v| &v == version).unwrap_or(false),
            ReferenceKind::Range(_) => self
                .as_range()
                .map(|r| r.satisfies(version))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Reference {
    fn from(value: String) -> Self {
        Reference(value)
    }
}

impl From<&str> for Reference {
    fn from(value: &str) -> Self {
        Reference(value.to_string())
    }
}
