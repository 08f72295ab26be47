use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ParseSource, Result, SpmError};
use crate::reference::Reference;

pub const ROOT_MANIFEST_FILE: &str = "spm-package.json";
pub const PACKAGE_MANIFEST_FILE: &str = "package.json";

/// The subset of a package manifest the core consumes: `dependencies`,
/// `bin`, and `scripts.{preinstall,install,postinstall}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub bin: BTreeMap<String, String>,

    #[serde(default)]
    pub scripts: Scripts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scripts {
    pub preinstall: Option<String>,
    pub install: Option<String>,
    pub postinstall: Option<String>,
}

impl Scripts {
    /// The three lifecycle phases in the fixed order the Linker runs them.
    pub fn phases(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("preinstall", self.preinstall.as_deref()),
            ("install", self.install.as_deref()),
            ("postinstall", self.postinstall.as_deref()),
        ]
    }
}

impl Manifest {
    pub fn from_bytes(bytes: &[u8]) -> Result<Manifest> {
        serde_json::from_slice(bytes).map_err(|e| SpmError::Parse {
            context: PACKAGE_MANIFEST_FILE.to_string(),
            source: ParseSource::Json(e),
        })
    }

    /// `dependencies` flattened into `(name, reference)` descriptor pairs,
    /// ordered by name (`BTreeMap` iteration order) so resolution fans out
    /// deterministically given a fixed registry response.
    pub fn dependency_descriptors(&self) -> Vec<(String, Reference)> {
        self.dependencies
            .iter()
            .map(|(name, reference)| (name.clone(), Reference::new(reference.clone())))
            .collect()
    }
}

/// Reads and parses the root project's `spm-package.json`.
pub fn read_root_manifest(project_dir: &Path) -> Result<Manifest> {
    let path = project_dir.join(ROOT_MANIFEST_FILE);
    let bytes = std::fs::read(&path).map_err(|e| SpmError::io(path.clone(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| SpmError::Parse {
        context: path.display().to_string(),
        source: ParseSource::Json(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dependencies_key_yields_empty_list() {
        let manifest = Manifest::from_bytes(br#"{"name":"leaf"}"#).unwrap();
        assert!(manifest.dependency_descriptors().is_empty());
    }

    #[test]
    fn parses_bin_and_scripts() {
        let manifest = Manifest::from_bytes(
            br#"{
                "dependencies": {"a": "^1.0.0"},
                "bin": {"mytool": "bin/mytool.js"},
                "scripts": {"install": "touch installed"}
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.bin.get("mytool").unwrap(), "bin/mytool.js");
        assert_eq!(manifest.scripts.install.as_deref(), Some("touch installed"));
        assert!(manifest.scripts.preinstall.is_none());
    }
}
