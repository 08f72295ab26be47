pub mod archive;
pub mod error;
pub mod fetcher;
pub mod linker;
pub mod manifest;
pub mod optimizer;
pub mod progress;
pub mod reference;
pub mod resolver;

use std::path::{Path, PathBuf};

use crate::error::{Result, SpmError};
use crate::fetcher::Fetcher;
use crate::linker::Linker;
use crate::manifest::read_root_manifest;
use crate::optimizer::TreeOptimizer;
use crate::progress::ProgressTracker;
use crate::resolver::Resolver;

/// Resolves `project_dir`'s manifest and links the result into `install_dir`:
/// manifest -> Resolver -> TreeOptimizer -> Linker -> on-disk layout. This is
/// the library entry point `main.rs` wraps with CLI argument parsing and
/// process exit-code translation.
pub async fn install(project_dir: &Path, install_dir: &Path, fetcher: &Fetcher) -> Result<()> {
    std::fs::create_dir_all(install_dir).map_err(|e| SpmError::io(install_dir, e))?;
    let install_dir: PathBuf = install_dir
        .canonicalize()
        .map_err(|e| SpmError::io(install_dir, e))?;

    let manifest = read_root_manifest(project_dir)?;
    let progress = ProgressTracker::new();

    let raw_tree = {
        let resolver = Resolver::new(fetcher, &progress);
        resolver.resolve_root(&manifest).await
    };

    let raw_tree = match raw_tree {
        Ok(tree) => tree,
        Err(err) => {
            progress.finish();
            return Err(err);
        }
    };

    let optimized_tree = TreeOptimizer::optimize(raw_tree);

    let linker = Linker::new(fetcher, &progress);
    let result = linker.install(&optimized_tree, &install_dir).await;

    progress.finish();
    result
}
