use std::path::Path;

use async_recursion::async_recursion;
use futures::future::try_join_all;

use crate::archive::ArchiveReader;
use crate::error::{Result, SpmError};
use crate::fetcher::Fetcher;
use crate::manifest::{Manifest, PACKAGE_MANIFEST_FILE};
use crate::progress::ProgressTracker;
use crate::reference::ReferenceKind;
use crate::resolver::ResolvedNode;

const NODE_MODULES: &str = "spm_node_modules";
const BIN_DIR: &str = ".bin";

pub struct Linker<'a> {
    fetcher: &'a Fetcher,
    progress: &'a ProgressTracker,
}

impl<'a> Linker<'a> {
    pub fn new(fetcher: &'a Fetcher, progress: &'a ProgressTracker) -> Self {
        Linker { fetcher, progress }
    }

    /// Installs an optimized tree rooted at `cwd`. The root node
    /// itself is never fetched/extracted (empty reference sentinel); only
    /// its children are installed under `cwd/spm_node_modules`.
    pub async fn install(&self, root: &ResolvedNode, cwd: &Path) -> Result<()> {
        self.install_node(root, cwd).await
    }

    /// Extracts `node` into `cwd` (unless it's the root sentinel), then
    /// recurses into each child at `cwd/spm_node_modules/<name>`, wiring up
    /// bin shims and running lifecycle scripts once each child finishes
    /// installing.
    #[async_recursion]
    async fn install_node(&self, node: &ResolvedNode, cwd: &Path) -> Result<()> {
        if !node.is_root() {
            self.extract_node(node, cwd).await?;
        }

        try_join_all(node.children.iter().map(|child| async move {
            let child_cwd = cwd.join(NODE_MODULES).join(&child.name);

            self.install_node(child, &child_cwd).await?;

            self.link_bin(child, &child_cwd, cwd).await?;
            self.run_scripts(child, &child_cwd).await?;

            self.progress.tick(child.name.clone());
            Ok::<(), SpmError>(())
        }))
        .await?;

        Ok(())
    }

    async fn extract_node(&self, node: &ResolvedNode, cwd: &Path) -> Result<()> {
        self.progress.add_work(1);

        let strip_n = match node.reference.kind() {
            ReferenceKind::Path(_) => 0,
            _ => 1,
        };

        let tarball = self.fetcher.fetch_tarball(&node.name, &node.reference).await?;

        tokio::fs::create_dir_all(cwd)
            .await
            .map_err(|e| SpmError::io(cwd, e))?;

        let buf = tarball.to_vec();
        let target = cwd.to_path_buf();
        tokio::task::spawn_blocking(move || ArchiveReader::extract_all(&buf, &target, strip_n))
            .await
            .expect("extraction task panicked")?;

        Ok(())
    }

    /// Reads `child`'s manifest from `child_cwd` and symlinks each of its
    /// `bin` entries into `parent_cwd/spm_node_modules/.bin/`.
    async fn link_bin(&self, child: &ResolvedNode, child_cwd: &Path, parent_cwd: &Path) -> Result<()> {
        let manifest = read_manifest(child_cwd).await?;

        if manifest.bin.is_empty() {
            return Ok(());
        }

        let bin_dir = parent_cwd.join(NODE_MODULES).join(BIN_DIR);
        tokio::fs::create_dir_all(&bin_dir)
            .await
            .map_err(|e| SpmError::io(&bin_dir, e))?;

        for (bin_name, bin_path) in &manifest.bin {
            let source = child_cwd.join(bin_path);
            let dest = bin_dir.join(bin_name);

            let source = tokio::fs::canonicalize(&source)
                .await
                .unwrap_or(source);

            let link_target = pathdiff::diff_paths(&source, &bin_dir).unwrap_or(source.clone());

            if dest.symlink_metadata().is_ok() {
                tokio::fs::remove_file(&dest).await.ok();
            }

            create_symlink(&link_target, &dest).map_err(|e| SpmError::io(dest.clone(), e))?;
        }

        Ok(())
    }

    /// Runs `preinstall`, `install`, `postinstall` in order for `child` if
    /// its manifest defines them, with `child_cwd/spm_node_modules/.bin`
    /// prepended to `PATH`.
    async fn run_scripts(&self, child: &ResolvedNode, child_cwd: &Path) -> Result<()> {
        let manifest = read_manifest(child_cwd).await?;

        let bin_dir = child_cwd.join(NODE_MODULES).join(BIN_DIR);
        let path_prefix = format!("{}:{}", bin_dir.display(), std::env::var("PATH").unwrap_or_default());

        for (phase, script) in manifest.scripts.phases() {
            let Some(script) = script else { continue };

            tracing::info!(package = %child.name, phase, "running lifecycle script");

            let status = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(script)
                .current_dir(child_cwd)
                .env("PATH", &path_prefix)
                .status()
                .await
                .map_err(|e| SpmError::io(child_cwd, e))?;

            if !status.success() {
                return Err(SpmError::ScriptFailure {
                    package: child.name.clone(),
                    phase,
                    status: status.code().unwrap_or(-1),
                });
            }
        }

        Ok(())
    }
}

async fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(PACKAGE_MANIFEST_FILE);

    match tokio::fs::read(&path).await {
        Ok(bytes) => Manifest::from_bytes(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
        Err(e) => Err(SpmError::io(path, e)),
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
