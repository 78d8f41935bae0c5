//! Local-process sandbox.
//!
//! Runs commands in a per-project directory on the host. This is the
//! implementation the server binary ships with; remote provisioners plug
//! in behind the same traits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::process::Command;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use stackforge_core::events::TunnelMap;
use stackforge_core::ids::ProjectId;

use crate::error::{SandboxError, SandboxResult};
use crate::handle::{Provisioner, SandboxHandle};

/// Directory names excluded from file listings.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "target", "dist", ".next"];

fn ignored_set() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for name in IGNORED_DIRS {
        let _ = builder.add(Glob::new(name).expect("static glob"));
    }
    builder.build().expect("static globset")
}

/// A sandbox rooted at a host directory.
pub struct LocalSandbox {
    root: PathBuf,
    tunnels: TunnelMap,
    ignored: GlobSet,
}

impl LocalSandbox {
    /// Create a sandbox over an existing directory.
    pub fn new(root: impl Into<PathBuf>, tunnels: TunnelMap) -> Self {
        Self {
            root: root.into(),
            tunnels,
            ignored: ignored_set(),
        }
    }

    /// Resolve a sandbox path against the root. Leading slashes are
    /// stripped so "absolute" sandbox paths stay inside the root.
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SandboxHandle for LocalSandbox {
    async fn wait_until_up(&self) -> SandboxResult<()> {
        Ok(())
    }

    async fn is_up(&self) -> bool {
        self.root.is_dir()
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn run_command(&self, command: &str, workdir: Option<&str>) -> SandboxResult<String> {
        let cwd = match workdir {
            Some(dir) => self.resolve(dir),
            None => self.root.clone(),
        };
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .output()
            .await
            .map_err(|e| SandboxError::Command(format!("{command}: {e}")))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            text.push_str(&format!("\n(exit status: {code})"));
        }
        debug!(command, exit = ?output.status.code(), "ran command");
        Ok(text)
    }

    async fn read_file(&self, path: &str, missing_ok: bool) -> SandboxResult<Option<String>> {
        let resolved = self.resolve(path);
        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if missing_ok {
                    Ok(None)
                } else {
                    Err(SandboxError::FileNotFound(path.to_string()))
                }
            }
            Err(e) => Err(SandboxError::Io(e)),
        }
    }

    async fn list_files(&self) -> SandboxResult<Vec<String>> {
        let root = self.root.clone();
        let ignored = self.ignored.clone();
        // Directory walking is blocking work.
        let paths = tokio::task::spawn_blocking(move || list_files_blocking(&root, &ignored))
            .await
            .map_err(|e| SandboxError::Command(format!("file walk panicked: {e}")))??;
        Ok(paths)
    }

    async fn list_tunnels(&self) -> SandboxResult<TunnelMap> {
        Ok(self.tunnels.clone())
    }
}

fn list_files_blocking(root: &Path, ignored: &GlobSet) -> SandboxResult<Vec<String>> {
    let mut paths = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir() && ignored.is_match(entry.file_name()))
    });
    for entry in walker {
        let entry = entry.map_err(|e| SandboxError::Command(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            paths.push(format!("/{}", rel.display()));
        }
    }
    paths.sort();
    Ok(paths)
}

/// Provisions [`LocalSandbox`] directories under a base path.
pub struct LocalProvisioner {
    base_dir: PathBuf,
    tunnels: TunnelMap,
}

impl LocalProvisioner {
    /// Create a provisioner rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, tunnels: TunnelMap) -> Self {
        Self {
            base_dir: base_dir.into(),
            tunnels,
        }
    }

    fn project_dir(&self, project_id: ProjectId) -> PathBuf {
        self.base_dir.join(format!("project-{project_id}"))
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    #[instrument(skip(self))]
    async fn acquire(&self, project_id: ProjectId) -> SandboxResult<Arc<dyn SandboxHandle>> {
        let dir = self.project_dir(project_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Arc::new(LocalSandbox::new(dir, self.tunnels.clone())))
    }

    #[instrument(skip(self))]
    async fn terminate_resources(&self, project_id: ProjectId) -> SandboxResult<()> {
        let dir = self.project_dir(project_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SandboxError::Io(e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
