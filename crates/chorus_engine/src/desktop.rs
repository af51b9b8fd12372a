//! Local desktop integration: launching applications and scoped file access.

use crate::capability::{ApplicationControl, FileOps};
use anyhow::{bail, Context};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Map a friendly application name to the executable we actually run.
/// Unknown names pass through unchanged so users can name binaries directly.
pub fn resolve_executable(name: &str) -> String {
    let key = name.trim().to_lowercase();
    let mapped = match key.as_str() {
        "browser" | "firefox" => "firefox",
        "files" | "file manager" => "nautilus",
        "terminal" => "gnome-terminal",
        "editor" | "text editor" => "gedit",
        "calculator" => "gnome-calculator",
        other => other,
    };
    mapped.to_string()
}

/// Controls desktop applications through ordinary process spawning.
pub struct DesktopAppControl;

impl DesktopAppControl {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopAppControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApplicationControl for DesktopAppControl {
    async fn launch(&self, name: &str) -> anyhow::Result<String> {
        let executable = resolve_executable(name);
        if executable.is_empty() {
            bail!("no application name given");
        }
        info!(application = %executable, "launching application");
        Command::new(&executable)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch {executable}"))?;
        Ok(format!("Launched {executable}"))
    }

    async fn close(&self, name: &str) -> anyhow::Result<String> {
        let executable = resolve_executable(name);
        if executable.is_empty() {
            bail!("no application name given");
        }
        info!(application = %executable, "closing application");
        let status = Command::new("pkill")
            .arg("-f")
            .arg(&executable)
            .status()
            .await
            .context("failed to run pkill")?;
        if status.success() {
            Ok(format!("Closed {executable}"))
        } else {
            bail!("{executable} does not appear to be running")
        }
    }
}

/// File operations confined to a root directory.
///
/// Requests are resolved relative to the root; absolute paths and `..`
/// components are rejected outright rather than canonicalized.
pub struct LocalFileOps {
    root: PathBuf,
}

impl LocalFileOps {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let requested = Path::new(path);
        if requested.is_absolute() {
            bail!("absolute paths are not allowed: {path}");
        }
        for component in requested.components() {
            if matches!(component, Component::ParentDir) {
                bail!("path escapes the working area: {path}");
            }
        }
        Ok(self.root.join(requested))
    }
}

#[async_trait]
impl FileOps for LocalFileOps {
    async fn create(&self, path: &str, contents: &str) -> anyhow::Result<String> {
        let target = self.resolve(path)?;
        // A trailing separator means the user asked for a directory.
        if path.ends_with('/') {
            tokio::fs::create_dir_all(&target)
                .await
                .with_context(|| format!("failed to create directory {path}"))?;
            debug!(path = %target.display(), "created directory");
            return Ok(format!("Created directory {path}"));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to prepare parent of {path}"))?;
        }
        tokio::fs::write(&target, contents)
            .await
            .with_context(|| format!("failed to create {path}"))?;
        debug!(path = %target.display(), "created file");
        Ok(format!("Created {path}"))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<String> {
        let target = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&target)
            .await
            .with_context(|| format!("nothing to delete at {path}"))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&target)
                .await
                .with_context(|| format!("failed to delete directory {path}"))?;
        } else {
            tokio::fs::remove_file(&target)
                .await
                .with_context(|| format!("failed to delete {path}"))?;
        }
        debug!(path = %target.display(), "deleted");
        Ok(format!("Deleted {path}"))
    }

    async fn read(&self, path: &str) -> anyhow::Result<String> {
        let target = self.resolve(path)?;
        tokio::fs::read_to_string(&target)
            .await
            .with_context(|| format!("failed to read {path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_map_to_executables() {
        assert_eq!(resolve_executable("Browser"), "firefox");
        assert_eq!(resolve_executable("file manager"), "nautilus");
        assert_eq!(resolve_executable("htop"), "htop");
    }

    #[tokio::test]
    async fn file_ops_stay_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalFileOps::new(dir.path());

        assert!(files.create("../escape.txt", "x").await.is_err());
        assert!(files.create("/etc/passwd", "x").await.is_err());
        assert!(files.read("sub/../../other").await.is_err());
    }

    #[tokio::test]
    async fn create_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalFileOps::new(dir.path());

        files.create("notes/todo.txt", "buy milk").await.unwrap();
        assert_eq!(files.read("notes/todo.txt").await.unwrap(), "buy milk");
        files.delete("notes/todo.txt").await.unwrap();
        assert!(files.read("notes/todo.txt").await.is_err());
    }

    #[tokio::test]
    async fn trailing_separator_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalFileOps::new(dir.path());

        files.create("archive/", "").await.unwrap();
        assert!(dir.path().join("archive").is_dir());
        files.delete("archive").await.unwrap();
        assert!(!dir.path().join("archive").exists());
    }
}
