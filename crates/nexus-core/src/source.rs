//! Manifest discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use nexus_protocols::{ExecutorManifest, LoaderError};

/// File name looked up inside each executor directory.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// A source of executor manifests.
pub trait ManifestSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Discover all manifests currently provided by this source.
    fn discover(&self) -> Result<Vec<ExecutorManifest>, LoaderError>;
}

/// A fixed set of manifests handed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    manifests: Vec<ExecutorManifest>,
}

impl StaticManifestSource {
    pub fn new(manifests: Vec<ExecutorManifest>) -> Self {
        Self { manifests }
    }

    pub fn push(&mut self, manifest: ExecutorManifest) {
        self.manifests.push(manifest);
    }
}

impl ManifestSource for StaticManifestSource {
    fn name(&self) -> &str {
        "static"
    }

    fn discover(&self) -> Result<Vec<ExecutorManifest>, LoaderError> {
        Ok(self.manifests.clone())
    }
}

/// Discovers `<root>/<kind>/<name>/manifest.yaml` files.
#[derive(Debug, Clone)]
pub struct DirectoryManifestSource {
    root: PathBuf,
    max_depth: usize,
}

impl DirectoryManifestSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: 3,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse a single manifest file.
    pub fn load_file(path: &Path) -> Result<ExecutorManifest, LoaderError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoaderError::InvalidManifest {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_yml::from_str(&content).map_err(|e| LoaderError::InvalidManifest {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl ManifestSource for DirectoryManifestSource {
    fn name(&self) -> &str {
        "directory"
    }

    /// A missing root yields no manifests. Unparseable files are skipped.
    fn discover(&self) -> Result<Vec<ExecutorManifest>, LoaderError> {
        let mut manifests = Vec::new();

        if !self.root.exists() {
            debug!("Modules directory does not exist: {}", self.root.display());
            return Ok(manifests);
        }

        if !self.root.is_dir() {
            return Err(LoaderError::Discovery(format!(
                "Not a directory: {}",
                self.root.display()
            )));
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(self.max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == MANIFEST_FILE)
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        for path in paths {
            match Self::load_file(&path) {
                Ok(manifest) => {
                    debug!("Discovered executor manifest: {} ({})", manifest.id, path.display());
                    manifests.push(manifest);
                }
                Err(e) => warn!("Skipping manifest: {}", e),
            }
        }

        debug!(
            "Discovered {} manifests under {}",
            manifests.len(),
            self.root.display()
        );
        Ok(manifests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_protocols::Version;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, kind: &str, name: &str, content: &str) {
        let dir = root.join(kind).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    #[test]
    fn test_static_source() {
        let source = StaticManifestSource::new(vec![ExecutorManifest::new(
            "a",
            "A",
            Version::new(1, 0, 0),
        )]);
        let manifests = source.discover().unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].id, "a");
    }

    #[test]
    fn test_directory_source_missing_root() {
        let source = DirectoryManifestSource::new("/nonexistent/nexus/modules");
        assert!(source.discover().unwrap().is_empty());
    }

    #[test]
    fn test_directory_source_discovers_and_skips_invalid() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            "executors",
            "echo",
            "id: echo\nversion: 1.0.0\nname: Echo\ncapabilities: [echo]\n",
        );
        write_manifest(
            temp.path(),
            "analyzers",
            "lint",
            "id: lint\nversion: 0.2.0\ntype: analyzers\nname: Lint\ndependencies: [echo]\n",
        );
        write_manifest(temp.path(), "executors", "broken", "id: [unclosed\n");

        let source = DirectoryManifestSource::new(temp.path());
        let manifests = source.discover().unwrap();
        let ids: Vec<&str> = manifests.iter().map(|m| m.id.as_str()).collect();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"echo"));
        assert!(ids.contains(&"lint"));
        let lint = manifests.iter().find(|m| m.id == "lint").unwrap();
        assert_eq!(lint.kind, "analyzers");
        assert!(lint.depends_on("echo"));
    }

    #[test]
    fn test_directory_source_ignores_other_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("executors").join("x");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("README.md"), "# not a manifest").unwrap();

        let source = DirectoryManifestSource::new(temp.path());
        assert!(source.discover().unwrap().is_empty());
    }

    #[test]
    fn test_load_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST_FILE);
        std::fs::write(&path, "name: Missing Id\n").unwrap();

        let err = DirectoryManifestSource::load_file(&path).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidManifest { .. }));
        assert!(err.to_string().contains(MANIFEST_FILE));
    }
}
