// Durable artifact storage keyed by relative location strings.

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed at {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact location `{0}`")]
    InvalidLocation(String),
}

/// Write-then-read store for model, metrics, importance, and prediction
/// artifacts. Locations come from `catalog::artifact_location`.
pub trait ArtifactStore: Send + Sync {
    fn write(&self, location: &str, bytes: &[u8]) -> Result<(), ArtifactError>;
    fn read(&self, location: &str) -> Result<Vec<u8>, ArtifactError>;
}

/// Artifact store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location under the root. Absolute paths and parent
    /// components are rejected so every artifact stays inside the root.
    fn resolve(&self, location: &str) -> Result<PathBuf, ArtifactError> {
        let rel = Path::new(location);
        let valid = !location.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(ArtifactError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn write(&self, location: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let path = self.resolve(location)?;
        let io_err = |source| ArtifactError::Io {
            location: location.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, bytes).map_err(io_err)
    }

    fn read(&self, location: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.resolve(location)?;
        fs::read(&path).map_err(|source| ArtifactError::Io {
            location: location.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seasoncast_artifacts_{name}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn write_creates_parent_directories() {
        let root = scratch("write_parents");
        let store = FsArtifactStore::new(&root);
        store.write("models/hr_ridge.json", b"{}").unwrap();
        assert!(root.join("models").join("hr_ridge.json").exists());
        assert_eq!(store.read("models/hr_ridge.json").unwrap(), b"{}");
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn write_overwrites_existing_artifact() {
        let root = scratch("overwrite");
        let store = FsArtifactStore::new(&root);
        store.write("metrics/a.json", b"old").unwrap();
        store.write("metrics/a.json", b"new").unwrap();
        assert_eq!(store.read("metrics/a.json").unwrap(), b"new");
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn escaping_locations_are_rejected() {
        let store = FsArtifactStore::new(scratch("escape"));
        for bad in ["../x.json", "/etc/passwd", "models/../../x", ""] {
            assert!(
                matches!(
                    store.write(bad, b"x"),
                    Err(ArtifactError::InvalidLocation(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn missing_artifact_is_io_error() {
        let store = FsArtifactStore::new(scratch("missing"));
        let err = store.read("models/none.json").unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
