use std::collections::HashSet;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::errors::StorageError;

/// Handle to a single artifact inside a run's working directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    run_id: Uuid,
    path: PathBuf,
}

impl ArtifactHandle {
    /// The run this artifact belongs to.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Absolute path of the artifact on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Filesystem-backed store for per-run working areas.
///
/// Each run gets its own uniquely named directory under the root, so
/// concurrent runs never collide. All artifact access goes through handles
/// returned by [`ArtifactStore::write`] so that cleanup can remove exactly
/// the files a run created.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory under which run directories are created.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory reserved for the given run.
    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(format!("run-{run_id}"))
    }

    /// Path an artifact with the given name would have inside the run
    /// directory. Does not touch the filesystem.
    pub fn artifact_path(&self, run_id: Uuid, name: &str) -> PathBuf {
        self.run_dir(run_id).join(name)
    }

    /// Create the working directory for a run, returning its path.
    pub async fn reserve(&self, run_id: Uuid) -> Result<PathBuf, StorageError> {
        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        Ok(dir)
    }

    /// Write bytes to a named artifact in the run directory.
    pub async fn write(
        &self,
        run_id: Uuid,
        name: &str,
        bytes: &[u8],
    ) -> Result<ArtifactHandle, StorageError> {
        let path = self.artifact_path(run_id, name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(ArtifactHandle { run_id, path })
    }

    /// Wrap an existing file written by an external tool into a handle.
    ///
    /// Used for artifacts that external commands (ffmpeg, converters) write
    /// directly to a path obtained from [`ArtifactStore::artifact_path`].
    pub fn adopt(&self, run_id: Uuid, path: PathBuf) -> ArtifactHandle {
        ArtifactHandle { run_id, path }
    }

    /// Read an artifact back.
    pub async fn read(&self, handle: &ArtifactHandle) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(&handle.path)
            .await
            .map_err(|source| StorageError::Read {
                path: handle.path.clone(),
                source,
            })
    }

    /// Remove a single artifact.
    pub async fn remove(&self, handle: &ArtifactHandle) -> Result<(), StorageError> {
        tokio::fs::remove_file(&handle.path)
            .await
            .map_err(|source| StorageError::Remove {
                path: handle.path.clone(),
                source,
            })
    }

    /// Remove every artifact in the run directory except the given paths.
    ///
    /// If nothing is kept, the run directory itself is removed as well.
    /// Missing files are not an error; the caller may have removed them
    /// already.
    pub async fn remove_all_except(
        &self,
        run_id: Uuid,
        keep: &HashSet<PathBuf>,
    ) -> Result<(), StorageError> {
        let dir = self.run_dir(run_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // Directory never created (or already gone) means nothing to do.
            Err(_) => return Ok(()),
        };

        let mut kept_any = false;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StorageError::Read {
                        path: dir.clone(),
                        source,
                    })
                }
            };
            let path = entry.path();
            if keep.contains(&path) {
                kept_any = true;
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to remove transient artifact {}: {}", path.display(), e);
            }
        }

        if !kept_any {
            if let Err(e) = tokio::fs::remove_dir(&dir).await {
                tracing::debug!("Run directory {} not removed: {}", dir.display(), e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let run_id = Uuid::new_v4();

        store.reserve(run_id).await.unwrap();
        let handle = store.write(run_id, "note.txt", b"hello").await.unwrap();
        assert_eq!(store.read(&handle).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_concurrent_runs_get_distinct_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());

        let a = store.reserve(Uuid::new_v4()).await.unwrap();
        let b = store.reserve(Uuid::new_v4()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_remove_all_except_keeps_only_listed_paths() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let run_id = Uuid::new_v4();

        store.reserve(run_id).await.unwrap();
        let transient = store.write(run_id, "audio.wav", b"pcm").await.unwrap();
        let kept = store.write(run_id, "out.txt", b"result").await.unwrap();

        let keep: HashSet<PathBuf> = [kept.path().to_path_buf()].into_iter().collect();
        store.remove_all_except(run_id, &keep).await.unwrap();

        assert!(!transient.path().exists());
        assert!(kept.path().exists());
    }

    #[tokio::test]
    async fn test_remove_all_except_with_empty_keep_removes_run_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());
        let run_id = Uuid::new_v4();

        store.reserve(run_id).await.unwrap();
        store.write(run_id, "video.mp4", b"bytes").await.unwrap();

        store
            .remove_all_except(run_id, &HashSet::new())
            .await
            .unwrap();
        assert!(!store.run_dir(run_id).exists());
    }

    #[tokio::test]
    async fn test_remove_all_except_on_unreserved_run_is_noop() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());

        store
            .remove_all_except(Uuid::new_v4(), &HashSet::new())
            .await
            .unwrap();
    }
}
