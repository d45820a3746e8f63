// Snapshot repository implementations
use crate::application::snapshot_repository::SnapshotRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Stores the snapshot blob in a single file.
#[derive(Debug, Clone)]
pub struct FileSnapshotRepository {
    path: PathBuf,
}

impl FileSnapshotRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotRepository for FileSnapshotRepository {
    async fn save(&self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Write then rename so a crash never leaves a truncated snapshot behind
        let temp = self.temp_path();
        tokio::fs::write(&temp, blob)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }
}

/// Keeps the snapshot in memory; counts saves for inspection.
#[derive(Debug, Default)]
pub struct MemorySnapshotRepository {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    blob: Option<String>,
    saves: usize,
}

impl MemorySnapshotRepository {
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                blob: Some(blob.into()),
                saves: 0,
            }),
        }
    }

    pub async fn save_count(&self) -> usize {
        self.state.lock().await.saves
    }
}

#[async_trait]
impl SnapshotRepository for MemorySnapshotRepository {
    async fn save(&self, blob: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.blob = Some(blob.to_string());
        state.saves += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<String>> {
        Ok(self.state.lock().await.blob.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("metric-dashboard-{}-{}", name, std::process::id()))
            .join("dashboard.json")
    }

    #[tokio::test]
    async fn test_file_repository_missing_file_is_none() {
        let repository = FileSnapshotRepository::new(scratch_path("missing"));
        assert_eq!(repository.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_repository_save_then_load() {
        let path = scratch_path("roundtrip");
        let repository = FileSnapshotRepository::new(&path);

        repository.save("{\"first\":1}").await.unwrap();
        repository.save("{\"second\":2}").await.unwrap();
        assert_eq!(repository.load().await.unwrap().as_deref(), Some("{\"second\":2}"));

        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_memory_repository_counts_saves() {
        let repository = MemorySnapshotRepository::with_blob("seed");
        assert_eq!(repository.load().await.unwrap().as_deref(), Some("seed"));
        repository.save("next").await.unwrap();
        assert_eq!(repository.save_count().await, 1);
    }
}
