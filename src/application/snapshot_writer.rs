// Debounced persistence of the dashboard snapshot
use crate::application::snapshot_repository::SnapshotRepository;
use crate::application::state_store::DashboardStore;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_PERSIST_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Clone)]
pub struct SnapshotWriter {
    store: Arc<DashboardStore>,
    repository: Arc<dyn SnapshotRepository>,
    debounce: Duration,
}

impl SnapshotWriter {
    pub fn new(
        store: Arc<DashboardStore>,
        repository: Arc<dyn SnapshotRepository>,
        debounce: Duration,
    ) -> Self {
        Self {
            store,
            repository,
            debounce,
        }
    }

    /// Serializes the current state and saves it immediately.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let blob = self
            .store
            .snapshot()
            .to_blob()
            .context("Failed to serialize dashboard snapshot")?;
        self.repository
            .save(&blob)
            .await
            .context("Failed to save dashboard snapshot")
    }

    /// Writes once per burst of mutations, after `debounce` without further changes.
    pub fn spawn(&self) -> JoinHandle<()> {
        let writer = self.clone();
        let mut revisions = self.store.subscribe_revisions();

        tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                loop {
                    tokio::select! {
                        changed = revisions.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(writer.debounce) => break,
                    }
                }

                let revision = *revisions.borrow_and_update();
                match writer.flush().await {
                    Ok(()) => tracing::debug!("Persisted dashboard snapshot at revision {}", revision),
                    Err(e) => tracing::warn!("Dashboard snapshot not persisted: {:#}", e),
                }
            }
        })
    }
}
