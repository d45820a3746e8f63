// Durable key-value storage for the dashboard snapshot blob
use async_trait::async_trait;

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn save(&self, blob: &str) -> anyhow::Result<()>;

    /// `None` when nothing has been persisted yet.
    async fn load(&self) -> anyhow::Result<Option<String>>;
}
