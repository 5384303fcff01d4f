use crate::domain::model::{LoadJob, TableRef, TransformOutput};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Where pipeline artifacts live between stages.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Remote tabular store that accepts full-replace CSV loads.
pub trait Warehouse: Send + Sync {
    /// Submit a truncate-and-replace CSV load with schema auto-detection.
    fn submit_load(
        &self,
        destination: &TableRef,
        csv: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<LoadJob>> + Send;

    /// Fetch the current state of a previously submitted job.
    fn refresh_job(&self, job: &LoadJob)
        -> impl std::future::Future<Output = Result<LoadJob>> + Send;
}

/// 三個階段，每個階段接收上一階段的產出路徑並回傳自己的產出
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, raw_path: &str) -> Result<String>;
    async fn transform(&self, staged_path: &str) -> Result<TransformOutput>;
    /// Returns the fully qualified destination table.
    async fn load(&self, processed_path: &str) -> Result<String>;
}
