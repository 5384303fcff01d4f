use crate::config::toml_config::PathsConfig;
use crate::core::extract::Extractor;
use crate::core::load::TableLoader;
use crate::core::transform::Transformer;
use crate::core::{Pipeline, Storage, Warehouse};
use crate::domain::model::{TableRef, TransformOutput};
use crate::utils::error::{EtlError, Result};
use std::time::Duration;

/// The NYC taxi pipeline: raw CSV → staging CSV → processed CSV → warehouse.
pub struct TaxiPipeline<S: Storage, W: Warehouse> {
    extractor: Extractor<S>,
    transformer: Transformer<S>,
    loader: Option<TableLoader<S, W>>,
}

impl<S: Storage + Clone, W: Warehouse> TaxiPipeline<S, W> {
    pub fn new(
        storage: S,
        warehouse: W,
        paths: &PathsConfig,
        destination: TableRef,
        poll_interval: Duration,
    ) -> Self {
        let mut pipeline = Self::without_loader(storage.clone(), paths);
        pipeline.loader = Some(TableLoader::new(
            storage,
            warehouse,
            destination,
            poll_interval,
        ));
        pipeline
    }

    /// 只跑 extract / transform 時不需要倉儲設定
    pub fn without_loader(storage: S, paths: &PathsConfig) -> Self {
        Self {
            extractor: Extractor::new(storage.clone(), paths.staging.clone()),
            transformer: Transformer::new(storage, paths.processed.clone()),
            loader: None,
        }
    }
}

impl<S: Storage, W: Warehouse> TaxiPipeline<S, W> {
    pub fn destination(&self) -> Option<&TableRef> {
        self.loader.as_ref().map(|loader| loader.destination())
    }
}

#[async_trait::async_trait]
impl<S: Storage, W: Warehouse> Pipeline for TaxiPipeline<S, W> {
    async fn extract(&self, raw_path: &str) -> Result<String> {
        self.extractor.run(raw_path).await
    }

    async fn transform(&self, staged_path: &str) -> Result<TransformOutput> {
        self.transformer.run(staged_path).await
    }

    async fn load(&self, processed_path: &str) -> Result<String> {
        match &self.loader {
            Some(loader) => loader.run(processed_path).await,
            None => Err(EtlError::load("no warehouse destination configured")),
        }
    }
}
