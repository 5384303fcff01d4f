use crate::config::toml_config::PathsConfig;
use crate::core::Pipeline;
use crate::domain::model::{RunReport, TransformOutput};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Per-stage retry policy: a failed stage is re-run from scratch up to
/// `retries` more times, waiting `delay` before each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageName::Extract => "extract",
            StageName::Transform => "transform",
            StageName::Load => "load",
        };
        f.write_str(name)
    }
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    paths: PathsConfig,
    retry: RetryPolicy,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P, paths: PathsConfig) -> Self {
        Self::new_with_monitoring(pipeline, paths, false)
    }

    pub fn new_with_monitoring(pipeline: P, paths: PathsConfig, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            paths,
            retry: RetryPolicy::default(),
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// True only when monitoring was requested and the process can be sampled.
    pub fn monitoring_enabled(&self) -> bool {
        self.monitor.is_enabled()
    }

    /// 執行單一階段，失敗時依重試策略重跑
    async fn attempt<T, F, Fut>(&self, stage: StageName, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            tracing::info!(%stage, attempt, "▶️ Running stage");

            match op().await {
                Ok(output) => {
                    self.monitor.log_stats(&stage.to_string());
                    return Ok(output);
                }
                Err(err) if attempt <= self.retry.retries => {
                    tracing::warn!(
                        %stage,
                        attempt,
                        retries = self.retry.retries,
                        delay_secs = self.retry.delay.as_secs(),
                        "Stage failed, will retry: {}",
                        err
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    tracing::error!(
                        %stage,
                        attempt,
                        category = ?err.category(),
                        "❌ Stage failed, giving up: {}",
                        err
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Run a single stage against its configured input artifact.
    pub async fn run_stage(&self, stage: StageName) -> Result<String> {
        match stage {
            StageName::Extract => {
                self.attempt(stage, || self.pipeline.extract(&self.paths.raw))
                    .await
            }
            StageName::Transform => self
                .attempt(stage, || self.pipeline.transform(&self.paths.staging))
                .await
                .map(|output| output.path),
            StageName::Load => {
                self.attempt(stage, || self.pipeline.load(&self.paths.processed))
                    .await
            }
        }
    }

    /// Extract → transform → load, each stage consuming the previous output.
    /// A stage that fails after its retries stops the run.
    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("🚀 Starting ETL run");

        let staged = self
            .attempt(StageName::Extract, || self.pipeline.extract(&self.paths.raw))
            .await?;
        let TransformOutput {
            path: processed,
            summary,
        } = self
            .attempt(StageName::Transform, || self.pipeline.transform(&staged))
            .await?;
        let destination = self
            .attempt(StageName::Load, || self.pipeline.load(&processed))
            .await?;

        self.monitor.log_final_stats();
        tracing::info!(
            rows_in = summary.rows_in,
            rows_out = summary.rows_out,
            dropped = summary.rows_dropped(),
            unparsed = summary.unparsed_total(),
            "✅ ETL run completed, loaded into {}",
            destination
        );

        Ok(RunReport {
            staged_path: staged,
            processed_path: processed,
            destination,
            transform: summary,
        })
    }
}
