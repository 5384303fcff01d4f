use crate::core::{Storage, Warehouse};
use crate::domain::model::{JobState, TableRef};
use crate::utils::error::{EtlError, Result};
use std::time::Duration;

/// Submits the processed artifact as a full-replace load and waits for the
/// remote job to finish.
#[derive(Debug, Clone)]
pub struct TableLoader<S: Storage, W: Warehouse> {
    storage: S,
    warehouse: W,
    destination: TableRef,
    poll_interval: Duration,
}

impl<S: Storage, W: Warehouse> TableLoader<S, W> {
    pub fn new(storage: S, warehouse: W, destination: TableRef, poll_interval: Duration) -> Self {
        Self {
            storage,
            warehouse,
            destination,
            poll_interval,
        }
    }

    pub fn destination(&self) -> &TableRef {
        &self.destination
    }

    pub async fn run(&self, processed_path: &str) -> Result<String> {
        let data = self.storage.read_file(processed_path).await?;
        let size = data.len();

        tracing::info!(
            destination = %self.destination,
            bytes = size,
            "Submitting load job (WRITE_TRUNCATE, autodetect)"
        );
        let mut job = self.warehouse.submit_load(&self.destination, data).await?;
        tracing::debug!("Load job {} submitted, state {:?}", job.job_id, job.state);

        // 等到遠端作業結束才返回
        while !job.state.is_terminal() {
            tokio::time::sleep(self.poll_interval).await;
            job = self.warehouse.refresh_job(&job).await?;
            tracing::debug!("Load job {} state {:?}", job.job_id, job.state);
        }

        match job.state {
            JobState::Failed { reason } => Err(EtlError::load(format!(
                "job {} loading {} failed: {}",
                job.job_id, self.destination, reason
            ))),
            _ => {
                tracing::info!(
                    job_id = %job.job_id,
                    destination = %self.destination,
                    "Load job finished"
                );
                Ok(self.destination.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::LoadJob;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemoryStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MemoryStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().unwrap();
            files.get(path).cloned().ok_or_else(|| {
                EtlError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                )
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().unwrap();
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    /// 依序回傳預先排好的作業狀態
    #[derive(Clone, Default)]
    struct ScriptedWarehouse {
        states: Arc<Mutex<VecDeque<JobState>>>,
        uploads: Arc<Mutex<Vec<(TableRef, Vec<u8>)>>>,
        polls: Arc<Mutex<usize>>,
    }

    impl ScriptedWarehouse {
        fn with_states(states: Vec<JobState>) -> Self {
            Self {
                states: Arc::new(Mutex::new(states.into())),
                ..Default::default()
            }
        }

        fn next_job(&self) -> LoadJob {
            let state = self
                .states
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(JobState::Done);
            LoadJob {
                job_id: "job_1".to_string(),
                project: "demo-project".to_string(),
                location: None,
                state,
            }
        }
    }

    impl Warehouse for ScriptedWarehouse {
        async fn submit_load(&self, destination: &TableRef, csv: Vec<u8>) -> Result<LoadJob> {
            self.uploads
                .lock()
                .unwrap()
                .push((destination.clone(), csv));
            Ok(self.next_job())
        }

        async fn refresh_job(&self, _job: &LoadJob) -> Result<LoadJob> {
            *self.polls.lock().unwrap() += 1;
            Ok(self.next_job())
        }
    }

    fn destination() -> TableRef {
        TableRef {
            project: "demo-project".to_string(),
            dataset: "demo_ds".to_string(),
            table: "nyc_taxi".to_string(),
        }
    }

    async fn storage_with_processed() -> MemoryStorage {
        let storage = MemoryStorage::default();
        storage
            .write_file("processed/ready.csv", b"fare\n1.0\n")
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn test_load_waits_for_done() {
        let warehouse = ScriptedWarehouse::with_states(vec![
            JobState::Pending,
            JobState::Running,
            JobState::Running,
            JobState::Done,
        ]);
        let loader = TableLoader::new(
            storage_with_processed().await,
            warehouse.clone(),
            destination(),
            Duration::ZERO,
        );

        let table = loader.run("processed/ready.csv").await.unwrap();
        assert_eq!(table, "demo-project.demo_ds.nyc_taxi");
        assert_eq!(*warehouse.polls.lock().unwrap(), 3);

        let uploads = warehouse.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, destination());
        assert_eq!(uploads[0].1, b"fare\n1.0\n".to_vec());
    }

    #[tokio::test]
    async fn test_load_surfaces_job_failure() {
        let warehouse = ScriptedWarehouse::with_states(vec![
            JobState::Running,
            JobState::Failed {
                reason: "schema mismatch".to_string(),
            },
        ]);
        let loader = TableLoader::new(
            storage_with_processed().await,
            warehouse,
            destination(),
            Duration::ZERO,
        );

        let err = loader.run("processed/ready.csv").await.unwrap_err();
        assert!(matches!(err, EtlError::LoadError { .. }));
        assert!(err.to_string().contains("schema mismatch"));
    }

    #[tokio::test]
    async fn test_load_missing_artifact_is_io_error() {
        let warehouse = ScriptedWarehouse::default();
        let loader = TableLoader::new(
            MemoryStorage::default(),
            warehouse.clone(),
            destination(),
            Duration::ZERO,
        );

        let err = loader.run("processed/ready.csv").await.unwrap_err();
        assert!(matches!(err, EtlError::IoError { .. }));
        assert!(warehouse.uploads.lock().unwrap().is_empty());
    }
}
