use crate::core::Storage;
use crate::utils::error::{EtlError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Artifacts on the local filesystem, relative to a data directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    /// 絕對路徑不受 base_path 影響
    pub fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        fs::read(&full_path).map_err(|e| EtlError::io(full_path.display().to_string(), e))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EtlError::io(parent.display().to_string(), e))?;
        }

        fs::write(&full_path, data).map_err(|e| EtlError::io(full_path.display().to_string(), e))
    }
}
