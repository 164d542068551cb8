use std::path::{Path, PathBuf};
use tokio::fs;

use crate::errors::{AppError, Result};

/// Files kept on local disk under a fixed base directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            AppError::Filesystem(format!("Failed to create storage directory: {}", e))
        })?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Writes `data` at `path` relative to the base and returns the full path.
    pub async fn store_bytes(&self, path: &str, data: &[u8]) -> Result<PathBuf> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Filesystem(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&full_path, data)
            .await
            .map_err(|e| AppError::Filesystem(format!("Failed to write file: {}", e)))?;

        Ok(full_path)
    }
}
