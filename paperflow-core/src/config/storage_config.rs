//! Database and data-directory configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
    pub base_data_dir: PathBuf,
    /// Uploaded originals, one `<doc_id>.<ext>` per document.
    pub upload_dir: PathBuf,
    /// Columnar outputs, partitioned `YYYY/MM/DD`.
    pub parquet_dir: PathBuf,
    /// Structured-document outputs, partitioned `YYYY/MM/DD`.
    pub json_dir: PathBuf,
    pub metrics_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "./data/paperflow.db".to_string(),
            base_data_dir: PathBuf::from("./data"),
            upload_dir: PathBuf::from("./uploads"),
            parquet_dir: PathBuf::from("./data/parquet"),
            json_dir: PathBuf::from("./data/json"),
            metrics_dir: PathBuf::from("./data/metrics"),
        }
    }
}
