use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

pub const RAW_EXPORT_FILE_NAME: &str = "rag_response.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode raw response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A raw response rendered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExport {
    pub file_name: &'static str,
    pub contents: String,
}

impl RawExport {
    pub fn from_value(value: &Value) -> Result<Self, ExportError> {
        Ok(Self {
            file_name: RAW_EXPORT_FILE_NAME,
            contents: serde_json::to_string_pretty(value)?,
        })
    }

    /// Saves the export under `dir`, creating the directory if needed.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(self.file_name);
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ExportError::Write {
                path: path.clone(),
                source,
            })?;
        tokio::fs::write(&path, self.contents.as_bytes())
            .await
            .map_err(|source| ExportError::Write {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), bytes = self.contents.len(), "export: raw response saved");
        Ok(path)
    }
}
