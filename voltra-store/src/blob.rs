use std::path::PathBuf;

use async_trait::async_trait;
use rust_xlsxwriter::Workbook;
use tracing::info;

use voltra_core::report::{BlobStore, SpreadsheetWriter};
use voltra_core::BoxError;

/// Filesystem-backed blob storage rooted at the configured export
/// directory. Returns the relative path so callers can build URLs from it.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, BoxError> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        info!("Blob written: {} ({} bytes)", full.display(), bytes.len());
        Ok(path.to_string())
    }
}

/// Renders a header row plus data rows into a single-sheet xlsx workbook.
pub struct XlsxSheetWriter;

impl SpreadsheetWriter for XlsxSheetWriter {
    fn write(&self, header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, BoxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, title) in header.iter().enumerate() {
            worksheet.write_string(0, col as u16, title)?;
        }
        for (row, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                worksheet.write_string(row as u32 + 1, col as u16, cell)?;
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}
