//! crates/assessment_core/src/extraction.rs
//!
//! Turns stored source documents into plain text. A failing document never
//! fails the batch; the caller only sees how many were skipped.

use futures::{future::join_all, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::SourceDocument;
use crate::ports::{BlobStore, PortError};

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to read document bytes: {0}")]
    Read(#[from] PortError),
    #[error("Unsupported document format")]
    UnsupportedFormat,
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
    #[error("Document contains no extractable text")]
    Empty,
    #[error("Document extraction timed out")]
    Timeout,
}

/// Text pulled from one document.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub document_id: Uuid,
    pub title: String,
    pub text: String,
}

/// Outcome of extracting every document of one request.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    pub texts: Vec<ExtractedText>,
    pub failed: usize,
}

/// Decodes raw bytes into text: PDF by magic bytes, otherwise UTF-8 plain text.
pub fn decode_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = if bytes.starts_with(b"%PDF") {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?
    } else {
        let text = std::str::from_utf8(bytes).map_err(|_| ExtractionError::UnsupportedFormat)?;
        text.to_string()
    };

    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}

#[derive(Clone)]
pub struct DocumentExtractor {
    blobs: Arc<dyn BlobStore>,
    timeout: Duration,
}

impl DocumentExtractor {
    pub fn new(blobs: Arc<dyn BlobStore>, timeout: Duration) -> Self {
        Self { blobs, timeout }
    }

    /// Reads and decodes a single document within the configured deadline.
    pub async fn extract(&self, document: &SourceDocument) -> Result<String, ExtractionError> {
        tokio::time::timeout(self.timeout, self.read_and_decode(document))
            .await
            .map_err(|_| ExtractionError::Timeout)?
    }

    /// Extracts all documents concurrently, skipping the ones that fail.
    pub async fn extract_all(&self, documents: &[SourceDocument]) -> ExtractionBatch {
        let results = join_all(documents.iter().map(|doc| self.extract(doc))).await;

        let mut batch = ExtractionBatch::default();
        for (doc, result) in documents.iter().zip(results) {
            match result {
                Ok(text) => {
                    debug!(document_id = %doc.id, chars = text.len(), "Extracted document text");
                    batch.texts.push(ExtractedText {
                        document_id: doc.id,
                        title: doc.title.clone(),
                        text,
                    });
                }
                Err(e) => {
                    warn!(document_id = %doc.id, title = %doc.title, error = %e, "Skipping unreadable document");
                    batch.failed += 1;
                }
            }
        }
        batch
    }

    async fn read_and_decode(&self, document: &SourceDocument) -> Result<String, ExtractionError> {
        let mut stream = self.blobs.open_read_stream(&document.file_id).await?;
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.try_next().await? {
            bytes.extend_from_slice(&chunk);
        }

        // PDF parsing is CPU bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || decode_text(&bytes))
            .await
            .map_err(|e| ExtractionError::Pdf(format!("decoder task failed: {}", e)))?
    }
}
