//! services/api/src/adapters/blob_fs.rs
//!
//! A `BlobStore` backed by a local directory. File handles are plain file
//! names relative to the root; anything that could escape it is refused.

use assessment_core::ports::{BlobStore, ByteStream, PortError, PortResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;

#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file_id: &str) -> PortResult<PathBuf> {
        let relative = Path::new(file_id);
        let is_plain = !file_id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(PortError::NotFound(format!("Invalid file handle '{}'", file_id)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn open_read_stream(&self, file_id: &str) -> PortResult<ByteStream> {
        let path = self.resolve(file_id)?;
        let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PortError::NotFound(format!("Blob {} not found", file_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        let stream = ReaderStream::new(file).map_err(|e| PortError::Unexpected(e.to_string()));
        Ok(Box::pin(stream))
    }
}
