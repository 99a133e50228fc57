//! Plain text input files

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{AdapterError, InputAdapter, InputType, MAX_INPUT_BYTES};
use crate::request::ProcessedContent;

/// Reads a local UTF-8 file
#[derive(Debug, Default)]
pub struct TextFileAdapter;

impl TextFileAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InputAdapter for TextFileAdapter {
    fn input_type(&self) -> InputType {
        InputType::Text
    }

    async fn process(&self, descriptor: &str) -> Result<ProcessedContent, AdapterError> {
        debug!(%descriptor, "TextFileAdapter::process: called");
        let path = PathBuf::from(descriptor);
        let io_err = |source| AdapterError::Io {
            path: path.clone(),
            source,
        };

        let meta = tokio::fs::metadata(&path).await.map_err(io_err)?;
        if !meta.is_file() {
            return Err(AdapterError::InvalidDescriptor(format!("{} is not a file", descriptor)));
        }
        if meta.len() > MAX_INPUT_BYTES {
            return Err(AdapterError::TooLarge {
                descriptor: descriptor.to_string(),
                bytes: meta.len(),
                limit: MAX_INPUT_BYTES,
            });
        }

        let text = tokio::fs::read_to_string(&path).await.map_err(io_err)?;
        debug!(bytes = text.len(), "TextFileAdapter::process: read file");

        let mut content = ProcessedContent::new(descriptor, InputType::Text, text).with_metadata("bytes", meta.len().to_string());
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            content = content.with_metadata("extension", ext);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_file_with_metadata() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("auth.txt");
        fs::write(&path, "token flow").unwrap();

        let content = TextFileAdapter::new().process(path.to_str().unwrap()).await.unwrap();
        assert_eq!(content.text, "token flow");
        assert_eq!(content.metadata["bytes"], "10");
        assert_eq!(content.metadata["extension"], "txt");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = TextFileAdapter::new().process("/nonexistent/notes.txt").await.unwrap_err();
        assert!(matches!(err, AdapterError::Io { .. }));
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let temp = tempdir().unwrap();
        let err = TextFileAdapter::new()
            .process(temp.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidDescriptor(_)));
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("big.txt");
        fs::write(&path, vec![b'a'; (MAX_INPUT_BYTES + 1) as usize]).unwrap();

        let err = TextFileAdapter::new().process(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, AdapterError::TooLarge { .. }));
    }
}
