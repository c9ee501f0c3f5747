//! Upload intake
//!
//! Persists an incoming byte stream to a uniquely named temporary PDF so the
//! pipeline can work from a path.

use std::fmt::Display;
use std::path::Path;

use futures::{Stream, StreamExt};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use super::types::OcrError;

/// A persisted upload. The file is removed by [`UploadedFile::release`] or,
/// failing that, when the handle is dropped.
#[derive(Debug)]
pub struct UploadedFile {
    path: TempPath,
    size: u64,
}

impl UploadedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the file, reporting any failure
    pub fn release(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Copy `stream` into a fresh `ocr-input-*.pdf` file under `dir` (or the
/// system temp dir).
pub async fn save_upload<S, B, E>(stream: S, dir: Option<&Path>) -> Result<UploadedFile, OcrError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut builder = tempfile::Builder::new();
    builder.prefix("ocr-input-").suffix(".pdf");
    let named = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(OcrError::Upload)?;

    let (file, path) = named.into_parts();
    let mut file = tokio::fs::File::from_std(file);
    let mut size = 0u64;

    // `path` is dropped (and the file removed) on every early return below
    let mut stream = std::pin::pin!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            OcrError::Upload(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("read upload: {}", e),
            ))
        })?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await.map_err(OcrError::Upload)?;
        size += bytes.len() as u64;
    }
    file.flush().await.map_err(OcrError::Upload)?;
    file.sync_all().await.map_err(OcrError::Upload)?;

    tracing::debug!(path = %path.display(), size, "Upload persisted");
    Ok(UploadedFile { path, size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_release() {
        let dir = TempDir::new().unwrap();
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
            vec![Ok(b"%PDF-1.5\n".to_vec()), Ok(b"body".to_vec())];

        let upload = save_upload(stream::iter(chunks), Some(dir.path())).await.unwrap();

        let path = upload.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("ocr-input-"));
        assert_eq!(upload.size(), 13);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5\nbody");

        upload.release().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_file() {
        let dir = TempDir::new().unwrap();
        let chunks: Vec<Result<&[u8], std::io::Error>> = vec![Ok(&b"data"[..])];

        let upload = save_upload(stream::iter(chunks), Some(dir.path())).await.unwrap();
        let path = upload.path().to_path_buf();
        drop(upload);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stream_error_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let chunks: Vec<Result<Vec<u8>, String>> =
            vec![Ok(b"partial".to_vec()), Err("connection reset".to_string())];

        let result = save_upload(stream::iter(chunks), Some(dir.path())).await;

        match result {
            Err(OcrError::Upload(e)) => assert!(e.to_string().contains("connection reset")),
            other => panic!("expected upload error, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
