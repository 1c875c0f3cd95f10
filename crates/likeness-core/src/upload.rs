//! The single image held by the pipeline.

use crate::outcome::ClassifyError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Default upper bound on accepted file size (10 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Identity of one accepted file. Every accepted file gets a fresh id, even
/// when its bytes match a previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(Uuid);

impl FileId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An accepted image plus its `data:` URL transport encoding.
#[derive(Clone)]
pub struct UploadedFile {
    id: FileId,
    name: String,
    mime: &'static str,
    bytes: Vec<u8>,
    data_url: String,
}

impl UploadedFile {
    /// Accept an image payload. Only image formats are accepted.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ClassifyError> {
        Self::from_bytes_limited(name, bytes, DEFAULT_MAX_FILE_BYTES)
    }

    /// Like [`from_bytes`](Self::from_bytes), rejecting payloads over `max_bytes`.
    pub fn from_bytes_limited(
        name: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, ClassifyError> {
        let name = name.into();
        if bytes.is_empty() {
            return Err(ClassifyError::UnsupportedFile(format!("{name} is empty")));
        }
        if bytes.len() > max_bytes {
            return Err(ClassifyError::UnsupportedFile(format!(
                "{name} is {} bytes, limit is {max_bytes}",
                bytes.len()
            )));
        }

        let format = image::guess_format(&bytes)
            .map_err(|_| ClassifyError::UnsupportedFile(format!("{name} is not an image")))?;
        let mime = format.to_mime_type();
        let data_url = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));

        let file = Self {
            id: FileId::new(),
            name,
            mime,
            bytes,
            data_url,
        };
        tracing::debug!(id = %file.id, name = %file.name, mime, size = file.bytes.len(), "file accepted");
        Ok(file)
    }

    /// Read and accept an image from disk.
    pub fn from_path(path: impl AsRef<Path>, max_bytes: usize) -> Result<Self, ClassifyError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path)
            .map_err(|e| ClassifyError::UnsupportedFile(format!("{name}: {e}")))?;
        Self::from_bytes_limited(name, bytes, max_bytes)
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `data:<mime>;base64,<payload>`, the form the classification service expects.
    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}
