//! Artifact references and pre-submission validation
//!
//! An [`Artifact`] describes a user-selected file: its name, size and
//! extension, plus where its bytes live. File-backed artifacts are only read
//! when uploaded, so validation never touches file contents or the network.

use crate::config::UploadConfig;
use crate::error::ValidationError;
use std::path::{Path, PathBuf};

/// Where an artifact's bytes come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Bytes already in memory
    Memory(Vec<u8>),
    /// File on disk, read at upload time
    File(PathBuf),
}

/// A user-selected document awaiting submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    size_bytes: u64,
    extension: String,
    source: ArtifactSource,
}

impl Artifact {
    /// Create an artifact from in-memory bytes
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            extension: extension_of(&name),
            size_bytes: bytes.len() as u64,
            name,
            source: ArtifactSource::Memory(bytes),
        }
    }

    /// Create an artifact referencing a file on disk
    ///
    /// Only metadata is read here. The name is the file's final path component.
    ///
    /// # Errors
    /// Returns an I/O error if the path does not exist or is not a regular file.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            extension: extension_of(&name),
            size_bytes: metadata.len(),
            name,
            source: ArtifactSource::File(path.to_path_buf()),
        })
    }

    /// File name as selected by the user
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Lowercased extension without the dot (empty if none)
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Where the bytes come from
    pub fn source(&self) -> &ArtifactSource {
        &self.source
    }

    /// MIME type sent with the upload
    pub fn content_type(&self) -> &'static str {
        match self.extension.as_str() {
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "txt" => "text/plain",
            _ => "application/octet-stream",
        }
    }

    /// Load the artifact's bytes
    pub(crate) async fn read_contents(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            ArtifactSource::Memory(bytes) => Ok(bytes.clone()),
            ArtifactSource::File(path) => tokio::fs::read(path).await,
        }
    }
}

/// Lowercased text after the last `.` in `name`, or empty
fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Pre-submission checks on artifact type and size
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactValidator {
    max_size_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl Default for ArtifactValidator {
    fn default() -> Self {
        Self::new(&UploadConfig::default())
    }
}

impl ArtifactValidator {
    /// Build a validator from upload limits
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            max_size_bytes: config.max_file_size_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Maximum accepted size in bytes
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Check an artifact
    ///
    /// Size is checked first, so an oversized file is `too_large` whatever its
    /// extension. Purely local: no I/O, no network.
    pub fn validate(&self, artifact: &Artifact) -> Result<(), ValidationError> {
        if artifact.size_bytes > self.max_size_bytes {
            return Err(ValidationError::TooLarge {
                size: artifact.size_bytes,
                max: self.max_size_bytes,
            });
        }

        if !self
            .allowed_extensions
            .iter()
            .any(|allowed| allowed == &artifact.extension)
        {
            return Err(ValidationError::InvalidType {
                extension: artifact.extension.clone(),
            });
        }

        Ok(())
    }
}

/// Validate against the default limits (pdf/docx/txt, 10 MiB)
pub fn validate(artifact: &Artifact) -> Result<(), ValidationError> {
    ArtifactValidator::default().validate(artifact)
}
