// Upload intake
//
// Raw uploads arrive as (name, MIME type, bytes). Only PDF documents and
// JPEG/PNG images are accepted; anything else is dropped without an error.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::sync::Arc;

/// MIME types the engine understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl MimeType {
    /// Parse a MIME type string, returning `None` for unsupported types
    pub fn parse(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Guess the MIME type from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An upload as handed over by the presentation layer, not yet validated
#[derive(Clone, Debug)]
pub struct RawUpload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl RawUpload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read an upload from disk, guessing its MIME type from the extension.
    ///
    /// Files with an unknown extension get `application/octet-stream` and will
    /// be filtered out by [`accept_uploads`].
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read upload: {}", path))?;
        let mime = path
            .extension()
            .and_then(MimeType::from_extension)
            .map(|m| m.as_str())
            .unwrap_or("application/octet-stream");
        let name = path.file_name().unwrap_or(path.as_str()).to_string();

        Ok(Self::new(name, mime, bytes))
    }
}

/// A validated upload. The byte buffer is shared, never copied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlob {
    pub name: String,
    pub mime: MimeType,
    pub bytes: Arc<[u8]>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, mime: MimeType, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Keep the uploads with a supported MIME type, dropping the rest
pub fn accept_uploads(uploads: Vec<RawUpload>) -> Vec<FileBlob> {
    uploads
        .into_iter()
        .filter_map(|upload| match MimeType::parse(&upload.mime) {
            Some(mime) => Some(FileBlob::new(upload.name, mime, upload.bytes)),
            None => {
                tracing::debug!(
                    "Ignoring upload {} with unsupported type {}",
                    upload.name,
                    upload.mime
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_parse_supported_mime_types() {
        assert_eq!(MimeType::parse("application/pdf"), Some(MimeType::Pdf));
        assert_eq!(MimeType::parse("image/jpeg"), Some(MimeType::Jpeg));
        assert_eq!(MimeType::parse("IMAGE/PNG"), Some(MimeType::Png));
        assert_eq!(MimeType::parse("image/gif"), None);
        assert_eq!(MimeType::parse("text/plain"), None);
    }

    #[test]
    fn test_accept_uploads_filters_unsupported() {
        let uploads = vec![
            RawUpload::new("a.pdf", "application/pdf", vec![1]),
            RawUpload::new("b.gif", "image/gif", vec![2]),
            RawUpload::new("c.png", "image/png", vec![3]),
            RawUpload::new("d.txt", "text/plain", vec![4]),
        ];

        let accepted = accept_uploads(uploads);

        let names: Vec<&str> = accepted.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "c.png"]);
        assert_eq!(accepted[1].mime, MimeType::Png);
    }

    #[test]
    fn test_from_path_guesses_mime() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let pdf_path = dir.join("Report.PDF");
        fs::write(&pdf_path, b"%PDF-1.5").unwrap();
        let upload = RawUpload::from_path(&pdf_path).unwrap();
        assert_eq!(upload.name, "Report.PDF");
        assert_eq!(upload.mime, "application/pdf");

        let other_path = dir.join("notes.md");
        fs::write(&other_path, b"# notes").unwrap();
        let upload = RawUpload::from_path(&other_path).unwrap();
        assert_eq!(upload.mime, "application/octet-stream");
        assert!(accept_uploads(vec![upload]).is_empty());
    }

    #[test]
    fn test_from_path_missing_file_errors() {
        let result = RawUpload::from_path(Utf8Path::new("/definitely/not/here.pdf"));
        assert!(result.is_err());
    }
}
