// Document processing capability
//
// The worker delegates all format work (page counting, previews, assembly) to
// a DocumentProcessor. Implementations run on blocking threads and must not
// touch editor state.

use crate::intake::{FileBlob, MimeType};
use crate::models::Rotation;
use thiserror::Error;

/// Errors raised while reading or producing documents
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Failed to read PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to process image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Page {page_index} is out of range ({page_count} pages)")]
    PageOutOfRange { page_index: usize, page_count: usize },

    #[error("Nothing to assemble")]
    NothingToAssemble,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// A rendered page preview
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thumbnail {
    pub mime: MimeType,
    pub bytes: Vec<u8>,
}

/// One output page: which input it comes from and how to turn it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssemblyPage {
    /// Index into [`AssemblyJob::inputs`]
    pub input: usize,
    pub page_index: usize,
    pub rotation: Rotation,
}

/// Everything needed to produce one output document
#[derive(Clone, Debug, Default)]
pub struct AssemblyJob {
    pub inputs: Vec<FileBlob>,
    pub pages: Vec<AssemblyPage>,
}

impl AssemblyJob {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait DocumentProcessor: Send + Sync {
    /// Number of pages in a file; images always have one
    fn page_count(&self, file: &FileBlob) -> Result<usize, ProcessingError>;

    /// Preview of one page
    fn render_thumbnail(&self, file: &FileBlob, page_index: usize)
    -> Result<Thumbnail, ProcessingError>;

    /// Produce the bytes of a new document holding `job.pages` in order
    fn assemble(&self, job: &AssemblyJob) -> Result<Vec<u8>, ProcessingError>;
}
