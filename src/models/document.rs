use crate::ids::{FileId, ResourceHandle};
use crate::intake::FileBlob;

/// Whether an upload is a multi-page document or a single image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Document,
    Image,
}

/// Processing status of an upload.
///
/// Intake hands over fully read bytes, so a document starts in `Processing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentStatus {
    Processing,
    Ready,
    Error,
}

/// One uploaded file.
///
/// Created with `page_count = 0` and `status = Processing`, then filled in as
/// the background worker reports the page count and streams thumbnails.
///
/// The document owns every handle in `thumbnails`; they must be released when
/// a slot is overwritten or the document is dropped from the model.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    pub id: FileId,
    pub blob: FileBlob,
    pub name: String,
    pub size: String,
    pub page_count: usize,
    /// One slot per page; `None` until that page's thumbnail arrives
    pub thumbnails: Vec<Option<ResourceHandle>>,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
}

impl SourceDocument {
    pub fn from_blob(blob: FileBlob) -> Self {
        let kind = if blob.mime.is_image() {
            DocumentKind::Image
        } else {
            DocumentKind::Document
        };

        Self {
            id: FileId::generate(),
            name: blob.name.clone(),
            size: human_size(blob.len()),
            page_count: 0,
            thumbnails: Vec::new(),
            kind,
            status: DocumentStatus::Processing,
            blob,
        }
    }

    /// Record the parsed page count, resetting the thumbnail slots.
    ///
    /// Returns the handles of any thumbnails the old slots owned.
    pub fn set_page_count(&mut self, page_count: usize) -> Vec<ResourceHandle> {
        let released = self.take_thumbnails();
        self.page_count = page_count;
        self.thumbnails = vec![None; page_count];
        if page_count == 0 {
            self.status = DocumentStatus::Ready;
        }
        released
    }

    /// Store a thumbnail for one page.
    ///
    /// Returns the handle that is no longer owned by anyone: the previous
    /// occupant of the slot, or the incoming handle itself when the page index
    /// is out of range.
    pub fn set_thumbnail(
        &mut self,
        page_index: usize,
        handle: ResourceHandle,
    ) -> Result<Option<ResourceHandle>, ResourceHandle> {
        let Some(slot) = self.thumbnails.get_mut(page_index) else {
            return Err(handle);
        };

        let previous = slot.replace(handle);
        if self.thumbnails.iter().all(Option::is_some) {
            self.status = DocumentStatus::Ready;
        }
        Ok(previous)
    }

    pub fn thumbnail(&self, page_index: usize) -> Option<&ResourceHandle> {
        self.thumbnails.get(page_index).and_then(Option::as_ref)
    }

    /// Count of pages whose thumbnail has arrived
    pub fn rendered_pages(&self) -> usize {
        self.thumbnails.iter().filter(|t| t.is_some()).count()
    }

    /// True once parsing finished, successfully or not
    pub fn is_settled(&self) -> bool {
        matches!(self.status, DocumentStatus::Ready | DocumentStatus::Error)
    }

    /// Give up ownership of every thumbnail handle
    pub fn take_thumbnails(&mut self) -> Vec<ResourceHandle> {
        self.thumbnails.iter_mut().filter_map(Option::take).collect()
    }
}

/// Format a byte count as megabytes with two decimals, e.g. `"1.50 MB"`
pub fn human_size(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}
