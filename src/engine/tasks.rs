// Assembly requests and the worker response dispatch
//
// Requests are built here and handed back to the caller for sending; the
// engine never talks to the channel itself. Responses are applied as pure
// transitions keyed by file id and page index, never by arrival order.

use crate::ids::{FileId, ResourceHandle};
use crate::models::{DocumentStatus, EditorState, PageRef, Severity, Step, TaskKind};
use crate::worker::protocol::{ErrorOrigin, PageSpec, SourceFile, WorkerRequest, WorkerResponse};

impl EditorState {
    /// Request a document made of the selected pages, in sequence order
    pub fn extract_selected(&mut self) -> Option<WorkerRequest> {
        if self.selection.is_empty() {
            return None;
        }

        let request = self.merge_pages_request(self.selected_in_order(), TaskKind::Extract)?;

        self.is_extracting = true;
        self.notifications.push("Extracting pages...", Severity::Info);
        Some(request)
    }

    /// Request a quick merge of every page of every file, in file order
    pub fn merge_files(&mut self) -> Option<WorkerRequest> {
        if self.files.is_empty() {
            return None;
        }

        self.is_saving = true;
        self.invalidate_save();
        Some(WorkerRequest::MergePdfs {
            files: self.files.values().map(|f| f.blob.clone()).collect(),
            task_kind: TaskKind::Save,
        })
    }

    /// Request the full current page sequence as one document
    pub fn merge_pages(&mut self) -> Option<WorkerRequest> {
        let request = self.merge_pages_request(self.pages.iter().collect(), TaskKind::Save)?;

        self.is_saving = true;
        self.invalidate_save();
        Some(request)
    }

    fn merge_pages_request(&self, pages: Vec<&PageRef>, task_kind: TaskKind) -> Option<WorkerRequest> {
        let specs: Vec<PageSpec> = pages
            .into_iter()
            .filter(|p| {
                let known = self.files.contains_key(&p.source_id);
                if !known {
                    tracing::debug!("Skipping page {} of removed file {}", p.unique_id, p.source_id);
                }
                known
            })
            .map(|p| PageSpec {
                file_id: p.source_id.clone(),
                page_index: p.source_index,
                rotation: p.rotation,
            })
            .collect();
        if specs.is_empty() {
            return None;
        }

        let files = self
            .files
            .values()
            .map(|f| SourceFile {
                id: f.id.clone(),
                file: f.blob.clone(),
            })
            .collect();

        Some(WorkerRequest::MergePages {
            files,
            pages: specs,
            task_kind,
        })
    }

    /// Apply one background response.
    ///
    /// Responses that reference files no longer in the model are dropped, and
    /// any resource they carry is queued for release. Returns whether the
    /// model changed.
    pub fn apply_response(&mut self, response: WorkerResponse) -> bool {
        match response {
            WorkerResponse::FileParsed {
                file_id,
                page_count,
            } => self.apply_file_parsed(&file_id, page_count),
            WorkerResponse::ThumbnailGenerated {
                file_id,
                page_index,
                image,
            } => self.apply_thumbnail(&file_id, page_index, image),
            WorkerResponse::MergeComplete {
                artifact,
                task_kind,
            } => {
                self.apply_merge_complete(artifact, task_kind);
                true
            }
            WorkerResponse::Error { reason, origin } => {
                self.apply_error(&reason, &origin);
                true
            }
        }
    }

    fn apply_file_parsed(&mut self, file_id: &FileId, page_count: usize) -> bool {
        let editing = self.step == Step::Editor;
        let Some(doc) = self.files.get_mut(file_id) else {
            tracing::debug!("Ignoring parse result for unknown file {}", file_id);
            return false;
        };

        let first_parse = doc.page_count == 0 && doc.thumbnails.is_empty();
        let released = doc.set_page_count(page_count);
        let had_thumbnails = !released.is_empty();
        self.release_all(released);

        if had_thumbnails {
            self.refresh_page_thumbnails();
        }
        if editing && first_parse {
            self.pages
                .extend((0..page_count).map(|index| PageRef::new(file_id.clone(), index, None)));
        }
        true
    }

    fn apply_thumbnail(&mut self, file_id: &FileId, page_index: usize, image: ResourceHandle) -> bool {
        let Some(doc) = self.files.get_mut(file_id) else {
            tracing::debug!("Dropping thumbnail for unknown file {}", file_id);
            self.release(image);
            return false;
        };

        match doc.set_thumbnail(page_index, image.clone()) {
            Ok(previous) => {
                if let Some(previous) = previous {
                    self.release(previous);
                }
            }
            Err(unused) => {
                tracing::debug!(
                    "Dropping thumbnail {} for page {} of {} (out of range)",
                    unused,
                    page_index,
                    file_id
                );
                self.release(unused);
                return false;
            }
        }

        for page in self
            .pages
            .iter_mut()
            .filter(|p| &p.source_id == file_id && p.source_index == page_index)
        {
            page.thumbnail = Some(image.clone());
        }
        true
    }

    fn apply_merge_complete(&mut self, artifact: ResourceHandle, task_kind: TaskKind) {
        tracing::info!("Artifact ready ({}): {}", task_kind, artifact);
        if let Some(previous) = self.artifacts.replace(task_kind, artifact) {
            self.release(previous);
        }

        match task_kind {
            TaskKind::Extract => {
                self.is_extracting = false;
                self.notifications.push("Extraction complete!", Severity::Success);
            }
            TaskKind::Save => {
                self.is_saving = false;
                self.notifications.push("File ready!", Severity::Success);
            }
        }
    }

    fn apply_error(&mut self, reason: &str, origin: &ErrorOrigin) {
        tracing::warn!("Background task failed ({:?}): {}", origin, reason);
        match origin {
            ErrorOrigin::Parse { file_id } => {
                if let Some(doc) = self.files.get_mut(file_id) {
                    doc.status = DocumentStatus::Error;
                }
            }
            ErrorOrigin::Assembly {
                task_kind: TaskKind::Save,
            } => self.is_saving = false,
            ErrorOrigin::Assembly {
                task_kind: TaskKind::Extract,
            } => self.is_extracting = false,
            ErrorOrigin::Channel => {
                self.is_saving = false;
                self.is_extracting = false;
            }
        }
        self.notifications
            .push(format!("Error: {}", reason), Severity::Error);
    }
}
