// File-level operations and navigation

use crate::ids::FileId;
use crate::intake::FileBlob;
use crate::models::{EditorState, Severity, SourceDocument, Step};
use crate::worker::protocol::WorkerRequest;

impl EditorState {
    /// Register new uploads and return one parse request per file.
    ///
    /// Adding while in the editor counts as a structural edit: the current
    /// page order is recorded and the redo branch dropped. The new pages are
    /// appended once their parse result arrives.
    pub fn add_files(&mut self, blobs: Vec<FileBlob>) -> Vec<WorkerRequest> {
        if blobs.is_empty() {
            return Vec::new();
        }

        if self.step == Step::Editor {
            self.record_history();
        }
        if self.step == Step::Upload {
            self.step = Step::Files;
        }
        self.invalidate_save();

        let count = blobs.len();
        let requests = blobs
            .into_iter()
            .map(|blob| {
                let doc = SourceDocument::from_blob(blob);
                let request = WorkerRequest::ParseFile {
                    file: doc.blob.clone(),
                    file_id: doc.id.clone(),
                };
                tracing::debug!("Added file {} ({}, {})", doc.name, doc.id, doc.size);
                self.files.insert(doc.id.clone(), doc);
                request
            })
            .collect();

        self.notifications
            .push(format!("{} files added", count), Severity::Success);
        requests
    }

    /// Drop one uploaded file and release its thumbnails.
    ///
    /// Pages already in the sequence stay but lose their preview; they are
    /// left out of any later assembly.
    pub fn remove_file(&mut self, id: &FileId) -> bool {
        let Some(mut doc) = self.files.shift_remove(id) else {
            return false;
        };

        self.release_all(doc.take_thumbnails());
        for page in self.pages.iter_mut().filter(|p| &p.source_id == id) {
            page.thumbnail = None;
        }
        self.invalidate_save();
        tracing::debug!("Removed file {} ({})", doc.name, id);
        true
    }

    /// Move one file next to another in file order
    pub fn reorder_files(&mut self, active: &FileId, over: &FileId) -> bool {
        let (Some(from), Some(to)) = (self.files.get_index_of(active), self.files.get_index_of(over))
        else {
            return false;
        };
        if from == to {
            return false;
        }

        self.files.move_index(from, to);
        self.invalidate_save();
        true
    }

    /// Navigate to a workflow step
    pub fn set_step(&mut self, step: Step) {
        self.step = step;
        self.invalidate_save();
    }

    /// Return to an empty session, queueing every owned resource for release
    pub fn reset_all(&mut self) {
        let thumbnails: Vec<_> = self
            .files
            .values_mut()
            .flat_map(|doc| doc.take_thumbnails())
            .collect();
        self.release_all(thumbnails);
        let artifacts = self.artifacts.take_all();
        self.release_all(artifacts);

        self.files.clear();
        self.pages.clear();
        self.selection.clear();
        self.anchor = None;
        self.history.clear();
        self.step = Step::Upload;
        self.is_saving = false;
        self.is_extracting = false;
        self.notifications.push("Reset complete", Severity::Info);
    }
}
