use crate::history::HistoryStack;
use crate::ids::{FileId, PageId, ResourceHandle};
use crate::models::artifact::{ArtifactSlots, TaskKind};
use crate::models::document::SourceDocument;
use crate::models::notification::NotificationQueue;
use crate::models::page::PageRef;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use std::time::Duration;

/// Frozen copy of the page sequence
pub type PageSnapshot = Arc<[PageRef]>;

/// Workflow step the user is on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Upload,
    Files,
    Editor,
}

/// The document and page model plus everything the editing engine touches.
///
/// Transitions never release resources themselves. They queue surrendered
/// handles with [`release`](Self::release) and the
/// [`StateManager`](crate::state::StateManager) frees them after the update.
#[derive(Clone, Debug)]
pub struct EditorState {
    /// Uploaded documents in file order
    pub files: IndexMap<FileId, SourceDocument>,

    /// Flattened page sequence; its order is the output order
    pub pages: Vec<PageRef>,

    pub selection: IndexSet<PageId>,

    /// Last singly-toggled page, used for range selection
    pub anchor: Option<PageId>,

    pub step: Step,
    pub history: HistoryStack<PageSnapshot>,
    pub artifacts: ArtifactSlots,
    pub is_saving: bool,
    pub is_extracting: bool,
    pub notifications: NotificationQueue,

    pending_release: Vec<ResourceHandle>,
}

impl EditorState {
    pub fn new(notification_ttl: Duration) -> Self {
        Self {
            files: IndexMap::new(),
            pages: Vec::new(),
            selection: IndexSet::new(),
            anchor: None,
            step: Step::Upload,
            history: HistoryStack::new(),
            artifacts: ArtifactSlots::default(),
            is_saving: false,
            is_extracting: false,
            notifications: NotificationQueue::new(notification_ttl),
            pending_release: Vec::new(),
        }
    }

    pub fn position_of(&self, id: &PageId) -> Option<usize> {
        self.pages.iter().position(|p| &p.unique_id == id)
    }

    pub fn contains_page(&self, id: &PageId) -> bool {
        self.position_of(id).is_some()
    }

    pub fn page(&self, id: &PageId) -> Option<&PageRef> {
        self.pages.iter().find(|p| &p.unique_id == id)
    }

    pub fn page_mut(&mut self, id: &PageId) -> Option<&mut PageRef> {
        self.pages.iter_mut().find(|p| &p.unique_id == id)
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|p| p.unique_id.clone()).collect()
    }

    pub fn is_selected(&self, id: &PageId) -> bool {
        self.selection.contains(id)
    }

    /// Selected pages in sequence order, not click order
    pub fn selected_in_order(&self) -> Vec<&PageRef> {
        self.pages
            .iter()
            .filter(|p| self.selection.contains(&p.unique_id))
            .collect()
    }

    pub fn snapshot_pages(&self) -> PageSnapshot {
        Arc::from(self.pages.as_slice())
    }

    /// Push the current page order onto the undo stack
    pub fn record_history(&mut self) {
        let snapshot = self.snapshot_pages();
        self.history.record(snapshot);
    }

    /// Drop selected ids that are no longer in the sequence.
    ///
    /// The anchor may go stale; range selection resolves it and no-ops.
    pub fn prune_selection(&mut self) {
        let live: IndexSet<&PageId> = self.pages.iter().map(|p| &p.unique_id).collect();
        self.selection.retain(|id| live.contains(id));
    }

    /// Clear the save artifact so a stale download is never offered
    pub fn invalidate_save(&mut self) {
        if let Some(handle) = self.artifacts.take(TaskKind::Save) {
            self.release(handle);
        }
    }

    /// Queue a handle whose owner gave it up
    pub fn release(&mut self, handle: ResourceHandle) {
        self.pending_release.push(handle);
    }

    pub fn release_all(&mut self, handles: impl IntoIterator<Item = ResourceHandle>) {
        self.pending_release.extend(handles);
    }

    /// Hand over every queued handle
    pub fn take_released(&mut self) -> Vec<ResourceHandle> {
        std::mem::take(&mut self.pending_release)
    }

    pub fn has_pending_release(&self) -> bool {
        !self.pending_release.is_empty()
    }

    /// True while at least one upload is still being parsed
    pub fn has_unsettled_files(&self) -> bool {
        self.files.values().any(|f| !f.is_settled())
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(crate::models::notification::DEFAULT_NOTIFICATION_TTL)
    }
}
