// Structural page edits: flatten, reorder, block move, rotate, delete, undo/redo
//
// Every edit that changes the sequence records the pre-edit snapshot first and
// invalidates the save artifact. Ids from outside are resolved before anything
// is touched; an unresolved id makes the whole operation a no-op.

use super::reorder::{array_move, block_move};
use crate::ids::PageId;
use crate::models::{EditorState, PageRef, PageSnapshot, Severity, Step};

impl EditorState {
    /// Materialize the flattened sequence from every known thumbnail slot.
    ///
    /// Clears selection and history and enters [`Step::Editor`].
    pub fn init_page_editor(&mut self) {
        self.pages = self
            .files
            .values()
            .flat_map(|file| {
                file.thumbnails
                    .iter()
                    .enumerate()
                    .map(move |(index, thumb)| PageRef::new(file.id.clone(), index, thumb.clone()))
            })
            .collect();
        self.selection.clear();
        self.anchor = None;
        self.history.clear();
        self.step = Step::Editor;
        self.invalidate_save();
        tracing::debug!("Page editor initialized with {} pages", self.pages.len());
    }

    /// Move one page next to another.
    ///
    /// No-op when either id is unknown or both are the same page.
    pub fn reorder_pages(&mut self, active: &PageId, over: &PageId) -> bool {
        let (Some(from), Some(to)) = (self.position_of(active), self.position_of(over)) else {
            return false;
        };
        if from == to {
            return false;
        }

        self.record_history();
        array_move(&mut self.pages, from, to);
        self.invalidate_save();
        true
    }

    /// Move the whole selection as one block next to `over`.
    ///
    /// Rejected when `over` is itself selected, when either id is unknown, or
    /// when nothing is selected.
    pub fn move_selected_pages(&mut self, active: &PageId, over: &PageId) -> bool {
        let (Some(active_index), Some(over_index)) = (self.position_of(active), self.position_of(over))
        else {
            return false;
        };
        if active_index == over_index || self.selection.is_empty() || self.selection.contains(over) {
            return false;
        }

        let snapshot = self.snapshot_pages();
        let pages = std::mem::take(&mut self.pages);
        let selection = &self.selection;
        match block_move(pages, |p| selection.contains(&p.unique_id), active_index, over_index) {
            Ok(moved) => {
                self.pages = moved;
                self.history.record(snapshot);
                self.invalidate_save();
                true
            }
            Err(untouched) => {
                self.pages = untouched;
                false
            }
        }
    }

    /// Finish a drag: block move when the dragged page is selected, single
    /// reorder otherwise
    pub fn drop_page(&mut self, active: &PageId, over: &PageId) -> bool {
        if active == over {
            return false;
        }
        if self.selection.contains(active) {
            self.move_selected_pages(active, over)
        } else {
            self.reorder_pages(active, over)
        }
    }

    /// How many pages a drag starting at `active` carries
    pub fn drag_count(&self, active: &PageId) -> usize {
        if self.selection.contains(active) {
            self.selection.len()
        } else {
            1
        }
    }

    pub fn rotate_page(&mut self, id: &PageId) -> bool {
        if !self.contains_page(id) {
            return false;
        }

        self.record_history();
        if let Some(page) = self.page_mut(id) {
            page.rotate();
        }
        self.invalidate_save();
        true
    }

    pub fn remove_page(&mut self, id: &PageId) -> bool {
        let Some(index) = self.position_of(id) else {
            return false;
        };

        self.record_history();
        self.pages.remove(index);
        self.selection.shift_remove(id);
        self.invalidate_save();
        true
    }

    /// Rotate every selected page by 90 degrees
    pub fn rotate_selected(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }

        self.record_history();
        let selection = &self.selection;
        self.pages
            .iter_mut()
            .filter(|p| selection.contains(&p.unique_id))
            .for_each(PageRef::rotate);
        self.invalidate_save();
        self.notifications.push("Rotated selected pages", Severity::Success);
        true
    }

    /// Delete every selected page and empty the selection
    pub fn remove_selected(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }

        self.record_history();
        let selection = std::mem::take(&mut self.selection);
        self.pages.retain(|p| !selection.contains(&p.unique_id));
        self.invalidate_save();
        self.notifications.push("Removed selected pages", Severity::Success);
        true
    }

    pub fn undo(&mut self) -> bool {
        let current = self.snapshot_pages();
        let Some(previous) = self.history.undo(current) else {
            return false;
        };

        self.restore_snapshot(&previous);
        self.notifications.push("Undo", Severity::Info);
        true
    }

    pub fn redo(&mut self) -> bool {
        let current = self.snapshot_pages();
        let Some(next) = self.history.redo(current) else {
            return false;
        };

        self.restore_snapshot(&next);
        self.notifications.push("Redo", Severity::Info);
        true
    }

    /// Make a snapshot the live sequence.
    ///
    /// Thumbnails are re-read from the source documents so pages rendered
    /// after the snapshot was taken keep their preview.
    fn restore_snapshot(&mut self, snapshot: &PageSnapshot) {
        self.pages = snapshot.to_vec();
        self.refresh_page_thumbnails();
        self.prune_selection();
        self.invalidate_save();
    }

    /// Point every page at its source document's current thumbnail
    pub(crate) fn refresh_page_thumbnails(&mut self) {
        let files = &self.files;
        for page in &mut self.pages {
            page.thumbnail = files
                .get(&page.source_id)
                .and_then(|file| file.thumbnail(page.source_index))
                .cloned();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ids::{FileId, PageId, ResourceHandle};
    use crate::intake::{FileBlob, MimeType};
    use crate::models::{EditorState, SourceDocument, Step, TaskKind};

    /// One parsed file with `pages` pages, all thumbnails rendered, in the editor
    fn editor_with_pages(pages: usize) -> EditorState {
        let mut state = EditorState::default();
        let mut doc = SourceDocument::from_blob(FileBlob::new("a.pdf", MimeType::Pdf, vec![1]));
        doc.set_page_count(pages);
        for i in 0..pages {
            doc.set_thumbnail(i, ResourceHandle::from(format!("thumb-{}", i)))
                .unwrap();
        }
        state.files.insert(doc.id.clone(), doc);
        state.init_page_editor();
        state
    }

    fn order(state: &EditorState) -> Vec<usize> {
        state.pages.iter().map(|p| p.source_index).collect()
    }

    fn id(state: &EditorState, position: usize) -> PageId {
        state.pages[position].unique_id.clone()
    }

    #[test]
    fn test_init_page_editor_flattens_thumbnail_slots() {
        let state = editor_with_pages(3);
        assert_eq!(state.step, Step::Editor);
        assert_eq!(order(&state), vec![0, 1, 2]);
        assert_eq!(state.pages[1].thumbnail, Some(ResourceHandle::from("thumb-1")));
        assert!(state.pages.iter().all(|p| p.rotation.degrees() == 0));
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_reorder_pages() {
        let mut state = editor_with_pages(4);
        let (a, c) = (id(&state, 0), id(&state, 2));

        assert!(state.reorder_pages(&a, &c));
        assert_eq!(order(&state), vec![1, 2, 0, 3]);
        assert_eq!(state.history.past_len(), 1);
    }

    #[test]
    fn test_reorder_pages_unresolved_is_noop() {
        let mut state = editor_with_pages(2);
        let a = id(&state, 0);

        assert!(!state.reorder_pages(&a, &PageId::from("missing")));
        assert!(!state.reorder_pages(&a, &a));
        assert_eq!(order(&state), vec![0, 1]);
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_move_selected_pages_rejects_selected_target() {
        let mut state = editor_with_pages(4);
        let (a, b) = (id(&state, 0), id(&state, 1));
        state.selection.insert(a.clone());
        state.selection.insert(b.clone());

        assert!(!state.move_selected_pages(&a, &b));
        assert!(!state.history.can_undo());
    }

    #[test]
    fn test_drop_page_dispatches_on_selection() {
        let mut state = editor_with_pages(5);
        let ids = state.page_ids();
        state.selection.insert(ids[0].clone());
        state.selection.insert(ids[2].clone());

        // dragging a selected page moves the block
        assert!(state.drop_page(&ids[0], &ids[3]));
        assert_eq!(order(&state), vec![1, 3, 0, 2, 4]);

        // dragging an unselected page moves just that page
        assert!(state.drop_page(&ids[4], &ids[1]));
        assert_eq!(order(&state), vec![4, 1, 3, 0, 2]);

        assert!(!state.drop_page(&ids[1], &ids[1]));
        assert_eq!(state.drag_count(&ids[0]), 2);
        assert_eq!(state.drag_count(&ids[1]), 1);
    }

    #[test]
    fn test_rotate_and_remove_single_page() {
        let mut state = editor_with_pages(3);
        let b = id(&state, 1);
        state.selection.insert(b.clone());

        assert!(state.rotate_page(&b));
        assert_eq!(state.pages[1].rotation.degrees(), 90);

        assert!(state.remove_page(&b));
        assert_eq!(order(&state), vec![0, 2]);
        assert!(state.selection.is_empty());

        assert!(!state.rotate_page(&b));
        assert!(!state.remove_page(&b));
        assert_eq!(state.history.past_len(), 2);
    }

    #[test]
    fn test_selection_wide_ops_on_empty_selection_push_nothing() {
        let mut state = editor_with_pages(2);

        assert!(!state.rotate_selected());
        assert!(!state.remove_selected());
        assert!(!state.history.can_undo());
        assert!(state.notifications.is_empty());
    }

    #[test]
    fn test_rotate_selected_twice_then_undo() {
        let mut state = editor_with_pages(3);
        let (a, b) = (id(&state, 0), id(&state, 1));
        state.selection.insert(a.clone());
        state.selection.insert(b.clone());

        state.rotate_selected();
        state.rotate_selected();
        assert_eq!(state.page(&a).unwrap().rotation.degrees(), 180);
        assert_eq!(state.page(&b).unwrap().rotation.degrees(), 180);

        assert!(state.undo());
        assert_eq!(state.page(&a).unwrap().rotation.degrees(), 90);
        assert_eq!(state.page(&b).unwrap().rotation.degrees(), 90);
        assert_eq!(state.history.past_len(), 1);
        assert_eq!(state.notifications.latest().unwrap().message, "Undo");
    }

    #[test]
    fn test_remove_selected_clears_selection() {
        let mut state = editor_with_pages(4);
        let (a, c) = (id(&state, 0), id(&state, 2));
        state.selection.insert(a);
        state.selection.insert(c);

        assert!(state.remove_selected());
        assert_eq!(order(&state), vec![1, 3]);
        assert!(state.selection.is_empty());
        assert_eq!(
            state.notifications.latest().unwrap().message,
            "Removed selected pages"
        );
    }

    #[test]
    fn test_undo_redo_restores_exact_sequence() {
        let mut state = editor_with_pages(4);
        let (a, d) = (id(&state, 0), id(&state, 3));
        state.reorder_pages(&a, &d);
        let before_undo = state.pages.clone();

        assert!(state.undo());
        assert_eq!(order(&state), vec![0, 1, 2, 3]);
        assert!(state.redo());
        assert_eq!(state.pages, before_undo);
        assert!(!state.redo());
    }

    #[test]
    fn test_new_edit_after_undo_drops_redo() {
        let mut state = editor_with_pages(3);
        let (a, b, c) = (id(&state, 0), id(&state, 1), id(&state, 2));
        state.reorder_pages(&a, &c);
        state.undo();

        state.rotate_page(&b);
        assert!(!state.redo());
    }

    #[test]
    fn test_undo_prunes_selection() {
        let mut state = editor_with_pages(2);
        let a = id(&state, 0);
        state.rotate_page(&a);

        // a page that only exists after the undo point
        let mut extra = crate::models::PageRef::new(FileId::from("x"), 0, None);
        extra.rotate();
        let extra_id = extra.unique_id.clone();
        state.pages.push(extra);
        state.selection.insert(extra_id.clone());
        state.selection.insert(a.clone());

        state.undo();
        assert!(state.selection.contains(&a));
        assert!(!state.selection.contains(&extra_id));
    }

    #[test]
    fn test_undo_refreshes_thumbnails_from_sources() {
        let mut state = EditorState::default();
        let mut doc = SourceDocument::from_blob(FileBlob::new("a.pdf", MimeType::Pdf, vec![1]));
        doc.set_page_count(2);
        let file_id = doc.id.clone();
        state.files.insert(file_id.clone(), doc);
        state.init_page_editor();

        let first = id(&state, 0);
        state.rotate_page(&first);
        state.files[&file_id]
            .set_thumbnail(0, ResourceHandle::from("late"))
            .unwrap();

        state.undo();
        assert_eq!(state.pages[0].thumbnail, Some(ResourceHandle::from("late")));
    }

    #[test]
    fn test_edits_invalidate_save_artifact() {
        let mut state = editor_with_pages(2);
        state.artifacts.replace(TaskKind::Save, ResourceHandle::from("merged"));
        state.artifacts.replace(TaskKind::Extract, ResourceHandle::from("extract"));

        let a = id(&state, 0);
        state.rotate_page(&a);

        assert!(state.artifacts.get(TaskKind::Save).is_none());
        assert!(state.artifacts.get(TaskKind::Extract).is_some());
        assert_eq!(state.take_released(), vec![ResourceHandle::from("merged")]);
    }
}
