// Page selection
//
// The selection only ever holds ids present in the sequence. Selection changes
// are not structural edits: they record no history and keep artifacts.

use crate::ids::PageId;
use crate::models::EditorState;

impl EditorState {
    /// Flip one page in or out of the selection and make it the range anchor
    pub fn toggle_page_selection(&mut self, id: &PageId) -> bool {
        if !self.contains_page(id) {
            return false;
        }

        if !self.selection.shift_remove(id) {
            self.selection.insert(id.clone());
        }
        self.anchor = Some(id.clone());
        true
    }

    /// Replace the selection, ignoring ids that are not in the sequence
    pub fn set_page_selection<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = PageId>,
    {
        let selection = ids.into_iter().filter(|id| self.contains_page(id)).collect();
        self.selection = selection;
    }

    pub fn select_all_pages(&mut self) {
        self.selection = self.pages.iter().map(|p| p.unique_id.clone()).collect();
    }

    pub fn deselect_all_pages(&mut self) {
        self.selection.clear();
    }

    /// Add every page between `anchor` and `target` (inclusive, either
    /// direction) to the selection.
    ///
    /// Pages already selected outside the range stay selected. No-op when
    /// either id is not in the sequence.
    pub fn extend_selection(&mut self, anchor: &PageId, target: &PageId) -> bool {
        let (Some(a), Some(b)) = (self.position_of(anchor), self.position_of(target)) else {
            return false;
        };

        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let range: Vec<PageId> = self.pages[low..=high]
            .iter()
            .map(|p| p.unique_id.clone())
            .collect();
        self.selection.extend(range);
        true
    }

    /// Handle a click on a page.
    ///
    /// With `extend` and a known anchor the range from the anchor is added;
    /// otherwise the page is toggled and becomes the new anchor.
    pub fn click_page(&mut self, id: &PageId, extend: bool) -> bool {
        match (extend, self.anchor.clone()) {
            (true, Some(anchor)) => self.extend_selection(&anchor, id),
            _ => self.toggle_page_selection(id),
        }
    }
}
