// State management module
//
// This module provides the StateManager which wraps EditorState with thread-safe
// access using Arc<RwLock<T>>, frees the resources that transitions give up,
// and emits change events for the presentation layer.

use crate::ids::{FileId, NotificationId, PageId, ResourceHandle};
use crate::models::{
    DocumentStatus, EditorState, Notification, PageRef, Settings, Severity, Step, TaskKind,
};
use crate::resources::ResourceRegistry;
use crate::worker::protocol::WorkerResponse;
use indexmap::IndexSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Change events emitted when state is modified
///
/// Subscribers (a presentation layer, the CLI, tests) react to these instead
/// of polling the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A file was added, removed or moved
    FilesChanged { file_count: usize },

    /// An existing file's parse progress changed
    DocumentUpdated {
        file_id: FileId,
        page_count: usize,
        rendered: usize,
        status: DocumentStatus,
    },

    StepChanged { step: Step },

    /// The page sequence changed (order, rotation, membership or thumbnails)
    PagesChanged { page_count: usize },

    SelectionChanged { selected: usize },

    HistoryChanged { can_undo: bool, can_redo: bool },

    TaskStatusChanged { is_saving: bool, is_extracting: bool },

    ArtifactReady { kind: TaskKind },

    ArtifactCleared { kind: TaskKind },

    NotificationPosted {
        id: NotificationId,
        message: String,
        severity: Severity,
    },

    /// Notifications expired or were dismissed
    NotificationsRemoved { count: usize },

    /// State has been reset
    StateReset,
}

/// The parts of [`EditorState`] that change detection compares
struct ChangeProbe {
    file_ids: Vec<FileId>,
    documents: Vec<(FileId, usize, usize, DocumentStatus)>,
    pages: Vec<PageRef>,
    selection: IndexSet<PageId>,
    step: Step,
    history: (usize, usize),
    is_saving: bool,
    is_extracting: bool,
    save: Option<ResourceHandle>,
    extract: Option<ResourceHandle>,
    notifications: Vec<Notification>,
}

impl ChangeProbe {
    fn capture(state: &EditorState) -> Self {
        Self {
            file_ids: state.files.keys().cloned().collect(),
            documents: state
                .files
                .values()
                .map(|f| (f.id.clone(), f.page_count, f.rendered_pages(), f.status))
                .collect(),
            pages: state.pages.clone(),
            selection: state.selection.clone(),
            step: state.step,
            history: (state.history.past_len(), state.history.future_len()),
            is_saving: state.is_saving,
            is_extracting: state.is_extracting,
            save: state.artifacts.get(TaskKind::Save).map(|a| a.handle.clone()),
            extract: state.artifacts.get(TaskKind::Extract).map(|a| a.handle.clone()),
            notifications: state.notifications.iter().cloned().collect(),
        }
    }

    fn artifact(&self, kind: TaskKind) -> Option<&ResourceHandle> {
        match kind {
            TaskKind::Save => self.save.as_ref(),
            TaskKind::Extract => self.extract.as_ref(),
        }
    }
}

/// Thread-safe state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`EditorState`] via `Arc<RwLock<T>>`
/// - Releases every resource handle a transition surrenders
/// - Detects state changes and emits [`StateChange`] events
///
/// # Usage
///
/// - [`read()`](Self::read) for reading state
/// - [`update()`](Self::update) / [`update_with()`](Self::update_with) for
///   mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct StateManager {
    state: Arc<RwLock<EditorState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    /// Backing store for thumbnails and artifacts
    resources: ResourceRegistry,
}

impl StateManager {
    /// Create a new StateManager with default settings
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    /// Create a StateManager using the notification lifetime and event buffer
    /// from `settings`
    pub fn with_settings(settings: &Settings) -> Self {
        let (state_tx, _) = broadcast::channel(settings.event_buffer.max(1));
        Self {
            state: Arc::new(RwLock::new(EditorState::new(settings.notification_ttl()))),
            state_tx,
            resources: ResourceRegistry::new(),
        }
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> EditorState {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let page_count = state_manager.read(|state| state.pages.len());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&EditorState) -> R,
    {
        f(&self.read_guard())
    }

    /// Update the state and emit change events
    ///
    /// # Returns
    /// The StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut EditorState),
    {
        self.update_with(update_fn).1
    }

    /// Update the state, returning the closure's result alongside the events
    ///
    /// This:
    /// 1. Captures the comparable parts of the old state
    /// 2. Applies the update function
    /// 3. Releases the resource handles the update gave up
    /// 4. Detects what changed and emits events
    pub fn update_with<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut EditorState) -> R,
    {
        let (result, released, changes) = {
            let mut state = self.write_guard();
            let before = ChangeProbe::capture(&state);
            let result = update_fn(&mut state);
            let released = state.take_released();
            let after = ChangeProbe::capture(&state);
            (result, released, detect_changes(&before, &after))
        };

        for handle in &released {
            self.resources.release(handle);
        }

        for change in &changes {
            // No subscribers is fine
            let _ = self.state_tx.send(change.clone());
        }

        (result, changes)
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// The registry holding every thumbnail and artifact
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    // Convenience methods for common state updates

    /// Apply a background response
    pub fn apply_response(&self, response: WorkerResponse) -> Vec<StateChange> {
        self.update(|state| {
            state.apply_response(response);
        })
    }

    /// Apply a response from a worker spawned in registry `generation`.
    ///
    /// A response from before the last reset is dropped and the resource it
    /// carries released. The check runs under the write lock, the same lock
    /// [`reset_all`](Self::reset_all) holds while it advances the generation.
    pub fn apply_worker_response(
        &self,
        generation: u64,
        response: WorkerResponse,
    ) -> Vec<StateChange> {
        let resources = &self.resources;
        self.update(|state| {
            if resources.generation() != generation {
                tracing::debug!("Dropping {} from before the last reset", response.tag());
                if let Some(handle) = response.carried_handle() {
                    state.release(handle.clone());
                }
                return;
            }
            state.apply_response(response);
        })
    }

    /// Drop notifications whose display time has passed
    pub fn expire_notifications(&self, now: Instant) -> Vec<StateChange> {
        // Skip the write lock when nothing is due
        let due = self.read(|state| state.notifications.iter().any(|n| n.expires_at <= now));
        if !due {
            return Vec::new();
        }
        self.update(|state| {
            state.notifications.expire(now);
        })
    }

    pub fn dismiss_notification(&self, id: &NotificationId) -> Vec<StateChange> {
        self.update(|state| {
            state.notifications.dismiss(id);
        })
    }

    /// Reset the model, free every resource still registered and start a new
    /// registry generation.
    ///
    /// Both happen under one write lock, so no worker response can land
    /// between the cleared model and the cleared registry.
    pub fn reset_all(&self) -> Vec<StateChange> {
        let resources = &self.resources;
        let (released, mut changes) = self.update_with(|state| {
            state.reset_all();
            // release_all below frees everything the model gave up
            let _ = state.take_released();
            resources.release_all()
        });
        tracing::info!("State reset, {} resources released", released);

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, EditorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, EditorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Detect what changed between two probes and generate events
fn detect_changes(old: &ChangeProbe, new: &ChangeProbe) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if old.file_ids != new.file_ids {
        changes.push(StateChange::FilesChanged {
            file_count: new.file_ids.len(),
        });
    }

    for (file_id, page_count, rendered, status) in &new.documents {
        let updated = old
            .documents
            .iter()
            .find(|(id, ..)| id == file_id)
            .is_some_and(|(_, c, r, s)| (c, r, s) != (page_count, rendered, status));
        if updated {
            changes.push(StateChange::DocumentUpdated {
                file_id: file_id.clone(),
                page_count: *page_count,
                rendered: *rendered,
                status: *status,
            });
        }
    }

    if old.step != new.step {
        changes.push(StateChange::StepChanged { step: new.step });
    }

    if old.pages != new.pages {
        changes.push(StateChange::PagesChanged {
            page_count: new.pages.len(),
        });
    }

    // IndexSet equality ignores order
    if old.selection != new.selection {
        changes.push(StateChange::SelectionChanged {
            selected: new.selection.len(),
        });
    }

    if old.history != new.history {
        changes.push(StateChange::HistoryChanged {
            can_undo: new.history.0 > 0,
            can_redo: new.history.1 > 0,
        });
    }

    if old.is_saving != new.is_saving || old.is_extracting != new.is_extracting {
        changes.push(StateChange::TaskStatusChanged {
            is_saving: new.is_saving,
            is_extracting: new.is_extracting,
        });
    }

    for kind in [TaskKind::Save, TaskKind::Extract] {
        match (old.artifact(kind), new.artifact(kind)) {
            (before, Some(after)) if before != Some(after) => {
                changes.push(StateChange::ArtifactReady { kind });
            }
            (Some(_), None) => changes.push(StateChange::ArtifactCleared { kind }),
            _ => {}
        }
    }

    let removed = old
        .notifications
        .iter()
        .filter(|n| !new.notifications.iter().any(|m| m.id == n.id))
        .count();
    if removed > 0 {
        changes.push(StateChange::NotificationsRemoved { count: removed });
    }
    for notification in &new.notifications {
        if !old.notifications.iter().any(|n| n.id == notification.id) {
            changes.push(StateChange::NotificationPosted {
                id: notification.id.clone(),
                message: notification.message.clone(),
                severity: notification.severity,
            });
        }
    }

    changes
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            resources: self.resources.clone(),
        }
    }
}
