// Editor session
//
// Ties the synchronous engine to the background worker. Every editing
// operation is a StateManager update; operations that produce a worker
// request post it after the state lock is released. Responses are applied by
// a pump task in the order they arrive, and a ticker expires notifications.

use crate::ids::{FileId, NotificationId, PageId};
use crate::intake::{FileBlob, RawUpload, accept_uploads};
use crate::metrics::SessionMetrics;
use crate::models::{EditorState, Settings, Step, TaskKind};
use crate::resources::Resource;
use crate::script::{EditCommand, ScriptError};
use crate::state::{StateChange, StateManager};
use crate::worker::{ChannelError, DocumentProcessor, TaskChannel, WorkerRequest, WorkerResponse};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Upper bound on how late a notification may linger past its expiry
const MAX_EXPIRY_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("An editor session needs a running tokio runtime")]
    NoRuntime(#[from] TryCurrentError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} finished without producing a document")]
    NoArtifact(TaskKind),

    #[error("State change channel closed")]
    Closed,
}

struct WorkerRuntime {
    channel: TaskChannel,
    pump: JoinHandle<()>,
}

impl WorkerRuntime {
    fn abort(&self) {
        self.channel.abort();
        self.pump.abort();
    }
}

/// One editing session: state, resources, worker and notification expiry
pub struct EditorSession {
    state: StateManager,
    processor: Arc<dyn DocumentProcessor>,
    settings: Settings,
    runtime: Handle,
    metrics: Arc<SessionMetrics>,
    worker: Mutex<Option<WorkerRuntime>>,
    ticker: JoinHandle<()>,
}

impl EditorSession {
    /// Create a session on the current tokio runtime.
    ///
    /// The worker is not started until the first request needs it.
    pub fn new(
        settings: Settings,
        processor: Arc<dyn DocumentProcessor>,
    ) -> Result<Self, SessionError> {
        let runtime = Handle::try_current()?;
        let state = StateManager::with_settings(&settings);

        let period = settings
            .notification_ttl()
            .min(MAX_EXPIRY_TICK)
            .max(Duration::from_millis(1));
        let ticker = runtime.spawn(run_expiry_ticker(state.clone(), period));

        tracing::info!("Editor session created");
        Ok(Self {
            state,
            processor,
            settings,
            runtime,
            metrics: Arc::new(SessionMetrics::new()),
            worker: Mutex::new(None),
            ticker,
        })
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> EditorState {
        self.state.snapshot()
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&EditorState) -> R,
    {
        self.state.read(f)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state.subscribe()
    }

    /// Start the worker if it is not already running
    pub fn init_worker(&self) {
        let mut slot = self.worker_guard();
        self.ensure_worker(&mut slot);
    }

    pub fn worker_running(&self) -> bool {
        self.worker_guard()
            .as_ref()
            .is_some_and(|worker| !worker.channel.is_closed())
    }

    // Files

    /// Validate raw uploads and add the accepted ones. Returns how many were
    /// accepted.
    pub fn add_uploads(&self, uploads: Vec<RawUpload>) -> usize {
        self.add_files(accept_uploads(uploads))
    }

    /// Add validated files and queue them for parsing
    pub fn add_files(&self, blobs: Vec<FileBlob>) -> usize {
        let (requests, _) = self.state.update_with(|state| state.add_files(blobs));
        let added = requests.len();
        self.metrics.record_edit(added > 0);
        for request in requests {
            self.dispatch(request);
        }
        added
    }

    pub fn remove_file(&self, id: &FileId) -> bool {
        self.edit(|state| state.remove_file(id))
    }

    pub fn reorder_files(&self, active: &FileId, over: &FileId) -> bool {
        self.edit(|state| state.reorder_files(active, over))
    }

    pub fn set_step(&self, step: Step) {
        self.edit(|state| {
            state.set_step(step);
            true
        });
    }

    // Pages

    pub fn init_page_editor(&self) {
        self.edit(|state| {
            state.init_page_editor();
            true
        });
    }

    pub fn reorder_pages(&self, active: &PageId, over: &PageId) -> bool {
        self.edit(|state| state.reorder_pages(active, over))
    }

    pub fn move_selected_pages(&self, active: &PageId, over: &PageId) -> bool {
        self.edit(|state| state.move_selected_pages(active, over))
    }

    /// Finish a drag of `active` onto `over`
    pub fn drop_page(&self, active: &PageId, over: &PageId) -> bool {
        self.edit(|state| state.drop_page(active, over))
    }

    pub fn rotate_page(&self, id: &PageId) -> bool {
        self.edit(|state| state.rotate_page(id))
    }

    pub fn remove_page(&self, id: &PageId) -> bool {
        self.edit(|state| state.remove_page(id))
    }

    pub fn rotate_selected(&self) -> bool {
        self.edit(EditorState::rotate_selected)
    }

    pub fn remove_selected(&self) -> bool {
        self.edit(EditorState::remove_selected)
    }

    pub fn undo(&self) -> bool {
        self.edit(EditorState::undo)
    }

    pub fn redo(&self) -> bool {
        self.edit(EditorState::redo)
    }

    /// Run one textual edit command
    pub fn run_command(&self, command: EditCommand) -> Result<bool, ScriptError> {
        let (result, _) = self.state.update_with(|state| command.apply(state));
        self.metrics.record_edit(matches!(result, Ok(true)));
        result
    }

    // Selection

    pub fn toggle_page_selection(&self, id: &PageId) -> bool {
        self.edit(|state| state.toggle_page_selection(id))
    }

    pub fn set_page_selection<I>(&self, ids: I)
    where
        I: IntoIterator<Item = PageId>,
    {
        self.edit(|state| {
            state.set_page_selection(ids);
            true
        });
    }

    pub fn select_all_pages(&self) {
        self.edit(|state| {
            state.select_all_pages();
            true
        });
    }

    pub fn deselect_all_pages(&self) {
        self.edit(|state| {
            state.deselect_all_pages();
            true
        });
    }

    pub fn extend_selection(&self, anchor: &PageId, target: &PageId) -> bool {
        self.edit(|state| state.extend_selection(anchor, target))
    }

    pub fn click_page(&self, id: &PageId, extend: bool) -> bool {
        self.edit(|state| state.click_page(id, extend))
    }

    // Assembly

    /// Merge every page of every file, in file order
    pub fn merge_files(&self) -> bool {
        self.run_task(EditorState::merge_files)
    }

    /// Assemble the page sequence into the save artifact
    pub fn save(&self) -> bool {
        self.run_task(EditorState::merge_pages)
    }

    /// Assemble the selected pages into the extract artifact
    pub fn extract_selected(&self) -> bool {
        self.run_task(EditorState::extract_selected)
    }

    /// The finished artifact of a task, if one is held
    pub fn artifact(&self, kind: TaskKind) -> Option<Resource> {
        let handle = self
            .state
            .read(|state| state.artifacts.get(kind).map(|a| a.handle.clone()))?;
        self.state.resources().get(&handle)
    }

    // Notifications

    pub fn dismiss_notification(&self, id: &NotificationId) {
        self.state.dismiss_notification(id);
    }

    /// Expire notifications now instead of waiting for the next tick
    pub fn expire_notifications(&self) {
        self.state.expire_notifications(Instant::now());
    }

    /// Tear down the worker and return to an empty Upload step, releasing
    /// every resource.
    ///
    /// Anything the old worker still produces is refused by the registry or
    /// dropped by the pump, so nothing from before the reset reaches the new
    /// session.
    pub fn reset_all(&self) {
        if let Some(worker) = self.worker_guard().take() {
            worker.abort();
            tracing::debug!("Worker torn down for reset");
        }
        self.state.reset_all();
    }

    // Waiting

    /// Wait until `predicate` holds, re-checking after every state change
    pub async fn wait_until<F>(&self, mut predicate: F, timeout: Duration) -> Result<(), SessionError>
    where
        F: FnMut(&EditorState) -> bool,
    {
        // Subscribe before the first check so no change slips between them
        let mut changes = self.state.subscribe();
        let wait = async {
            loop {
                if self.state.read(|state| predicate(state)) {
                    return Ok(());
                }
                match changes.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Waiter skipped {} state changes", skipped);
                    }
                    Err(RecvError::Closed) => return Err(SessionError::Closed),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::Timeout(timeout))?
    }

    /// Wait until every file has finished parsing (or failed)
    pub async fn wait_for_files_settled(&self, timeout: Duration) -> Result<(), SessionError> {
        self.wait_until(|state| !state.has_unsettled_files(), timeout)
            .await
    }

    /// Wait for the task of `kind` to finish and return its artifact
    pub async fn wait_for_artifact(
        &self,
        kind: TaskKind,
        timeout: Duration,
    ) -> Result<Resource, SessionError> {
        self.wait_until(
            |state| match kind {
                TaskKind::Save => !state.is_saving,
                TaskKind::Extract => !state.is_extracting,
            },
            timeout,
        )
        .await?;

        self.artifact(kind).ok_or(SessionError::NoArtifact(kind))
    }

    fn edit<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut EditorState) -> bool,
    {
        let (applied, _) = self.state.update_with(f);
        self.metrics.record_edit(applied);
        applied
    }

    fn run_task<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut EditorState) -> Option<WorkerRequest>,
    {
        let (request, _) = self.state.update_with(f);
        self.metrics.record_edit(request.is_some());
        match request {
            Some(request) => {
                self.dispatch(request);
                true
            }
            None => false,
        }
    }

    /// Post a request, starting the worker first if needed. A request that
    /// cannot be delivered fails like any other worker error.
    fn dispatch(&self, request: WorkerRequest) {
        self.metrics.record_request();
        let sent = {
            let mut slot = self.worker_guard();
            self.ensure_worker(&mut slot).channel.send(request)
        };

        if let Err(e) = sent {
            tracing::error!("Failed to post request: {}", e);
            let reason = e.to_string();
            let ChannelError::Closed { origin } = e;
            let response = WorkerResponse::Error { reason, origin };
            self.metrics.record_response(&response);
            self.state.apply_response(response);
        }
    }

    fn ensure_worker<'a>(&self, slot: &'a mut Option<WorkerRuntime>) -> &'a WorkerRuntime {
        let generation = self.state.resources().generation();
        let stale = match slot.as_ref() {
            Some(worker) if worker.channel.is_closed() => {
                tracing::warn!("Worker stopped unexpectedly, restarting");
                true
            }
            Some(worker) if worker.channel.generation() != generation => {
                tracing::debug!("Worker predates the last reset, restarting");
                true
            }
            _ => false,
        };
        if stale {
            if let Some(old) = slot.take() {
                old.abort();
            }
        }
        slot.get_or_insert_with(|| self.start_worker())
    }

    fn start_worker(&self) -> WorkerRuntime {
        let (channel, responses) = TaskChannel::spawn(
            Arc::clone(&self.processor),
            self.state.resources().clone(),
            &self.runtime,
        );
        let pump = self.runtime.spawn(pump_responses(
            self.state.clone(),
            Arc::clone(&self.metrics),
            channel.generation(),
            responses,
        ));
        tracing::info!("Worker initialized");
        WorkerRuntime { channel, pump }
    }

    fn worker_guard(&self) -> MutexGuard<'_, Option<WorkerRuntime>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.ticker.abort();
        if let Some(worker) = self.worker_guard().take() {
            worker.abort();
        }
    }
}

async fn pump_responses(
    state: StateManager,
    metrics: Arc<SessionMetrics>,
    generation: u64,
    mut responses: UnboundedReceiver<WorkerResponse>,
) {
    while let Some(response) = responses.recv().await {
        tracing::debug!("Applying {}", response.tag());
        metrics.record_response(&response);
        state.apply_worker_response(generation, response);
    }
}

async fn run_expiry_ticker(state: StateManager, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        state.expire_notifications(Instant::now());
    }
}
