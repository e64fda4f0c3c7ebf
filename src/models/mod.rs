//! Data models for the page assembly engine.
//!
//! - [`SourceDocument`]: one uploaded file, its page count and thumbnail slots
//! - [`PageRef`]: one page in the flattened, reorderable sequence
//! - [`ArtifactSlots`]: the latest produced output per [`TaskKind`]
//! - [`NotificationQueue`]: transient user-facing messages
//! - [`EditorState`]: the aggregate, wrapped in `Arc<RwLock<>>` by
//!   [`StateManager`](crate::state::StateManager)
//! - [`Settings`]: user settings loaded from `Pagesmith Settings.yaml`

pub mod artifact;
pub mod config;
pub mod document;
pub mod editor_state;
pub mod notification;
pub mod page;

pub use artifact::{ArtifactSlots, PendingArtifact, TaskKind};
pub use config::Settings;
pub use document::{DocumentKind, DocumentStatus, SourceDocument, human_size};
pub use editor_state::{EditorState, PageSnapshot, Step};
pub use notification::{Notification, NotificationQueue, Severity};
pub use page::{PageRef, Rotation};
