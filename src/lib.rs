// Pagesmith - local page assembly engine
//
// This is the library crate containing the editing engine, state management
// and the background document worker. The binary crate (main.rs) provides
// the command-line entry point.

pub mod config;
pub mod engine;
pub mod export;
pub mod history;
pub mod ids;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod resources;
pub mod script;
pub mod session;
pub mod state;
pub mod worker;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use ids::{FileId, NotificationId, PageId, ResourceHandle};
pub use intake::{FileBlob, MimeType, RawUpload};
pub use models::{EditorState, PageRef, Rotation, Settings, Step, TaskKind};
pub use resources::{Resource, ResourceRegistry};
pub use session::{EditorSession, SessionError};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
