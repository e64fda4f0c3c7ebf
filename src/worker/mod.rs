//! Background document work.
//!
//! - [`protocol`]: the request/response messages exchanged with the worker
//! - [`processor`]: the format capability the worker delegates to
//! - [`pdf`]: the built-in lopdf/image processor
//! - [`channel`]: the queue and the worker task draining it

pub mod channel;
pub mod pdf;
pub mod processor;
pub mod protocol;

pub use channel::{ChannelError, TaskChannel};
pub use pdf::PdfProcessor;
pub use processor::{
    AssemblyJob, AssemblyPage, DocumentProcessor, ProcessingError, Thumbnail,
};
pub use protocol::{ErrorOrigin, PageSpec, SourceFile, WorkerRequest, WorkerResponse};
