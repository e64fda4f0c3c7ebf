// Background task protocol
//
// Every message is `{ "type": <TAG>, "payload": { ... } }`. Requests flow from
// the main context to the worker, responses stream back. Parse responses for
// one file arrive in page order; nothing is ordered across files, so every
// response is keyed by file id (and page index for thumbnails).

use crate::ids::{FileId, ResourceHandle};
use crate::intake::FileBlob;
use crate::models::{Rotation, TaskKind};
use serde::{Deserialize, Serialize};

/// A source file referenced by id in a page-level merge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: FileId,
    pub file: FileBlob,
}

/// One page of a page-level merge, in output order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    pub file_id: FileId,
    pub page_index: usize,
    /// Added to any rotation the source page already carries
    pub rotation: Rotation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorkerRequest {
    /// Count pages, then stream one thumbnail per page
    ParseFile { file: FileBlob, file_id: FileId },

    /// Every page of every file, in file order
    MergePdfs {
        files: Vec<FileBlob>,
        task_kind: TaskKind,
    },

    /// Exactly the given pages, in the given order
    MergePages {
        files: Vec<SourceFile>,
        pages: Vec<PageSpec>,
        task_kind: TaskKind,
    },
}

impl WorkerRequest {
    pub fn tag(&self) -> &'static str {
        match self {
            WorkerRequest::ParseFile { .. } => "PARSE_FILE",
            WorkerRequest::MergePdfs { .. } => "MERGE_PDFS",
            WorkerRequest::MergePages { .. } => "MERGE_PAGES",
        }
    }

    /// Where a failure of this request must be routed
    pub fn origin(&self) -> ErrorOrigin {
        match self {
            WorkerRequest::ParseFile { file_id, .. } => ErrorOrigin::Parse {
                file_id: file_id.clone(),
            },
            WorkerRequest::MergePdfs { task_kind, .. }
            | WorkerRequest::MergePages { task_kind, .. } => ErrorOrigin::Assembly {
                task_kind: *task_kind,
            },
        }
    }
}

/// The request an `ERROR` response belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ErrorOrigin {
    Parse { file_id: FileId },
    Assembly { task_kind: TaskKind },
    /// The channel itself failed; the request kind is unknown
    Channel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorkerResponse {
    FileParsed {
        file_id: FileId,
        page_count: usize,
    },

    /// Ownership of `image` passes to the receiver
    ThumbnailGenerated {
        file_id: FileId,
        page_index: usize,
        image: ResourceHandle,
    },

    /// Ownership of `artifact` passes to the receiver
    MergeComplete {
        artifact: ResourceHandle,
        task_kind: TaskKind,
    },

    Error { reason: String, origin: ErrorOrigin },
}

impl WorkerResponse {
    pub fn tag(&self) -> &'static str {
        match self {
            WorkerResponse::FileParsed { .. } => "FILE_PARSED",
            WorkerResponse::ThumbnailGenerated { .. } => "THUMBNAIL_GENERATED",
            WorkerResponse::MergeComplete { .. } => "MERGE_COMPLETE",
            WorkerResponse::Error { .. } => "ERROR",
        }
    }

    /// The resource handle carried by this response, if any
    pub fn carried_handle(&self) -> Option<&ResourceHandle> {
        match self {
            WorkerResponse::ThumbnailGenerated { image, .. } => Some(image),
            WorkerResponse::MergeComplete { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}
