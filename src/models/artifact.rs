use crate::ids::ResourceHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which result slot a produced document belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Full merge of files or of the current page order
    Save,
    /// Only the selected pages
    Extract,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Save => f.write_str("save"),
            TaskKind::Extract => f.write_str("extract"),
        }
    }
}

/// A produced output document waiting to be downloaded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingArtifact {
    pub handle: ResourceHandle,
    pub kind: TaskKind,
}

/// One outstanding artifact per [`TaskKind`].
///
/// Every method that removes an artifact hands back its handle so the caller
/// can release the underlying resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactSlots {
    save: Option<PendingArtifact>,
    extract: Option<PendingArtifact>,
}

impl ArtifactSlots {
    pub fn get(&self, kind: TaskKind) -> Option<&PendingArtifact> {
        self.slot(kind).as_ref()
    }

    /// Put a new artifact in its slot, returning the handle it displaced
    pub fn replace(&mut self, kind: TaskKind, handle: ResourceHandle) -> Option<ResourceHandle> {
        self.slot_mut(kind)
            .replace(PendingArtifact { handle, kind })
            .map(|old| old.handle)
    }

    /// Empty a slot, returning the handle it held
    pub fn take(&mut self, kind: TaskKind) -> Option<ResourceHandle> {
        self.slot_mut(kind).take().map(|a| a.handle)
    }

    /// Empty both slots
    pub fn take_all(&mut self) -> Vec<ResourceHandle> {
        [TaskKind::Save, TaskKind::Extract]
            .into_iter()
            .filter_map(|kind| self.take(kind))
            .collect()
    }

    fn slot(&self, kind: TaskKind) -> &Option<PendingArtifact> {
        match kind {
            TaskKind::Save => &self.save,
            TaskKind::Extract => &self.extract,
        }
    }

    fn slot_mut(&mut self, kind: TaskKind) -> &mut Option<PendingArtifact> {
        match kind {
            TaskKind::Save => &mut self.save,
            TaskKind::Extract => &mut self.extract,
        }
    }
}
