use crate::ids::{FileId, PageId, ResourceHandle};
use serde::{Deserialize, Serialize};

/// Clockwise page rotation, always one of 0, 90, 180 or 270 degrees
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "i64")]
pub struct Rotation(u16);

impl Rotation {
    pub const ZERO: Rotation = Rotation(0);

    /// Normalize any multiple of 90 (negative included) into 0..360.
    ///
    /// Returns `None` for angles that are not a multiple of 90.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Self(degrees.rem_euclid(360) as u16))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    /// Turn a further 90 degrees clockwise
    #[must_use]
    pub fn rotate_cw(self) -> Self {
        Self((self.0 + 90) % 360)
    }

    /// Add another rotation, wrapping at 360
    #[must_use]
    pub fn add(self, other: Rotation) -> Self {
        Self((self.0 + other.0) % 360)
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.0
    }
}

impl TryFrom<i64> for Rotation {
    type Error = String;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees).ok_or_else(|| format!("{} is not a multiple of 90", degrees))
    }
}

/// One page in the flattened, reorderable sequence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRef {
    pub unique_id: PageId,
    /// Lookup-only reference to the document this page came from
    pub source_id: FileId,
    /// 0-based page index within the source document
    pub source_index: usize,
    /// Borrowed thumbnail; the source document owns the handle
    pub thumbnail: Option<ResourceHandle>,
    pub rotation: Rotation,
}

impl PageRef {
    pub fn new(source_id: FileId, source_index: usize, thumbnail: Option<ResourceHandle>) -> Self {
        Self {
            unique_id: PageId::generate(),
            source_id,
            source_index,
            thumbnail,
            rotation: Rotation::ZERO,
        }
    }

    pub fn rotate(&mut self) {
        self.rotation = self.rotation.rotate_cw();
    }
}
