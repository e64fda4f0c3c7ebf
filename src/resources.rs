// Resource registry
//
// Rendered thumbnails and produced artifacts are binary blobs that outlive the
// call that created them. They live here, keyed by a ResourceHandle, until the
// owning entity releases them. A handle is owned by exactly one entity (a
// SourceDocument thumbnail slot or an artifact slot); PageRefs only borrow it.
//
// `release_all` starts a new generation. Work begun under an older generation
// can no longer register anything, so a full reset leaves the store empty even
// while a worker is still finishing.

use crate::ids::ResourceHandle;
use crate::intake::MimeType;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A binary resource: MIME type plus shared bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub mime: MimeType,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct Store {
    generation: u64,
    items: HashMap<ResourceHandle, Resource>,
}

/// Thread-safe store of live binary resources.
///
/// Cloning the registry yields another view of the same store, so the worker
/// context can register resources that the main context later releases.
#[derive(Clone, Debug, Default)]
pub struct ResourceRegistry {
    inner: Arc<Mutex<Store>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource and return its freshly generated handle
    pub fn register(&self, mime: MimeType, bytes: impl Into<Arc<[u8]>>) -> ResourceHandle {
        let mut store = self.lock();
        insert(&mut store, mime, bytes.into())
    }

    /// Store a resource on behalf of work started in `generation`.
    ///
    /// Returns `None`, storing nothing, once the registry has moved past that
    /// generation.
    pub fn register_in(
        &self,
        generation: u64,
        mime: MimeType,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Option<ResourceHandle> {
        let mut store = self.lock();
        if store.generation != generation {
            tracing::debug!(
                "Refusing resource from generation {} (now {})",
                generation,
                store.generation
            );
            return None;
        }
        Some(insert(&mut store, mime, bytes.into()))
    }

    /// The current generation, advanced by every [`release_all`](Self::release_all)
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Look up a live resource
    pub fn get(&self, handle: &ResourceHandle) -> Option<Resource> {
        self.lock().items.get(handle).cloned()
    }

    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.lock().items.contains_key(handle)
    }

    /// Release a resource. Returns false if the handle was not live.
    pub fn release(&self, handle: &ResourceHandle) -> bool {
        let released = self.lock().items.remove(handle).is_some();
        if !released {
            tracing::debug!("Release of unknown resource {}", handle);
        }
        released
    }

    /// Release every live resource and start a new generation, returning how
    /// many were freed
    pub fn release_all(&self) -> usize {
        let mut store = self.lock();
        let count = store.items.len();
        store.items.clear();
        store.generation += 1;
        count
    }

    /// Number of resources currently held
    pub fn live_count(&self) -> usize {
        self.lock().items.len()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn insert(store: &mut Store, mime: MimeType, bytes: Arc<[u8]>) -> ResourceHandle {
    let handle = ResourceHandle::generate();
    store.items.insert(handle.clone(), Resource { mime, bytes });
    handle
}
