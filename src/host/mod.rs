//! Isolation Host.
//!
//! Owns the isolated execution context: every run publishes its document
//! under a fresh [`ExecutionHandle`] in the [`DocumentStore`], which the
//! guest-origin server reads to answer `GET /run/<handle>`. Exactly one
//! handle is live at a time; publishing a new one releases the previous
//! document first, so repeated runs never accumulate resources.
//!
//! The store is the Rust counterpart of a revocable object URL: removing
//! the entry revokes the URL, and the guest server answers `410 Gone`.

mod handle;
mod sandbox;

pub use handle::{ExecutionHandle, HandleId, HandleState};
pub use sandbox::PREVIEW_SANDBOX;

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

/// Published guest documents, keyed by handle id.
pub type DocumentStore = Arc<DashMap<HandleId, Arc<str>>>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("document is {size} bytes, over the {limit} byte limit")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("handle {handle} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        handle: HandleId,
        from: HandleState,
        to: HandleState,
    },
}

pub struct IsolationHost {
    store: DocumentStore,
    /// `scheme://host:port` the guest documents are served from.
    guest_origin: String,
    max_document_bytes: usize,
    live: Option<ExecutionHandle>,
    runs: u64,
}

impl IsolationHost {
    pub fn new(store: DocumentStore, guest_origin: impl Into<String>, max_document_bytes: usize) -> Self {
        Self {
            store,
            guest_origin: guest_origin.into().trim_end_matches('/').to_string(),
            max_document_bytes,
            live: None,
            runs: 0,
        }
    }

    /// Reserve a new handle for the next run (state `Pending`).
    pub fn prepare(&mut self) -> ExecutionHandle {
        self.runs += 1;
        let id = HandleId::generate(self.runs);
        let url = format!("{}/run/{}", self.guest_origin, id);
        ExecutionHandle::new(id, self.runs, url)
    }

    /// Publish `document` under a pending handle, making it the live one.
    ///
    /// On failure the handle is dropped as disposed and the previous live
    /// handle stays untouched.
    pub fn load(
        &mut self,
        mut handle: ExecutionHandle,
        document: String,
    ) -> Result<&ExecutionHandle, HostError> {
        if document.len() > self.max_document_bytes {
            handle.transition(HandleState::Disposed)?;
            return Err(HostError::DocumentTooLarge {
                size: document.len(),
                limit: self.max_document_bytes,
            });
        }

        handle.transition(HandleState::Active)?;
        if let Some(previous) = self.live.take() {
            self.release(previous);
        }

        self.store.insert(handle.id().clone(), Arc::from(document));
        crate::debug!("host"; "run {} live at {}", handle.run(), handle.url());
        Ok(self.live.insert(handle))
    }

    /// Release the live handle if it is `id`.
    ///
    /// Returns the handle in its final `Disposed` state.
    pub fn dispose(&mut self, id: &HandleId) -> Option<ExecutionHandle> {
        if !self.is_active(id) {
            return None;
        }
        let handle = self.live.take()?;
        Some(self.release(handle))
    }

    /// Dispose whatever is live (host teardown).
    pub fn shutdown(&mut self) {
        if let Some(id) = self.active_id().cloned() {
            self.dispose(&id);
        }
    }

    fn release(&self, mut handle: ExecutionHandle) -> ExecutionHandle {
        self.store.remove(handle.id());
        if let Err(e) = handle.transition(HandleState::Disposed) {
            crate::debug!("host"; "{}", e);
        }
        crate::debug!("host"; "released run {} ({})", handle.run(), handle.id().short());
        handle
    }

    pub fn active(&self) -> Option<&ExecutionHandle> {
        self.live.as_ref()
    }

    pub fn active_id(&self) -> Option<&HandleId> {
        self.live.as_ref().map(ExecutionHandle::id)
    }

    pub fn is_active(&self, id: &HandleId) -> bool {
        self.active_id() == Some(id)
    }

    /// Number of handles prepared so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }
}

impl Drop for IsolationHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(limit: usize) -> IsolationHost {
        IsolationHost::new(DocumentStore::default(), "http://127.0.0.1:5311/", limit)
    }

    #[test]
    fn test_load_publishes_document() {
        let mut host = host(1024);
        let handle = host.prepare();
        assert_eq!(handle.state(), HandleState::Pending);
        let id = handle.id().clone();

        let live = host.load(handle, "<p>one</p>".into()).unwrap();
        assert_eq!(live.state(), HandleState::Active);
        assert_eq!(live.url(), format!("http://127.0.0.1:5311/run/{id}"));
        assert_eq!(host.store().get(id.as_str()).as_deref().map(|d| &**d), Some("<p>one</p>"));
        assert!(host.is_active(&id));
    }

    #[test]
    fn test_new_load_releases_previous_document() {
        let mut host = host(1024);
        let first = host.prepare();
        let first_id = first.id().clone();
        host.load(first, "one".into()).unwrap();

        for i in 0..10 {
            let next = host.prepare();
            host.load(next, format!("doc {i}")).unwrap();
        }

        assert_eq!(host.store().len(), 1);
        assert!(!host.store().contains_key(first_id.as_str()));
        assert!(!host.is_active(&first_id));
        assert_eq!(host.runs(), 11);
    }

    #[test]
    fn test_dispose_only_affects_live_handle() {
        let mut host = host(1024);
        let handle = host.prepare();
        let id = handle.id().clone();
        host.load(handle, "doc".into()).unwrap();

        assert!(host.dispose(&HandleId::generate(99)).is_none());
        assert!(host.is_active(&id));

        let disposed = host.dispose(&id).unwrap();
        assert_eq!(disposed.state(), HandleState::Disposed);
        assert!(host.store().is_empty());
        assert!(host.active().is_none());
        assert!(host.dispose(&id).is_none());
    }

    #[test]
    fn test_oversized_document_fails_without_touching_live_run() {
        let mut host = host(8);
        let ok = host.prepare();
        let ok_id = ok.id().clone();
        host.load(ok, "small".into()).unwrap();

        let big = host.prepare();
        let err = host.load(big, "far too large".into()).unwrap_err();
        assert!(matches!(err, HostError::DocumentTooLarge { size: 13, limit: 8 }));
        assert!(host.is_active(&ok_id));
        assert_eq!(host.store().len(), 1);

        // Still usable for the next run.
        let next = host.prepare();
        assert!(host.load(next, "tiny".into()).is_ok());
    }

    #[test]
    fn test_drop_releases_live_document() {
        let store = DocumentStore::default();
        {
            let mut host = IsolationHost::new(Arc::clone(&store), "http://guest", 64);
            let handle = host.prepare();
            host.load(handle, "doc".into()).unwrap();
            assert_eq!(store.len(), 1);
        }
        assert!(store.is_empty());
    }
}
