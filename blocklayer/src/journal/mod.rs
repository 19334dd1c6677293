//! Journal sub-service contract.
//!
//! The create pipeline treats journal provisioning as a black box: it hands
//! the sub-service the image id, the journal geometry, and the initial tag
//! data, and waits for the completion. [`StoreJournaler`] is a minimal
//! store-backed implementation suitable for tests and embedded use; a real
//! deployment substitutes its own.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::store::{ObjectStore, StoreError};

/// Mirror uuid recorded in the journal tag of a locally-primary image.
///
/// Non-primary images record the uuid of their remote primary instead.
pub const LOCAL_MIRROR_UUID: &str = "";

/// Geometry of a journal to be provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalParams {
    /// Base-2 log of the journal object size.
    pub order: u8,
    /// Number of journal objects written round-robin.
    pub splay_width: u8,
    /// Pool holding the journal objects, when distinct from the metadata
    /// pool.
    pub pool: Option<String>,
}

/// Initial tag data stamped into a freshly created journal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JournalTagData {
    /// Owner of the entries that will be appended under this tag:
    /// [`LOCAL_MIRROR_UUID`] for a primary image, the primary cluster's
    /// mirror uuid for a replication target.
    pub mirror_uuid: String,
}

/// Asynchronous journal provisioning and teardown.
pub trait Journaler: Send + Sync + 'static {
    /// Creates the journal for an image.
    fn create(
        &self,
        image_id: &str,
        params: &JournalParams,
        tag: &JournalTagData,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes the journal of an image.
    fn remove(&self, image_id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Name of the per-image journal header object.
pub fn journal_object_name(image_id: &str) -> String {
    format!("image_journal.{image_id}")
}

/// Journal sub-service that keeps the journal header in the same object
/// store as the image metadata.
///
/// The header object carries the tag's mirror uuid as its payload so
/// replication tooling can recover the tag owner without a journal replay.
pub struct StoreJournaler<S> {
    store: Arc<S>,
}

impl<S: ObjectStore> StoreJournaler<S> {
    /// Creates a journaler backed by the given store handle.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: ObjectStore> Journaler for StoreJournaler<S> {
    async fn create(
        &self,
        image_id: &str,
        params: &JournalParams,
        tag: &JournalTagData,
    ) -> Result<(), StoreError> {
        debug!(
            image_id,
            order = params.order,
            splay_width = params.splay_width,
            pool = params.pool.as_deref(),
            "creating journal"
        );
        self.store
            .create_exclusive(
                &journal_object_name(image_id),
                Bytes::from(tag.mirror_uuid.clone().into_bytes()),
            )
            .await
    }

    async fn remove(&self, image_id: &str) -> Result<(), StoreError> {
        debug!(image_id, "removing journal");
        self.store.remove(&journal_object_name(image_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_journal_object_name() {
        assert_eq!(journal_object_name("abc123"), "image_journal.abc123");
    }

    #[tokio::test]
    async fn test_create_records_tag_owner() {
        let store = Arc::new(MemoryStore::new("meta", 1));
        let journaler = StoreJournaler::new(Arc::clone(&store));

        let params = JournalParams {
            order: 24,
            splay_width: 4,
            pool: None,
        };
        let tag = JournalTagData {
            mirror_uuid: "remote-primary".to_string(),
        };
        journaler.create("img1", &params, &tag).await.unwrap();

        let payload = store.object_data(&journal_object_name("img1")).unwrap();
        assert_eq!(&payload[..], b"remote-primary");
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = Arc::new(MemoryStore::new("meta", 1));
        let journaler = StoreJournaler::new(Arc::clone(&store));

        let params = JournalParams {
            order: 24,
            splay_width: 4,
            pool: None,
        };
        let tag = JournalTagData::default();
        journaler.create("img1", &params, &tag).await.unwrap();

        let err = journaler.create("img1", &params, &tag).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_remove_deletes_journal() {
        let store = Arc::new(MemoryStore::new("meta", 1));
        let journaler = StoreJournaler::new(Arc::clone(&store));

        let params = JournalParams {
            order: 24,
            splay_width: 4,
            pool: None,
        };
        journaler
            .create("img1", &params, &JournalTagData::default())
            .await
            .unwrap();
        journaler.remove("img1").await.unwrap();

        assert!(!store.contains(&journal_object_name("img1")));
    }
}
