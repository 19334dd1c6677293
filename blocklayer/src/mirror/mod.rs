//! Pool-level mirroring vocabulary and the watcher notification channel.
//!
//! Mirroring enrolls an image for cross-cluster replication. The pool-wide
//! registry object records the pool's mirror mode and one registration per
//! mirrored image; watchers subscribe to registration changes so replication
//! daemons notice new images without polling.

use std::future::Future;

use tokio::sync::broadcast;
use tracing::debug;

use crate::store::StoreError;

/// Pool-level replication policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorMode {
    /// No image in this pool is mirrored.
    Disabled,
    /// Images opt into mirroring individually.
    Image,
    /// Every journaled image in the pool is mirrored.
    Pool,
}

impl MirrorMode {
    /// Raw on-wire representation stored in the mirror registry.
    pub const fn as_raw(self) -> u32 {
        match self {
            MirrorMode::Disabled => 0,
            MirrorMode::Image => 1,
            MirrorMode::Pool => 2,
        }
    }

    /// Decodes a raw stored value; unknown values yield `None` and must be
    /// treated as invalid by the caller.
    pub const fn from_raw(raw: u32) -> Option<MirrorMode> {
        match raw {
            0 => Some(MirrorMode::Disabled),
            1 => Some(MirrorMode::Image),
            2 => Some(MirrorMode::Pool),
            _ => None,
        }
    }
}

/// Lifecycle state of a per-image mirror registration.
///
/// Image create only reads `Enabled` and writes `Enabled`; the transitional
/// states belong to the enable/disable flows and are preserved untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorImageState {
    /// Mirroring is being torn down.
    Disabling,
    /// Mirroring is being set up.
    Enabling,
    /// The image is actively mirrored.
    Enabled,
    /// The image is not mirrored.
    #[default]
    Disabled,
}

/// A per-image mirror registration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MirrorImage {
    /// Identity of this image shared by both sides of the replication
    /// relationship.
    pub global_image_id: String,
    /// Current registration state.
    pub state: MirrorImageState,
}

/// A mirror-registry change fanned out to watchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    /// An image's registration changed.
    ImageUpdated {
        /// New registration state.
        state: MirrorImageState,
        /// Pool-local image id.
        image_id: String,
        /// Cross-cluster image identity.
        global_image_id: String,
    },
}

/// Fan-out of mirror-registry changes to interested watchers.
///
/// Notification is best-effort from the pipeline's point of view: a failed
/// send is logged and never fails the create.
pub trait MirrorNotifier: Send + Sync + 'static {
    /// Announces that an image's mirror registration changed.
    fn image_updated(
        &self,
        state: MirrorImageState,
        image_id: &str,
        global_image_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Notifier that fans events out over a `tokio::sync::broadcast` channel.
///
/// Watchers call [`subscribe`](BroadcastNotifier::subscribe) and receive
/// every event sent while subscribed. With no watchers attached the send is
/// a no-op; an image create must not depend on anyone listening.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<MirrorEvent>,
}

impl BroadcastNotifier {
    /// Creates a notifier whose channel buffers up to `capacity` events per
    /// lagging watcher.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Registers a new watcher.
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.tx.subscribe()
    }

    /// Number of currently attached watchers.
    pub fn watcher_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MirrorNotifier for BroadcastNotifier {
    async fn image_updated(
        &self,
        state: MirrorImageState,
        image_id: &str,
        global_image_id: &str,
    ) -> Result<(), StoreError> {
        if self.tx.receiver_count() == 0 {
            debug!(image_id, "no mirror watchers attached");
            return Ok(());
        }
        self.tx
            .send(MirrorEvent::ImageUpdated {
                state,
                image_id: image_id.to_string(),
                global_image_id: global_image_id.to_string(),
            })
            .map(|_| ())
            .map_err(|_| StoreError::io("all mirror watchers disconnected"))
    }
}
