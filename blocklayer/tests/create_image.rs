//! End-to-end tests for the image-create transaction.
//!
//! These tests drive [`CreateImageRequest`] against the in-memory store
//! and assert on the cluster-side objects it leaves behind: a successful
//! create leaves exactly the requested scaffolding, a failed create leaves
//! no trace beyond the sticky snapshot-mode bootstrap.

use std::sync::Arc;

use blocklayer::config::CreateDefaults;
use blocklayer::image::{CreateError, CreateImageRequest, Features, ImageOptions};
use blocklayer::journal::{journal_object_name, StoreJournaler, LOCAL_MIRROR_UUID};
use blocklayer::mirror::{
    BroadcastNotifier, MirrorEvent, MirrorImage, MirrorImageState, MirrorMode, MirrorNotifier,
};
use blocklayer::store::{
    header_object_name, id_object_name, object_map_name, MemoryStore, StoreError, StoreOp,
    NO_SNAPSHOT,
};

const MIB: u64 = 1024 * 1024;

/// Bundles the collaborators every request needs.
struct Cluster {
    store: Arc<MemoryStore>,
    journaler: Arc<StoreJournaler<MemoryStore>>,
    notifier: Arc<BroadcastNotifier>,
    defaults: CreateDefaults,
}

impl Cluster {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new("meta", 1));
        let journaler = Arc::new(StoreJournaler::new(Arc::clone(&store)));
        Self {
            store,
            journaler,
            notifier: Arc::new(BroadcastNotifier::new(16)),
            defaults: CreateDefaults::default(),
        }
    }

    fn request(
        &self,
        name: &str,
        id: &str,
        size: u64,
        options: &ImageOptions,
    ) -> CreateImageRequest<MemoryStore, StoreJournaler<MemoryStore>, BroadcastNotifier> {
        CreateImageRequest::new(
            Arc::clone(&self.store),
            Arc::clone(&self.journaler),
            Arc::clone(&self.notifier),
            &self.defaults,
            name,
            id,
            size,
            options,
        )
    }
}

fn journaled_features() -> Features {
    Features::LAYERING | Features::EXCLUSIVE_LOCK | Features::JOURNALING
}

fn full_features() -> Features {
    Features::LAYERING | Features::EXCLUSIVE_LOCK | Features::OBJECT_MAP | Features::JOURNALING
}

#[tokio::test]
async fn test_minimal_create() {
    let cluster = Cluster::new();
    let options = ImageOptions::default();

    cluster
        .request("a", "I1", 4 * MIB, &options)
        .send()
        .await
        .unwrap();

    // Id object binds the name to the id.
    let id_payload = cluster.store.object_data(&id_object_name("a")).unwrap();
    assert_eq!(&id_payload[..], b"I1");
    assert_eq!(cluster.store.directory_entry("a").as_deref(), Some("I1"));

    // The header is the authoritative record.
    let header = cluster.store.header(&header_object_name("I1")).unwrap();
    assert_eq!(header.size, 4 * MIB);
    assert_eq!(header.order, 22);
    assert_eq!(header.features, Features::LAYERING);
    assert_eq!(header.object_prefix, "image_data.I1");
    assert_eq!(header.data_pool_id, None);

    // No object map, journal, or mirror registration was requested.
    assert!(!cluster
        .store
        .contains(&object_map_name("I1", NO_SNAPSHOT)));
    assert!(!cluster.store.contains(&journal_object_name("I1")));
    assert!(cluster.store.mirror_image("I1").is_none());

    // Default stripe shape is not persisted separately.
    assert_eq!(cluster.store.stripe_shape(&header_object_name("I1")), None);
}

#[tokio::test]
async fn test_full_features_with_pool_mirroring() {
    let cluster = Cluster::new();
    cluster.store.set_mirror_mode(MirrorMode::Pool);
    let mut watcher = cluster.notifier.subscribe();

    let options = ImageOptions::default().with_features(full_features());
    cluster
        .request("vm", "I2", 16 * MIB, &options)
        .send()
        .await
        .unwrap();

    // Object map sized to one entry per data object.
    assert_eq!(
        cluster
            .store
            .object_map_len(&object_map_name("I2", NO_SNAPSHOT)),
        Some(4)
    );

    // The journal tag of a primary image carries the local mirror uuid.
    let journal_payload = cluster
        .store
        .object_data(&journal_object_name("I2"))
        .unwrap();
    assert_eq!(&journal_payload[..], LOCAL_MIRROR_UUID.as_bytes());

    // Pool-wide mirroring enables the registration with a minted uuid.
    let mirror = cluster.store.mirror_image("I2").unwrap();
    assert_eq!(mirror.state, MirrorImageState::Enabled);
    assert!(uuid::Uuid::parse_str(&mirror.global_image_id).is_ok());

    // Watchers hear about the new registration.
    let event = watcher.recv().await.unwrap();
    assert_eq!(
        event,
        MirrorEvent::ImageUpdated {
            state: MirrorImageState::Enabled,
            image_id: "I2".to_string(),
            global_image_id: mirror.global_image_id,
        }
    );
}

#[tokio::test]
async fn test_non_primary_mirror_create() {
    let cluster = Cluster::new();
    // Mirror mode never provisioned on this pool; forced non-primary
    // proceeds regardless.
    let options = ImageOptions::default().with_features(journaled_features());
    cluster
        .request("replica", "I3", 4 * MIB, &options)
        .replica_of("G7", "P")
        .send()
        .await
        .unwrap();

    // The journal tag records the primary's mirror uuid, not ours.
    let journal_payload = cluster
        .store
        .object_data(&journal_object_name("I3"))
        .unwrap();
    assert_eq!(&journal_payload[..], b"P");

    // The registration reuses the primary's global image id.
    let mirror = cluster.store.mirror_image("I3").unwrap();
    assert_eq!(mirror.state, MirrorImageState::Enabled);
    assert_eq!(mirror.global_image_id, "G7");
}

#[tokio::test]
async fn test_mid_pipeline_failure_rolls_back_everything() {
    let cluster = Cluster::new();
    let injected = StoreError::io("injected object map failure");
    cluster
        .store
        .fail_next(StoreOp::ObjectMapResize, injected.clone());

    let options = ImageOptions::default()
        .with_features(Features::LAYERING | Features::EXCLUSIVE_LOCK | Features::OBJECT_MAP);
    let err = cluster
        .request("a", "I4", 4 * MIB, &options)
        .send()
        .await
        .unwrap_err();

    // The caller sees the forward error, not a cleanup error.
    assert_eq!(err, CreateError::Store(injected));

    // No trace of the image remains.
    assert!(cluster.store.directory_entry("a").is_none());
    assert!(!cluster.store.contains(&id_object_name("a")));
    assert!(!cluster.store.contains(&header_object_name("I4")));
    assert!(!cluster
        .store
        .contains(&object_map_name("I4", NO_SNAPSHOT)));

    // A subsequent identical create succeeds.
    cluster
        .request("a", "I4", 4 * MIB, &options)
        .send()
        .await
        .unwrap();
    assert_eq!(cluster.store.directory_entry("a").as_deref(), Some("I4"));
}

#[tokio::test]
async fn test_rollback_is_best_effort() {
    let cluster = Cluster::new();
    let forward_error = StoreError::io("injected object map failure");
    cluster
        .store
        .fail_next(StoreOp::ObjectMapResize, forward_error.clone());
    cluster.store.fail_next_on(
        StoreOp::Remove,
        header_object_name("I5"),
        StoreError::io("injected header cleanup failure"),
    );

    let options = ImageOptions::default()
        .with_features(Features::LAYERING | Features::EXCLUSIVE_LOCK | Features::OBJECT_MAP);
    let err = cluster
        .request("a", "I5", 4 * MIB, &options)
        .send()
        .await
        .unwrap_err();

    // Still the forward error, even though a rollback step failed too.
    assert_eq!(err, CreateError::Store(forward_error));

    // The failed step leaves an orphan header; the remaining steps still
    // ran.
    assert!(cluster.store.contains(&header_object_name("I5")));
    assert!(cluster.store.directory_entry("a").is_none());
    assert!(!cluster.store.contains(&id_object_name("a")));
}

#[tokio::test]
async fn test_set_clear_conflict_cancels_feature() {
    let cluster = Cluster::new();
    let options = ImageOptions::default()
        .with_features(Features::LAYERING | Features::EXCLUSIVE_LOCK)
        .with_features_set(Features::OBJECT_MAP)
        .with_features_clear(Features::OBJECT_MAP);

    let request = cluster.request("a", "I6", 4 * MIB, &options);
    assert!(!request.features().contains(Features::OBJECT_MAP));
    request.send().await.unwrap();

    // The conflicting bit cancelled, so no object map was created.
    assert!(!cluster
        .store
        .contains(&object_map_name("I6", NO_SNAPSHOT)));
    let header = cluster.store.header(&header_object_name("I6")).unwrap();
    assert!(!header.features.contains(Features::OBJECT_MAP));
}

#[tokio::test]
async fn test_explicit_striping_is_persisted() {
    let cluster = Cluster::new();
    let options = ImageOptions::default()
        .with_order(22)
        .with_striping(1 << 20, 4);

    cluster
        .request("striped", "I7", 64 * MIB, &options)
        .send()
        .await
        .unwrap();

    let header_obj = header_object_name("I7");
    assert_eq!(cluster.store.stripe_shape(&header_obj), Some((1 << 20, 4)));
    let header = cluster.store.header(&header_obj).unwrap();
    assert!(header.features.contains(Features::STRIPINGV2));
}

#[tokio::test]
async fn test_data_pool_create_records_pool_id_and_prefix() {
    let cluster = Cluster::new();
    cluster.store.add_pool("fast-ssd", 7);

    let options = ImageOptions::default().with_data_pool("fast-ssd");
    cluster
        .request("fast", "I8", 4 * MIB, &options)
        .send()
        .await
        .unwrap();

    let header = cluster.store.header(&header_object_name("I8")).unwrap();
    assert!(header.features.contains(Features::DATA_POOL));
    assert_eq!(header.data_pool_id, Some(7));
    // The prefix embeds the metadata pool id when data lives elsewhere.
    assert_eq!(header.object_prefix, "image_data.1.I8");
}

#[tokio::test]
async fn test_missing_data_pool_fails_before_any_side_effect() {
    let cluster = Cluster::new();
    let options = ImageOptions::default().with_data_pool("no-such-pool");

    let err = cluster
        .request("a", "I9", 4 * MIB, &options)
        .send()
        .await
        .unwrap_err();

    assert_eq!(err, CreateError::DataPoolMissing("no-such-pool".to_string()));
    assert_eq!(cluster.store.object_count(), 0);
}

#[tokio::test]
async fn test_existing_disabled_registration_is_reenabled() {
    let cluster = Cluster::new();
    cluster.store.set_mirror_mode(MirrorMode::Pool);
    cluster.store.put_mirror_image(
        "I10",
        MirrorImage {
            global_image_id: "stale".to_string(),
            state: MirrorImageState::Disabled,
        },
    );

    let options = ImageOptions::default().with_features(journaled_features());
    cluster
        .request("reborn", "I10", 4 * MIB, &options)
        .send()
        .await
        .unwrap();

    let mirror = cluster.store.mirror_image("I10").unwrap();
    assert_eq!(mirror.state, MirrorImageState::Enabled);
    // A fresh primary id replaces the stale one.
    assert_ne!(mirror.global_image_id, "stale");
    assert!(uuid::Uuid::parse_str(&mirror.global_image_id).is_ok());
}

#[tokio::test]
async fn test_journal_failure_unwinds_object_map() {
    let cluster = Cluster::new();
    cluster.store.fail_next_on(
        StoreOp::CreateExclusive,
        journal_object_name("I11"),
        StoreError::io("injected journal failure"),
    );

    let options = ImageOptions::default().with_features(full_features());
    let err = cluster
        .request("a", "I11", 4 * MIB, &options)
        .send()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CreateError::Store(StoreError::io("injected journal failure"))
    );
    assert!(!cluster
        .store
        .contains(&object_map_name("I11", NO_SNAPSHOT)));
    assert!(!cluster.store.contains(&header_object_name("I11")));
    assert!(cluster.store.directory_entry("a").is_none());
}

#[tokio::test]
async fn test_mirror_enable_failure_removes_journal() {
    let cluster = Cluster::new();
    cluster.store.set_mirror_mode(MirrorMode::Pool);
    cluster.store.fail_next(
        StoreOp::MirrorImageSet,
        StoreError::io("injected mirror failure"),
    );

    let options = ImageOptions::default().with_features(journaled_features());
    let err = cluster
        .request("a", "I12", 4 * MIB, &options)
        .send()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CreateError::Store(StoreError::io("injected mirror failure"))
    );
    assert!(!cluster.store.contains(&journal_object_name("I12")));
    assert!(cluster.store.directory_entry("a").is_none());
    assert!(!cluster.store.contains(&id_object_name("a")));
}

/// Notifier whose sends always fail.
struct DeadNotifier;

impl MirrorNotifier for DeadNotifier {
    async fn image_updated(
        &self,
        _state: MirrorImageState,
        _image_id: &str,
        _global_image_id: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::io("watcher channel down"))
    }
}

#[tokio::test]
async fn test_notify_failure_does_not_fail_create() {
    let cluster = Cluster::new();
    cluster.store.set_mirror_mode(MirrorMode::Pool);

    let options = ImageOptions::default().with_features(journaled_features());
    let request = CreateImageRequest::new(
        Arc::clone(&cluster.store),
        Arc::clone(&cluster.journaler),
        Arc::new(DeadNotifier),
        &cluster.defaults,
        "a",
        "I13",
        4 * MIB,
        &options,
    );
    request.send().await.unwrap();

    assert_eq!(
        cluster.store.mirror_image("I13").unwrap().state,
        MirrorImageState::Enabled
    );
}
