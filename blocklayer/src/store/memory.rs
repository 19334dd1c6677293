//! In-memory reference implementation of the object store.
//!
//! [`MemoryStore`] keeps every named object in a concurrent map and
//! implements the full [`ObjectStore`] contract, including exclusive
//! creates and the self-managed snapshot mode switch. It exists for tests
//! and embedded use; its one-shot fault injection lets pipeline tests fail
//! any single operation, optionally scoped to one object, without touching
//! the pipeline itself.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::image::ImageHeader;
use crate::mirror::{MirrorImage, MirrorMode};
use crate::store::names::{DIRECTORY_OBJECT, MIRROR_REGISTRY_OBJECT};
use crate::store::{ObjectStore, StoreError};

/// Identifies a store operation for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// [`ObjectStore::lookup_pool`]
    LookupPool,
    /// [`ObjectStore::stat`]
    Stat,
    /// [`ObjectStore::create_exclusive`]
    CreateExclusive,
    /// [`ObjectStore::remove`]
    Remove,
    /// [`ObjectStore::selfmanaged_snap_create`]
    SnapCreate,
    /// [`ObjectStore::selfmanaged_snap_remove`]
    SnapRemove,
    /// [`ObjectStore::write_image_id`]
    WriteImageId,
    /// [`ObjectStore::directory_add`]
    DirectoryAdd,
    /// [`ObjectStore::directory_remove`]
    DirectoryRemove,
    /// [`ObjectStore::write_header`]
    WriteHeader,
    /// [`ObjectStore::set_stripe_shape`]
    SetStripeShape,
    /// [`ObjectStore::object_map_resize`]
    ObjectMapResize,
    /// [`ObjectStore::mirror_mode_get`]
    MirrorModeGet,
    /// [`ObjectStore::mirror_image_get`]
    MirrorImageGet,
    /// [`ObjectStore::mirror_image_set`]
    MirrorImageSet,
}

/// A pending one-shot fault.
#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    oid: Option<String>,
    error: StoreError,
}

/// An object and whatever typed payloads have been written to it.
///
/// A real store keys typed state off per-object class methods; here one
/// record carries the union of the payload kinds this crate writes.
#[derive(Debug, Clone, Default)]
struct MemObject {
    data: Bytes,
    entries: BTreeMap<String, String>,
    header: Option<ImageHeader>,
    stripe_shape: Option<(u64, u64)>,
    object_map_len: Option<u64>,
    mirror_mode: Option<u32>,
    mirror_images: BTreeMap<String, MirrorImage>,
}

/// In-memory object store bound to a single metadata pool.
pub struct MemoryStore {
    pool_name: String,
    pool_id: i64,
    pools: DashMap<String, i64>,
    objects: DashMap<String, MemObject>,
    self_managed_snaps: AtomicBool,
    next_snap_id: AtomicU64,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryStore {
    /// Creates an empty store for the named pool.
    pub fn new(pool_name: impl Into<String>, pool_id: i64) -> Self {
        Self {
            pool_name: pool_name.into(),
            pool_id,
            pools: DashMap::new(),
            objects: DashMap::new(),
            self_managed_snaps: AtomicBool::new(false),
            next_snap_id: AtomicU64::new(1),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Registers an additional pool resolvable by [`ObjectStore::lookup_pool`].
    pub fn add_pool(&self, name: impl Into<String>, id: i64) {
        self.pools.insert(name.into(), id);
    }

    /// Arms a one-shot fault: the next invocation of `op` fails with
    /// `error` instead of running.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.push_fault(op, None, error);
    }

    /// Arms a one-shot fault scoped to a single object id.
    pub fn fail_next_on(&self, op: StoreOp, oid: impl Into<String>, error: StoreError) {
        self.push_fault(op, Some(oid.into()), error);
    }

    fn push_fault(&self, op: StoreOp, oid: Option<String>, error: StoreError) {
        self.faults
            .lock()
            .unwrap()
            .push(Fault { op, oid, error });
    }

    fn take_fault(&self, op: StoreOp, oid: &str) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().unwrap();
        let hit = faults
            .iter()
            .position(|f| f.op == op && f.oid.as_deref().map_or(true, |o| o == oid));
        match hit {
            Some(index) => Err(faults.swap_remove(index).error),
            None => Ok(()),
        }
    }

    /// True once the pool has switched to self-managed snapshot mode.
    pub fn is_self_managed_snapshots(&self) -> bool {
        self.self_managed_snaps.load(Ordering::SeqCst)
    }

    /// Number of objects currently in the pool.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// True if the named object exists.
    pub fn contains(&self, oid: &str) -> bool {
        self.objects.contains_key(oid)
    }

    /// Raw payload of the named object, if it exists.
    pub fn object_data(&self, oid: &str) -> Option<Bytes> {
        self.objects.get(oid).map(|obj| obj.data.clone())
    }

    /// Image id bound to `image_name` in the pool directory, if any.
    pub fn directory_entry(&self, image_name: &str) -> Option<String> {
        self.objects
            .get(DIRECTORY_OBJECT)
            .and_then(|obj| obj.entries.get(image_name).cloned())
    }

    /// Header record of the named object, if one was written.
    pub fn header(&self, oid: &str) -> Option<ImageHeader> {
        self.objects.get(oid).and_then(|obj| obj.header.clone())
    }

    /// Stripe shape persisted on the named header object, if any.
    pub fn stripe_shape(&self, oid: &str) -> Option<(u64, u64)> {
        self.objects.get(oid).and_then(|obj| obj.stripe_shape)
    }

    /// Entry count of the named object map, if it exists.
    pub fn object_map_len(&self, oid: &str) -> Option<u64> {
        self.objects.get(oid).and_then(|obj| obj.object_map_len)
    }

    /// Mirror registration for an image id, if one exists.
    pub fn mirror_image(&self, image_id: &str) -> Option<MirrorImage> {
        self.objects
            .get(MIRROR_REGISTRY_OBJECT)
            .and_then(|obj| obj.mirror_images.get(image_id).cloned())
    }

    /// Sets the pool's mirror mode.
    pub fn set_mirror_mode(&self, mode: MirrorMode) {
        self.set_raw_mirror_mode(mode.as_raw());
    }

    /// Sets the pool's mirror mode to an arbitrary raw value, including
    /// values the crate does not recognize.
    pub fn set_raw_mirror_mode(&self, raw: u32) {
        self.objects
            .entry(MIRROR_REGISTRY_OBJECT.to_string())
            .or_default()
            .mirror_mode = Some(raw);
    }

    /// Seeds a mirror registration directly, bypassing the pipeline.
    pub fn put_mirror_image(&self, image_id: impl Into<String>, image: MirrorImage) {
        self.objects
            .entry(MIRROR_REGISTRY_OBJECT.to_string())
            .or_default()
            .mirror_images
            .insert(image_id.into(), image);
    }
}

impl ObjectStore for MemoryStore {
    fn pool_name(&self) -> &str {
        &self.pool_name
    }

    fn pool_id(&self) -> i64 {
        self.pool_id
    }

    async fn lookup_pool(&self, name: &str) -> Result<i64, StoreError> {
        self.take_fault(StoreOp::LookupPool, name)?;
        if name == self.pool_name {
            return Ok(self.pool_id);
        }
        self.pools
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| StoreError::NoSuchPool(name.to_string()))
    }

    async fn stat(&self, oid: &str) -> Result<u64, StoreError> {
        self.take_fault(StoreOp::Stat, oid)?;
        self.objects
            .get(oid)
            .map(|obj| obj.data.len() as u64)
            .ok_or_else(|| StoreError::NotFound(oid.to_string()))
    }

    async fn create_exclusive(&self, oid: &str, data: Bytes) -> Result<(), StoreError> {
        self.take_fault(StoreOp::CreateExclusive, oid)?;
        match self.objects.entry(oid.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(oid.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(MemObject {
                    data,
                    ..MemObject::default()
                });
                Ok(())
            }
        }
    }

    async fn remove(&self, oid: &str) -> Result<(), StoreError> {
        self.take_fault(StoreOp::Remove, oid)?;
        self.objects
            .remove(oid)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(oid.to_string()))
    }

    async fn selfmanaged_snap_create(&self) -> Result<u64, StoreError> {
        self.take_fault(StoreOp::SnapCreate, "")?;
        self.self_managed_snaps.store(true, Ordering::SeqCst);
        Ok(self.next_snap_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn selfmanaged_snap_remove(&self, _snap_id: u64) -> Result<(), StoreError> {
        self.take_fault(StoreOp::SnapRemove, "")?;
        Ok(())
    }

    async fn write_image_id(&self, oid: &str, image_id: &str) -> Result<(), StoreError> {
        self.take_fault(StoreOp::WriteImageId, oid)?;
        match self.objects.entry(oid.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(oid.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(MemObject {
                    data: Bytes::from(image_id.to_string().into_bytes()),
                    ..MemObject::default()
                });
                Ok(())
            }
        }
    }

    async fn directory_add(
        &self,
        oid: &str,
        image_name: &str,
        image_id: &str,
    ) -> Result<(), StoreError> {
        self.take_fault(StoreOp::DirectoryAdd, oid)?;
        let mut dir = self.objects.entry(oid.to_string()).or_default();
        if dir.entries.contains_key(image_name) {
            return Err(StoreError::AlreadyExists(image_name.to_string()));
        }
        dir.entries
            .insert(image_name.to_string(), image_id.to_string());
        Ok(())
    }

    async fn directory_remove(
        &self,
        oid: &str,
        image_name: &str,
        image_id: &str,
    ) -> Result<(), StoreError> {
        self.take_fault(StoreOp::DirectoryRemove, oid)?;
        let mut dir = self
            .objects
            .get_mut(oid)
            .ok_or_else(|| StoreError::NotFound(oid.to_string()))?;
        match dir.entries.get(image_name) {
            Some(id) if id == image_id => {
                dir.entries.remove(image_name);
                Ok(())
            }
            _ => Err(StoreError::NotFound(image_name.to_string())),
        }
    }

    async fn write_header(&self, oid: &str, header: ImageHeader) -> Result<(), StoreError> {
        self.take_fault(StoreOp::WriteHeader, oid)?;
        match self.objects.entry(oid.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(oid.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(MemObject {
                    header: Some(header),
                    ..MemObject::default()
                });
                Ok(())
            }
        }
    }

    async fn set_stripe_shape(
        &self,
        oid: &str,
        stripe_unit: u64,
        stripe_count: u64,
    ) -> Result<(), StoreError> {
        self.take_fault(StoreOp::SetStripeShape, oid)?;
        let mut obj = self
            .objects
            .get_mut(oid)
            .ok_or_else(|| StoreError::NotFound(oid.to_string()))?;
        obj.stripe_shape = Some((stripe_unit, stripe_count));
        Ok(())
    }

    async fn object_map_resize(&self, oid: &str, object_count: u64) -> Result<(), StoreError> {
        self.take_fault(StoreOp::ObjectMapResize, oid)?;
        self.objects
            .entry(oid.to_string())
            .or_default()
            .object_map_len = Some(object_count);
        Ok(())
    }

    async fn mirror_mode_get(&self, oid: &str) -> Result<u32, StoreError> {
        self.take_fault(StoreOp::MirrorModeGet, oid)?;
        self.objects
            .get(oid)
            .and_then(|obj| obj.mirror_mode)
            .ok_or_else(|| StoreError::NotFound(oid.to_string()))
    }

    async fn mirror_image_get(&self, oid: &str, image_id: &str) -> Result<MirrorImage, StoreError> {
        self.take_fault(StoreOp::MirrorImageGet, oid)?;
        self.objects
            .get(oid)
            .and_then(|obj| obj.mirror_images.get(image_id).cloned())
            .ok_or_else(|| StoreError::NotFound(image_id.to_string()))
    }

    async fn mirror_image_set(
        &self,
        oid: &str,
        image_id: &str,
        image: MirrorImage,
    ) -> Result<(), StoreError> {
        self.take_fault(StoreOp::MirrorImageSet, oid)?;
        self.objects
            .entry(oid.to_string())
            .or_default()
            .mirror_images
            .insert(image_id.to_string(), image);
        Ok(())
    }
}
