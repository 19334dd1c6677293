//! Object store client abstraction.
//!
//! The create pipeline never talks to a concrete cluster directly; it goes
//! through the [`ObjectStore`] trait, which models the slice of a
//! distributed object store the image metadata needs: named-object
//! stat/create/remove, the typed per-object operations (directory, header,
//! object map, mirror registry), and self-managed snapshot allocation.
//!
//! Keeping the store behind a trait lets tests drive the pipeline against
//! the in-memory [`MemoryStore`] with injected faults, and lets embedders
//! plug in a real cluster client without touching the pipeline.

mod error;
mod memory;
mod names;

pub use error::StoreError;
pub use memory::{MemoryStore, StoreOp};
pub use names::{
    data_object_prefix, header_object_name, id_object_name, object_map_name, DATA_OBJECT_PREFIX,
    DIRECTORY_OBJECT, MIRROR_REGISTRY_OBJECT, NO_SNAPSHOT,
};

use std::future::Future;

use bytes::Bytes;

use crate::image::ImageHeader;
use crate::mirror::MirrorImage;

/// Asynchronous client handle for a single metadata pool.
///
/// All operations are strictly per-object and complete independently; the
/// pipeline serializes them itself. Implementations must be cheap to share
/// (`Arc`) so a request's handle outlives the caller's.
pub trait ObjectStore: Send + Sync + 'static {
    /// Name of the pool this handle is bound to.
    fn pool_name(&self) -> &str;

    /// Numeric id of the pool this handle is bound to.
    fn pool_id(&self) -> i64;

    /// Resolves a pool name to its numeric id.
    ///
    /// Returns [`StoreError::NoSuchPool`] if no pool has that name.
    fn lookup_pool(&self, name: &str) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Stats a named object, returning its size in bytes.
    fn stat(&self, oid: &str) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Creates a named object exclusively with the given payload.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the object is present.
    fn create_exclusive(
        &self,
        oid: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes a named object.
    fn remove(&self, oid: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Allocates a self-managed snapshot id, switching the pool into
    /// self-managed snapshot mode if it was not already.
    fn selfmanaged_snap_create(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Releases a previously allocated self-managed snapshot id.
    fn selfmanaged_snap_remove(
        &self,
        snap_id: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Exclusively creates the per-image id object and records the image id
    /// in it.
    fn write_image_id(
        &self,
        oid: &str,
        image_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds an `(image_name -> image_id)` entry to a directory object,
    /// creating the object if needed.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the name is taken.
    fn directory_add(
        &self,
        oid: &str,
        image_name: &str,
        image_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes the `(image_name, image_id)` entry from a directory object.
    fn directory_remove(
        &self,
        oid: &str,
        image_name: &str,
        image_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Exclusively creates a header object with the image's authoritative
    /// metadata record.
    fn write_header(
        &self,
        oid: &str,
        header: ImageHeader,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Persists explicit stripe parameters on an existing header object.
    fn set_stripe_shape(
        &self,
        oid: &str,
        stripe_unit: u64,
        stripe_count: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Initializes (or resizes) an object map to the given number of
    /// entries, all in the NONEXISTENT state.
    fn object_map_resize(
        &self,
        oid: &str,
        object_count: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads the pool-level mirror mode as its raw on-wire value.
    ///
    /// Returns [`StoreError::NotFound`] if the registry object does not
    /// exist or carries no mode yet. Decoding the raw value is the
    /// caller's job so unknown values can be rejected explicitly.
    fn mirror_mode_get(&self, oid: &str) -> impl Future<Output = Result<u32, StoreError>> + Send;

    /// Reads the mirror registration for an image id.
    ///
    /// Returns [`StoreError::NotFound`] if the image has no registration.
    fn mirror_image_get(
        &self,
        oid: &str,
        image_id: &str,
    ) -> impl Future<Output = Result<MirrorImage, StoreError>> + Send;

    /// Upserts the mirror registration for an image id.
    fn mirror_image_set(
        &self,
        oid: &str,
        image_id: &str,
        image: MirrorImage,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
