//! The image-create transaction.
//!
//! Creating an image is not a single write: the id object, directory entry,
//! header, striping parameters, object map, journal, and mirror
//! registration are laid down in a prescribed order, and any failure
//! unwinds every prior step so the pool looks exactly as it did before the
//! attempt.
//!
//! [`CreateImageRequest`] is a single-shot request object. It normalizes
//! and validates its options at construction and in [`send`], then drives
//! the forward pipeline; each step issues exactly one asynchronous store
//! operation. On a forward failure the request enters the compensating
//! rollback pipeline, which is best-effort (a cleanup failure is logged and
//! the next step still runs) and always reports the *original* forward
//! error to the caller.
//!
//! ```text
//! validate -> pool check -> id object -> directory entry -> header
//!   -> stripe shape -> object map -> mirror mode -> journal
//!   -> mirror registration -> watcher notify -> done
//!
//! rollback (entered at the failing step's designated entry):
//!   remove journal -> remove object map -> remove header
//!     -> remove directory entry -> remove id object -> report saved error
//! ```
//!
//! Consuming `self` in [`send`](CreateImageRequest::send) is what makes the
//! completion single-shot: the request cannot be re-driven, and the outcome
//! is delivered exactly once.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::CreateDefaults;
use crate::image::validate::{
    validate_features, validate_layout, validate_order, validate_striping,
};
use crate::image::{CreateError, Features, ImageHeader, ImageLayout, ImageOptions};
use crate::journal::{JournalParams, JournalTagData, Journaler, LOCAL_MIRROR_UUID};
use crate::mirror::{MirrorImage, MirrorImageState, MirrorMode, MirrorNotifier};
use crate::store::{
    data_object_prefix, header_object_name, id_object_name, object_map_name, ObjectStore,
    DIRECTORY_OBJECT, MIRROR_REGISTRY_OBJECT, NO_SNAPSHOT,
};

/// Rollback entry points, ordered by how much of the forward pipeline has
/// side-effected. Unwinding from an entry runs every step at or below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Unwind {
    /// Only the id object exists.
    IdObject,
    /// Id object and directory entry exist.
    Directory,
    /// Header exists (stripe/object-map writes only mutate it and the map).
    Header,
    /// Object map may exist.
    ObjectMap,
    /// Journal may exist.
    Journal,
}

/// A single-shot request that materializes a new image's metadata.
///
/// Construction normalizes the caller's options against the configured
/// defaults (merging set/clear bits, filling geometry, deriving the
/// `DATA_POOL` and `STRIPINGV2` bits); [`send`](Self::send) validates the
/// normalized request and drives the pipeline to completion or rollback.
pub struct CreateImageRequest<S, J, N>
where
    S: ObjectStore,
    J: Journaler,
    N: MirrorNotifier,
{
    store: Arc<S>,
    journaler: Arc<J>,
    notifier: Arc<N>,

    image_name: String,
    image_id: String,
    size: u64,

    features: Features,
    order: u8,
    stripe_unit: u64,
    stripe_count: u64,
    layout: ImageLayout,
    journal: JournalParams,
    data_pool: Option<String>,
    data_pool_id: Option<i64>,
    validate_pool: bool,

    non_primary_global_image_id: Option<String>,
    primary_mirror_uuid: Option<String>,
    force_non_primary: bool,

    id_obj: String,
    header_obj: String,
    objmap_obj: String,
}

impl<S, J, N> CreateImageRequest<S, J, N>
where
    S: ObjectStore,
    J: Journaler,
    N: MirrorNotifier,
{
    /// Builds a request for a locally-primary image.
    ///
    /// `image_id` must be cluster-unique; minting it is the caller's
    /// responsibility. The request holds its own clone of the store handle
    /// so its lifetime is independent of the caller's.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        journaler: Arc<J>,
        notifier: Arc<N>,
        defaults: &CreateDefaults,
        image_name: impl Into<String>,
        image_id: impl Into<String>,
        size: u64,
        options: &ImageOptions,
    ) -> Self {
        let image_name = image_name.into();
        let image_id = image_id.into();

        let resolved = options.resolve(defaults, store.pool_name());
        let layout = ImageLayout::new(resolved.order, resolved.stripe_unit, resolved.stripe_count);

        let id_obj = id_object_name(&image_name);
        let header_obj = header_object_name(&image_id);
        let objmap_obj = object_map_name(&image_id, NO_SNAPSHOT);

        debug!(
            name = %image_name,
            id = %image_id,
            size,
            features = ?resolved.features,
            order = resolved.order,
            stripe_unit = resolved.stripe_unit,
            stripe_count = resolved.stripe_count,
            journal_order = resolved.journal.order,
            journal_splay_width = resolved.journal.splay_width,
            journal_pool = resolved.journal.pool.as_deref(),
            data_pool = resolved.data_pool.as_deref(),
            "normalized image create request"
        );

        Self {
            store,
            journaler,
            notifier,
            image_name,
            image_id,
            size,
            features: resolved.features,
            order: resolved.order,
            stripe_unit: resolved.stripe_unit,
            stripe_count: resolved.stripe_count,
            layout,
            journal: resolved.journal,
            data_pool: resolved.data_pool,
            data_pool_id: None,
            validate_pool: defaults.validate_pool,
            non_primary_global_image_id: None,
            primary_mirror_uuid: None,
            force_non_primary: false,
            id_obj,
            header_obj,
            objmap_obj,
        }
    }

    /// Marks this image as a replication target of a remote primary.
    ///
    /// The image will reuse the primary's `global_image_id` and stamp the
    /// primary's mirror uuid into its journal tag, and the mirror
    /// registration is enabled regardless of the pool's mirror mode. The
    /// requested features must include `JOURNALING`.
    pub fn replica_of(
        mut self,
        non_primary_global_image_id: impl Into<String>,
        primary_mirror_uuid: impl Into<String>,
    ) -> Self {
        self.non_primary_global_image_id = Some(non_primary_global_image_id.into());
        self.primary_mirror_uuid = Some(primary_mirror_uuid.into());
        self.force_non_primary = true;
        self
    }

    /// Resolved feature mask this request will record in the header.
    pub fn features(&self) -> Features {
        self.features
    }

    /// Effective data layout of the image being created.
    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    /// Drives the request to completion.
    ///
    /// Validator failures return before any cluster side effect. Any
    /// pipeline failure rolls back every completed step and returns the
    /// original error; rollback failures are logged, never returned.
    pub async fn send(mut self) -> Result<(), CreateError> {
        self.validate().await?;
        self.validate_pool().await?;
        self.create_id_object().await?;

        match self.construct().await {
            Ok(()) => Ok(()),
            Err((entry, err)) => {
                self.unwind(entry, &err).await;
                Err(err)
            }
        }
    }

    /// Spawns the request onto the runtime, delivering the outcome through
    /// a oneshot channel.
    ///
    /// Dropping the receiver abandons the outcome but not the request: the
    /// pipeline (and any rollback) runs to completion regardless.
    pub fn dispatch(self) -> oneshot::Receiver<Result<(), CreateError>> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(self.send().await);
        });
        rx
    }

    /// Pre-pipeline validation: pure checks plus data-pool resolution.
    async fn validate(&mut self) -> Result<(), CreateError> {
        validate_features(self.features, self.force_non_primary)?;
        validate_order(self.order)?;
        validate_striping(self.order, self.stripe_unit, self.stripe_count)?;
        self.validate_data_pool().await?;
        validate_layout(&self.layout, self.size)?;
        Ok(())
    }

    /// Resolves the data pool name to its numeric id when `DATA_POOL` is
    /// in play.
    async fn validate_data_pool(&mut self) -> Result<(), CreateError> {
        if !self.features.contains(Features::DATA_POOL) {
            return Ok(());
        }
        // resolve() only sets DATA_POOL with a pool name present
        let pool = self.data_pool.clone().unwrap_or_default();
        match self.store.lookup_pool(&pool).await {
            Ok(pool_id) => {
                self.data_pool_id = Some(pool_id);
                Ok(())
            }
            Err(err) => {
                error!(pool = %pool, error = %err, "data pool does not exist");
                Err(CreateError::DataPoolMissing(pool))
            }
        }
    }

    /// Checks the pool is ready for images, bootstrapping self-managed
    /// snapshot mode on a fresh pool.
    async fn validate_pool(&self) -> Result<(), CreateError> {
        if !self.validate_pool {
            return Ok(());
        }
        debug!(image = %self.image_name, "validating pool");

        match self.store.stat(DIRECTORY_OBJECT).await {
            Ok(_) => return Ok(()),
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                error!(error = %err, "failed to stat image directory");
                return Err(err.into());
            }
        }

        // Fresh pool: allocate and immediately release one self-managed
        // snapshot id to lock the pool into self-managed snapshot mode.
        // This runs once per pool lifetime.
        let snap_id = self.store.selfmanaged_snap_create().await.map_err(|err| {
            error!(error = %err, "failed to allocate self-managed snapshot");
            err
        })?;

        if let Err(err) = self.store.selfmanaged_snap_remove(snap_id).await {
            // The pool already switched modes; the id leaks and that is
            // tolerated.
            warn!(snap_id, error = %err, "failed to release bootstrap snapshot");
        }
        Ok(())
    }

    /// Exclusively creates the id object binding name to id.
    async fn create_id_object(&self) -> Result<(), CreateError> {
        debug!(oid = %self.id_obj, "creating id object");
        self.store
            .write_image_id(&self.id_obj, &self.image_id)
            .await
            .map_err(|err| {
                error!(oid = %self.id_obj, error = %err, "error creating id object");
                err.into()
            })
    }

    /// Runs the steps past the point of no return. A failure carries the
    /// rollback entry point for the steps that have already side-effected.
    async fn construct(&mut self) -> Result<(), (Unwind, CreateError)> {
        self.add_to_directory()
            .await
            .map_err(|err| (Unwind::IdObject, err))?;
        self.create_header()
            .await
            .map_err(|err| (Unwind::Directory, err))?;
        self.set_stripe_unit_count()
            .await
            .map_err(|err| (Unwind::Header, err))?;
        self.object_map_resize()
            .await
            .map_err(|err| (Unwind::Header, err))?;

        if !self.features.contains(Features::JOURNALING) {
            debug!(image = %self.image_name, "image created");
            return Ok(());
        }

        let mirror_mode = self
            .fetch_mirror_mode()
            .await
            .map_err(|err| (Unwind::ObjectMap, err))?;
        self.journal_create()
            .await
            .map_err(|err| (Unwind::ObjectMap, err))?;

        if mirror_mode != MirrorMode::Pool && !self.force_non_primary {
            debug!(image = %self.image_name, "image created, mirroring not enabled");
            return Ok(());
        }

        let existing = self
            .fetch_mirror_image()
            .await
            .map_err(|err| (Unwind::Journal, err))?;
        if let Some(image) = &existing {
            if image.state == MirrorImageState::Enabled {
                debug!(
                    image = %self.image_name,
                    global_image_id = %image.global_image_id,
                    "mirroring already enabled"
                );
                return Ok(());
            }
        }

        let global_image_id = self
            .mirror_image_enable(existing)
            .await
            .map_err(|err| (Unwind::Journal, err))?;
        self.notify_watchers(&global_image_id).await;

        debug!(image = %self.image_name, "image created");
        Ok(())
    }

    /// Makes the image discoverable by name.
    async fn add_to_directory(&self) -> Result<(), CreateError> {
        debug!(name = %self.image_name, "adding image to directory");
        self.store
            .directory_add(DIRECTORY_OBJECT, &self.image_name, &self.image_id)
            .await
            .map_err(|err| {
                error!(name = %self.image_name, error = %err, "error adding image to directory");
                err.into()
            })
    }

    /// Exclusively creates the authoritative header record.
    async fn create_header(&self) -> Result<(), CreateError> {
        debug!(oid = %self.header_obj, "creating image header");

        let object_prefix = data_object_prefix(
            self.data_pool_id.map(|_| self.store.pool_id()),
            &self.image_id,
        );
        let header = ImageHeader {
            size: self.size,
            order: self.order,
            features: self.features,
            object_prefix,
            data_pool_id: self.data_pool_id,
        };

        self.store
            .write_header(&self.header_obj, header)
            .await
            .map_err(|err| {
                error!(oid = %self.header_obj, error = %err, "error writing header");
                err.into()
            })
    }

    /// Persists explicit stripe parameters; skipped for the default
    /// one-object-per-stripe shape.
    async fn set_stripe_unit_count(&self) -> Result<(), CreateError> {
        if (self.stripe_unit == 0 && self.stripe_count == 0)
            || (self.stripe_count == 1 && self.stripe_unit == self.layout.object_size)
        {
            return Ok(());
        }
        debug!(
            stripe_unit = self.stripe_unit,
            stripe_count = self.stripe_count,
            "setting stripe unit/count"
        );
        self.store
            .set_stripe_shape(&self.header_obj, self.stripe_unit, self.stripe_count)
            .await
            .map_err(|err| {
                error!(error = %err, "error setting stripe unit/count");
                err.into()
            })
    }

    /// Sizes the object map so every data object starts NONEXISTENT.
    async fn object_map_resize(&self) -> Result<(), CreateError> {
        if !self.features.contains(Features::OBJECT_MAP) {
            return Ok(());
        }
        let object_count = self.layout.num_objects(self.size);
        debug!(oid = %self.objmap_obj, object_count, "initializing object map");
        self.store
            .object_map_resize(&self.objmap_obj, object_count)
            .await
            .map_err(|err| {
                error!(error = %err, "error creating initial object map");
                err.into()
            })
    }

    /// Reads the pool-level mirror mode; an absent registry means
    /// mirroring was never provisioned.
    async fn fetch_mirror_mode(&self) -> Result<MirrorMode, CreateError> {
        debug!("fetching pool mirror mode");
        match self.store.mirror_mode_get(MIRROR_REGISTRY_OBJECT).await {
            Ok(raw) => MirrorMode::from_raw(raw).ok_or_else(|| {
                error!(raw, "unknown mirror mode on pool");
                CreateError::UnknownMirrorMode(raw)
            }),
            Err(err) if err.is_not_found() => Ok(MirrorMode::Disabled),
            Err(err) => {
                error!(error = %err, "failed to retrieve mirror mode");
                Err(err.into())
            }
        }
    }

    /// Provisions the journal, tagging entries with their owning
    /// mirror uuid.
    async fn journal_create(&self) -> Result<(), CreateError> {
        debug!(image = %self.image_name, "creating journal");

        let mirror_uuid = if self.force_non_primary {
            self.primary_mirror_uuid.clone().unwrap_or_default()
        } else {
            LOCAL_MIRROR_UUID.to_string()
        };
        let tag = JournalTagData { mirror_uuid };

        self.journaler
            .create(&self.image_id, &self.journal, &tag)
            .await
            .map_err(|err| {
                error!(error = %err, "error creating journal");
                err.into()
            })
    }

    /// Reads any existing mirror registration for this image id.
    async fn fetch_mirror_image(&self) -> Result<Option<MirrorImage>, CreateError> {
        debug!(image = %self.image_name, "fetching mirror image registration");
        match self
            .store
            .mirror_image_get(MIRROR_REGISTRY_OBJECT, &self.image_id)
            .await
        {
            Ok(image) => Ok(Some(image)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => {
                error!(error = %err, "cannot enable mirroring");
                Err(err.into())
            }
        }
    }

    /// Upserts the registration in the `Enabled` state, minting a
    /// fresh global image id for primaries.
    async fn mirror_image_enable(
        &self,
        existing: Option<MirrorImage>,
    ) -> Result<String, CreateError> {
        let global_image_id = match &self.non_primary_global_image_id {
            Some(id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };
        debug!(image = %self.image_name, global_image_id = %global_image_id, "enabling mirroring");

        let mut image = existing.unwrap_or_default();
        image.state = MirrorImageState::Enabled;
        image.global_image_id = global_image_id.clone();

        self.store
            .mirror_image_set(MIRROR_REGISTRY_OBJECT, &self.image_id, image)
            .await
            .map_err(|err| {
                error!(error = %err, "cannot enable mirroring");
                CreateError::from(err)
            })?;
        Ok(global_image_id)
    }

    /// Announces the registration change. Watchers cope with missed
    /// updates, so a failure is logged and the create still succeeds.
    async fn notify_watchers(&self, global_image_id: &str) {
        match self
            .notifier
            .image_updated(MirrorImageState::Enabled, &self.image_id, global_image_id)
            .await
        {
            Ok(()) => {
                debug!(global_image_id, "image mirroring is enabled");
            }
            Err(err) => {
                warn!(error = %err, "failed to send mirror update notification");
            }
        }
    }

    /// Best-effort rollback from the given entry point. Each step logs its
    /// own failure and the next step still runs; `cause` is only for the
    /// log record and is never replaced.
    async fn unwind(&self, entry: Unwind, cause: &CreateError) {
        warn!(
            image = %self.image_name,
            entry = ?entry,
            error = %cause,
            "image create failed, rolling back"
        );
        if entry >= Unwind::Journal {
            self.journal_remove().await;
        }
        if entry >= Unwind::ObjectMap {
            self.remove_object_map().await;
        }
        if entry >= Unwind::Header {
            self.remove_header_object().await;
        }
        if entry >= Unwind::Directory {
            self.remove_from_directory().await;
        }
        self.remove_id_object().await;
    }

    async fn journal_remove(&self) {
        if !self.features.contains(Features::JOURNALING) {
            return;
        }
        debug!(image = %self.image_name, "rollback: removing journal");
        if let Err(err) = self.journaler.remove(&self.image_id).await {
            error!(error = %err, "error cleaning up journal after creation failed");
        }
    }

    async fn remove_object_map(&self) {
        if !self.features.contains(Features::OBJECT_MAP) {
            return;
        }
        debug!(oid = %self.objmap_obj, "rollback: removing object map");
        if let Err(err) = self.store.remove(&self.objmap_obj).await {
            error!(error = %err, "error cleaning up object map after creation failed");
        }
    }

    async fn remove_header_object(&self) {
        debug!(oid = %self.header_obj, "rollback: removing header");
        if let Err(err) = self.store.remove(&self.header_obj).await {
            error!(error = %err, "error cleaning up image header after creation failed");
        }
    }

    async fn remove_from_directory(&self) {
        debug!(name = %self.image_name, "rollback: removing directory entry");
        if let Err(err) = self
            .store
            .directory_remove(DIRECTORY_OBJECT, &self.image_name, &self.image_id)
            .await
        {
            error!(error = %err, "error cleaning up directory entry after creation failed");
        }
    }

    async fn remove_id_object(&self) {
        debug!(oid = %self.id_obj, "rollback: removing id object");
        if let Err(err) = self.store.remove(&self.id_obj).await {
            error!(error = %err, "error cleaning up id object after creation failed");
        }
    }
}
