//! The authoritative per-image metadata record.

use crate::image::Features;

/// Contents of the per-image header object.
///
/// Written exclusively once during create; stripe parameters are persisted
/// separately when the shape is non-default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    /// Image size in bytes.
    pub size: u64,
    /// Base-2 log of the data object size.
    pub order: u8,
    /// Enabled feature bits.
    pub features: Features,
    /// Name prefix shared by all of this image's data objects.
    pub object_prefix: String,
    /// Numeric id of the data pool, when distinct from the metadata pool.
    pub data_pool_id: Option<i64>,
}
