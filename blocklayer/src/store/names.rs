//! Well-known object names and per-image derived names.
//!
//! Every reader and writer of a pool agrees on these names; they are the
//! contract that makes an image discoverable without any central index
//! beyond the directory object itself.

/// Pool-wide directory object mapping image names to image ids.
pub const DIRECTORY_OBJECT: &str = "image_directory";

/// Pool-wide mirror registry object holding the mirror mode and the
/// per-image mirror registrations.
pub const MIRROR_REGISTRY_OBJECT: &str = "image_mirroring";

/// Prefix shared by all data-object names.
pub const DATA_OBJECT_PREFIX: &str = "image_data.";

/// Snapshot id denoting the live (non-snapshot) view of an image.
pub const NO_SNAPSHOT: u64 = u64::MAX;

/// Name of the per-image id object, keyed by the human-visible image name.
pub fn id_object_name(image_name: &str) -> String {
    format!("image_id.{image_name}")
}

/// Name of the per-image header object, keyed by the image id.
pub fn header_object_name(image_id: &str) -> String {
    format!("image_header.{image_id}")
}

/// Name of the per-image object map for the given snapshot view.
pub fn object_map_name(image_id: &str, snap_id: u64) -> String {
    if snap_id == NO_SNAPSHOT {
        format!("image_object_map.{image_id}")
    } else {
        format!("image_object_map.{image_id}.{snap_id}")
    }
}

/// Data-object name prefix recorded in the image header.
///
/// When the image keeps its data in a separate pool, the prefix embeds the
/// *metadata* pool id so data-object names remain unique across pools;
/// otherwise it is just the prefix literal and the image id.
pub fn data_object_prefix(metadata_pool_id: Option<i64>, image_id: &str) -> String {
    match metadata_pool_id {
        Some(pool_id) => format!("{DATA_OBJECT_PREFIX}{pool_id}.{image_id}"),
        None => format!("{DATA_OBJECT_PREFIX}{image_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_object_name() {
        assert_eq!(id_object_name("vm-disk"), "image_id.vm-disk");
    }

    #[test]
    fn test_header_object_name() {
        assert_eq!(header_object_name("abc123"), "image_header.abc123");
    }

    #[test]
    fn test_object_map_name_live_view() {
        assert_eq!(object_map_name("abc123", NO_SNAPSHOT), "image_object_map.abc123");
    }

    #[test]
    fn test_object_map_name_snapshot_view() {
        assert_eq!(object_map_name("abc123", 7), "image_object_map.abc123.7");
    }

    #[test]
    fn test_data_object_prefix_same_pool() {
        assert_eq!(data_object_prefix(None, "abc123"), "image_data.abc123");
    }

    #[test]
    fn test_data_object_prefix_separate_data_pool() {
        assert_eq!(data_object_prefix(Some(3), "abc123"), "image_data.3.abc123");
    }
}
