//! Pure validation of normalized create options.
//!
//! These checks run before the pipeline issues any cluster operation, so a
//! rejected request leaves no trace. The data-pool check needs the store
//! and lives with the pipeline.

use crate::image::{CreateError, Features, ImageLayout};

/// Smallest supported object size order (4 KiB objects).
pub const MIN_ORDER: u8 = 12;

/// Largest supported object size order (32 MiB objects).
pub const MAX_ORDER: u8 = 25;

/// Checks the feature mask for unknown bits and dependency violations.
///
/// # Panics
///
/// Panics if `force_non_primary` is set without `JOURNALING`: a
/// replication-target create without a journal is a caller bug, not a user
/// error.
pub fn validate_features(features: Features, force_non_primary: bool) -> Result<(), CreateError> {
    let unknown = features.unknown();
    if !unknown.is_empty() {
        return Err(CreateError::UnsupportedFeatures(unknown.bits()));
    }
    if features.contains(Features::FAST_DIFF) && !features.contains(Features::OBJECT_MAP) {
        return Err(CreateError::FeatureDependency(
            "cannot use fast diff without object map",
        ));
    }
    if features.contains(Features::OBJECT_MAP) && !features.contains(Features::EXCLUSIVE_LOCK) {
        return Err(CreateError::FeatureDependency(
            "cannot use object map without exclusive lock",
        ));
    }
    if features.contains(Features::JOURNALING) {
        if !features.contains(Features::EXCLUSIVE_LOCK) {
            return Err(CreateError::FeatureDependency(
                "cannot use journaling without exclusive lock",
            ));
        }
    } else {
        assert!(
            !force_non_primary,
            "non-primary image create requires journaling"
        );
    }
    Ok(())
}

/// Checks that the object size order is within the supported range.
pub fn validate_order(order: u8) -> Result<(), CreateError> {
    if !(MIN_ORDER..=MAX_ORDER).contains(&order) {
        return Err(CreateError::OrderOutOfRange(order));
    }
    Ok(())
}

/// Checks the raw striping parameters against the object size.
pub fn validate_striping(order: u8, stripe_unit: u64, stripe_count: u64) -> Result<(), CreateError> {
    if (stripe_unit != 0) != (stripe_count != 0) {
        return Err(CreateError::UnpairedStriping);
    }
    if stripe_unit != 0 {
        let object_size = 1u64 << order;
        if stripe_unit > object_size || object_size % stripe_unit != 0 {
            return Err(CreateError::InvalidStripeUnit {
                stripe_unit,
                object_size,
            });
        }
    }
    Ok(())
}

/// Checks that the image fits the object map's representational limit.
///
/// Only meaningful when `OBJECT_MAP` is requested, but cheap enough to run
/// unconditionally: an image too large to ever enable the object map is
/// rejected up front.
pub fn validate_layout(layout: &ImageLayout, size: u64) -> Result<(), CreateError> {
    if !layout.fits_object_map(size) {
        return Err(CreateError::ObjectMapTooLarge { size });
    }
    Ok(())
}
