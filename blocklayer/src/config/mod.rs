//! Configuration consulted when normalizing create options.
//!
//! Every option a caller omits is filled from [`CreateDefaults`]; the
//! shipped [`Default`] values match what a fresh deployment would use.

mod defaults;

pub use defaults::*;

use crate::image::Features;

/// Deployment-level defaults for image creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDefaults {
    /// Feature mask applied when the caller supplies none.
    pub features: Features,
    /// Object size order applied when the caller supplies none (or zero).
    pub order: u8,
    /// Stripe unit applied when the caller supplies none (or zero).
    pub stripe_unit: u64,
    /// Stripe count applied when the caller supplies none (or zero).
    pub stripe_count: u64,
    /// Journal object size order.
    pub journal_order: u8,
    /// Journal splay width.
    pub journal_splay_width: u8,
    /// Pool holding journal objects, when distinct from the metadata pool.
    pub journal_pool: Option<String>,
    /// Pool holding data objects, when distinct from the metadata pool.
    pub data_pool: Option<String>,
    /// Whether to run new-pool validation before creating an image.
    pub validate_pool: bool,
}

impl Default for CreateDefaults {
    fn default() -> Self {
        Self {
            features: DEFAULT_FEATURES,
            order: DEFAULT_ORDER,
            stripe_unit: DEFAULT_STRIPE_UNIT,
            stripe_count: DEFAULT_STRIPE_COUNT,
            journal_order: DEFAULT_JOURNAL_ORDER,
            journal_splay_width: DEFAULT_JOURNAL_SPLAY_WIDTH,
            journal_pool: None,
            data_pool: None,
            validate_pool: DEFAULT_VALIDATE_POOL,
        }
    }
}

impl CreateDefaults {
    /// Sets the default feature mask.
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Sets the default object size order.
    pub fn with_order(mut self, order: u8) -> Self {
        self.order = order;
        self
    }

    /// Sets the default data pool.
    pub fn with_data_pool(mut self, pool: impl Into<String>) -> Self {
        self.data_pool = Some(pool.into());
        self
    }

    /// Enables or disables new-pool validation.
    pub fn with_validate_pool(mut self, validate_pool: bool) -> Self {
        self.validate_pool = validate_pool;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = CreateDefaults::default();
        assert_eq!(defaults.features, Features::LAYERING);
        assert_eq!(defaults.order, 22);
        assert_eq!(defaults.stripe_unit, 0);
        assert_eq!(defaults.stripe_count, 0);
        assert_eq!(defaults.journal_order, 24);
        assert_eq!(defaults.journal_splay_width, 4);
        assert!(defaults.validate_pool);
    }

    #[test]
    fn test_builder_setters() {
        let defaults = CreateDefaults::default()
            .with_features(Features::LAYERING | Features::EXCLUSIVE_LOCK)
            .with_order(20)
            .with_data_pool("fast-ssd")
            .with_validate_pool(false);

        assert!(defaults.features.contains(Features::EXCLUSIVE_LOCK));
        assert_eq!(defaults.order, 20);
        assert_eq!(defaults.data_pool.as_deref(), Some("fast-ssd"));
        assert!(!defaults.validate_pool);
    }
}
