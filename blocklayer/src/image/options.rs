//! Caller-supplied image creation options and their normalization.
//!
//! Every field is optional; absent fields (and zero geometry values) are
//! filled from [`CreateDefaults`]. Normalization also derives the
//! `DATA_POOL` and `STRIPINGV2` bits, which callers cannot set directly in
//! a way that survives resolution.

use crate::config::CreateDefaults;
use crate::image::Features;
use crate::journal::JournalParams;

/// Options accepted by an image-create request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions {
    /// Full feature mask; absent means "use the configured default mask".
    pub features: Option<Features>,
    /// Bits to add on top of the base mask.
    pub features_set: Features,
    /// Bits to clear from the base mask.
    pub features_clear: Features,
    /// Stripe unit in bytes; absent or zero selects the default.
    pub stripe_unit: Option<u64>,
    /// Stripe count; absent or zero selects the default.
    pub stripe_count: Option<u64>,
    /// Object size order; absent or zero selects the default.
    pub order: Option<u8>,
    /// Journal object size order.
    pub journal_order: Option<u8>,
    /// Journal splay width.
    pub journal_splay_width: Option<u8>,
    /// Journal pool name.
    pub journal_pool: Option<String>,
    /// Data pool name.
    pub data_pool: Option<String>,
}

impl ImageOptions {
    /// Sets the full feature mask.
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = Some(features);
        self
    }

    /// Adds feature bits on top of the base mask.
    pub fn with_features_set(mut self, features: Features) -> Self {
        self.features_set = features;
        self
    }

    /// Clears feature bits from the base mask.
    pub fn with_features_clear(mut self, features: Features) -> Self {
        self.features_clear = features;
        self
    }

    /// Sets explicit striping parameters.
    pub fn with_striping(mut self, stripe_unit: u64, stripe_count: u64) -> Self {
        self.stripe_unit = Some(stripe_unit);
        self.stripe_count = Some(stripe_count);
        self
    }

    /// Sets the object size order.
    pub fn with_order(mut self, order: u8) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the data pool name.
    pub fn with_data_pool(mut self, pool: impl Into<String>) -> Self {
        self.data_pool = Some(pool.into());
        self
    }

    /// Sets the journal geometry.
    pub fn with_journal(mut self, order: u8, splay_width: u8, pool: Option<String>) -> Self {
        self.journal_order = Some(order);
        self.journal_splay_width = Some(splay_width);
        self.journal_pool = pool;
        self
    }

    /// Normalizes these options against the configured defaults.
    ///
    /// `metadata_pool` is the pool the image's metadata will live in; a
    /// data pool naming the same pool is meaningless and is erased.
    pub(crate) fn resolve(&self, defaults: &CreateDefaults, metadata_pool: &str) -> ResolvedOptions {
        let mut features = self.features.unwrap_or(defaults.features);

        // Bits both set and cleared cancel; neither side wins.
        let conflict = self.features_set.intersection(self.features_clear);
        features |= self.features_set.difference(conflict);
        features.remove(self.features_clear.difference(conflict));

        let stripe_unit = match self.stripe_unit {
            Some(unit) if unit != 0 => unit,
            _ => defaults.stripe_unit,
        };
        let stripe_count = match self.stripe_count {
            Some(count) if count != 0 => count,
            _ => defaults.stripe_count,
        };
        let order = match self.order {
            Some(order) if order != 0 => order,
            _ => defaults.order,
        };

        let journal = JournalParams {
            order: self.journal_order.unwrap_or(defaults.journal_order),
            splay_width: self
                .journal_splay_width
                .unwrap_or(defaults.journal_splay_width),
            pool: self.journal_pool.clone().or_else(|| defaults.journal_pool.clone()),
        };

        let mut data_pool = self.data_pool.clone().or_else(|| defaults.data_pool.clone());
        match data_pool.as_deref() {
            Some(pool) if !pool.is_empty() && pool != metadata_pool => {
                features.insert(Features::DATA_POOL);
            }
            _ => {
                features.remove(Features::DATA_POOL);
                data_pool = None;
            }
        }

        let object_size = 1u64 << order;
        if (stripe_unit != 0 && stripe_unit != object_size)
            || (stripe_count != 0 && stripe_count != 1)
        {
            features.insert(Features::STRIPINGV2);
        } else {
            features.remove(Features::STRIPINGV2);
        }

        ResolvedOptions {
            features,
            order,
            stripe_unit,
            stripe_count,
            journal,
            data_pool,
        }
    }
}

/// Options after defaults have been applied and derived bits computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedOptions {
    pub features: Features,
    pub order: u8,
    pub stripe_unit: u64,
    pub stripe_count: u64,
    pub journal: JournalParams,
    pub data_pool: Option<String>,
}
