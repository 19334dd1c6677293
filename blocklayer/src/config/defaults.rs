//! Default values for image-create configuration.

use crate::image::Features;

/// Default feature mask for new images.
pub const DEFAULT_FEATURES: Features = Features::LAYERING;

/// Default object size order (4 MiB objects).
pub const DEFAULT_ORDER: u8 = 22;

/// Default stripe unit; zero selects one object per stripe.
pub const DEFAULT_STRIPE_UNIT: u64 = 0;

/// Default stripe count; zero selects one object per stripe.
pub const DEFAULT_STRIPE_COUNT: u64 = 0;

/// Default journal object size order (16 MiB objects).
pub const DEFAULT_JOURNAL_ORDER: u8 = 24;

/// Default number of journal objects written round-robin.
pub const DEFAULT_JOURNAL_SPLAY_WIDTH: u8 = 4;

/// Whether new-pool validation (the directory stat and the self-managed
/// snapshot bootstrap) runs before creating an image.
pub const DEFAULT_VALIDATE_POOL: bool = true;
