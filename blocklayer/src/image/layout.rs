//! Data layout of an image: object size and stripe shape.
//!
//! An image's bytes are striped across fixed-size objects. The default
//! shape is one object per stripe (`stripe_unit == object_size`,
//! `stripe_count == 1`); anything else requires the `STRIPINGV2` feature.

/// Upper bound on the number of entries an object map can represent.
///
/// Images whose layout would require more data objects than this cannot
/// enable the `OBJECT_MAP` feature.
pub const MAX_OBJECT_MAP_OBJECT_COUNT: u64 = 256_000_000;

/// Effective data layout of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Size of each data object in bytes (`2^order`).
    pub object_size: u64,
    /// Bytes written to one object before moving to the next in the stripe.
    pub stripe_unit: u64,
    /// Number of objects a stripe spans.
    pub stripe_count: u64,
}

impl ImageLayout {
    /// Builds the effective layout from an order and the (possibly zero)
    /// stripe parameters. Zero stripe parameters select the default
    /// one-object-per-stripe shape.
    pub fn new(order: u8, stripe_unit: u64, stripe_count: u64) -> Self {
        let object_size = 1u64 << order;
        if stripe_unit == 0 || stripe_count == 0 {
            ImageLayout {
                object_size,
                stripe_unit: object_size,
                stripe_count: 1,
            }
        } else {
            ImageLayout {
                object_size,
                stripe_unit,
                stripe_count,
            }
        }
    }

    /// Bytes covered by one full pass over the stripe.
    #[inline]
    pub fn period(&self) -> u64 {
        self.object_size * self.stripe_count
    }

    /// Number of data objects needed to hold `size` bytes under this
    /// layout.
    ///
    /// A full period fills all `stripe_count` objects; a partial tail only
    /// touches the objects its stripes reach.
    pub fn num_objects(&self, size: u64) -> u64 {
        let period = self.period();
        let num_periods = size.div_ceil(period);
        let tail = size % period;

        let mut unreached = 0;
        if tail > 0 && tail < self.stripe_unit * self.stripe_count {
            unreached = self.stripe_count - tail.div_ceil(self.stripe_unit);
        }
        num_periods * self.stripe_count - unreached
    }

    /// Whether an image of `size` bytes can be tracked by an object map
    /// under this layout.
    pub fn fits_object_map(&self, size: u64) -> bool {
        self.num_objects(size) <= MAX_OBJECT_MAP_OBJECT_COUNT
    }
}
