//! Image feature bits.
//!
//! Features are a fixed vocabulary of capability bits recorded in the image
//! header. Some are requested by the caller, some are derived during option
//! resolution (`DATA_POOL`, `STRIPINGV2`), and several imply one another;
//! the dependency rules are enforced by the create-time validators.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A set of image feature bits.
///
/// Bits outside [`Features::ALL`] are representable (so a caller's bogus
/// request can be carried to the validator and rejected) but never valid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Features(u64);

impl Features {
    /// No features.
    pub const NONE: Features = Features(0);
    /// Copy-on-write cloning from a parent image.
    pub const LAYERING: Features = Features(1 << 0);
    /// Non-default striping of data across objects.
    pub const STRIPINGV2: Features = Features(1 << 1);
    /// Cooperative exclusive ownership of the image.
    pub const EXCLUSIVE_LOCK: Features = Features(1 << 2);
    /// Per-object allocation tracking.
    pub const OBJECT_MAP: Features = Features(1 << 3);
    /// Snapshot diffing backed by the object map.
    pub const FAST_DIFF: Features = Features(1 << 4);
    /// Flatten that also dissociates snapshots from the parent.
    pub const DEEP_FLATTEN: Features = Features(1 << 5);
    /// Append-only modification journal.
    pub const JOURNALING: Features = Features(1 << 6);
    /// Data objects live in a separate pool from the metadata.
    pub const DATA_POOL: Features = Features(1 << 7);

    /// Every feature this crate understands.
    pub const ALL: Features = Features((1 << 8) - 1);

    /// Builds a feature set from raw bits, keeping unknown bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Features {
        Features(bits)
    }

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if every bit in `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bits are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bits in `self` that are not in `other`.
    #[inline]
    pub const fn difference(self, other: Features) -> Features {
        Features(self.0 & !other.0)
    }

    /// Bits common to `self` and `other`.
    #[inline]
    pub const fn intersection(self, other: Features) -> Features {
        Features(self.0 & other.0)
    }

    /// Adds the bits of `other` to `self`.
    #[inline]
    pub fn insert(&mut self, other: Features) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other` from `self`.
    #[inline]
    pub fn remove(&mut self, other: Features) {
        self.0 &= !other.0;
    }

    /// Bits set in `self` that are outside the known vocabulary.
    #[inline]
    pub const fn unknown(self) -> Features {
        self.difference(Features::ALL)
    }
}

impl BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

impl BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Features) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Features {
    type Output = Features;

    fn bitand(self, rhs: Features) -> Features {
        Features(self.0 & rhs.0)
    }
}

impl fmt::Debug for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Features, &str); 8] = [
            (Features::LAYERING, "LAYERING"),
            (Features::STRIPINGV2, "STRIPINGV2"),
            (Features::EXCLUSIVE_LOCK, "EXCLUSIVE_LOCK"),
            (Features::OBJECT_MAP, "OBJECT_MAP"),
            (Features::FAST_DIFF, "FAST_DIFF"),
            (Features::DEEP_FLATTEN, "DEEP_FLATTEN"),
            (Features::JOURNALING, "JOURNALING"),
            (Features::DATA_POOL, "DATA_POOL"),
        ];

        let mut first = true;
        write!(f, "Features(")?;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        let unknown = self.unknown();
        if !unknown.is_empty() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{:#x}", unknown.bits())?;
            first = false;
        }
        if first {
            write!(f, "NONE")?;
        }
        write!(f, ")")
    }
}
