//! Image metadata model and the create transaction.
//!
//! An image is a logical block device stored as a collection of fixed-size
//! objects in a pool. This module owns the image-side vocabulary (features,
//! layout, header, options) and the [`CreateImageRequest`] pipeline that
//! materializes a new image's metadata scaffolding.

mod create;
mod error;
mod features;
mod header;
mod layout;
mod options;
pub mod validate;

pub use create::CreateImageRequest;
pub use error::{CreateError, ErrorKind};
pub use features::Features;
pub use header::ImageHeader;
pub use layout::{ImageLayout, MAX_OBJECT_MAP_OBJECT_COUNT};
pub use options::ImageOptions;
