//! blocklayer - block-device image metadata for distributed object stores
//!
//! This library materializes the metadata scaffolding of a block-device
//! image inside a distributed object store: the id record, directory
//! entry, header, striping parameters, object map, journal, and mirror
//! registration, created as a single all-or-nothing transaction.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use blocklayer::config::CreateDefaults;
//! use blocklayer::image::{CreateImageRequest, ImageOptions};
//! use blocklayer::journal::StoreJournaler;
//! use blocklayer::mirror::BroadcastNotifier;
//! use blocklayer::store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new("vms", 1));
//! let journaler = Arc::new(StoreJournaler::new(Arc::clone(&store)));
//! let notifier = Arc::new(BroadcastNotifier::default());
//!
//! let request = CreateImageRequest::new(
//!     store, journaler, notifier,
//!     &CreateDefaults::default(),
//!     "vm-disk", "img-0001", 10 << 30,
//!     &ImageOptions::default(),
//! );
//! request.send().await?;
//! ```
//!
//! Either the image exists with all requested scaffolding afterwards, or
//! no trace of it remains: any mid-pipeline failure unwinds every prior
//! step and reports the original error.

pub mod config;
pub mod image;
pub mod journal;
pub mod logging;
pub mod mirror;
pub mod store;

/// Version of the blocklayer library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
