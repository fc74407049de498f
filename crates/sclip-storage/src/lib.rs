//! S3-compatible object storage for published clips.
//!
//! This crate provides:
//! - Spaces client configuration from the environment
//! - Public-read clip uploads
//! - Object key and public URL construction
//! - Connectivity checks for startup

pub mod client;
pub mod error;
pub mod publish;

pub use client::{SpacesClient, SpacesConfig};
pub use error::{StorageError, StorageResult};
pub use publish::{content_type_for, object_key, publish_clip, PublishedObject};
