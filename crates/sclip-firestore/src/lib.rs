//! Firestore REST API client.
//!
//! This crate provides:
//! - The record repository: claim, commit, failure bookkeeping
//! - Service account authentication via gcp_auth
//! - Local emulator support
//! - Request metrics and tracing spans

pub mod client;
pub mod error;
pub mod metrics;
pub mod records;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use records::{document_to_record, RecordRepository, DEFAULT_COLLECTION};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
