//! HTTP transport for the authoritative remote store.
//!
//! Implements the core `RemoteCollection` trait against the hosted REST API.

mod client;
mod error;

pub use client::{CollectionHandle, HttpRemoteStore};
pub use error::{RemoteStoreError, Result, RetryClass};
