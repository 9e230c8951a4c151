//! HTTP adapter for the remote row API
//!
//! Implements the `RemoteSource` port from `shelfsync-core` against a
//! PostgREST-style row API over HTTPS. The adapter owns the wire details
//! (URL construction, bearer auth, status-to-error mapping, row decoding)
//! so the engine never sees HTTP.

pub mod client;

pub use client::HttpRemoteSource;
