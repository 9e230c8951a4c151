//! Shelfsync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core of the shelfsync
//! engine:
//! - **Domain types** - `SyncCursor`, `TableDescriptor`, `TableSyncReport`
//! - **Port definitions** - Traits for adapters: `RemoteSource`,
//!   `AuthRefresher`, `BackgroundRuntime`
//! - **Configuration** - Typed config structs loaded from YAML
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O dependencies.
//! Ports define trait interfaces that adapter crates implement
//! (`shelfsync-store` for persistence, `shelfsync-remote` for the row API).
//! The orchestration layer in `shelfsync-engine` drives domain types through
//! port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
