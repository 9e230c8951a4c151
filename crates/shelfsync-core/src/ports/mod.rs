//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! sync engine. Ports are interfaces that the orchestration layer depends
//! on, but whose implementations live in adapter crates or in the host
//! application.
//!
//! ## Ports Overview
//!
//! - [`RemoteSource`] - Row-level read access to the authoritative remote
//! - [`AuthRefresher`] - External signal to refresh expired credentials
//! - [`BackgroundRuntime`] - OS background-task registration facility

pub mod auth;
pub mod background;
pub mod remote_source;

pub use auth::{AuthRefresher, NoopRefresher};
pub use background::{BackgroundCapability, BackgroundRuntime, TaskOutcome, TaskRegistration};
pub use remote_source::{RemoteError, RemoteRow, RemoteSource};
