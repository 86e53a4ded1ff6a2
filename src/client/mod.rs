// File: ./src/client/mod.rs
pub mod auth;
pub mod core;
pub mod memory;
pub mod service;
pub mod sync;

pub use crate::client::auth::AuthState;
pub use crate::client::core::RtmClient;
pub use crate::client::memory::MemoryService;
pub use crate::client::service::{RemoteList, RemoteTask, ServiceError, TaskService, Timeline};
pub use crate::client::sync::{Importer, SyncOutcome, SyncReport};
