// Library for the binary and tests

pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod series;
pub mod snapshot;
pub mod sync_loop;

pub use error::{ErrorKind, SyncError};
pub use sync_loop::{Handlers, SyncEvent, SyncLoop, SyncState};
