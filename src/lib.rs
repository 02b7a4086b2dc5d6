pub mod compactor;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod limits;
pub mod model;
pub mod observability;
pub mod remote;
pub mod scheduler;
pub mod slots;
pub mod store;
pub mod wal;
pub mod wire;

pub use error::{Error, Result};
