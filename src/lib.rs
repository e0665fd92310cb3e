//! Data core of the crimes-stance dashboard: dataset loading, temporal
//! aggregation, bootstrap-interval comparison and soft timeouts.

pub mod aggregate;
pub mod assets;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod manifest;
pub mod overview;
pub mod preferences;
pub mod record;
pub mod significance;
pub mod timeout;

pub use error::{ErrorKind, LoadError, LoadResult};
