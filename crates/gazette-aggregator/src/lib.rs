//! Streaming sensor aggregator
//!
//! Validates incoming readings, keeps a bounded 24h history per sensor key,
//! derives min/max statistics, and persists snapshots with throttled atomic
//! writes plus a crash-recovery cache and a monthly long-term log.

pub mod aggregator;
pub mod buffer;
pub mod cache;
pub mod longterm;
pub mod persist;
pub mod settings;
pub mod validate;

pub use aggregator::*;
pub use buffer::*;
pub use cache::*;
pub use longterm::*;
pub use persist::*;
pub use settings::*;
pub use validate::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;
