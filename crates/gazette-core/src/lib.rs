//! Core data types, topic parsing, units, and rollups for the greenhouse
//! sensor pipeline.
//!
//! Everything in here is pure: no I/O besides the tolerant readers in
//! [`files`], which downstream consumers use to load what the status daemon
//! wrote.

pub mod files;
pub mod rollups;
pub mod topic;
pub mod types;
pub mod units;

pub use files::*;
pub use rollups::*;
pub use topic::*;
pub use types::*;
pub use units::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidPayload(#[from] std::str::Utf8Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
