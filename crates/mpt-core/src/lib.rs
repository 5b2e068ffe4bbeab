pub mod error;
pub mod portfolio;
pub mod types;

#[cfg(feature = "frontier")]
pub mod frontier;

#[cfg(feature = "frontier")]
pub mod allocation;

#[cfg(feature = "statistics")]
pub mod statistics;

pub use error::MptError;
pub use types::*;

/// Standard result type for all mpt operations
pub type MptResult<T> = Result<T, MptError>;
