pub mod identity;
pub mod report;
pub mod search;

/// Error type used across the repository and capability traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
