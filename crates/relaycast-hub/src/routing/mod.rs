//! Routing: pattern matching, topology resolution, and blacklist filtering.

pub mod blacklist;
pub mod matcher;
pub mod router;

pub use matcher::PatternMatcher;
pub use router::Router;
