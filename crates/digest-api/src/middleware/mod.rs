//! Tower middleware for the read API.

pub mod rate_limit;

pub use rate_limit::RateLimitLayer;
