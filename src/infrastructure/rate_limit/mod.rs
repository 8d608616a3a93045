//! Admission control for the model API
//!
//! Token buckets with lazy refill, composed into one limiter shared by all
//! workers of a session.

pub mod limiter;
pub mod token_bucket;

pub use limiter::RateLimiter;
pub use token_bucket::TokenBucket;
