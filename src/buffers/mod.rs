//! Buffer management and granular pooling
//!
//! Buffers are handed out with capacities rounded up to a configured
//! granularity and cached by exact capacity when returned.

pub mod bucket;
pub mod buffer;
pub mod config;
pub mod pool;
pub mod stats;

// Re-export main types
pub use bucket::Bucket;
pub use buffer::{Buffer, BufferId};
pub use config::{BufferPoolConfig, BufferPoolConfigBuilder, DEFAULT_GRANULARITY};
pub use pool::{BufferPool, ReleaseOutcome};
pub use stats::{next_buffer_sequence, BucketStats, BufferPoolStats};
