//! # daq-payload - Pooled Buffers and Payload Dispatch for DAQ Records
//!
//! Binary records from detector readout pass through two layers: a
//! granular buffer pool that recycles the byte buffers records live in,
//! and a dispatcher that reads the 16-byte envelope of each record and
//! hands the bytes to the factory registered for its type code.
//!
//! ## Features
//!
//! - **Granular buffer pool**: capacities rounded to a fixed granule, one bucket per size
//! - **Bounded memory**: optional limits on cached and on outstanding bytes
//! - **Accounting**: per-bucket and global counters, balance checks for leak detection
//! - **Envelope dispatch**: type-code lookup through an injected registry
//! - **Composite records**: recursive decoding with per-element failure reports
//! - **Record streams**: framed readers and writers over any `Read`/`Write`
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │        RecordReader / RecordWriter               │
//! ├──────────────────────────────────────────────────┤
//! │   Dispatcher  ──►  TypeRegistry  ──►  Factories  │
//! │      │                                (standard, │
//! │      │                                 composite,│
//! │      ▼                                 custom)   │
//! │   BufferPool  ──►  Buckets (per capacity)        │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use daq_payload::{BufferPool, BufferPoolConfig, Dispatcher, TypeRegistry};
//!
//! let pool = Arc::new(BufferPool::new(BufferPoolConfig::default()).unwrap());
//! let dispatcher = Dispatcher::new(Arc::new(TypeRegistry::standard()))
//!     .with_pool(pool.clone());
//!
//! let buffer = pool.acquire(100).unwrap();
//! assert_eq!(buffer.capacity(), 128);
//! let _ = pool.release(buffer);
//! assert!(pool.is_balanced());
//! # let _ = dispatcher;
//! ```

// Core modules
pub mod error;
pub mod buffers;
pub mod payloads;

// Framed I/O over byte streams
pub mod stream;

// Main API re-exports
pub use error::{PayloadError, Result};
pub use buffers::{
    BucketStats, Buffer, BufferId, BufferPool, BufferPoolConfig, BufferPoolConfigBuilder,
    BufferPoolStats, ReleaseOutcome,
};
pub use payloads::{
    Composite, Dispatcher, DispatcherConfig, ElementFailure, Envelope, Payload, PayloadBody,
    PayloadFactory, PayloadType, RawFactory, TypeRegistry,
};
pub use stream::{RecordReader, RecordWriter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 0;
