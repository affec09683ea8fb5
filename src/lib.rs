//! # EsoxSolutions.ConnectionPool
//!
//! Bounded, thread-safe pool of reusable network connections.
//!
//! ## Features
//!
//! - Lock-free bounded idle queue with non-blocking get and release
//! - Overflow connections minted by a factory when the queue is empty
//! - Connections flagged unusable are destroyed instead of recycled
//! - Automatic return of connections via RAII (Drop trait)
//! - Graceful, idempotent shutdown
//! - Async acquisition with the factory run off the reactor
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_connpool::{ChannelPool, Connection};
//! use std::convert::Infallible;
//!
//! struct Conn(bool);
//!
//! impl Connection for Conn {
//!     type Error = Infallible;
//!     fn is_closed(&self) -> bool { self.0 }
//!     fn close(&mut self) -> Result<(), Infallible> { self.0 = true; Ok(()) }
//! }
//!
//! let pool = ChannelPool::new(1, 4, || Ok::<_, Infallible>(Conn(false))).unwrap();
//! {
//!     let conn = pool.get().unwrap();
//!     assert!(!conn.is_closed());
//!     // Connection automatically returned when `conn` goes out of scope
//! }
//! assert_eq!(pool.len(), 1);
//! ```

/// Tracing target for pool lifecycle events.
pub const TRACING_TARGET_POOL: &str = "esox_connpool::pool";

/// Tracing target for individual connection events.
pub const TRACING_TARGET_CONNECTION: &str = "esox_connpool::connection";

mod pool;
mod config;
mod connection;
mod metrics;
mod errors;

pub use pool::{ChannelPool, Factory, Pool};
pub use config::PoolConfiguration;
pub use connection::{Connection, PooledConnection};
pub use metrics::{PoolMetrics, MetricsExporter};
pub use errors::{BoxError, PoolError, PoolResult};
