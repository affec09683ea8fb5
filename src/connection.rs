//! Provider connection contract and the pool-aware wrapper handed to callers

use crate::errors::{PoolError, PoolResult};
use crate::metrics::MetricsTracker;
use crate::pool::Shared;
use crate::TRACING_TARGET_CONNECTION;

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;
use tracing::{debug, warn};

/// A provider connection managed by the pool
///
/// The pool never looks inside the connection: it only asks whether it is
/// still open and closes it when it will not be reused. Factories must hand
/// out connections that are fully established.
///
/// # Examples
///
/// ```
/// use esox_connpool::Connection;
/// use std::io;
/// use std::net::{Shutdown, TcpStream};
///
/// struct Tcp {
///     stream: TcpStream,
///     closed: bool,
/// }
///
/// impl Connection for Tcp {
///     type Error = io::Error;
///
///     fn is_closed(&self) -> bool {
///         self.closed
///     }
///
///     fn close(&mut self) -> io::Result<()> {
///         self.closed = true;
///         self.stream.shutdown(Shutdown::Both)
///     }
/// }
/// ```
pub trait Connection: Send + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the connection has been closed, locally or by the peer
    fn is_closed(&self) -> bool;

    /// Close the connection and release its resources
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Close a connection that will not be reused, logging rather than
/// surfacing a failure.
pub(crate) fn close_quietly<C: Connection>(conn: &mut C, reason: &'static str) {
    if conn.is_closed() {
        return;
    }
    if let Err(error) = conn.close() {
        warn!(
            target: TRACING_TARGET_CONNECTION,
            reason,
            error = %error,
            "Failed to close connection"
        );
    }
}

/// A connection borrowed from a [`ChannelPool`](crate::ChannelPool)
///
/// Releasing the handle with [`close`](Self::close), or dropping it, hands the
/// connection back to its pool. A handle flagged with
/// [`mark_unusable`](Self::mark_unusable) is destroyed instead.
///
/// The handle only holds a weak reference to the pool: it never keeps a
/// pool alive, and a handle outliving its pool closes the connection on
/// release.
pub struct PooledConnection<C: Connection> {
    conn: Option<C>,
    pool: Weak<Shared<C>>,
    unusable: Mutex<bool>,
}

impl<C: Connection> PooledConnection<C> {
    pub(crate) fn new(conn: C, pool: Weak<Shared<C>>) -> Self {
        Self {
            conn: Some(conn),
            pool,
            unusable: Mutex::new(false),
        }
    }

    /// Release the connection
    ///
    /// An unusable, still-open connection is closed and never re-enters the
    /// pool. Anything else goes back to the pool, which either keeps it idle
    /// or closes it when full or stopped.
    ///
    /// # Errors
    ///
    /// - [`PoolError::ConnectionClosed`] if the provider connection is
    ///   already closed
    /// - [`PoolError::PoolUnavailable`] if the pool no longer exists; the
    ///   connection is closed first
    pub fn close(mut self) -> PoolResult<()> {
        self.release()
    }

    /// Flag the connection so that releasing it destroys it
    pub fn mark_unusable(&self) {
        *self.unusable.lock() = true;
    }

    pub fn is_unusable(&self) -> bool {
        *self.unusable.lock()
    }

    /// Detach the provider connection from the pool permanently
    ///
    /// The connection is neither recycled nor closed; the caller owns it.
    pub fn into_inner(mut self) -> C {
        self.conn.take().expect("Connection already released")
    }

    fn release(&mut self) -> PoolResult<()> {
        let unusable = self.unusable.lock();
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        if *unusable && !conn.is_closed() {
            close_quietly(&mut conn, "marked unusable");
            if let Some(pool) = self.pool.upgrade() {
                MetricsTracker::record(&pool.metrics.total_destroyed);
            }
            debug!(target: TRACING_TARGET_CONNECTION, "Destroyed unusable connection");
            return Ok(());
        }

        match self.pool.upgrade() {
            Some(pool) => pool.put(conn),
            None => {
                close_quietly(&mut conn, "pool dropped");
                Err(PoolError::PoolUnavailable)
            }
        }
    }
}

impl<C: Connection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("Connection already released")
    }
}

impl<C: Connection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("Connection already released")
    }
}

impl<C: Connection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if self.conn.is_none() {
            return;
        }
        if let Err(error) = self.release() {
            debug!(
                target: TRACING_TARGET_CONNECTION,
                error = %error,
                "Connection release on drop failed"
            );
        }
    }
}

impl<C: Connection + fmt::Debug> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .field("unusable", &*self.unusable.lock())
            .finish()
    }
}
