//! Core connection pool implementation

use crate::config::PoolConfiguration;
use crate::connection::{close_quietly, Connection, PooledConnection};
use crate::errors::{BoxError, PoolError, PoolResult};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::TRACING_TARGET_POOL;

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Factory minting new provider connections
pub type Factory<C> = Arc<dyn Fn() -> Result<C, BoxError> + Send + Sync>;

/// Capability interface of a connection pool
///
/// Applications hold pool instances explicitly and pass them where they are
/// needed; there is no process-wide default pool.
pub trait Pool {
    type Connection;

    /// Borrow a connection
    fn get(&self) -> PoolResult<Self::Connection>;

    /// Shut the pool down, closing every idle connection
    fn stop(&self);

    /// Number of idle connections
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct PoolState<C> {
    idle: Arc<ArrayQueue<C>>,
    factory: Factory<C>,
}

enum Rejected<C> {
    Full(C),
    Stopped(C),
}

/// State shared between a pool and the connections it hands out
pub(crate) struct Shared<C: Connection> {
    name: String,
    max_capacity: usize,
    state: RwLock<Option<PoolState<C>>>,
    pub(crate) metrics: MetricsTracker,
}

impl<C: Connection> Shared<C> {
    fn snapshot(&self) -> Option<(Arc<ArrayQueue<C>>, Factory<C>)> {
        self.state
            .read()
            .as_ref()
            .map(|state| (Arc::clone(&state.idle), Arc::clone(&state.factory)))
    }

    fn create(&self, factory: &Factory<C>, context: &str) -> PoolResult<C> {
        match factory() {
            Ok(conn) => {
                MetricsTracker::record(&self.metrics.total_created);
                debug!(target: TRACING_TARGET_POOL, pool = %self.name, context, "Created connection");
                Ok(conn)
            }
            Err(source) => {
                MetricsTracker::record(&self.metrics.factory_failures);
                Err(PoolError::factory(context, source))
            }
        }
    }

    /// Return a released connection to the idle queue
    pub(crate) fn put(&self, conn: C) -> PoolResult<()> {
        if conn.is_closed() {
            return Err(PoolError::ConnectionClosed);
        }

        // The read lock is held across the push so `stop` cannot drain the
        // queue while a connection is being added to it.
        let guard = self.state.read();
        let outcome = match guard.as_ref() {
            Some(state) => state.idle.push(conn).map_err(Rejected::Full),
            None => Err(Rejected::Stopped(conn)),
        };
        drop(guard);

        match outcome {
            Ok(()) => {
                MetricsTracker::record(&self.metrics.total_returned);
                debug!(target: TRACING_TARGET_POOL, pool = %self.name, "Connection returned to idle queue");
            }
            Err(Rejected::Full(mut conn)) => {
                close_quietly(&mut conn, "idle queue full");
                MetricsTracker::record(&self.metrics.total_discarded);
                debug!(target: TRACING_TARGET_POOL, pool = %self.name, "Idle queue full, discarded connection");
            }
            Err(Rejected::Stopped(mut conn)) => {
                self.stop();
                close_quietly(&mut conn, "pool stopped");
                MetricsTracker::record(&self.metrics.total_discarded);
            }
        }
        Ok(())
    }

    fn stop(&self) {
        let Some(state) = self.state.write().take() else {
            return;
        };
        drop(state.factory);

        let mut closed = 0usize;
        while let Some(mut conn) = state.idle.pop() {
            close_quietly(&mut conn, "pool stopped");
            MetricsTracker::record(&self.metrics.total_discarded);
            closed += 1;
        }
        info!(target: TRACING_TARGET_POOL, pool = %self.name, closed, "Pool stopped");
    }

    fn len(&self) -> usize {
        self.state.read().as_ref().map_or(0, |state| state.idle.len())
    }
}

impl<C: Connection> Drop for Shared<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Thread-safe pool of reusable connections backed by a bounded idle queue
///
/// Cloning the pool is cheap and yields another handle to the same pool.
///
/// # Examples
///
/// ```
/// use esox_connpool::{ChannelPool, Connection};
/// use std::convert::Infallible;
///
/// struct Conn(bool);
///
/// impl Connection for Conn {
///     type Error = Infallible;
///     fn is_closed(&self) -> bool { self.0 }
///     fn close(&mut self) -> Result<(), Infallible> { self.0 = true; Ok(()) }
/// }
///
/// let pool = ChannelPool::new(2, 4, || Ok::<_, Infallible>(Conn(false))).unwrap();
/// assert_eq!(pool.len(), 2);
///
/// let conn = pool.get().unwrap();
/// assert_eq!(pool.len(), 1);
///
/// conn.close().unwrap();
/// assert_eq!(pool.len(), 2);
///
/// pool.stop();
/// assert!(pool.get().is_err());
/// ```
pub struct ChannelPool<C: Connection> {
    shared: Arc<Shared<C>>,
}

impl<C: Connection> Clone for ChannelPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connection> ChannelPool<C> {
    /// Create a pool holding at most `max_capacity` idle connections,
    /// filled with `initial_capacity` connections up front
    pub fn new<F, E>(initial_capacity: usize, max_capacity: usize, factory: F) -> PoolResult<Self>
    where
        F: Fn() -> Result<C, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let config = PoolConfiguration::new()
            .with_initial_capacity(initial_capacity)
            .with_max_capacity(max_capacity);
        Self::with_config(config, factory)
    }

    /// Create a pool from a configuration
    ///
    /// If the factory fails while filling the pool, every connection created
    /// so far is closed before the error is returned.
    pub fn with_config<F, E>(config: PoolConfiguration, factory: F) -> PoolResult<Self>
    where
        F: Fn() -> Result<C, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        config.validate()?;

        let factory: Factory<C> = Arc::new(move || factory().map_err(Into::into));
        let idle = Arc::new(ArrayQueue::new(config.max_capacity));
        let shared = Arc::new(Shared {
            name: config.name,
            max_capacity: config.max_capacity,
            state: RwLock::new(Some(PoolState {
                idle: Arc::clone(&idle),
                factory: Arc::clone(&factory),
            })),
            metrics: MetricsTracker::new(),
        });

        for index in 0..config.initial_capacity {
            let context = format!("initial fill {}/{}", index + 1, config.initial_capacity);
            match shared.create(&factory, &context) {
                Ok(conn) => {
                    if let Err(mut conn) = idle.push(conn) {
                        close_quietly(&mut conn, "idle queue full");
                    }
                }
                Err(error) => {
                    warn!(target: TRACING_TARGET_POOL, pool = %shared.name, error = %error, "Factory is not able to fill the pool");
                    shared.stop();
                    return Err(error);
                }
            }
        }

        info!(
            target: TRACING_TARGET_POOL,
            pool = %shared.name,
            initial = config.initial_capacity,
            max = shared.max_capacity,
            "Pool created"
        );

        Ok(Self { shared })
    }

    /// Borrow a connection
    ///
    /// Pops an idle connection if one is available, otherwise mints a new one
    /// with the factory. Never waits for a connection to be returned.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Closed`] if the pool is stopped, or the idle connection
    ///   popped from the queue is already closed
    /// - [`PoolError::Factory`] if a new connection could not be created
    pub fn get(&self) -> PoolResult<PooledConnection<C>> {
        let (idle, factory) = self.shared.snapshot().ok_or(PoolError::Closed)?;

        match idle.pop() {
            Some(conn) => self.checkout(conn),
            None => {
                let conn = self.shared.create(&factory, "overflow")?;
                Ok(self.wrap(conn))
            }
        }
    }

    /// Borrow a connection, running an overflow factory call on the blocking
    /// thread pool
    pub async fn get_async(&self) -> PoolResult<PooledConnection<C>> {
        let (idle, factory) = self.shared.snapshot().ok_or(PoolError::Closed)?;

        if let Some(conn) = idle.pop() {
            return self.checkout(conn);
        }

        // Wrapped inside the task so a result dropped by a cancelled caller
        // still releases the connection back to the pool.
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            shared
                .create(&factory, "overflow")
                .map(|conn| PooledConnection::new(conn, Arc::downgrade(&shared)))
        })
        .await
        .map_err(|_| PoolError::Cancelled)?
    }

    /// Shut the pool down
    ///
    /// Later calls to [`get`](Self::get) fail with [`PoolError::Closed`].
    /// Idle connections are closed; connections currently borrowed are closed
    /// when released. Calling it again does nothing.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Number of idle connections, 0 once stopped
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.read().is_none()
    }

    pub fn max_capacity(&self) -> usize {
        self.shared.max_capacity
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.shared.metrics.get_metrics(self.len(), self.shared.max_capacity)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format, labelled with the pool name
    pub fn export_metrics_prometheus(&self, tags: Option<&HashMap<String, String>>) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), &self.shared.name, tags)
    }

    fn checkout(&self, conn: C) -> PoolResult<PooledConnection<C>> {
        if conn.is_closed() {
            warn!(target: TRACING_TARGET_POOL, pool = %self.shared.name, "Idle connection was already closed");
            return Err(PoolError::Closed);
        }
        MetricsTracker::record(&self.shared.metrics.total_reused);
        Ok(self.wrap(conn))
    }

    fn wrap(&self, conn: C) -> PooledConnection<C> {
        PooledConnection::new(conn, Arc::downgrade(&self.shared))
    }
}

impl<C: Connection> Pool for ChannelPool<C> {
    type Connection = PooledConnection<C>;

    fn get(&self) -> PoolResult<Self::Connection> {
        ChannelPool::get(self)
    }

    fn stop(&self) {
        ChannelPool::stop(self)
    }

    fn len(&self) -> usize {
        ChannelPool::len(self)
    }
}

impl<C: Connection> fmt::Debug for ChannelPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPool")
            .field("name", &self.shared.name)
            .field("max_capacity", &self.shared.max_capacity)
            .field("idle", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
