//! Metrics collection and export for connection pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use serde::Serialize;

/// Metrics snapshot for a pool
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
/// let pool = ChannelPool::new(1, 2, || Ok::<_, Infallible>(Conn(false))).unwrap();
/// let conn = pool.get().unwrap();
/// conn.close().unwrap();
///
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.total_reused, 1);
/// assert_eq!(metrics.total_returned, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(Serialize))]
pub struct PoolMetrics {
    /// Connections minted by the factory
    pub total_created: usize,

    /// Connections handed out from the idle queue
    pub total_reused: usize,

    /// Connections accepted back into the idle queue
    pub total_returned: usize,

    /// Connections closed because the idle queue was full or the pool stopped
    pub total_discarded: usize,

    /// Connections closed because they were marked unusable
    pub total_destroyed: usize,

    /// Factory calls that returned an error
    pub factory_failures: usize,

    /// Current idle connections
    pub idle_connections: usize,

    /// Idle queue fill ratio (0.0 to 1.0)
    pub utilization: f64,

    /// Maximum idle capacity
    pub max_capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_discarded".to_string(), self.total_discarded.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("idle_connections".to_string(), self.idle_connections.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        Self::write_metric(&mut output, "connpool_connections_idle", "gauge", "Current idle connections", &labels, metrics.idle_connections.to_string());
        Self::write_metric(&mut output, "connpool_utilization", "gauge", "Idle queue fill ratio", &labels, format!("{:.2}", metrics.utilization));
        Self::write_metric(&mut output, "connpool_connections_created_total", "counter", "Connections created by the factory", &labels, metrics.total_created.to_string());
        Self::write_metric(&mut output, "connpool_connections_reused_total", "counter", "Connections reused from the idle queue", &labels, metrics.total_reused.to_string());
        Self::write_metric(&mut output, "connpool_connections_returned_total", "counter", "Connections returned to the idle queue", &labels, metrics.total_returned.to_string());
        Self::write_metric(&mut output, "connpool_connections_discarded_total", "counter", "Connections closed on a full or stopped pool", &labels, metrics.total_discarded.to_string());
        Self::write_metric(&mut output, "connpool_connections_destroyed_total", "counter", "Unusable connections destroyed", &labels, metrics.total_destroyed.to_string());
        Self::write_metric(&mut output, "connpool_factory_failures_total", "counter", "Factory failures", &labels, metrics.factory_failures.to_string());

        output
    }

    fn write_metric(output: &mut String, name: &str, kind: &str, help: &str, labels: &str, value: String) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_reused: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_discarded: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub factory_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, idle: usize, capacity: usize) -> PoolMetrics {
        let utilization = if capacity > 0 {
            idle as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_discarded: self.total_discarded.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            factory_failures: self.factory_failures.load(Ordering::Relaxed),
            idle_connections: idle,
            utilization,
            max_capacity: capacity,
        }
    }
}
