//! Pool configuration options

use crate::errors::{PoolError, PoolResult};

#[cfg(feature = "metrics")]
use serde::{Deserialize, Serialize};

/// Configuration for connection pool capacity
///
/// # Examples
///
/// ```
/// use esox_connpool::PoolConfiguration;
///
/// let config = PoolConfiguration::new()
///     .with_name("nats")
///     .with_initial_capacity(2)
///     .with_max_capacity(8);
///
/// assert_eq!(config.max_capacity, 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "metrics", derive(Serialize, Deserialize))]
pub struct PoolConfiguration {
    /// Name used in log events and metric labels
    pub name: String,

    /// Number of connections created up front
    pub initial_capacity: usize,

    /// Maximum number of idle connections kept by the pool
    pub max_capacity: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            initial_capacity: 0,
            max_capacity: 16,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of connections created on construction
    pub fn with_initial_capacity(mut self, initial: usize) -> Self {
        self.initial_capacity = initial;
        self
    }

    /// Set the maximum number of idle connections
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_connpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_capacity(0);
    /// assert!(config.validate().is_err());
    /// ```
    pub fn with_max_capacity(mut self, max: usize) -> Self {
        self.max_capacity = max;
        self
    }

    /// Check `0 < max_capacity` and `initial_capacity <= max_capacity`
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_capacity == 0 || self.initial_capacity > self.max_capacity {
            return Err(PoolError::InvalidConfig {
                initial: self.initial_capacity,
                max: self.max_capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bounds() {
        assert!(PoolConfiguration::new().validate().is_ok());

        let equal = PoolConfiguration::new().with_initial_capacity(4).with_max_capacity(4);
        assert!(equal.validate().is_ok());

        let zero_max = PoolConfiguration::new().with_max_capacity(0);
        assert!(matches!(
            zero_max.validate(),
            Err(PoolError::InvalidConfig { initial: 0, max: 0 })
        ));

        let too_many = PoolConfiguration::new().with_initial_capacity(5).with_max_capacity(4);
        assert!(matches!(
            too_many.validate(),
            Err(PoolError::InvalidConfig { initial: 5, max: 4 })
        ));
    }
}
