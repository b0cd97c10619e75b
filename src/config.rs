use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("monitor report interval must be non-zero")]
    ZeroInterval,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    // untracked packets are dropped once the backlog holds this many; 0 drops them all
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl QueueConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub name: String,
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: "DeliveryQueue".to_string(),
            interval: Duration::from_secs(1),
        }
    }
}

impl MonitorConfig {
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(QueueConfig::default().capacity, 10_000);
        assert_eq!(QueueConfig::default().with_capacity(0).capacity, 0);
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_interval() {
        let monitor = MonitorConfig::new("link", Duration::ZERO);
        let err = monitor.validate().unwrap_err();
        assert_eq!(err, ConfigError::ZeroInterval);
        assert_eq!(err.to_string(), "monitor report interval must be non-zero");
    }
}
