use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Local};
use log::info;

use crate::config::{ConfigError, MonitorConfig};
use crate::stats::QueueStats;

// ==========================================
// One report row: rates over the last interval + live backlog
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct RateReport {
    pub name: String,
    pub at: DateTime<Local>,
    pub elapsed_secs: f64,
    pub delta: QueueStats,
    // never reset, this is the live stock
    pub backlog: usize,
}

impl RateReport {
    pub fn delivered_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.delta.delivered as f64 / self.elapsed_secs
    }
}

impl fmt::Display for RateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<14} | queued {:<8} | dropped {:<8} | delivered {:<8} ({:.1}/s) | failed {:<6} | purged {:<6} | backlog {}",
            self.at.format("%H:%M:%S"),
            self.name,
            self.delta.queued,
            self.delta.dropped,
            self.delta.delivered,
            self.delivered_per_sec(),
            self.delta.failed,
            self.delta.purged,
            self.backlog,
        )
    }
}

// ==========================================
// Periodic reporter over queue snapshots
// ==========================================
pub struct Monitor {
    config: MonitorConfig,
    last_report: Instant,
    last_stats: QueueStats,
}

impl Monitor {
    pub fn new(config: MonitorConfig, now: Instant) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            last_report: now,
            last_stats: QueueStats::default(),
        })
    }

    /// Emits a report once per interval, `None` in between.
    pub fn observe(&mut self, now: Instant, stats: QueueStats, backlog: usize) -> Option<RateReport> {
        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed < self.config.interval {
            return None;
        }

        let report = RateReport {
            name: self.config.name.clone(),
            at: Local::now(),
            elapsed_secs: elapsed.as_secs_f64(),
            delta: stats.since(&self.last_stats),
            backlog,
        };
        info!("{}", report);

        // only the per-interval counters roll over, backlog is read fresh each time
        self.last_stats = stats;
        self.last_report = now;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn reports_once_per_interval_with_deltas() {
        let start = Instant::now();
        let config = MonitorConfig::new("uplink", Duration::from_secs(1));
        let mut monitor = Monitor::new(config, start).expect("valid config");

        let first = QueueStats {
            queued: 10,
            delivered: 4,
            ..QueueStats::default()
        };
        assert!(monitor.observe(start + Duration::from_millis(500), first, 6).is_none());

        let report = monitor
            .observe(start + Duration::from_secs(2), first, 6)
            .expect("interval elapsed");
        assert_eq!(report.delta.queued, 10);
        assert_eq!(report.backlog, 6);
        assert_eq!(report.delivered_per_sec(), 2.0);
        assert!(report.to_string().contains("uplink"));

        let second = QueueStats {
            queued: 12,
            delivered: 9,
            dropped: 1,
            ..QueueStats::default()
        };
        let report = monitor
            .observe(start + Duration::from_secs(3), second, 3)
            .expect("interval elapsed");
        assert_eq!(report.delta.queued, 2);
        assert_eq!(report.delta.delivered, 5);
        assert_eq!(report.delta.dropped, 1);
        assert_eq!(report.backlog, 3);
    }
}
