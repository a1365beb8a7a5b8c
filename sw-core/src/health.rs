//! Sensor health tracking
//!
//! Every sensor read goes through [`SensorHealthTracker`]. After
//! `max_consecutive_failures` failed reads in a row the sensor is disabled for a
//! cooldown window that doubles on every further trip, up to `max_backoff`.
//! While disabled the read closure is not called at all. A single successful
//! read returns the sensor to healthy.
//!
//! State is keyed by an opaque caller-chosen string and lives only in memory.

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

use crate::settings::HealthSettings;
use crate::tree::{ReadFault, Reading};

/// Per-sensor circuit breaker state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorHealth {
    pub consecutive_failures: u32,
    pub backoff_level: u32,
    pub disabled_until: Option<Instant>,
}

impl SensorHealth {
    fn is_disabled_at(&self, now: Instant) -> bool {
        self.disabled_until.is_some_and(|until| now < until)
    }

    fn is_unhealthy(&self) -> bool {
        self.consecutive_failures > 0 || self.disabled_until.is_some()
    }
}

/// Observable health state of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    /// Failing but still being read; holds the consecutive failure count
    Failing(u32),
    /// Reads are suppressed for the remaining duration
    Disabled(Duration),
}

/// Aggregate read statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub total_sensors_tracked: usize,
    pub temporarily_disabled_sensors: Vec<String>,
    pub read_attempts: u64,
    pub successful_reads: u64,
    pub failed_reads: u64,
    /// Reads suppressed by an active cooldown
    pub skipped_reads: u64,
    /// 100 when nothing has been read yet
    pub success_rate_percent: f64,
}

#[derive(Debug, Clone)]
pub struct SensorHealthTracker {
    settings: HealthSettings,
    sensors: HashMap<String, SensorHealth>,
    read_attempts: u64,
    successful_reads: u64,
    failed_reads: u64,
    skipped_reads: u64,
}

impl SensorHealthTracker {
    pub fn new(settings: HealthSettings) -> Self {
        Self {
            settings,
            sensors: HashMap::new(),
            read_attempts: 0,
            successful_reads: 0,
            failed_reads: 0,
            skipped_reads: 0,
        }
    }

    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    /// Read through the breaker using the current time
    pub fn read_with<F>(&mut self, key: &str, read: F) -> Option<f64>
    where
        F: FnOnce() -> Reading,
    {
        self.read_with_at(key, Instant::now(), read)
    }

    /// Read through the breaker at an explicit point in time.
    ///
    /// Returns `None` both when the read failed and when it was skipped.
    pub fn read_with_at<F>(&mut self, key: &str, now: Instant, read: F) -> Option<f64>
    where
        F: FnOnce() -> Reading,
    {
        if self.sensors.get(key).is_some_and(|h| h.is_disabled_at(now)) {
            self.skipped_reads += 1;
            trace!(sensor = %key, "Sensor in cooldown, read skipped");
            return None;
        }

        self.read_attempts += 1;
        match read() {
            Ok(value) => {
                self.successful_reads += 1;
                self.record_success(key);
                Some(value)
            }
            Err(fault) => {
                self.failed_reads += 1;
                self.record_failure(key, now, &fault);
                None
            }
        }
    }

    /// Mark `key` healthy; returns true if it was unhealthy before
    pub fn record_success(&mut self, key: &str) -> bool {
        let health = self.sensors.entry(key.to_string()).or_default();
        let recovered = health.is_unhealthy();
        if recovered {
            info!(sensor = %key, "Sensor recovered");
        }
        *health = SensorHealth::default();
        recovered
    }

    /// Count a failure; returns the cooldown when this failure tripped the breaker
    pub fn record_failure(&mut self, key: &str, now: Instant, fault: &ReadFault) -> Option<Duration> {
        let threshold = self.settings.max_consecutive_failures;
        let delay = backoff_delay(&self.settings, self.sensors.get(key).map_or(0, |h| h.backoff_level));

        let health = self.sensors.entry(key.to_string()).or_default();
        health.consecutive_failures += 1;
        if health.consecutive_failures < threshold {
            trace!(sensor = %key, failures = health.consecutive_failures, fault = %fault, "Sensor read failed");
            return None;
        }

        health.consecutive_failures = 0;
        health.disabled_until = Some(now + delay);
        health.backoff_level = health.backoff_level.saturating_add(1);

        warn!(
            sensor = %key,
            failures = threshold,
            cooldown_secs = delay.as_secs(),
            fault = %fault,
            "Sensor disabled after repeated failures"
        );
        Some(delay)
    }

    pub fn state(&self, key: &str, now: Instant) -> HealthState {
        match self.sensors.get(key) {
            Some(h) => match h.disabled_until {
                Some(until) if now < until => HealthState::Disabled(until - now),
                _ if h.consecutive_failures > 0 => HealthState::Failing(h.consecutive_failures),
                _ => HealthState::Healthy,
            },
            None => HealthState::Healthy,
        }
    }

    pub fn health(&self, key: &str) -> Option<&SensorHealth> {
        self.sensors.get(key)
    }

    pub fn report(&self) -> HealthReport {
        self.report_at(Instant::now())
    }

    pub fn report_at(&self, now: Instant) -> HealthReport {
        let mut disabled: Vec<String> = self
            .sensors
            .iter()
            .filter(|(_, h)| h.is_disabled_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        disabled.sort();

        let success_rate_percent = if self.read_attempts > 0 {
            self.successful_reads as f64 / self.read_attempts as f64 * 100.0
        } else {
            100.0
        };

        HealthReport {
            total_sensors_tracked: self.sensors.len(),
            temporarily_disabled_sensors: disabled,
            read_attempts: self.read_attempts,
            successful_reads: self.successful_reads,
            failed_reads: self.failed_reads,
            skipped_reads: self.skipped_reads,
            success_rate_percent,
        }
    }

    /// Forget all per-sensor state; counters are kept
    pub fn reset(&mut self) {
        self.sensors.clear();
    }
}

/// Cooldown for the given backoff level, capped at `max_backoff`
pub fn backoff_delay(settings: &HealthSettings, level: u32) -> Duration {
    let factor = 1u32.checked_shl(level).unwrap_or(u32::MAX);
    settings
        .initial_backoff()
        .saturating_mul(factor)
        .min(settings.max_backoff())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SensorHealthTracker {
        SensorHealthTracker::new(HealthSettings::default())
    }

    #[test]
    fn test_disabled_after_three_failures() {
        let mut tracker = tracker();
        let start = Instant::now();

        for _ in 0..3 {
            assert_eq!(tracker.read_with_at("x", start, || Err(ReadFault::NoValue)), None);
        }
        let health = tracker.health("x").unwrap();
        assert_eq!(health.disabled_until, Some(start + Duration::from_secs(15)));
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.backoff_level, 1);

        // skipped without calling the sensor
        let mut called = false;
        let skipped = tracker.read_with_at("x", start + Duration::from_secs(5), || {
            called = true;
            Ok(1.0)
        });
        assert_eq!(skipped, None);
        assert!(!called);

        let value = tracker.read_with_at("x", start + Duration::from_secs(20), || Ok(42.0));
        assert_eq!(value, Some(42.0));
        assert_eq!(tracker.state("x", start + Duration::from_secs(20)), HealthState::Healthy);

        let report = tracker.report_at(start + Duration::from_secs(20));
        assert_eq!(report.read_attempts, 4);
        assert_eq!(report.failed_reads, 3);
        assert_eq!(report.skipped_reads, 1);
        assert_eq!(report.success_rate_percent, 25.0);
    }

    #[test]
    fn test_backoff_sequence_is_capped() {
        let settings = HealthSettings::default();
        let delays: Vec<u64> = (0..8).map(|level| backoff_delay(&settings, level).as_secs()).collect();
        assert_eq!(delays, vec![15, 30, 60, 120, 240, 300, 300, 300]);
        assert_eq!(backoff_delay(&settings, 200).as_secs(), 300);
    }

    #[test]
    fn test_continuous_failures_grow_cooldown() {
        let mut tracker = tracker();
        let mut now = Instant::now();
        let mut cooldowns = Vec::new();

        for _ in 0..7 {
            for _ in 0..3 {
                tracker.read_with_at("gpu_power", now, || Err(ReadFault::SensorMissing));
            }
            let until = tracker.health("gpu_power").unwrap().disabled_until.unwrap();
            cooldowns.push((until - now).as_secs());
            now = until;
        }
        assert_eq!(cooldowns, vec![15, 30, 60, 120, 240, 300, 300]);
        assert!(cooldowns.windows(2).all(|w| w[0] <= w[1]));

        tracker.read_with_at("gpu_power", now, || Ok(180.0));
        assert_eq!(tracker.health("gpu_power").unwrap().backoff_level, 0);
    }

    #[test]
    fn test_recovered_event() {
        let mut tracker = tracker();
        assert!(!tracker.record_success("cpu_temp"));
        tracker.record_failure("cpu_temp", Instant::now(), &ReadFault::NoValue);
        assert_eq!(tracker.state("cpu_temp", Instant::now()), HealthState::Failing(1));
        assert!(tracker.record_success("cpu_temp"));
    }

    #[test]
    fn test_failing_sensor_does_not_affect_others() {
        let mut tracker = tracker();
        let now = Instant::now();
        for _ in 0..3 {
            tracker.read_with_at("storage_a", now, || Err(ReadFault::NoValue));
        }
        assert_eq!(tracker.read_with_at("storage_b", now, || Ok(35.0)), Some(35.0));

        let report = tracker.report_at(now);
        assert_eq!(report.temporarily_disabled_sensors, vec!["storage_a".to_string()]);
        assert_eq!(report.total_sensors_tracked, 2);
    }

    #[test]
    fn test_empty_report_and_reset() {
        let mut tracker = tracker();
        let report = tracker.report();
        assert_eq!(report.success_rate_percent, 100.0);
        assert_eq!(report.total_sensors_tracked, 0);

        let now = Instant::now();
        for _ in 0..3 {
            tracker.read_with_at("x", now, || Err(ReadFault::NoValue));
        }
        tracker.reset();
        assert_eq!(tracker.state("x", now), HealthState::Healthy);
        assert_eq!(tracker.read_with_at("x", now, || Ok(1.0)), Some(1.0));
    }
}
