/*
 * This file is part of Sensorwatch.
 *
 * Copyright (C) 2025 Sensorwatch contributors
 *
 * Sensorwatch is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Sensorwatch is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Sensorwatch. If not, see <https://www.gnu.org/licenses/>.
 */

//! Periodic read loop
//!
//! Hardware reads are blocking, so every tick runs on the blocking pool while
//! the async side only keeps time. A tick that overruns its soft timeout is
//! left to finish on its own; ticks that come due meanwhile are skipped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sw_core::MetricBatch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::app::Session;
use crate::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub interval: Duration,
    pub tick_timeout: Duration,
    pub max_consecutive_errors: u32,
    /// Stop after this many completed ticks
    pub max_ticks: Option<u64>,
}

impl WatchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.update_interval(),
            tick_timeout: config.tick_timeout(),
            max_consecutive_errors: config.max_consecutive_tick_errors,
            max_ticks: None,
        }
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    TickLimit,
    TooManyErrors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub completed_ticks: u64,
    pub failed_ticks: u64,
    pub skipped_ticks: u64,
    pub stop_reason: StopReason,
}

/// Run ticks until `shutdown` resolves, the tick limit is hit, or too many
/// ticks in a row failed. `on_batch` sees every completed batch.
pub async fn run_watch<S, F>(
    session: Arc<Mutex<Session>>,
    options: WatchOptions,
    shutdown: S,
    mut on_batch: F,
) -> WatchSummary
where
    S: Future<Output = ()>,
    F: FnMut(&MetricBatch),
{
    tokio::pin!(shutdown);

    let mut ticker = interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pending: Option<JoinHandle<MetricBatch>> = None;
    let mut consecutive_errors: u32 = 0;
    let mut summary = WatchSummary {
        completed_ticks: 0,
        failed_ticks: 0,
        skipped_ticks: 0,
        stop_reason: StopReason::Shutdown,
    };

    info!(
        interval_ms = options.interval.as_millis() as u64,
        timeout_ms = options.tick_timeout.as_millis() as u64,
        "Watch loop starting"
    );

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested");
                summary.stop_reason = StopReason::Shutdown;
                break;
            }
            _ = ticker.tick() => {}
        }

        if pending.as_ref().is_some_and(|h| !h.is_finished()) {
            summary.skipped_ticks += 1;
            warn!("Previous tick still running, skipping this one");
            continue;
        }
        pending = None;

        let worker = session.clone();
        let mut handle = tokio::task::spawn_blocking(move || worker.lock().tick());

        match timeout(options.tick_timeout, &mut handle).await {
            Ok(Ok(batch)) => {
                if consecutive_errors > 0 {
                    debug!(errors = consecutive_errors, "Read loop recovered");
                }
                consecutive_errors = 0;
                summary.completed_ticks += 1;
                on_batch(&batch);
            }
            Ok(Err(e)) => {
                consecutive_errors += 1;
                summary.failed_ticks += 1;
                error!(error = %e, count = consecutive_errors, "Read tick failed");
            }
            Err(_) => {
                consecutive_errors += 1;
                summary.failed_ticks += 1;
                warn!(
                    timeout_ms = options.tick_timeout.as_millis() as u64,
                    count = consecutive_errors,
                    "Read tick timed out"
                );
                pending = Some(handle);
            }
        }

        if consecutive_errors >= options.max_consecutive_errors {
            error!(errors = consecutive_errors, "Too many consecutive failed ticks, stopping");
            summary.stop_reason = StopReason::TooManyErrors;
            break;
        }
        if options.max_ticks.is_some_and(|max| summary.completed_ticks >= max) {
            summary.stop_reason = StopReason::TickLimit;
            break;
        }
    }

    info!(
        completed = summary.completed_ticks,
        failed = summary.failed_ticks,
        skipped = summary.skipped_ticks,
        "Watch loop stopped"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use sw_core::{HardwareNode, HardwareProvider, SensorNode, SnapshotProvider};
    use tempfile::TempDir;

    /// Snapshot provider whose refresh can be slowed down after startup
    struct SlowProvider {
        inner: SnapshotProvider,
        delay_ms: Arc<AtomicU64>,
    }

    impl HardwareProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        fn enumerate(&mut self) -> sw_error::Result<Vec<HardwareNode>> {
            self.inner.enumerate()
        }

        fn refresh(&mut self, node: &mut HardwareNode) -> sw_error::Result<()> {
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                std::thread::sleep(Duration::from_millis(delay));
            }
            self.inner.refresh(node)
        }
    }

    fn session(dir: &TempDir, delay_ms: Arc<AtomicU64>) -> Arc<Mutex<Session>> {
        let provider = SlowProvider {
            inner: SnapshotProvider::from_nodes(vec![HardwareNode::new("AMD Ryzen 7 7700", "Cpu", "/amdcpu/0")
                .with_sensor(SensorNode::new("Core (Tctl/Tdie)", "Temperature", "/amdcpu/0/temperature/2", Some(51.0)))]),
            delay_ms,
        };
        Arc::new(Mutex::new(Session::open(
            &AppConfig::default(),
            Box::new(provider),
            dir.path().join("cache.json"),
        )))
    }

    fn options(max_ticks: Option<u64>) -> WatchOptions {
        WatchOptions {
            interval: Duration::from_millis(20),
            tick_timeout: Duration::from_millis(500),
            max_consecutive_errors: 2,
            max_ticks,
        }
    }

    #[tokio::test]
    async fn test_stops_after_tick_limit() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir, Arc::new(AtomicU64::new(0)));

        let mut seen = Vec::new();
        let summary = run_watch(session, options(Some(3)), std::future::pending(), |batch| {
            seen.push(batch.cpu_temp)
        })
        .await;

        assert_eq!(summary.stop_reason, StopReason::TickLimit);
        assert_eq!(summary.completed_ticks, 3);
        assert_eq!(seen, vec![Some(51.0); 3]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir, Arc::new(AtomicU64::new(0)));

        let summary = run_watch(session, options(None), async {}, |_| {}).await;
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
    }

    #[tokio::test]
    async fn test_slow_ticks_time_out_and_stop() {
        let dir = TempDir::new().unwrap();
        let delay = Arc::new(AtomicU64::new(0));
        let session = session(&dir, delay.clone());
        delay.store(150, Ordering::SeqCst);

        let mut opts = options(None);
        opts.tick_timeout = Duration::from_millis(30);
        let summary = run_watch(session, opts, std::future::pending(), |_| {}).await;

        assert_eq!(summary.stop_reason, StopReason::TooManyErrors);
        assert_eq!(summary.failed_ticks, 2);
        assert_eq!(summary.completed_ticks, 0);
        assert!(summary.skipped_ticks > 0);
    }
}
