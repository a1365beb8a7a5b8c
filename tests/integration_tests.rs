/*
 * Integration tests for Sensorwatch
 *
 * These tests drive the engine through the host layer: snapshot files on
 * disk, the config file, the persistent cache and the command line.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use sensorwatch::app::{ProviderSource, Session};
use sensorwatch::cli::{run_cli, Cli};
use sensorwatch::config::AppConfig;
use sensorwatch::monitor::{run_watch, StopReason, WatchOptions};
use serial_test::serial;
use sw_core::cache::cache_key;
use sw_core::report::render_report;
use sw_core::{metrics, CacheStore, CustomSensorConfig, HardwareNode, SensorNode, SnapshotFile};
use tempfile::TempDir;

// Test utilities
fn desktop_hardware() -> Vec<HardwareNode> {
    vec![
        HardwareNode::new("AMD Ryzen 9 7950X", "Cpu", "/amdcpu/0")
            .with_sensor(SensorNode::new("Core (Tctl/Tdie)", "Temperature", "/amdcpu/0/temperature/2", Some(62.5)))
            .with_sensor(SensorNode::new("CCD1 (Tdie)", "Temperature", "/amdcpu/0/temperature/3", Some(58.0))),
        HardwareNode::new("AMD Radeon RX 7900 XTX", "GpuAmd", "/gpu-amd/0")
            .with_sensor(SensorNode::new("GPU Core", "Temperature", "/gpu-amd/0/temperature/0", Some(48.0)))
            .with_sensor(SensorNode::new("GPU Hot Spot", "Temperature", "/gpu-amd/0/temperature/2", Some(61.0)))
            .with_sensor(SensorNode::new("GPU Core", "Clock", "/gpu-amd/0/clock/0", Some(2400.0)))
            .with_sensor(SensorNode::new("GPU Package", "Power", "/gpu-amd/0/power/0", Some(210.0)))
            .with_sensor(SensorNode::new("GPU Memory Used", "SmallData", "/gpu-amd/0/smalldata/0", Some(8192.0)))
            .with_sensor(SensorNode::new("GPU Memory Total", "SmallData", "/gpu-amd/0/smalldata/1", Some(24576.0))),
        HardwareNode::new("Samsung SSD 990 PRO 2TB", "Storage", "/nvme/0")
            .with_sensor(SensorNode::new("Composite Temperature", "Temperature", "/nvme/0/temperature/0", Some(41.0))),
        HardwareNode::new("ASUS ROG STRIX X670E-E", "Motherboard", "/motherboard").with_child(
            HardwareNode::new("Nuvoton NCT6799D", "SuperIO", "/lpc/nct6799d/0")
                .with_sensor(SensorNode::new("Fan #2", "Fan", "/lpc/nct6799d/0/fan/1", Some(1180.0))),
        ),
    ]
}

fn write_snapshot(dir: &Path, hardware: Vec<HardwareNode>) -> PathBuf {
    let path = dir.join("snapshot.json");
    let json = serde_json::to_string_pretty(&SnapshotFile { hardware }).unwrap();
    fs::write(&path, json).unwrap();
    path
}

fn open_session(snapshot: &Path, config: &AppConfig, cache: &Path) -> Session {
    let provider = ProviderSource::Snapshot(snapshot.to_path_buf()).open().unwrap();
    Session::open(config, provider, cache.to_path_buf())
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn test_full_read_from_snapshot_file() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());
        let mut config = AppConfig::default();
        config.custom_sensors.insert(
            "pump".to_string(),
            CustomSensorConfig {
                identifier: "/lpc/nct6799d/0/fan/1".to_string(),
                display_name: "Pump".to_string(),
                enabled: true,
            },
        );

        let mut session = open_session(&snapshot, &config, &dir.path().join("cache.json"));
        let batch = session.tick();

        assert_eq!(batch.cpu_temp, Some(62.5));
        assert_eq!(batch.gpu_value("gpu_core_temp"), Some(48.0));
        assert_eq!(batch.gpu_value("gpu_hotspot_temp"), Some(61.0));
        assert_eq!(batch.gpu_value("gpu_power"), Some(210.0));
        assert_eq!(batch.vram_used_gb, Some(8.0));
        assert_eq!(batch.vram_total_gb, Some(24.0));
        assert_eq!(batch.storage_temps.len(), 1);
        assert_eq!(batch.storage_temps[0].temp, 41.0);
        assert_eq!(batch.custom_sensors.get("/lpc/nct6799d/0/fan/1"), Some(&1180.0));
    }

    #[test]
    fn test_resolutions_survive_restart() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());
        let cache_path = dir.path().join("cache.json");

        {
            let session = open_session(&snapshot, &AppConfig::default(), &cache_path);
            assert!(session.inventory.active_cpu().is_some());
        }
        assert!(cache_path.exists());

        let cache = CacheStore::new(&cache_path).load();
        let key = cache_key("/amdcpu/0", metrics::CPU_PACKAGE_TEMP);
        assert_eq!(cache.get(&key), Some("/amdcpu/0/temperature/2"));

        let session = open_session(&snapshot, &AppConfig::default(), &cache_path);
        assert_eq!(
            session.inventory.active_cpu().map(|s| s.sensor_id.as_str()),
            Some("/amdcpu/0/temperature/2")
        );
    }

    #[test]
    fn test_hardware_change_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());
        let cache_path = dir.path().join("cache.json");
        open_session(&snapshot, &AppConfig::default(), &cache_path);

        let mut swapped = desktop_hardware();
        swapped[0] = HardwareNode::new("Intel Core i9-14900K", "Cpu", "/intelcpu/0")
            .with_sensor(SensorNode::new("CPU Package", "Temperature", "/intelcpu/0/temperature/0", Some(70.0)));
        let snapshot = write_snapshot(dir.path(), swapped);

        let mut session = open_session(&snapshot, &AppConfig::default(), &cache_path);
        let old_key = cache_key("/amdcpu/0", metrics::CPU_PACKAGE_TEMP);
        assert!(session.inventory.cache().get(&old_key).is_none());
        assert!(session.inventory.init_log().iter().any(|l| l.contains("Hardware configuration changed")));
        assert_eq!(session.tick().cpu_temp, Some(70.0));
    }

    #[test]
    fn test_report_lists_everything() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());
        let session = open_session(&snapshot, &AppConfig::default(), &dir.path().join("cache.json"));

        let report = render_report(&session.inventory);
        assert!(report.contains("=== SENSOR DIAGNOSIS ==="));
        assert!(report.contains("=== INITIALIZATION LOG ==="));
        assert!(report.contains("=== HARDWARE OVERVIEW ==="));
        assert!(report.contains("Nuvoton NCT6799D"));
        assert!(report.contains("/lpc/nct6799d/0/fan/1"));
        assert!(report.contains("=== CACHE ==="));
    }
}

#[cfg(test)]
mod watch_tests {
    use super::*;

    #[tokio::test]
    async fn test_watch_reads_every_tick() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());
        let session = open_session(&snapshot, &AppConfig::default(), &dir.path().join("cache.json"));

        let options = WatchOptions {
            interval: Duration::from_millis(10),
            tick_timeout: Duration::from_secs(2),
            max_consecutive_errors: 3,
            max_ticks: Some(4),
        };
        let mut temps = Vec::new();
        let summary = run_watch(
            Arc::new(Mutex::new(session)),
            options,
            std::future::pending(),
            |batch| temps.push(batch.cpu_temp),
        )
        .await;

        assert_eq!(summary.stop_reason, StopReason::TickLimit);
        assert_eq!(summary.failed_ticks, 0);
        assert_eq!(temps, vec![Some(62.5); 4]);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn cli(dir: &TempDir, snapshot: &Path, args: &[&str]) -> Cli {
        let config = dir.path().join("config.json");
        let cache = dir.path().join("cache.json");
        let mut argv = vec![
            "sensorwatch".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--snapshot".to_string(),
            snapshot.display().to_string(),
            "--cache-file".to_string(),
            cache.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_commands_run_against_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());

        run_cli(&cli(&dir, &snapshot, &["inventory", "--json"])).await.unwrap();
        run_cli(&cli(&dir, &snapshot, &["diagnose"])).await.unwrap();
        run_cli(&cli(&dir, &snapshot, &["probe", "/nvme/0/temperature/0"])).await.unwrap();
        run_cli(&cli(&dir, &snapshot, &["watch", "--ticks", "1", "--interval-ms", "100"]))
            .await
            .unwrap();
        assert!(dir.path().join("cache.json").exists());

        run_cli(&cli(&dir, &snapshot, &["cache", "clear"])).await.unwrap();
        assert!(!dir.path().join("cache.json").exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_unknown_sensor_id_fails() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());
        assert!(run_cli(&cli(&dir, &snapshot, &["probe", "/nope/0"])).await.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let snapshot = write_snapshot(dir.path(), desktop_hardware());
        fs::write(dir.path().join("config.json"), r#"{"tick_timeout_ms": 0}"#).unwrap();
        assert!(run_cli(&cli(&dir, &snapshot, &["inventory"])).await.is_err());
    }
}
