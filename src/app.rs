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

//! Engine session: inventory plus reader, wired from the app config

use std::path::{Path, PathBuf};

use anyhow::Context;
use sw_core::{
    CacheStore, HardwareInventory, HardwareProvider, HwmonProvider, MetricBatch, SensorReader,
    SnapshotProvider,
};
use tracing::info;

use crate::config::AppConfig;

/// Where hardware comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSource {
    Hwmon,
    Snapshot(PathBuf),
}

impl ProviderSource {
    pub fn from_snapshot_flag(snapshot: Option<&Path>) -> Self {
        match snapshot {
            Some(path) => Self::Snapshot(path.to_path_buf()),
            None => Self::Hwmon,
        }
    }

    pub fn open(&self) -> anyhow::Result<Box<dyn HardwareProvider>> {
        Ok(match self {
            Self::Hwmon => Box::new(HwmonProvider::new()),
            Self::Snapshot(path) => Box::new(
                SnapshotProvider::from_file(path)
                    .with_context(|| format!("Failed to load hardware snapshot {}", path.display()))?,
            ),
        })
    }
}

pub struct Session {
    pub inventory: HardwareInventory,
    pub reader: SensorReader,
}

impl Session {
    /// Enumerate hardware, apply the configured selections and map custom sensors
    pub fn open(config: &AppConfig, provider: Box<dyn HardwareProvider>, cache_path: PathBuf) -> Self {
        let store = CacheStore::new(cache_path);
        let mut inventory = HardwareInventory::new(provider, store, config.engine.scoring.clone());
        inventory.select_cpu(&config.selected_cpu);
        inventory.select_gpu(&config.selected_gpu);
        inventory.log_final_status();

        let mut reader = SensorReader::new(config.engine.health.clone());
        let mapped = reader.set_custom_sensors(&inventory, config.custom_sensors.clone());
        info!(
            provider = %inventory.provider_name(),
            devices = inventory.nodes().len(),
            custom_sensors = mapped,
            "Session ready"
        );

        Self { inventory, reader }
    }

    /// One read tick
    pub fn tick(&mut self) -> MetricBatch {
        self.reader.read_all(&mut self.inventory)
    }

    /// Re-detect hardware and remap custom sensors
    pub fn refresh_hardware(&mut self) {
        self.inventory.refresh_hardware();
        self.reader.map_custom_sensors(&self.inventory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_core::{HardwareNode, SensorNode};
    use tempfile::TempDir;

    fn provider() -> Box<dyn HardwareProvider> {
        Box::new(SnapshotProvider::from_nodes(vec![
            HardwareNode::new("Intel Core i5-13600K", "Cpu", "/intelcpu/0")
                .with_sensor(SensorNode::new("CPU Package", "Temperature", "/intelcpu/0/temperature/0", Some(45.0))),
            HardwareNode::new("Crucial P5 Plus", "Storage", "/nvme/0")
                .with_sensor(SensorNode::new("Composite", "Temperature", "/nvme/0/temperature/0", Some(39.0))),
        ]))
    }

    #[test]
    fn test_session_ticks() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::open(&AppConfig::default(), provider(), dir.path().join("cache.json"));

        let batch = session.tick();
        assert_eq!(batch.cpu_temp, Some(45.0));
        assert_eq!(batch.storage_temps.len(), 1);
        assert!(dir.path().join("cache.json").exists());

        session.refresh_hardware();
        assert_eq!(session.tick().cpu_temp, Some(45.0));
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = ProviderSource::from_snapshot_flag(Some(&dir.path().join("missing.json")));
        assert!(source.open().is_err());
        assert_eq!(ProviderSource::from_snapshot_flag(None), ProviderSource::Hwmon);
    }
}
