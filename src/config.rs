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

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sw_core::constants::{limits::MAX_CONFIG_FILE_SIZE, monitor, paths, selection};
use sw_core::settings::EngineSettings;
use sw_core::CustomSensors;
use sw_error::{Result, SensorwatchError};
use tracing::debug;

fn default_selection() -> String {
    selection::AUTO.to_string()
}

fn default_update_interval_ms() -> u64 {
    monitor::DEFAULT_UPDATE_INTERVAL_MS
}

fn default_tick_timeout_ms() -> u64 {
    monitor::DEFAULT_TICK_TIMEOUT_MS
}

fn default_max_tick_errors() -> u32 {
    monitor::DEFAULT_MAX_CONSECUTIVE_TICK_ERRORS
}

/// Application configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// CPU node id, or "auto" for the first CPU
    #[serde(default = "default_selection")]
    pub selected_cpu: String,
    /// GPU node id, or "auto" for the first GPU
    #[serde(default = "default_selection")]
    pub selected_gpu: String,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default = "default_tick_timeout_ms")]
    pub tick_timeout_ms: u64,
    #[serde(default = "default_max_tick_errors")]
    pub max_consecutive_tick_errors: u32,
    /// Overrides the default cache location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    #[serde(default)]
    pub custom_sensors: CustomSensors,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            selected_cpu: default_selection(),
            selected_gpu: default_selection(),
            update_interval_ms: default_update_interval_ms(),
            tick_timeout_ms: default_tick_timeout_ms(),
            max_consecutive_tick_errors: default_max_tick_errors(),
            cache_file: None,
            custom_sensors: CustomSensors::new(),
            engine: EngineSettings::default(),
        }
    }
}

/// Config location: explicit path, else `<config dir>/config.json`
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(paths::default_config_path)
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let size = fs::metadata(path)
            .map_err(|source| SensorwatchError::FileRead {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(SensorwatchError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                max_size: MAX_CONFIG_FILE_SIZE,
            });
        }

        let content = fs::read_to_string(path).map_err(|source| SensorwatchError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!(path = ?path, custom_sensors = config.custom_sensors.len(), "Config loaded");
        Ok(config)
    }

    /// Write atomically: temp file in the same directory, then rename
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SensorwatchError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        };
        write().map_err(|source| {
            let _ = fs::remove_file(&tmp);
            SensorwatchError::FileWrite {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_interval_ms < monitor::MIN_UPDATE_INTERVAL_MS {
            return Err(SensorwatchError::invalid_config(
                "update_interval_ms",
                format!("must be at least {}", monitor::MIN_UPDATE_INTERVAL_MS),
            ));
        }
        if self.tick_timeout_ms == 0 {
            return Err(SensorwatchError::invalid_config("tick_timeout_ms", "must be at least 1"));
        }
        if self.max_consecutive_tick_errors == 0 {
            return Err(SensorwatchError::invalid_config(
                "max_consecutive_tick_errors",
                "must be at least 1",
            ));
        }
        for (id, sensor) in &self.custom_sensors {
            if sensor.identifier.trim().is_empty() {
                return Err(SensorwatchError::invalid_config(
                    format!("custom_sensors.{}.identifier", id),
                    "must not be empty",
                ));
            }
        }
        self.engine.validate()
    }

    /// Cache location: explicit override, else the config value, else the default
    pub fn cache_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.cache_file.clone())
            .unwrap_or_else(paths::default_cache_path)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_millis(self.tick_timeout_ms)
    }
}
