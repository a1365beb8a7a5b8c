//! Per-tick sensor reading
//!
//! [`SensorReader`] turns the active sensors of a [`HardwareInventory`] into a
//! [`MetricBatch`]. Every read goes through the health tracker, so a failing
//! sensor costs nothing while it is cooling down and never holds up the others.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, warn};

use crate::health::{HealthReport, SensorHealthTracker};
use crate::inventory::{ActiveSensor, HardwareInventory};
use crate::settings::HealthSettings;
use crate::tree::HardwareNode;

/// GPU slots emitted as plain values, as (batch field, inventory slot)
const GPU_VALUE_SLOTS: [(&str, &str); 6] = [
    ("gpu_core_temp", "gpu_core_temp"),
    ("gpu_hotspot_temp", "gpu_hotspot_temp"),
    ("gpu_memory_temp", "gpu_memory_temp"),
    ("gpu_core_clock", "core_clock"),
    ("gpu_memory_clock", "memory_clock"),
    ("gpu_power", "power"),
];

const MIB_PER_GIB: f64 = 1024.0;

fn default_display_name() -> String {
    "Unknown sensor".to_string()
}

fn default_enabled() -> bool {
    true
}

/// A user-chosen sensor read by its identifier, bypassing resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSensorConfig {
    pub identifier: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Custom sensors keyed by config id
pub type CustomSensors = BTreeMap<String, CustomSensorConfig>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageReading {
    pub key: String,
    pub name: String,
    pub temp: f64,
}

/// One tick worth of metric values; absent fields had no reading
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricBatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_temp: Option<f64>,
    /// Plain GPU values keyed by field name (`gpu_core_temp`, `gpu_power`, ...)
    #[serde(flatten)]
    pub gpu: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vram_used_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vram_total_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vram_percent: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub storage_temps: Vec<StorageReading>,
    /// Custom sensor values keyed by sensor identifier
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_sensors: BTreeMap<String, f64>,
}

impl MetricBatch {
    pub fn gpu_value(&self, field: &str) -> Option<f64> {
        self.gpu.get(field).copied()
    }

    /// Number of values carried by this batch
    pub fn value_count(&self) -> usize {
        let vram = [self.vram_used_gb, self.vram_total_gb, self.vram_percent]
            .iter()
            .filter(|v| v.is_some())
            .count();
        usize::from(self.cpu_temp.is_some())
            + self.gpu.len()
            + vram
            + self.storage_temps.len()
            + self.custom_sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value_count() == 0
    }
}

#[derive(Debug, Clone)]
struct MappedCustomSensor {
    identifier: String,
    display_name: String,
    sensor: ActiveSensor,
}

pub struct SensorReader {
    health: SensorHealthTracker,
    custom_config: CustomSensors,
    /// Keyed by health key `custom_<config id>`
    custom_mapped: BTreeMap<String, MappedCustomSensor>,
}

impl SensorReader {
    pub fn new(settings: HealthSettings) -> Self {
        Self {
            health: SensorHealthTracker::new(settings),
            custom_config: CustomSensors::new(),
            custom_mapped: BTreeMap::new(),
        }
    }

    /// Replace the custom sensor configuration and map it against `inventory`
    pub fn set_custom_sensors(&mut self, inventory: &HardwareInventory, config: CustomSensors) -> usize {
        self.custom_config = config;
        self.map_custom_sensors(inventory)
    }

    /// Map enabled custom sensors to sensors in the current tree.
    ///
    /// Call again after the hardware was refreshed. Returns the number mapped.
    pub fn map_custom_sensors(&mut self, inventory: &HardwareInventory) -> usize {
        self.custom_mapped.clear();

        let mut to_find: HashMap<String, (String, String)> = self
            .custom_config
            .iter()
            .filter(|(_, c)| c.enabled && !c.identifier.trim().is_empty())
            .map(|(id, c)| {
                (
                    c.identifier.trim().to_string(),
                    (format!("custom_{}", id), c.display_name.clone()),
                )
            })
            .collect();
        if to_find.is_empty() {
            return 0;
        }

        for node in inventory.nodes() {
            map_subtree(node, &node.id, &mut to_find, &mut self.custom_mapped);
            if to_find.is_empty() {
                break;
            }
        }

        for (identifier, (_, display_name)) in &to_find {
            warn!(sensor = %display_name, identifier = %identifier, "Custom sensor not found");
        }
        self.custom_mapped.len()
    }

    pub fn custom_sensor_count(&self) -> usize {
        self.custom_mapped.len()
    }

    /// Mapped custom sensors as (identifier, display name)
    pub fn custom_sensor_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom_mapped
            .values()
            .map(|m| (m.identifier.as_str(), m.display_name.as_str()))
    }

    /// Refresh the hardware and read every active sensor
    pub fn read_all(&mut self, inventory: &mut HardwareInventory) -> MetricBatch {
        let errors = inventory.refresh_values();
        if !errors.is_empty() {
            warn!(failed = errors.len(), "Hardware refresh failed, values may be stale");
            for err in &errors {
                debug!(error = %err, "Refresh error");
            }
        }
        self.read_active(inventory, Instant::now())
    }

    /// Read every active sensor from the tree as it is, at `now`
    pub fn read_active(&mut self, inventory: &HardwareInventory, now: Instant) -> MetricBatch {
        let mut batch = MetricBatch::default();
        let health = &mut self.health;
        let mut read = |key: &str, sensor: &ActiveSensor| {
            health.read_with_at(key, now, || inventory.sensor_value(sensor))
        };

        if let Some(cpu) = inventory.active_cpu() {
            batch.cpu_temp = read("cpu_temp", cpu);
        }

        let gpu = inventory.active_gpu();
        for (field, slot) in GPU_VALUE_SLOTS {
            if let Some(sensor) = gpu.get(slot) {
                if let Some(value) = read(&format!("gpu_{}", slot), sensor) {
                    batch.gpu.insert(field.to_string(), value);
                }
            }
        }

        if let (Some(used), Some(total)) = (gpu.get("vram_used"), gpu.get("vram_total")) {
            let used = read("gpu_vram_used", used);
            let total = read("gpu_vram_total", total);
            if let (Some(used), Some(total)) = (used, total) {
                if total > 0.0 {
                    batch.vram_used_gb = Some(used / MIB_PER_GIB);
                    batch.vram_total_gb = Some(total / MIB_PER_GIB);
                    batch.vram_percent = Some((used / total * 100.0).min(100.0));
                }
            }
        }

        for (key, storage) in inventory.storage_sensors() {
            if let Some(temp) = read(&format!("storage_{}", key), &storage.sensor) {
                batch.storage_temps.push(StorageReading {
                    key: key.clone(),
                    name: storage.display_name.clone(),
                    temp,
                });
            }
        }

        for (key, mapped) in &self.custom_mapped {
            if let Some(value) = read(key, &mapped.sensor) {
                batch.custom_sensors.insert(mapped.identifier.clone(), value);
            }
        }

        debug!(values = batch.value_count(), "Sensors read");
        batch
    }

    pub fn health(&self) -> &SensorHealthTracker {
        &self.health
    }

    pub fn health_report(&self) -> HealthReport {
        self.health.report()
    }

    pub fn reset_health(&mut self) {
        self.health.reset();
    }
}

fn map_subtree(
    node: &HardwareNode,
    hardware_id: &str,
    to_find: &mut HashMap<String, (String, String)>,
    mapped: &mut BTreeMap<String, MappedCustomSensor>,
) {
    for sensor in &node.sensors {
        let identifier = sensor.id.trim();
        if let Some((key, display_name)) = to_find.remove(identifier) {
            debug!(sensor = %display_name, target = %sensor.name, "Custom sensor mapped");
            mapped.insert(
                key,
                MappedCustomSensor {
                    identifier: identifier.to_string(),
                    display_name,
                    sensor: ActiveSensor::new(hardware_id, sensor),
                },
            );
        }
    }
    for child in &node.children {
        map_subtree(child, hardware_id, to_find, mapped);
    }
}
