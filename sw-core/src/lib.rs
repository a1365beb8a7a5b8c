//! Sensorwatch Core Library
//!
//! Resolves logical hardware metrics ("CPU package temperature", "GPU power")
//! to concrete sensors in a vendor-agnostic hardware tree, remembers the
//! result across runs, and reads the chosen sensors behind a per-sensor
//! circuit breaker.
//!
//! # Module Structure
//!
//! - `tree` - Hardware tree model and the provider trait
//! - `hw/` - Providers: Linux hwmon and JSON snapshots
//! - `resolution/` - Metric profiles, candidate scoring, tree search
//! - `cache/` - Persisted resolution cache and hardware fingerprint
//! - `inventory` - Enumeration, classification, active sensor selection
//! - `health` - Per-sensor failure tracking with exponential backoff
//! - `reader` - One read tick over the active sensors
//! - `report` - Human-readable diagnostics
//!
//! # Example
//!
//! ```no_run
//! use sw_core::{CacheStore, HardwareInventory, HwmonProvider, SensorReader};
//! use sw_core::settings::EngineSettings;
//!
//! let settings = EngineSettings::default();
//! let mut inventory = HardwareInventory::new(
//!     Box::new(HwmonProvider::new()),
//!     CacheStore::new(sw_core::constants::paths::default_cache_path()),
//!     settings.scoring.clone(),
//! );
//! inventory.select_cpu("auto");
//! inventory.select_gpu("auto");
//!
//! let mut reader = SensorReader::new(settings.health.clone());
//! let batch = reader.read_all(&mut inventory);
//! println!("{:?}", batch.cpu_temp);
//! ```

// Grouped modules
pub mod cache;
pub mod hw;
pub mod resolution;

// Standalone modules
pub mod constants;
pub mod health;
pub mod inventory;
pub mod reader;
pub mod report;
pub mod settings;
pub mod tree;

pub use cache::{CacheStatistics, CacheStore, HardwareFingerprint, ResolutionCache};
pub use health::{HealthReport, HealthState, SensorHealthTracker};
pub use hw::{HwmonProvider, SnapshotFile, SnapshotProvider};
pub use inventory::{
    resolve_metric, ActiveSensor, CategoryCounts, FailedResolution, HardwareCategory,
    HardwareDetails, HardwareInventory, SensorSummary, StorageSensor,
};
pub use reader::{CustomSensorConfig, CustomSensors, MetricBatch, SensorReader, StorageReading};
pub use resolution::{find_sensor, metrics, profile_for, MetricProfile};
pub use tree::{HardwareNode, HardwareProvider, ReadFault, Reading, SensorNode};

pub use sw_error::{Result, SensorwatchError};
