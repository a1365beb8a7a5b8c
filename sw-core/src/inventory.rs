//! Hardware inventory
//!
//! Owns the enumerated hardware forest, its classification, the resolution
//! cache and the set of active sensors for the selected CPU and GPU.
//!
//! Resolution happens only here (startup, explicit refresh, selection change);
//! the per-tick read path just looks up the active sensor handles in the
//! refreshed tree.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheStore, HardwareFingerprint, ResolutionCache};
use crate::constants::{classify, selection};
use crate::resolution::{find_sensor, metrics, GPU_SLOTS};
use crate::settings::ScoringSettings;
use crate::tree::{HardwareNode, HardwareProvider, ReadFault, Reading, SensorNode};

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareCategory {
    Cpu,
    Gpu,
    Storage,
    Motherboard,
    Other,
}

impl HardwareCategory {
    /// Classify a node by keywords in its kind string.
    ///
    /// Device-type keywords decide before vendor keywords, so `GpuAmd` is a GPU
    /// while a bare `Amd` still counts as a CPU.
    pub fn classify(kind: &str) -> Self {
        let kind = kind.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| kind.contains(w));

        if has(classify::CPU_TYPE_KEYWORDS) {
            Self::Cpu
        } else if has(classify::GPU_TYPE_KEYWORDS) {
            Self::Gpu
        } else if has(classify::CPU_KEYWORDS) {
            Self::Cpu
        } else if has(classify::GPU_KEYWORDS) {
            Self::Gpu
        } else if has(classify::STORAGE_KEYWORDS) {
            Self::Storage
        } else if has(classify::MOTHERBOARD_KEYWORDS) {
            Self::Motherboard
        } else {
            Self::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
            Self::Storage => "Storage",
            Self::Motherboard => "Motherboard",
            Self::Other => "Other",
        }
    }
}

/// Number of top-level nodes per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub cpu: usize,
    pub gpu: usize,
    pub storage: usize,
    pub motherboard: usize,
    pub other: usize,
}

impl CategoryCounts {
    fn add(&mut self, category: HardwareCategory) {
        match category {
            HardwareCategory::Cpu => self.cpu += 1,
            HardwareCategory::Gpu => self.gpu += 1,
            HardwareCategory::Storage => self.storage += 1,
            HardwareCategory::Motherboard => self.motherboard += 1,
            HardwareCategory::Other => self.other += 1,
        }
    }
}

// ============================================================================
// Active sensors and diagnostics
// ============================================================================

/// Handle to a resolved sensor, looked up in the current tree on every read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveSensor {
    /// Id of the top-level node whose subtree holds the sensor
    pub hardware_id: String,
    pub sensor_id: String,
    pub name: String,
    pub kind: String,
}

impl ActiveSensor {
    pub fn new(hardware_id: &str, sensor: &SensorNode) -> Self {
        Self {
            hardware_id: hardware_id.to_string(),
            sensor_id: sensor.id.clone(),
            name: sensor.name.clone(),
            kind: sensor.kind.clone(),
        }
    }
}

/// A storage temperature sensor, used without resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageSensor {
    pub key: String,
    pub display_name: String,
    pub sensor: ActiveSensor,
}

/// A metric that could not be resolved, with the search trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedResolution {
    pub hardware: String,
    pub metric: String,
    pub trace: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSummary {
    pub name: String,
    pub kind: String,
    pub id: String,
    pub value: Option<f64>,
}

impl From<&SensorNode> for SensorSummary {
    fn from(s: &SensorNode) -> Self {
        Self {
            name: s.name.clone(),
            kind: s.kind.clone(),
            id: s.id.clone(),
            value: s.value,
        }
    }
}

/// One top-level node with its own sensors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareDetails {
    pub name: String,
    pub kind: String,
    pub id: String,
    pub sensors: Vec<SensorSummary>,
    pub sensor_count: usize,
}

// ============================================================================
// Cache-then-search resolution
// ============================================================================

/// Resolve `metric` on `node`: cached id among the node's direct sensors first,
/// full subtree search otherwise. Returns the sensor and whether the cache changed.
pub fn resolve_metric(
    cache: &mut ResolutionCache,
    provider: &mut dyn HardwareProvider,
    node: &mut HardwareNode,
    metric: &str,
    scoring: &ScoringSettings,
    trace: &mut Vec<String>,
) -> (Option<SensorNode>, bool) {
    let key = cache_key(&node.id, metric);

    if let Some(cached_id) = cache.get(&key) {
        if let Some(sensor) = node.direct_sensor(cached_id) {
            trace.push(format!("Found in cache: '{}'", sensor.name));
            debug!(metric = %metric, hardware = %node.name, sensor = %sensor.name, "Cache hit");
            return (Some(sensor.clone()), false);
        }
        trace.push(format!("Cached id '{}' is stale, searching again", cached_id));
    }

    match find_sensor(metric, node, provider, scoring, trace) {
        Some(sensor) => {
            cache.insert(key, sensor.id.clone());
            trace.push("Stored in cache".to_string());
            info!(metric = %metric, hardware = %node.name, sensor = %sensor.name, "Sensor resolved");
            (Some(sensor), true)
        }
        None => {
            warn!(metric = %metric, hardware = %node.name, "Sensor could not be resolved");
            (None, false)
        }
    }
}

// ============================================================================
// Inventory
// ============================================================================

pub struct HardwareInventory {
    provider: Box<dyn HardwareProvider>,
    provider_error: Option<String>,
    store: CacheStore,
    cache: ResolutionCache,
    scoring: ScoringSettings,

    nodes: Vec<HardwareNode>,
    categories: Vec<HardwareCategory>,
    counts: CategoryCounts,
    fingerprint: HardwareFingerprint,

    selected_cpu: String,
    selected_gpu: String,
    active_cpu: Option<ActiveSensor>,
    active_gpu: BTreeMap<String, ActiveSensor>,
    storage_sensors: BTreeMap<String, StorageSensor>,

    failed: BTreeMap<String, FailedResolution>,
    init_log: Vec<String>,
}

impl HardwareInventory {
    /// Load the cache, enumerate and classify hardware.
    ///
    /// Never fails: a provider error leaves the inventory empty and is kept
    /// for the diagnostic report.
    pub fn new(provider: Box<dyn HardwareProvider>, store: CacheStore, scoring: ScoringSettings) -> Self {
        let cache = store.load();
        let mut inventory = Self {
            provider,
            provider_error: None,
            store,
            cache,
            scoring,
            nodes: Vec::new(),
            categories: Vec::new(),
            counts: CategoryCounts::default(),
            fingerprint: HardwareFingerprint::from_nodes(&[]),
            selected_cpu: selection::AUTO.to_string(),
            selected_gpu: selection::AUTO.to_string(),
            active_cpu: None,
            active_gpu: BTreeMap::new(),
            storage_sensors: BTreeMap::new(),
            failed: BTreeMap::new(),
            init_log: Vec::new(),
        };
        inventory.enumerate();
        inventory
    }

    /// Enumerate, fingerprint and classify. Selections are not touched.
    fn enumerate(&mut self) {
        self.nodes.clear();
        self.categories.clear();
        self.provider_error = None;

        match self.provider.enumerate() {
            Ok(nodes) => self.nodes = nodes,
            Err(e) => {
                let msg = format!("Hardware provider '{}' failed: {}", self.provider.name(), e);
                warn!(provider = %self.provider.name(), error = %e, "Hardware enumeration failed");
                self.init_log.push(format!("ERROR: {}", msg));
                self.provider_error = Some(msg);
            }
        }

        for node in &mut self.nodes {
            if let Err(e) = self.provider.refresh(node) {
                warn!(hardware = %node.name, error = %e, "Initial refresh failed");
            }
        }

        self.fingerprint = HardwareFingerprint::from_nodes(&self.nodes);
        debug!(devices = self.nodes.len(), digest = %self.fingerprint.digest(), "Hardware fingerprint built");
        // a provider outage says nothing about the hardware, keep the loaded cache
        if self.provider_error.is_some() {
            self.init_log
                .push("Hardware unavailable, sensor cache left untouched".to_string());
        } else if self.store.invalidate_for_hardware(&mut self.cache, &self.fingerprint) {
            self.init_log
                .push("Hardware configuration changed, sensor cache reset".to_string());
        }

        self.detect();
    }

    fn detect(&mut self) {
        self.categories.clear();
        self.counts = CategoryCounts::default();
        self.storage_sensors.clear();
        self.init_log.push("=== HARDWARE DETECTION STARTED ===".to_string());

        for node in &self.nodes {
            let category = HardwareCategory::classify(&node.kind);
            self.categories.push(category);
            self.counts.add(category);
            self.init_log.push(format!("Found: {} ({})", node.name, node.kind));

            match category {
                HardwareCategory::Cpu => self.init_log.push(format!("  CPU detected: {}", node.name)),
                HardwareCategory::Gpu => self.init_log.push(format!("  GPU detected: {}", node.name)),
                HardwareCategory::Storage => {
                    let mut found = 0;
                    for sensor in node.sensors.iter().filter(|s| s.kind.eq_ignore_ascii_case("Temperature")) {
                        let key = format!("{}_{}", node.name.replace(' ', "_"), sensor.id);
                        self.storage_sensors.insert(
                            key.clone(),
                            StorageSensor {
                                key,
                                display_name: format!("{} ({})", node.name, sensor.name),
                                sensor: ActiveSensor::new(&node.id, sensor),
                            },
                        );
                        found += 1;
                    }
                    self.init_log
                        .push(format!("  Storage: {} - {} temperature sensors", node.name, found));
                }
                HardwareCategory::Motherboard => self.init_log.push(format!(
                    "  Motherboard/controller: {} - {} sensors available for inspection",
                    node.name,
                    node.sensor_count()
                )),
                HardwareCategory::Other => self
                    .init_log
                    .push(format!("  Other hardware (available for inspection): {}", node.kind)),
            }
        }

        let c = self.counts;
        self.init_log.push(format!(
            "Hardware summary: CPU {}, GPU {}, Storage {}, Motherboard {}, Other {}",
            c.cpu, c.gpu, c.storage, c.motherboard, c.other
        ));
    }

    fn indices_of(&self, category: HardwareCategory) -> impl Iterator<Item = usize> + '_ {
        self.categories
            .iter()
            .enumerate()
            .filter(move |(_, c)| **c == category)
            .map(|(i, _)| i)
    }

    fn pick(&self, category: HardwareCategory, selection: &str) -> Option<usize> {
        if selection == selection::AUTO {
            self.indices_of(category).next()
        } else {
            self.indices_of(category).find(|&i| self.nodes[i].id == selection)
        }
    }

    fn persist(&mut self, cache_updated: bool) {
        if cache_updated && !self.store.save(&mut self.cache) {
            warn!(path = ?self.store.path(), "Sensor cache not persisted, continuing in memory");
        }
    }

    /// Select the CPU whose temperature sensor becomes active.
    ///
    /// Returns the resolved node id, or `selection` unchanged if no CPU matched.
    pub fn select_cpu(&mut self, selection: &str) -> String {
        self.selected_cpu = selection.to_string();
        let Some(idx) = self.pick(HardwareCategory::Cpu, selection) else {
            warn!(selection = %selection, "CPU not found");
            self.active_cpu = None;
            return selection.to_string();
        };

        let mut trace = Vec::new();
        let (found, updated) = resolve_metric(
            &mut self.cache,
            self.provider.as_mut(),
            &mut self.nodes[idx],
            metrics::CPU_PACKAGE_TEMP,
            &self.scoring,
            &mut trace,
        );

        let node = &self.nodes[idx];
        match found {
            Some(sensor) => {
                info!(cpu = %node.name, sensor = %sensor.name, "Active CPU sensor set");
                self.failed.remove(metrics::CPU_PACKAGE_TEMP);
                self.active_cpu = Some(ActiveSensor::new(&node.id, &sensor));
            }
            None => {
                warn!(cpu = %node.name, "No temperature sensor found for CPU");
                self.active_cpu = None;
                self.failed.insert(
                    metrics::CPU_PACKAGE_TEMP.to_string(),
                    FailedResolution {
                        hardware: node.name.clone(),
                        metric: metrics::CPU_PACKAGE_TEMP.to_string(),
                        trace,
                    },
                );
            }
        }

        let id = node.id.clone();
        self.persist(updated);
        id
    }

    /// Select the GPU whose eight metric slots become active.
    ///
    /// Previously active GPU sensors are replaced wholesale, and cleared when
    /// no GPU matches.
    pub fn select_gpu(&mut self, selection: &str) -> String {
        self.selected_gpu = selection.to_string();
        self.active_gpu.clear();
        let Some(idx) = self.pick(HardwareCategory::Gpu, selection) else {
            warn!(selection = %selection, "GPU not found");
            return selection.to_string();
        };

        let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
        count_kinds(&self.nodes[idx], &mut kinds);
        let gpu_name = self.nodes[idx].name.clone();
        self.init_log.push(format!("  Resolving GPU sensors for: {}", gpu_name));
        self.init_log.push(format!("    Available sensor kinds: {:?}", kinds));

        let mut any_updated = false;
        let mut found_slots = Vec::new();
        let mut failed_slots = Vec::new();
        for (slot, metric) in GPU_SLOTS {
            let mut trace = Vec::new();
            let (found, updated) = resolve_metric(
                &mut self.cache,
                self.provider.as_mut(),
                &mut self.nodes[idx],
                metric,
                &self.scoring,
                &mut trace,
            );
            any_updated |= updated;

            let failed_key = format!("{}_{}", gpu_name, metric);
            match found {
                Some(sensor) => {
                    found_slots.push(format!("{}: {}", slot, sensor.name));
                    self.failed.remove(&failed_key);
                    self.active_gpu
                        .insert(slot.to_string(), ActiveSensor::new(&self.nodes[idx].id, &sensor));
                }
                None => {
                    failed_slots.push(slot);
                    self.failed.insert(
                        failed_key,
                        FailedResolution {
                            hardware: gpu_name.clone(),
                            metric: metric.to_string(),
                            trace,
                        },
                    );
                }
            }
        }

        self.init_log.push(format!("    Resolved: {}", found_slots.join(", ")));
        if !failed_slots.is_empty() {
            self.init_log.push(format!("    Unresolved: {}", failed_slots.join(", ")));
        }
        info!(
            gpu = %gpu_name,
            resolved = self.active_gpu.len(),
            unresolved = failed_slots.len(),
            "Active GPU sensors set"
        );

        let id = self.nodes[idx].id.clone();
        self.persist(any_updated);
        id
    }

    /// Re-enumerate hardware, invalidate the cache on change and re-apply selections
    pub fn refresh_hardware(&mut self) {
        info!("Refreshing hardware detection");
        self.active_cpu = None;
        self.active_gpu.clear();
        self.failed.clear();
        self.init_log.clear();

        self.enumerate();
        let (cpu, gpu) = (self.selected_cpu.clone(), self.selected_gpu.clone());
        self.select_cpu(&cpu);
        self.select_gpu(&gpu);
        self.log_final_status();
    }

    /// Drop every cached mapping, re-detect and re-resolve. Returns the persist result.
    pub fn reset_cache(&mut self) -> bool {
        let fingerprint = self.cache.fingerprint();
        self.cache = ResolutionCache::new();
        if let Some(fp) = &fingerprint {
            self.cache.set_fingerprint(fp);
        }

        self.active_cpu = None;
        self.active_gpu.clear();
        self.failed.clear();

        for node in &mut self.nodes {
            for err in node.refresh_all(self.provider.as_mut()) {
                warn!(hardware = %node.name, error = %err, "Refresh failed");
            }
        }
        self.detect();
        let (cpu, gpu) = (self.selected_cpu.clone(), self.selected_gpu.clone());
        self.select_cpu(&cpu);
        self.select_gpu(&gpu);

        let saved = self.store.save(&mut self.cache);
        if saved {
            info!("Sensor cache reset and hardware re-detected");
        }
        saved
    }

    /// Refresh every node and subtree; errors are returned, not raised
    pub fn refresh_values(&mut self) -> Vec<sw_error::SensorwatchError> {
        let mut errors = Vec::new();
        for node in &mut self.nodes {
            errors.extend(node.refresh_all(self.provider.as_mut()));
        }
        errors
    }

    /// Current value of an active sensor in the last refreshed tree
    pub fn sensor_value(&self, sensor: &ActiveSensor) -> Reading {
        self.nodes
            .iter()
            .find(|n| n.id == sensor.hardware_id)
            .and_then(|n| n.find_sensor_by_id(&sensor.sensor_id))
            .ok_or(ReadFault::SensorMissing)?
            .reading()
    }

    /// Run a traced search for `metric` on the top-level node named `hardware_name`
    pub fn diagnose_metric(&mut self, metric: &str, hardware_name: &str) -> String {
        let Some(node) = self.nodes.iter_mut().find(|n| n.name == hardware_name) else {
            return format!("Hardware '{}' not found", hardware_name);
        };

        let mut trace = Vec::new();
        find_sensor(metric, node, self.provider.as_mut(), &self.scoring, &mut trace);

        let mut out = format!("=== SENSOR DIAGNOSIS: {} ===\n", metric);
        out.push_str(&format!("Hardware: {} ({})\n\n", node.name, node.kind));
        out.push_str("Search:\n");
        for line in &trace {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&format!(
            "Available sensors on '{}' ({}):\n",
            node.name,
            node.sensors.len()
        ));
        for sensor in &node.sensors {
            out.push_str(&format!(
                "  - {} | {} | {}\n",
                sensor.name,
                sensor.kind,
                format_value(sensor.value)
            ));
        }
        out
    }

    /// Refreshed view of one top-level node
    pub fn hardware_details(&mut self, hardware_name: &str) -> Option<HardwareDetails> {
        let node = self.nodes.iter_mut().find(|n| n.name == hardware_name)?;
        if let Err(e) = self.provider.refresh(node) {
            warn!(hardware = %hardware_name, error = %e, "Refresh failed");
        }
        Some(HardwareDetails {
            name: node.name.clone(),
            kind: node.kind.clone(),
            id: node.id.clone(),
            sensors: node.sensors.iter().map(SensorSummary::from).collect(),
            sensor_count: node.sensors.len(),
        })
    }

    /// Refresh everything and read one sensor by id
    pub fn probe_sensor(&mut self, identifier: &str) -> Option<f64> {
        let identifier = identifier.trim();
        for err in self.refresh_values() {
            debug!(error = %err, "Refresh failed while probing");
        }
        self.nodes
            .iter()
            .find_map(|n| n.find_sensor_by_id(identifier))
            .and_then(|s| s.reading().ok())
    }

    pub fn log_final_status(&self) {
        let c = self.counts;
        info!(
            provider = %self.provider.name(),
            cpu = c.cpu,
            gpu = c.gpu,
            storage = c.storage,
            motherboard = c.motherboard,
            other = c.other,
            "Hardware detection complete"
        );
        info!(
            cpus = c.cpu,
            cpu_sensor_loaded = self.active_cpu.is_some(),
            gpus = c.gpu,
            gpu_sensors = self.active_gpu.len(),
            gpu_supported = self.gpu_supported(),
            storage_sensors = self.storage_sensors.len(),
            "Active sensors"
        );
        if !self.failed.is_empty() {
            warn!(failed = self.failed.len(), "Some sensors could not be resolved");
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn provider_error(&self) -> Option<&str> {
        self.provider_error.as_deref()
    }

    pub fn nodes(&self) -> &[HardwareNode] {
        &self.nodes
    }

    pub fn category_of(&self, index: usize) -> Option<HardwareCategory> {
        self.categories.get(index).copied()
    }

    pub fn nodes_in(&self, category: HardwareCategory) -> Vec<&HardwareNode> {
        self.indices_of(category).map(|i| &self.nodes[i]).collect()
    }

    pub fn cpus(&self) -> Vec<&HardwareNode> {
        self.nodes_in(HardwareCategory::Cpu)
    }

    pub fn gpus(&self) -> Vec<&HardwareNode> {
        self.nodes_in(HardwareCategory::Gpu)
    }

    pub fn counts(&self) -> CategoryCounts {
        self.counts
    }

    pub fn fingerprint(&self) -> &HardwareFingerprint {
        &self.fingerprint
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn active_cpu(&self) -> Option<&ActiveSensor> {
        self.active_cpu.as_ref()
    }

    pub fn active_gpu(&self) -> &BTreeMap<String, ActiveSensor> {
        &self.active_gpu
    }

    pub fn storage_sensors(&self) -> &BTreeMap<String, StorageSensor> {
        &self.storage_sensors
    }

    pub fn failed_sensors(&self) -> &BTreeMap<String, FailedResolution> {
        &self.failed
    }

    pub fn init_log(&self) -> &[String] {
        &self.init_log
    }

    /// At least one GPU was enumerated and at least one GPU slot resolved
    pub fn gpu_supported(&self) -> bool {
        self.counts.gpu > 0 && !self.active_gpu.is_empty()
    }
}

fn count_kinds(node: &HardwareNode, kinds: &mut BTreeMap<String, usize>) {
    for sensor in &node.sensors {
        *kinds.entry(sensor.kind.clone()).or_default() += 1;
    }
    for child in &node.children {
        count_kinds(child, kinds);
    }
}

/// Sensor value with two decimals, `N/A` when absent
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::hw::SnapshotProvider;
    use tempfile::TempDir;

    fn ryzen() -> HardwareNode {
        HardwareNode::new("AMD Ryzen 9 7950X", "Cpu", "/amdcpu/0")
            .with_sensor(SensorNode::new("Core 0", "Temperature", "/amdcpu/0/temperature/1", Some(47.0)))
            .with_sensor(SensorNode::new("Core (Tctl/Tdie)", "Temperature", "/amdcpu/0/temperature/2", Some(55.0)))
    }

    fn rtx() -> HardwareNode {
        HardwareNode::new("NVIDIA GeForce RTX 4070", "GpuNvidia", "/gpu-nvidia/0")
            .with_sensor(SensorNode::new("GPU Core", "Temperature", "/gpu-nvidia/0/temperature/0", Some(61.0)))
            .with_sensor(SensorNode::new("GPU Hot Spot", "Temperature", "/gpu-nvidia/0/temperature/2", Some(72.0)))
            .with_sensor(SensorNode::new("GPU Core", "Clock", "/gpu-nvidia/0/clock/0", Some(2475.0)))
            .with_sensor(SensorNode::new("GPU Memory", "Clock", "/gpu-nvidia/0/clock/4", Some(10501.0)))
            .with_sensor(SensorNode::new("GPU Package", "Power", "/gpu-nvidia/0/power/0", Some(180.0)))
            .with_sensor(SensorNode::new("GPU Memory Used", "SmallData", "/gpu-nvidia/0/smalldata/1", Some(3072.0)))
            .with_sensor(SensorNode::new("GPU Memory Total", "SmallData", "/gpu-nvidia/0/smalldata/2", Some(12288.0)))
    }

    fn ssd() -> HardwareNode {
        HardwareNode::new("Samsung SSD 990 PRO", "Storage", "/nvme/0")
            .with_sensor(SensorNode::new("Temperature", "Temperature", "/nvme/0/temperature/0", Some(41.0)))
            .with_sensor(SensorNode::new("Data Read", "Data", "/nvme/0/data/0", Some(1200.0)))
    }

    fn board() -> HardwareNode {
        HardwareNode::new("ASUS ROG STRIX X670E", "Motherboard", "/motherboard")
            .with_child(
                HardwareNode::new("Nuvoton NCT6799D", "SuperIO", "/lpc/nct6799d")
                    .with_sensor(SensorNode::new("CPU Fan", "Fan", "/lpc/nct6799d/fan/1", Some(900.0))),
            )
    }

    fn inventory(dir: &TempDir, nodes: Vec<HardwareNode>) -> HardwareInventory {
        HardwareInventory::new(
            Box::new(SnapshotProvider::from_nodes(nodes)),
            CacheStore::new(dir.path().join("sensor_cache.json")),
            ScoringSettings::default(),
        )
    }

    #[test]
    fn test_classify() {
        assert_eq!(HardwareCategory::classify("Cpu"), HardwareCategory::Cpu);
        assert_eq!(HardwareCategory::classify("GpuNvidia"), HardwareCategory::Gpu);
        assert_eq!(HardwareCategory::classify("GpuAmd"), HardwareCategory::Gpu);
        assert_eq!(HardwareCategory::classify("GpuIntel"), HardwareCategory::Gpu);
        assert_eq!(HardwareCategory::classify("Amd"), HardwareCategory::Cpu);
        assert_eq!(HardwareCategory::classify("Storage"), HardwareCategory::Storage);
        assert_eq!(HardwareCategory::classify("SuperIO"), HardwareCategory::Motherboard);
        assert_eq!(HardwareCategory::classify("EmbeddedController"), HardwareCategory::Motherboard);
        assert_eq!(HardwareCategory::classify("Network"), HardwareCategory::Other);
    }

    #[test]
    fn test_detection_and_storage_sensors() {
        let dir = TempDir::new().unwrap();
        let inv = inventory(&dir, vec![ryzen(), rtx(), ssd(), board()]);

        let counts = inv.counts();
        assert_eq!((counts.cpu, counts.gpu, counts.storage, counts.motherboard), (1, 1, 1, 1));

        let storage = inv.storage_sensors();
        assert_eq!(storage.len(), 1);
        let entry = storage.get("Samsung_SSD_990_PRO_/nvme/0/temperature/0").unwrap();
        assert_eq!(entry.display_name, "Samsung SSD 990 PRO (Temperature)");
        assert_eq!(inv.sensor_value(&entry.sensor), Ok(41.0));
        assert!(inv.init_log().iter().any(|l| l.contains("Motherboard/controller: ASUS ROG STRIX X670E - 1 sensors")));
    }

    #[test]
    fn test_select_cpu_auto_and_cache() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir, vec![ryzen(), rtx()]);

        assert_eq!(inv.select_cpu("auto"), "/amdcpu/0");
        let cpu = inv.active_cpu().unwrap().clone();
        assert_eq!(cpu.sensor_id, "/amdcpu/0/temperature/2");
        assert_eq!(inv.cache().get("/amdcpu/0_CPU_PACKAGE_TEMP"), Some("/amdcpu/0/temperature/2"));

        // persisted, and a second inventory hits the cache
        let inv2 = {
            let mut inv2 = inventory(&dir, vec![ryzen(), rtx()]);
            inv2.select_cpu("/amdcpu/0");
            inv2
        };
        assert_eq!(inv2.active_cpu(), Some(&cpu));
    }

    #[test]
    fn test_select_unknown_cpu_clears_active_sensor() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir, vec![ryzen()]);
        inv.select_cpu("auto");
        assert!(inv.active_cpu().is_some());

        assert_eq!(inv.select_cpu("/intelcpu/7"), "/intelcpu/7");
        assert!(inv.active_cpu().is_none());
    }

    #[test]
    fn test_select_gpu_resolves_slots() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir, vec![ryzen(), rtx()]);

        assert_eq!(inv.select_gpu("auto"), "/gpu-nvidia/0");
        let gpu = inv.active_gpu();
        assert_eq!(gpu["gpu_core_temp"].sensor_id, "/gpu-nvidia/0/temperature/0");
        assert_eq!(gpu["gpu_hotspot_temp"].sensor_id, "/gpu-nvidia/0/temperature/2");
        assert_eq!(gpu["core_clock"].sensor_id, "/gpu-nvidia/0/clock/0");
        assert_eq!(gpu["memory_clock"].sensor_id, "/gpu-nvidia/0/clock/4");
        assert_eq!(gpu["power"].sensor_id, "/gpu-nvidia/0/power/0");
        assert_eq!(gpu["vram_used"].sensor_id, "/gpu-nvidia/0/smalldata/1");
        assert_eq!(gpu["vram_total"].sensor_id, "/gpu-nvidia/0/smalldata/2");
        assert!(inv.gpu_supported());
    }

    #[test]
    fn test_gpu_without_temperatures_records_failures() {
        let dir = TempDir::new().unwrap();
        let arc = HardwareNode::new("Intel Arc A770", "GpuIntel", "/gpu-intel/0")
            .with_sensor(SensorNode::new("GPU Package", "Power", "/gpu-intel/0/power/0", Some(190.0)));
        let mut inv = inventory(&dir, vec![arc]);
        inv.select_gpu("auto");

        assert_eq!(inv.active_gpu().len(), 1);
        assert_eq!(inv.active_gpu()["power"].sensor_id, "/gpu-intel/0/power/0");
        let failed = inv.failed_sensors();
        assert_eq!(failed.len(), 7);
        let core = &failed["Intel Arc A770_GPU_CORE_TEMP"];
        assert_eq!(core.metric, "GPU_CORE_TEMP");
        assert!(core.trace.iter().any(|l| l.starts_with("No Temperature sensor scored above")));
        assert!(inv.init_log().iter().any(|l| l.contains("Unresolved: gpu_core_temp")));
    }

    #[test]
    fn test_select_unknown_gpu_clears_slots() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir, vec![rtx()]);
        inv.select_gpu("auto");
        assert!(inv.gpu_supported());
        assert_eq!(inv.select_gpu("/gpu-amd/3"), "/gpu-amd/3");
        assert!(inv.active_gpu().is_empty());
        assert!(!inv.gpu_supported());
    }

    #[test]
    fn test_missing_cpu_records_failure() {
        let dir = TempDir::new().unwrap();
        let bare = HardwareNode::new("Mystery CPU", "Cpu", "/cpu/x")
            .with_sensor(SensorNode::new("Bus Speed", "Clock", "/cpu/x/clock/0", Some(100.0)));
        let mut inv = inventory(&dir, vec![bare]);
        assert_eq!(inv.select_cpu("auto"), "/cpu/x");
        assert!(inv.active_cpu().is_none());
        let failure = &inv.failed_sensors()["CPU_PACKAGE_TEMP"];
        assert_eq!(failure.hardware, "Mystery CPU");
        assert_eq!(inv.cache().entry_count(), 0);
    }

    #[test]
    fn test_stale_cache_entry_falls_back_to_search() {
        let dir = TempDir::new().unwrap();
        let mut cache = ResolutionCache::new();
        let store = CacheStore::new(dir.path().join("sensor_cache.json"));
        cache.set_fingerprint(&HardwareFingerprint::from_nodes(&[ryzen()]));
        cache.insert("/amdcpu/0_CPU_PACKAGE_TEMP", "/amdcpu/0/temperature/99");
        assert!(store.save(&mut cache));

        let mut inv = inventory(&dir, vec![ryzen()]);
        inv.select_cpu("auto");
        assert_eq!(inv.active_cpu().unwrap().sensor_id, "/amdcpu/0/temperature/2");
        assert_eq!(inv.cache().get("/amdcpu/0_CPU_PACKAGE_TEMP"), Some("/amdcpu/0/temperature/2"));
    }

    #[test]
    fn test_resolve_metric_trace_on_cache_hit() {
        let mut cache = ResolutionCache::new();
        cache.insert("/amdcpu/0_CPU_PACKAGE_TEMP", "/amdcpu/0/temperature/2");
        let mut provider = SnapshotProvider::from_nodes(vec![ryzen()]);
        let mut node = ryzen();
        let mut trace = Vec::new();

        let (found, updated) = resolve_metric(
            &mut cache,
            &mut provider,
            &mut node,
            metrics::CPU_PACKAGE_TEMP,
            &ScoringSettings::default(),
            &mut trace,
        );
        assert_eq!(found.unwrap().id, "/amdcpu/0/temperature/2");
        assert!(!updated);
        assert_eq!(trace, vec!["Found in cache: 'Core (Tctl/Tdie)'".to_string()]);
    }

    #[test]
    fn test_diagnose_metric_and_details() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir, vec![ryzen(), ssd()]);

        let report = inv.diagnose_metric(metrics::CPU_PACKAGE_TEMP, "AMD Ryzen 9 7950X");
        assert!(report.starts_with("=== SENSOR DIAGNOSIS: CPU_PACKAGE_TEMP ==="));
        assert!(report.contains("Selected 'Core (Tctl/Tdie)'"));
        assert!(report.contains("  - Core 0 | Temperature | 47.00"));
        assert_eq!(inv.diagnose_metric(metrics::CPU_PACKAGE_TEMP, "Nope"), "Hardware 'Nope' not found");

        let details = inv.hardware_details("Samsung SSD 990 PRO").unwrap();
        assert_eq!(details.sensor_count, 2);
        assert_eq!(details.id, "/nvme/0");
        assert!(inv.hardware_details("Nope").is_none());
    }

    #[test]
    fn test_single_sensor_lookup() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir, vec![ryzen(), board()]);
        assert_eq!(inv.probe_sensor("/lpc/nct6799d/fan/1"), Some(900.0));
        assert_eq!(inv.probe_sensor("/lpc/nct6799d/fan/9"), None);
    }

    #[test]
    fn test_provider_failure_leaves_empty_inventory() {
        let dir = TempDir::new().unwrap();
        let inv = HardwareInventory::new(
            Box::new(crate::hw::HwmonProvider::with_base(dir.path().join("missing"))),
            CacheStore::new(dir.path().join("sensor_cache.json")),
            ScoringSettings::default(),
        );
        assert!(inv.nodes().is_empty());
        assert!(inv.provider_error().is_some());
        assert!(inv.init_log()[0].starts_with("ERROR:"));
    }

    #[test]
    fn test_provider_failure_keeps_persisted_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sensor_cache.json");
        let mut first = inventory(&dir, vec![ryzen()]);
        first.select_cpu("auto");
        assert_eq!(CacheStore::new(&path).load().entry_count(), 1);

        let inv = HardwareInventory::new(
            Box::new(crate::hw::HwmonProvider::with_base(dir.path().join("missing"))),
            CacheStore::new(&path),
            ScoringSettings::default(),
        );
        assert!(inv.provider_error().is_some());
        assert_eq!(inv.cache().entry_count(), 1);
        assert!(inv.init_log().iter().any(|l| l.contains("sensor cache left untouched")));

        let on_disk = CacheStore::new(&path).load();
        assert_eq!(
            on_disk.get(&cache_key("/amdcpu/0", metrics::CPU_PACKAGE_TEMP)),
            Some("/amdcpu/0/temperature/2")
        );
    }

    /// Snapshot provider that stays reachable after being boxed
    struct Shared(std::sync::Arc<std::sync::Mutex<SnapshotProvider>>);

    impl HardwareProvider for Shared {
        fn name(&self) -> &str {
            "shared-snapshot"
        }

        fn enumerate(&mut self) -> sw_error::Result<Vec<HardwareNode>> {
            self.0.lock().unwrap().enumerate()
        }

        fn refresh(&mut self, node: &mut HardwareNode) -> sw_error::Result<()> {
            self.0.lock().unwrap().refresh(node)
        }
    }

    #[test]
    fn test_refresh_hardware_after_cpu_swap() {
        let dir = TempDir::new().unwrap();
        let hardware = std::sync::Arc::new(std::sync::Mutex::new(SnapshotProvider::from_nodes(vec![
            ryzen(),
            rtx(),
        ])));
        let mut inv = HardwareInventory::new(
            Box::new(Shared(hardware.clone())),
            CacheStore::new(dir.path().join("sensor_cache.json")),
            ScoringSettings::default(),
        );
        inv.select_cpu("auto");
        inv.select_gpu("auto");
        let old_fingerprint = inv.fingerprint().clone();

        {
            let mut provider = hardware.lock().unwrap();
            assert!(provider.remove_hardware("/amdcpu/0"));
            provider.add_hardware(
                HardwareNode::new("Intel Core i9-14900K", "Cpu", "/intelcpu/0")
                    .with_sensor(SensorNode::new("CPU Package", "Temperature", "/intelcpu/0/temperature/0", Some(70.0))),
            );
        }
        inv.refresh_hardware();

        assert_ne!(inv.fingerprint(), &old_fingerprint);
        assert!(inv.init_log().iter().any(|l| l.contains("Hardware configuration changed")));
        let cpu = inv.active_cpu().unwrap().clone();
        assert_eq!(cpu.sensor_id, "/intelcpu/0/temperature/0");
        assert_eq!(inv.sensor_value(&cpu), Ok(70.0));
        assert!(inv.cache().get(&cache_key("/amdcpu/0", metrics::CPU_PACKAGE_TEMP)).is_none());
        assert_eq!(
            inv.cache().get(&cache_key("/intelcpu/0", metrics::CPU_PACKAGE_TEMP)),
            Some("/intelcpu/0/temperature/0")
        );
        assert!(inv.gpu_supported());

        let on_disk = inv.store().load();
        assert_eq!(on_disk.fingerprint(), Some(inv.fingerprint().clone()));
    }

    #[test]
    fn test_reset_cache_rediscovers_mappings() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir, vec![ryzen(), rtx()]);
        inv.select_cpu("auto");
        inv.cache.insert("/gone/0_CPU_PACKAGE_TEMP", "/gone/0/temperature/0");

        assert!(inv.reset_cache());
        assert!(inv.cache().get("/gone/0_CPU_PACKAGE_TEMP").is_none());
        assert_eq!(inv.cache().fingerprint(), Some(inv.fingerprint().clone()));
        assert_eq!(
            inv.active_cpu().map(|s| s.sensor_id.as_str()),
            Some("/amdcpu/0/temperature/2")
        );
        assert!(!inv.active_gpu().is_empty());

        let on_disk = inv.store().load();
        assert!(on_disk.get("/gone/0_CPU_PACKAGE_TEMP").is_none());
        assert_eq!(
            on_disk.get(&cache_key("/amdcpu/0", metrics::CPU_PACKAGE_TEMP)),
            Some("/amdcpu/0/temperature/2")
        );
    }
}
