//! Linux hwmon provider
//!
//! Every `hwmonN` directory becomes one top-level hardware node. Node ids are
//! built from the driver name and the stable device identity (PCI address, I2C
//! bus/address or platform device) so they survive hwmon renumbering.
//!
//! # Attributes
//!
//! - `tempN_input` - Temperature, millidegrees Celsius
//! - `fanN_input` - Fan, RPM
//! - `inN_input` - Voltage, millivolts
//! - `powerN_average` / `powerN_input` - Power, microwatts
//! - `freqN_input` - Clock, hertz
//! - `device/mem_info_vram_used` / `device/mem_info_vram_total` - SmallData, bytes

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use sw_error::{Result, SensorwatchError};
use tracing::{debug, info, trace, warn};

use crate::constants::{paths, units};
use crate::tree::{HardwareNode, HardwareProvider, SensorNode};

/// How a raw attribute value converts to the reported unit
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scale {
    Divide(f64),
    Identity,
}

impl Scale {
    fn apply(self, raw: f64) -> f64 {
        match self {
            Scale::Divide(d) => raw / d,
            Scale::Identity => raw,
        }
    }
}

#[derive(Debug, Clone)]
struct Attribute {
    path: PathBuf,
    scale: Scale,
}

/// Node kind derived from the hwmon driver name
pub fn kind_for_driver(driver: &str) -> &'static str {
    let d = driver.to_ascii_lowercase();
    match d.as_str() {
        "coretemp" | "k10temp" | "zenpower" => "Cpu",
        "amdgpu" | "radeon" => "GpuAmd",
        "nouveau" | "nvidia" => "GpuNvidia",
        "i915" | "xe" => "GpuIntel",
        "nvme" | "drivetemp" => "Storage",
        "acpitz" => "Motherboard",
        "it87" => "SuperIO",
        _ if d.starts_with("nct") || d.starts_with("w83") || d.starts_with("f71") || d.starts_with("asus") => {
            "SuperIO"
        }
        _ => "Other",
    }
}

fn pci_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9a-fA-F]{4}:[0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-9a-fA-F]").ok())
        .as_ref()
}

fn i2c_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"i2c-(\d+)/(\d+)-([0-9a-fA-F]{4})").ok())
        .as_ref()
}

fn attribute_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(temp|fan|in|power|freq)(\d+)_(input|average)$").ok())
        .as_ref()
}

/// Stable identity of the device behind a hwmon directory
fn device_identity(hwmon_dir: &Path) -> String {
    let fallback = || {
        hwmon_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string())
    };

    let Ok(real) = fs::canonicalize(hwmon_dir.join("device")) else {
        return fallback();
    };
    let real = real.to_string_lossy();

    if let Some(caps) = i2c_pattern().and_then(|re| re.captures(&real)) {
        return format!("i2c-{}-{}", &caps[1], caps[3].to_ascii_lowercase());
    }
    // the innermost PCI function owns the device
    if let Some(m) = pci_pattern().and_then(|re| re.find_iter(&real).last()) {
        return m.as_str().to_ascii_lowercase();
    }
    if real.contains("/platform/") {
        if let Some(name) = real.rsplit('/').next().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
    }
    fallback()
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_value(attr: &Attribute) -> Option<f64> {
    let raw = read_trimmed(&attr.path)?.parse::<f64>().ok()?;
    Some(attr.scale.apply(raw))
}

/// Provider backed by `/sys/class/hwmon` (or another base path)
#[derive(Debug)]
pub struct HwmonProvider {
    base: PathBuf,
    attributes: HashMap<String, Attribute>,
}

impl Default for HwmonProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HwmonProvider {
    pub fn new() -> Self {
        Self::with_base(paths::HWMON_BASE)
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            attributes: HashMap::new(),
        }
    }

    fn read_chip(&mut self, dir: &Path, id: &str) -> Result<HardwareNode> {
        let driver = read_trimmed(&dir.join("name")).unwrap_or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string())
        });
        let mut node = HardwareNode::new(driver.clone(), kind_for_driver(&driver), id);

        let mut files: Vec<String> = fs::read_dir(dir)
            .map_err(|source| SensorwatchError::FileRead {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        files.sort_by_key(|f| attribute_sort_key(f));

        for file in &files {
            let Some(caps) = attribute_pattern().and_then(|re| re.captures(file)) else {
                continue;
            };
            let (class, index, suffix) = (&caps[1], &caps[2], &caps[3]);
            // prefer powerN_average when both are exposed
            if class == "power" && suffix == "input" && files.iter().any(|f| f == &format!("power{}_average", index)) {
                continue;
            }

            let base = format!("{}{}", class, index);
            let (kind, scale) = match class {
                "temp" => ("Temperature", Scale::Divide(units::MILLIDEGREE_DIVISOR)),
                "fan" => ("Fan", Scale::Identity),
                "in" => ("Voltage", Scale::Divide(units::MILLIVOLT_DIVISOR)),
                "power" => ("Power", Scale::Divide(units::MICROWATT_DIVISOR)),
                _ => ("Clock", Scale::Divide(units::HERTZ_PER_MHZ)),
            };
            let name = read_trimmed(&dir.join(format!("{}_label", base))).unwrap_or_else(|| base.clone());
            self.add_sensor(&mut node, name, kind, &base, dir.join(file), scale);
        }

        let device = dir.join("device");
        for (file, name) in [
            ("mem_info_vram_used", "GPU Memory Used"),
            ("mem_info_vram_total", "GPU Memory Total"),
        ] {
            let path = device.join(file);
            if path.is_file() {
                self.add_sensor(&mut node, name.to_string(), "SmallData", file, path, Scale::Divide(units::BYTES_PER_MIB));
            }
        }

        trace!(chip = %node.name, id = %node.id, sensors = node.sensors.len(), "Read hwmon chip");
        Ok(node)
    }

    fn add_sensor(&mut self, node: &mut HardwareNode, name: String, kind: &str, base: &str, path: PathBuf, scale: Scale) {
        let id = format!("{}/{}", node.id, base);
        let attr = Attribute { path, scale };
        let value = read_value(&attr);
        self.attributes.insert(id.clone(), attr);
        node.sensors.push(SensorNode::new(name, kind, id, value));
    }
}

/// Orders `temp2_input` before `temp10_input`
fn attribute_sort_key(file: &str) -> (String, u32, String) {
    match attribute_pattern().and_then(|re| re.captures(file)) {
        Some(caps) => (caps[1].to_string(), caps[2].parse().unwrap_or(0), caps[3].to_string()),
        None => (file.to_string(), 0, String::new()),
    }
}

impl HardwareProvider for HwmonProvider {
    fn name(&self) -> &str {
        "hwmon"
    }

    fn enumerate(&mut self) -> Result<Vec<HardwareNode>> {
        if !self.base.is_dir() {
            return Err(SensorwatchError::ProviderUnavailable(format!(
                "{} does not exist",
                self.base.display()
            )));
        }

        self.attributes.clear();
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.base)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        dirs.sort_by_key(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let index = name.trim_start_matches("hwmon").parse::<u32>().unwrap_or(u32::MAX);
            (index, name)
        });

        let mut nodes: Vec<HardwareNode> = Vec::new();
        for dir in dirs {
            let driver = read_trimmed(&dir.join("name")).unwrap_or_default();
            let mut id = format!("{}/{}", driver, device_identity(&dir));
            let mut n = 2;
            while nodes.iter().any(|node| node.id == id) {
                id = format!("{}/{}#{}", driver, device_identity(&dir), n);
                n += 1;
            }

            match self.read_chip(&dir, &id) {
                Ok(node) => {
                    debug!(chip = %node.name, kind = %node.kind, id = %node.id, sensors = node.sensors.len(), "Found hwmon chip");
                    nodes.push(node);
                }
                Err(e) => warn!(path = ?dir, error = %e, "Skipping unreadable hwmon chip"),
            }
        }

        info!(chips = nodes.len(), "hwmon enumeration complete");
        Ok(nodes)
    }

    fn refresh(&mut self, node: &mut HardwareNode) -> Result<()> {
        for sensor in &mut node.sensors {
            let Some(attr) = self.attributes.get(&sensor.id) else {
                return Err(SensorwatchError::refresh(
                    &node.name,
                    format!("{} is not part of the last enumeration", sensor.id),
                ));
            };
            sensor.value = read_value(attr);
        }
        Ok(())
    }
}
