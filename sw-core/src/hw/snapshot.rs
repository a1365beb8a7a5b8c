//! Snapshot provider
//!
//! Serves a static hardware tree, either built in memory or loaded from a JSON
//! file of the form `{"hardware": [HardwareNode, ...]}`. A file-backed snapshot
//! is re-read whenever the file changes, so edits show up on the next refresh.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use sw_error::{Result, SensorwatchError};
use tracing::{debug, warn};

use crate::constants::limits::MAX_SNAPSHOT_FILE_SIZE;
use crate::tree::{HardwareNode, HardwareProvider};

/// On-disk snapshot format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub hardware: Vec<HardwareNode>,
}

#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    hardware: Vec<HardwareNode>,
    source: Option<PathBuf>,
    loaded_at: Option<SystemTime>,
}

fn find_node_mut<'a>(nodes: &'a mut [HardwareNode], id: &str) -> Option<&'a mut HardwareNode> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_node<'a>(nodes: &'a [HardwareNode], id: &str) -> Option<&'a HardwareNode> {
    nodes
        .iter()
        .find_map(|n| if n.id == id { Some(n) } else { find_node(&n.children, id) })
}

fn read_snapshot(path: &Path) -> Result<Vec<HardwareNode>> {
    let size = fs::metadata(path)
        .map_err(|source| SensorwatchError::FileRead {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if size > MAX_SNAPSHOT_FILE_SIZE {
        return Err(SensorwatchError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max_size: MAX_SNAPSHOT_FILE_SIZE,
        });
    }
    let content = fs::read_to_string(path).map_err(|source| SensorwatchError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let file: SnapshotFile = serde_json::from_str(&content)?;
    Ok(file.hardware)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl SnapshotProvider {
    pub fn from_nodes(hardware: Vec<HardwareNode>) -> Self {
        Self {
            hardware,
            source: None,
            loaded_at: None,
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let hardware = read_snapshot(&path)?;
        debug!(path = ?path, nodes = hardware.len(), "Loaded hardware snapshot");
        Ok(Self {
            hardware,
            loaded_at: modified(&path),
            source: Some(path),
        })
    }

    /// Re-read the backing file if it changed since the last load
    fn reload_if_changed(&mut self) {
        let Some(path) = &self.source else {
            return;
        };
        let current = modified(path);
        if current.is_some() && current == self.loaded_at {
            return;
        }
        match read_snapshot(path) {
            Ok(hardware) => {
                self.hardware = hardware;
                self.loaded_at = current;
            }
            Err(e) => warn!(path = ?path, error = %e, "Keeping previous snapshot"),
        }
    }

    /// Inject a value; returns false when no sensor has that id
    pub fn set_value(&mut self, sensor_id: &str, value: Option<f64>) -> bool {
        fn visit(nodes: &mut [HardwareNode], sensor_id: &str, value: Option<f64>) -> bool {
            for node in nodes {
                if let Some(sensor) = node.sensors.iter_mut().find(|s| s.id == sensor_id) {
                    sensor.value = value;
                    return true;
                }
                if visit(&mut node.children, sensor_id, value) {
                    return true;
                }
            }
            false
        }
        visit(&mut self.hardware, sensor_id, value)
    }

    /// Add a top-level node, as if the device had been plugged in
    pub fn add_hardware(&mut self, node: HardwareNode) {
        self.hardware.push(node);
    }

    /// Remove a top-level node by id
    pub fn remove_hardware(&mut self, id: &str) -> bool {
        let before = self.hardware.len();
        self.hardware.retain(|n| n.id != id);
        self.hardware.len() != before
    }

    pub fn hardware(&self) -> &[HardwareNode] {
        &self.hardware
    }

    pub fn hardware_mut(&mut self, id: &str) -> Option<&mut HardwareNode> {
        find_node_mut(&mut self.hardware, id)
    }
}

impl HardwareProvider for SnapshotProvider {
    fn name(&self) -> &str {
        if self.source.is_some() {
            "snapshot-file"
        } else {
            "snapshot"
        }
    }

    fn enumerate(&mut self) -> Result<Vec<HardwareNode>> {
        self.reload_if_changed();
        Ok(self.hardware.clone())
    }

    fn refresh(&mut self, node: &mut HardwareNode) -> Result<()> {
        self.reload_if_changed();
        let Some(current) = find_node(&self.hardware, &node.id) else {
            return Err(SensorwatchError::HardwareNotFound(node.id.clone()));
        };
        for sensor in &mut node.sensors {
            sensor.value = current.direct_sensor(&sensor.id).and_then(|s| s.value);
        }
        Ok(())
    }
}
