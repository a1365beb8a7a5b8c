//! Hardware tree model
//!
//! A provider hands out an owned forest of [`HardwareNode`]s on every enumeration
//! pass. The engine never keeps references into a provider's live state: nodes are
//! plain values that a provider refreshes in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use sw_error::Result;

/// One sensor exposed by a hardware node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorNode {
    pub name: String,
    /// Free-form sensor category such as "Temperature", "Clock", "Power", "SmallData"
    pub kind: String,
    /// Stable identifier, unique within the owning hardware subtree
    pub id: String,
    #[serde(default)]
    pub value: Option<f64>,
}

impl SensorNode {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, id: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            id: id.into(),
            value,
        }
    }

    /// Current value as a reading
    pub fn reading(&self) -> Reading {
        match self.value {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(ReadFault::NotFinite(v)),
            None => Err(ReadFault::NoValue),
        }
    }
}

/// A hardware device with its sensors and sub-devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareNode {
    pub name: String,
    /// Free-form vendor/driver category string, not a closed set
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub sensors: Vec<SensorNode>,
    #[serde(default)]
    pub children: Vec<HardwareNode>,
}

impl HardwareNode {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            id: id.into(),
            sensors: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_sensor(mut self, sensor: SensorNode) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn with_child(mut self, child: HardwareNode) -> Self {
        self.children.push(child);
        self
    }

    /// Sensor with the given id among this node's own sensors
    pub fn direct_sensor(&self, sensor_id: &str) -> Option<&SensorNode> {
        self.sensors.iter().find(|s| s.id == sensor_id)
    }

    /// Sensor with the given id anywhere in this subtree
    pub fn find_sensor_by_id(&self, sensor_id: &str) -> Option<&SensorNode> {
        self.direct_sensor(sensor_id)
            .or_else(|| self.children.iter().find_map(|c| c.find_sensor_by_id(sensor_id)))
    }

    /// Number of sensors in this subtree
    pub fn sensor_count(&self) -> usize {
        self.sensors.len() + self.children.iter().map(HardwareNode::sensor_count).sum::<usize>()
    }

    /// Refresh this node and every descendant, parent before children.
    ///
    /// Refresh failures are collected rather than aborting the walk.
    pub fn refresh_all(&mut self, provider: &mut dyn HardwareProvider) -> Vec<sw_error::SensorwatchError> {
        let mut errors = Vec::new();
        self.refresh_into(provider, &mut errors);
        errors
    }

    fn refresh_into(&mut self, provider: &mut dyn HardwareProvider, errors: &mut Vec<sw_error::SensorwatchError>) {
        if let Err(e) = provider.refresh(self) {
            errors.push(e);
        }
        for child in &mut self.children {
            child.refresh_into(provider, errors);
        }
    }
}

/// Why a sensor read produced no value
#[derive(Debug, Clone, PartialEq)]
pub enum ReadFault {
    /// The sensor exists but reported no value
    NoValue,
    /// The sensor reported NaN or infinity
    NotFinite(f64),
    /// The sensor (or its hardware) is gone from the current tree
    SensorMissing,
    /// The provider failed while reading
    Provider(String),
}

impl fmt::Display for ReadFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadFault::NoValue => write!(f, "sensor has no value"),
            ReadFault::NotFinite(v) => write!(f, "sensor value is not finite ({})", v),
            ReadFault::SensorMissing => write!(f, "sensor not present in hardware tree"),
            ReadFault::Provider(msg) => write!(f, "provider error: {}", msg),
        }
    }
}

/// Outcome of a single sensor read
pub type Reading = std::result::Result<f64, ReadFault>;

/// Source of hardware trees
pub trait HardwareProvider: Send {
    /// Short label used in logs and reports
    fn name(&self) -> &str;

    /// Enumerate the current top-level hardware nodes, children included
    fn enumerate(&mut self) -> Result<Vec<HardwareNode>>;

    /// Update the sensor values of `node` itself; children are refreshed separately
    fn refresh(&mut self, node: &mut HardwareNode) -> Result<()>;
}
