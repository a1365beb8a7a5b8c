//! Compiled-in metric profiles
//!
//! A profile describes how to recognize the sensor behind a logical metric:
//! name fragments to look for, fragments that veto a sensor, the subset of
//! fragments that earn a bonus, and the sensor kind that must match.
//!
//! Search terms include localized fragments (German) because some hardware
//! layers translate sensor names.

/// Logical metric names
pub mod metrics {
    pub const CPU_PACKAGE_TEMP: &str = "CPU_PACKAGE_TEMP";
    pub const GPU_CORE_TEMP: &str = "GPU_CORE_TEMP";
    pub const GPU_HOTSPOT_TEMP: &str = "GPU_HOTSPOT_TEMP";
    pub const GPU_MEMORY_TEMP: &str = "GPU_MEMORY_TEMP";
    pub const GPU_CORE_CLOCK: &str = "GPU_CORE_CLOCK";
    pub const GPU_MEMORY_CLOCK: &str = "GPU_MEMORY_CLOCK";
    pub const GPU_POWER: &str = "GPU_POWER";
    pub const VRAM_USED: &str = "VRAM_USED";
    pub const VRAM_TOTAL: &str = "VRAM_TOTAL";
    pub const STORAGE_TEMP: &str = "STORAGE_TEMP";
}

/// GPU slots resolved on GPU selection, as (slot name, metric name)
pub const GPU_SLOTS: [(&str, &str); 8] = [
    ("gpu_core_temp", metrics::GPU_CORE_TEMP),
    ("gpu_hotspot_temp", metrics::GPU_HOTSPOT_TEMP),
    ("gpu_memory_temp", metrics::GPU_MEMORY_TEMP),
    ("core_clock", metrics::GPU_CORE_CLOCK),
    ("memory_clock", metrics::GPU_MEMORY_CLOCK),
    ("power", metrics::GPU_POWER),
    ("vram_used", metrics::VRAM_USED),
    ("vram_total", metrics::VRAM_TOTAL),
];

/// Search profile for one logical metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricProfile {
    pub name: &'static str,
    pub search_terms: &'static [&'static str],
    pub exclude_terms: &'static [&'static str],
    pub priority_terms: &'static [&'static str],
    /// Must equal the sensor kind, compared case-insensitively
    pub sensor_kind: &'static str,
    /// Hint only; not enforced while walking the tree
    pub hardware_kinds: &'static [&'static str],
}

impl MetricProfile {
    pub fn is_priority_term(&self, term: &str) -> bool {
        self.priority_terms.iter().any(|p| p.eq_ignore_ascii_case(term))
    }
}

const GPU_KINDS: &[&str] = &["Gpu", "GPU", "GpuNvidia", "GpuAmd", "GpuIntel"];

static PROFILES: &[MetricProfile] = &[
    MetricProfile {
        name: metrics::CPU_PACKAGE_TEMP,
        search_terms: &[
            // Intel
            "package", "paket", "gehäuse", "cpu package", "core package",
            // AMD
            "tctl", "tdie", "core (tctl)", "core (tdie)", "core (tctl/tdie)",
            "cpu (tctl)", "cpu (tdie)", "amd cpu", "ryzen",
            // generic
            "cpu temp", "cpu temperature", "processor", "prozessor",
            "core temp", "core temperature", "cpu die", "die temp",
        ],
        exclude_terms: &["core 0", "core 1", "core 2", "core 3", "core 4", "core 5", "core 6", "core 7"],
        priority_terms: &["package", "tctl", "tdie"],
        sensor_kind: "Temperature",
        hardware_kinds: &["Cpu", "CPU"],
    },
    MetricProfile {
        name: metrics::GPU_CORE_TEMP,
        search_terms: &[
            "gpu core", "gpu temperature", "core temp", "gpu temp", "gpu-kern",
            "graphics temperature", "nvidia",
            "gpu", "radeon", "amd gpu", "graphics core", "gpu die",
            "temperature", "temp", "core", "edge",
        ],
        exclude_terms: &["junction", "hotspot", "hot spot", "memory", "mem"],
        priority_terms: &["gpu core", "gpu temp", "gpu"],
        sensor_kind: "Temperature",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::GPU_HOTSPOT_TEMP,
        search_terms: &[
            "hot spot", "hotspot", "junction", "verbindungstemperatur",
            "gpu junction", "tj-max", "tjunction", "gpu hotspot",
        ],
        exclude_terms: &[],
        priority_terms: &["hotspot", "junction"],
        sensor_kind: "Temperature",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::GPU_MEMORY_TEMP,
        search_terms: &[
            "memory junction", "memory temp", "mem junction", "mem temp",
            "speicherverbindung", "vram temp", "gpu memory", "memory temperature",
            "mem junction temp", "memory tj", "mem",
        ],
        exclude_terms: &[],
        priority_terms: &["memory junction", "mem junction", "memory temp"],
        sensor_kind: "Temperature",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::GPU_CORE_CLOCK,
        search_terms: &[
            "gpu core", "core clock", "gpu clock", "gpu-kerntakt", "kerntakt",
            "graphics clock", "base clock", "gpu speed", "core speed",
            "shader clock", "cuda clock", "sclk",
        ],
        exclude_terms: &["memory", "mem", "vram"],
        priority_terms: &["gpu core", "core clock", "gpu clock"],
        sensor_kind: "Clock",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::GPU_MEMORY_CLOCK,
        search_terms: &[
            "gpu memory", "memory clock", "mem clock", "speichertakt",
            "vram clock", "memory speed", "mem speed", "effective memory clock", "mclk",
        ],
        exclude_terms: &[],
        priority_terms: &["memory clock", "mem clock", "gpu memory"],
        sensor_kind: "Clock",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::GPU_POWER,
        search_terms: &[
            "gpu package", "gpu power", "power", "gpu-leistung", "leistung",
            "total graphics power", "board power", "chip power", "ppt",
            "power consumption", "watt", "w",
        ],
        exclude_terms: &[],
        priority_terms: &["gpu power", "power", "gpu package"],
        sensor_kind: "Power",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::VRAM_USED,
        search_terms: &[
            "gpu memory used", "memory used", "vram belegt", "genutzter speicher",
            "dedicated memory used", "gpu dedicated memory used", "video memory used",
        ],
        exclude_terms: &[],
        priority_terms: &["memory used", "gpu memory used"],
        sensor_kind: "SmallData",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::VRAM_TOTAL,
        search_terms: &[
            "gpu memory total", "memory total", "vram gesamt", "gesamtspeicher",
            "dedicated memory total", "gpu dedicated memory total", "video memory total",
        ],
        exclude_terms: &[],
        priority_terms: &["memory total", "gpu memory total"],
        sensor_kind: "SmallData",
        hardware_kinds: GPU_KINDS,
    },
    MetricProfile {
        name: metrics::STORAGE_TEMP,
        search_terms: &["temperature", "temperatur", "temp"],
        exclude_terms: &[],
        priority_terms: &[],
        sensor_kind: "Temperature",
        hardware_kinds: &["Storage", "Hdd", "SSD", "NVMe", "M2"],
    },
];

/// Look up the profile for a metric name
pub fn profile_for(metric_name: &str) -> Option<&'static MetricProfile> {
    PROFILES.iter().find(|p| p.name == metric_name)
}

/// All compiled-in profiles
pub fn all_profiles() -> &'static [MetricProfile] {
    PROFILES
}
