//! Human-readable diagnostics
//!
//! Text dumps for troubleshooting. Nothing here is meant to be parsed.

use std::fmt::Write;

use crate::health::HealthReport;
use crate::inventory::{format_value, HardwareInventory};
use crate::tree::{HardwareNode, SensorNode};

/// Refresh all hardware and render the full diagnostic report
pub fn diagnostic_report(inventory: &mut HardwareInventory) -> String {
    for err in inventory.refresh_values() {
        tracing::debug!(error = %err, "Refresh failed while building report");
    }
    render_report(inventory)
}

/// Render the diagnostic report from the tree as it is
pub fn render_report(inventory: &HardwareInventory) -> String {
    let mut out = String::new();
    let cache = inventory.cache();

    let _ = writeln!(out, "=== SENSOR DIAGNOSIS ===");
    let _ = writeln!(out, "Provider: {}", inventory.provider_name());
    let _ = writeln!(
        out,
        "Hardware fingerprint: {} ({} devices)",
        inventory.fingerprint().digest(),
        inventory.nodes().len()
    );
    let _ = writeln!(out, "Cache entries: {}", cache.entry_count());
    if let Some(err) = inventory.provider_error() {
        let _ = writeln!(out, "Provider error: {}", err);
    }
    out.push('\n');

    if !inventory.init_log().is_empty() {
        let _ = writeln!(out, "=== INITIALIZATION LOG ===");
        for line in inventory.init_log() {
            let _ = writeln!(out, "{}", line);
        }
        out.push('\n');
    }

    let failed = inventory.failed_sensors();
    if !failed.is_empty() {
        let _ = writeln!(out, "=== FAILED SENSORS ===");
        for (key, failure) in failed {
            let _ = writeln!(out, "Sensor: {}", key);
            let _ = writeln!(out, "Hardware: {}", failure.hardware);
            if !failure.trace.is_empty() {
                let _ = writeln!(out, "Search trace:");
                for line in &failure.trace {
                    let _ = writeln!(out, "  {}", line);
                }
            }
            out.push('\n');
        }
    }

    let _ = writeln!(out, "=== HARDWARE OVERVIEW ===");
    for node in inventory.nodes() {
        render_node(&mut out, node, 0);
    }

    let _ = write!(out, "\n\n=== CACHE ===\n");
    for (key, sensor_id) in cache.entries() {
        let _ = writeln!(out, "{}: {}", key, sensor_id.as_str().unwrap_or_default());
    }
    out
}

fn render_node(out: &mut String, node: &HardwareNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "\n{}=== {} ({}) ===\n", indent, node.name, node.kind);
    let _ = writeln!(out, "{}Identifier: {}", indent, node.id);

    // grouped by kind, in order of first appearance
    let mut groups: Vec<(&str, Vec<&SensorNode>)> = Vec::new();
    for sensor in &node.sensors {
        match groups.iter_mut().find(|(kind, _)| *kind == sensor.kind) {
            Some((_, sensors)) => sensors.push(sensor),
            None => groups.push((sensor.kind.as_str(), vec![sensor])),
        }
    }
    for (kind, sensors) in groups {
        let _ = write!(out, "\n{}{} ({}):\n", indent, kind, sensors.len());
        for sensor in sensors {
            let _ = writeln!(
                out,
                "{}  - {}: {} | ID: {}",
                indent,
                sensor.name,
                format_value(sensor.value),
                sensor.id
            );
        }
    }

    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

/// Render the sensor health summary
pub fn render_health(report: &HealthReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== SENSOR HEALTH ===");
    let _ = writeln!(out, "Sensors tracked: {}", report.total_sensors_tracked);
    let _ = writeln!(
        out,
        "Reads: {} attempted, {} ok, {} failed, {} skipped",
        report.read_attempts, report.successful_reads, report.failed_reads, report.skipped_reads
    );
    let _ = writeln!(out, "Success rate: {:.1}%", report.success_rate_percent);
    if report.temporarily_disabled_sensors.is_empty() {
        let _ = writeln!(out, "Disabled sensors: none");
    } else {
        let _ = writeln!(
            out,
            "Disabled sensors: {}",
            report.temporarily_disabled_sensors.join(", ")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::hw::SnapshotProvider;
    use crate::settings::ScoringSettings;
    use tempfile::TempDir;

    fn inventory(dir: &TempDir) -> HardwareInventory {
        let nodes = vec![
            HardwareNode::new("AMD Ryzen 5 5600X", "Cpu", "/amdcpu/0")
                .with_sensor(SensorNode::new("Core (Tctl/Tdie)", "Temperature", "/amdcpu/0/temperature/2", Some(48.25)))
                .with_sensor(SensorNode::new("Core #1", "Clock", "/amdcpu/0/clock/1", None))
                .with_sensor(SensorNode::new("CCD1 (Tdie)", "Temperature", "/amdcpu/0/temperature/3", Some(46.0))),
            HardwareNode::new("Gigabyte B550", "Motherboard", "/mainboard").with_child(
                HardwareNode::new("ITE IT8688E", "SuperIO", "/lpc/it8688e")
                    .with_sensor(SensorNode::new("Fan #1", "Fan", "/lpc/it8688e/fan/0", Some(1020.0))),
            ),
        ];
        let mut inv = HardwareInventory::new(
            Box::new(SnapshotProvider::from_nodes(nodes)),
            CacheStore::new(dir.path().join("sensor_cache.json")),
            ScoringSettings::default(),
        );
        inv.select_cpu("auto");
        inv.select_gpu("auto");
        inv
    }

    #[test]
    fn test_report_sections() {
        let dir = TempDir::new().unwrap();
        let mut inv = inventory(&dir);
        let report = diagnostic_report(&mut inv);

        assert!(report.starts_with("=== SENSOR DIAGNOSIS ===\n"));
        assert!(report.contains(&format!("Hardware fingerprint: {}", inv.fingerprint().digest())));
        assert!(report.contains("Cache entries: 1"));
        assert!(report.contains("=== INITIALIZATION LOG ==="));
        assert!(report.contains("\nTemperature (2):\n  - Core (Tctl/Tdie): 48.25 | ID: /amdcpu/0/temperature/2"));
        assert!(report.contains("  - Core #1: N/A | ID: /amdcpu/0/clock/1"));
        assert!(report.contains("\n  === ITE IT8688E (SuperIO) ===\n"));
        assert!(report.contains("    - Fan #1: 1020.00 | ID: /lpc/it8688e/fan/0"));
        assert!(report.ends_with("/amdcpu/0_CPU_PACKAGE_TEMP: /amdcpu/0/temperature/2\n"));
        // no GPU in the tree, nothing failed
        assert!(!report.contains("=== FAILED SENSORS ==="));
    }

    #[test]
    fn test_health_render() {
        let report = HealthReport {
            total_sensors_tracked: 3,
            temporarily_disabled_sensors: vec!["gpu_power".to_string()],
            read_attempts: 10,
            successful_reads: 7,
            failed_reads: 3,
            skipped_reads: 2,
            success_rate_percent: 70.0,
        };
        let text = render_health(&report);
        assert!(text.contains("Reads: 10 attempted, 7 ok, 3 failed, 2 skipped"));
        assert!(text.contains("Success rate: 70.0%"));
        assert!(text.contains("Disabled sensors: gpu_power"));
    }
}
