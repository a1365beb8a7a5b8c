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

//! Command Line Interface

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use serde::Serialize;
use sw_core::report::{diagnostic_report, render_health};
use sw_core::{
    ActiveSensor, CacheStore, CategoryCounts, HardwareCategory, HardwareInventory, MetricBatch,
};
use tracing::info;

use crate::app::{ProviderSource, Session};
use crate::config::{config_path, AppConfig};
use crate::monitor::{run_watch, WatchOptions};

#[derive(Parser, Debug)]
#[command(name = "sensorwatch")]
#[command(version)]
#[command(about = "Sensorwatch - resolve and monitor hardware sensors")]
#[command(long_about = "Sensorwatch - resolve and monitor hardware sensors

Finds the sensors behind CPU, GPU and storage metrics in the hardware tree,
remembers the choice across runs, and reads them with per-sensor backoff.

EXAMPLES:
    sensorwatch inventory                      Show detected hardware and active sensors
    sensorwatch watch --ticks 10               Read sensors ten times, then exit
    sensorwatch diagnose                       Full diagnostic report
    sensorwatch diagnose-metric GPU_POWER \"AMD Radeon RX 7900 XT\"
    sensorwatch --snapshot tree.json inventory Use a hardware snapshot instead of hwmon
    sensorwatch cache stats                    Show resolution cache statistics

ENVIRONMENT VARIABLES:
    SENSORWATCH_LOG=debug          Log filter (overridden by --log-level)
    SENSORWATCH_CONFIG_DIR=<dir>   Config and cache directory

FILES:
    ~/.config/sensorwatch/config.json         Application settings
    ~/.config/sensorwatch/sensor_cache.json   Resolution cache")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: <config dir>/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Read hardware from a JSON snapshot instead of hwmon
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Resolution cache file
    #[arg(long, global = true)]
    pub cache_file: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "sw_core=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show classified hardware and active sensors
    Inventory {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the full diagnostic report
    Diagnose,

    /// Trace the search for one metric on one device
    DiagnoseMetric {
        /// Metric name, e.g. CPU_PACKAGE_TEMP
        metric: String,
        /// Top-level hardware name as shown by `inventory`
        hardware_name: String,
    },

    /// Read one sensor by identifier
    Probe {
        identifier: String,
    },

    /// Read sensors periodically
    Watch(WatchArgs),

    /// Inspect or reset the resolution cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Tick interval (default from config)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many ticks
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Print batches as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Stats,
    /// Delete the cache file, keeping a backup
    Clear,
    /// Drop all mappings and resolve again
    Reset,
}

// ============================================================================
// Execution
// ============================================================================

struct RunContext {
    config: AppConfig,
    cache_path: PathBuf,
    source: ProviderSource,
}

impl RunContext {
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let path = config_path(cli.config.as_deref());
        let config = AppConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        Ok(Self {
            cache_path: config.cache_path(cli.cache_file.as_deref()),
            source: ProviderSource::from_snapshot_flag(cli.snapshot.as_deref()),
            config,
        })
    }

    fn open_session(&self) -> anyhow::Result<Session> {
        let provider = self.source.open()?;
        Ok(Session::open(&self.config, provider, self.cache_path.clone()))
    }
}

pub async fn run_cli(cli: &Cli) -> anyhow::Result<()> {
    let ctx = RunContext::load(cli)?;

    match &cli.command {
        Commands::Inventory { json } => cmd_inventory(&ctx, *json),
        Commands::Diagnose => {
            let mut session = ctx.open_session()?;
            print!("{}", diagnostic_report(&mut session.inventory));
            Ok(())
        }
        Commands::DiagnoseMetric { metric, hardware_name } => {
            let mut session = ctx.open_session()?;
            print!("{}", session.inventory.diagnose_metric(metric, hardware_name));
            Ok(())
        }
        Commands::Probe { identifier } => {
            let mut session = ctx.open_session()?;
            match session.inventory.probe_sensor(identifier) {
                Some(value) => {
                    println!("{}: {:.2}", identifier, value);
                    Ok(())
                }
                None => anyhow::bail!("Sensor '{}' not found or has no value", identifier),
            }
        }
        Commands::Watch(args) => cmd_watch(&ctx, args).await,
        Commands::Cache(sub) => cmd_cache(&ctx, sub),
    }
}

// ============================================================================
// Inventory Command
// ============================================================================

#[derive(Debug, Serialize)]
struct DeviceSummary {
    name: String,
    kind: String,
    id: String,
    category: HardwareCategory,
    sensor_count: usize,
}

#[derive(Debug, Serialize)]
struct InventorySummary {
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_error: Option<String>,
    fingerprint: String,
    counts: CategoryCounts,
    devices: Vec<DeviceSummary>,
    cpu_sensor: Option<ActiveSensor>,
    gpu_sensors: BTreeMap<String, ActiveSensor>,
    storage_sensors: BTreeMap<String, String>,
    /// Failed metric key -> hardware name
    failed: BTreeMap<String, String>,
    gpu_supported: bool,
}

fn summarize(inventory: &HardwareInventory) -> InventorySummary {
    InventorySummary {
        provider: inventory.provider_name().to_string(),
        provider_error: inventory.provider_error().map(str::to_string),
        fingerprint: inventory.fingerprint().digest(),
        counts: inventory.counts(),
        devices: inventory
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| DeviceSummary {
                name: n.name.clone(),
                kind: n.kind.clone(),
                id: n.id.clone(),
                category: inventory.category_of(i).unwrap_or(HardwareCategory::Other),
                sensor_count: n.sensor_count(),
            })
            .collect(),
        cpu_sensor: inventory.active_cpu().cloned(),
        gpu_sensors: inventory.active_gpu().clone(),
        storage_sensors: inventory
            .storage_sensors()
            .iter()
            .map(|(k, s)| (k.clone(), s.display_name.clone()))
            .collect(),
        failed: inventory
            .failed_sensors()
            .iter()
            .map(|(k, f)| (k.clone(), f.hardware.clone()))
            .collect(),
        gpu_supported: inventory.gpu_supported(),
    }
}

fn cmd_inventory(ctx: &RunContext, json: bool) -> anyhow::Result<()> {
    let session = ctx.open_session()?;
    let summary = summarize(&session.inventory);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Sensorwatch Inventory");
    println!("=====================");
    println!();
    println!("Provider:    {}", summary.provider);
    if let Some(err) = &summary.provider_error {
        println!("Error:       {}", err);
    }
    println!("Fingerprint: {}", summary.fingerprint);
    println!();

    println!("Hardware ({}):", summary.devices.len());
    for device in &summary.devices {
        println!(
            "  [{}] {} ({}) - {} sensors, id {}",
            device.category.label(),
            device.name,
            device.kind,
            device.sensor_count,
            device.id
        );
    }
    println!();

    println!("Active sensors:");
    match &summary.cpu_sensor {
        Some(s) => println!("  cpu_temp: {} ({})", s.name, s.sensor_id),
        None => println!("  cpu_temp: none"),
    }
    for (slot, s) in &summary.gpu_sensors {
        println!("  {}: {} ({})", slot, s.name, s.sensor_id);
    }
    for (key, name) in &summary.storage_sensors {
        println!("  storage {}: {}", key, name);
    }

    if !summary.failed.is_empty() {
        println!();
        println!("Unresolved ({}):", summary.failed.len());
        for (key, hardware) in &summary.failed {
            println!("  {} on {}", key, hardware);
        }
    }
    Ok(())
}

// ============================================================================
// Watch Command
// ============================================================================

fn print_batch(batch: &MetricBatch, json: bool) {
    if json {
        match serde_json::to_string(batch) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize batch"),
        }
        return;
    }

    let mut parts = Vec::new();
    if let Some(t) = batch.cpu_temp {
        parts.push(format!("cpu {:.1}°C", t));
    }
    for (field, value) in &batch.gpu {
        parts.push(format!("{} {:.1}", field, value));
    }
    if let (Some(used), Some(total), Some(pct)) = (batch.vram_used_gb, batch.vram_total_gb, batch.vram_percent) {
        parts.push(format!("vram {:.1}/{:.1} GB ({:.0}%)", used, total, pct));
    }
    for storage in &batch.storage_temps {
        parts.push(format!("{} {:.1}°C", storage.name, storage.temp));
    }
    for (identifier, value) in &batch.custom_sensors {
        parts.push(format!("{} {:.2}", identifier, value));
    }
    if parts.is_empty() {
        println!("(no readings)");
    } else {
        println!("{}", parts.join(" | "));
    }
}

async fn cmd_watch(ctx: &RunContext, args: &WatchArgs) -> anyhow::Result<()> {
    let mut options = WatchOptions::from_config(&ctx.config);
    if let Some(ms) = args.interval_ms {
        let mut check = ctx.config.clone();
        check.update_interval_ms = ms;
        check.validate().context("Invalid --interval-ms")?;
        options.interval = check.update_interval();
    }
    options.max_ticks = args.ticks;

    let session = Arc::new(Mutex::new(ctx.open_session()?));
    for (identifier, name) in session.lock().reader.custom_sensor_names() {
        info!(identifier = %identifier, name = %name, "Watching custom sensor");
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    let json = args.json;
    let summary = run_watch(session.clone(), options, shutdown, |batch| print_batch(batch, json)).await;

    let report = session.lock().reader.health_report();
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!();
        print!("{}", render_health(&report));
    }
    info!(stop_reason = ?summary.stop_reason, "Watch finished");
    Ok(())
}

// ============================================================================
// Cache Commands
// ============================================================================

fn cmd_cache(ctx: &RunContext, cmd: &CacheCommands) -> anyhow::Result<()> {
    match cmd {
        CacheCommands::Stats => {
            let stats = CacheStore::new(&ctx.cache_path).statistics();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        CacheCommands::Clear => {
            if CacheStore::new(&ctx.cache_path).clear() {
                println!("Cleared sensor cache {}", ctx.cache_path.display());
            } else {
                println!("No sensor cache at {}", ctx.cache_path.display());
            }
        }
        CacheCommands::Reset => {
            let mut session = ctx.open_session()?;
            if !session.inventory.reset_cache() {
                anyhow::bail!("Sensor cache was reset in memory but could not be saved");
            }
            println!(
                "Sensor cache reset, {} mappings resolved",
                session.inventory.cache().entry_count()
            );
        }
    }
    Ok(())
}
