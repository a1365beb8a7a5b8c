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

//! Logging setup
//!
//! Structured logs go to stderr so that reports and JSON on stdout stay clean.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the default log filter
pub const LOG_ENV: &str = "SENSORWATCH_LOG";

const DEFAULT_FILTER: &str = "info";

/// Filter directive from the command line, else the environment, else `info`
pub fn resolve_filter(flag: Option<&str>) -> String {
    if let Some(level) = flag.map(str::trim).filter(|l| !l.is_empty()) {
        return level.to_string();
    }
    match std::env::var(LOG_ENV) {
        Ok(level) if !level.trim().is_empty() => level.trim().to_string(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(flag: Option<&str>) {
    let directive = resolve_filter(flag);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}': {}, using '{}'", directive, e, DEFAULT_FILTER);
        EnvFilter::new(DEFAULT_FILTER)
    });

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
