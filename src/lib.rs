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

//! Sensorwatch - hardware sensor resolution and monitoring for Linux
//!
//! Host for the `sw_core` engine: command line, configuration file, logging
//! and the periodic read loop.

pub mod app;
pub mod cli;
pub mod config;
pub mod logger;
pub mod monitor;
