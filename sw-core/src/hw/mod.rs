//! Hardware providers
//!
//! Implementations of [`HardwareProvider`](crate::tree::HardwareProvider):
//! live Linux hwmon data and static JSON snapshots.

mod hwmon;
mod snapshot;

pub use hwmon::{kind_for_driver, HwmonProvider};
pub use snapshot::{SnapshotFile, SnapshotProvider};
