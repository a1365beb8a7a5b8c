//! Constants and configuration defaults for Sensorwatch
//!
//! Centralizes the behavioral constants of the resolution engine. Tunable
//! values are exposed again through `settings`, which uses these as defaults.

/// File system locations
pub mod paths {
    use std::path::PathBuf;

    /// Base path for Linux hwmon devices
    pub const HWMON_BASE: &str = "/sys/class/hwmon";

    /// Application directory name under the config base
    pub const APP_DIR: &str = "sensorwatch";

    /// Application configuration file
    pub const CONFIG_FILE: &str = "config.json";

    /// Resolution cache file
    pub const CACHE_FILE: &str = "sensor_cache.json";

    /// Environment variable that overrides the config directory
    pub const CONFIG_DIR_ENV: &str = "SENSORWATCH_CONFIG_DIR";

    /// User configuration directory
    ///
    /// When running elevated via sudo the invoking user's directory is used so that
    /// the cache is shared between privileged and unprivileged runs.
    pub fn user_config_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Some(PathBuf::from(dir));
            }
        }

        // SAFETY: geteuid has no preconditions and only returns the effective user ID.
        let elevated = unsafe { libc::geteuid() } == 0;
        let config_base = if elevated {
            std::env::var("SUDO_USER")
                .ok()
                .and_then(|user| get_user_home(&user))
                .map(|home| home.join(".config"))
        } else {
            None
        };

        let config_base = config_base.or_else(|| {
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                Some(PathBuf::from(xdg))
            } else if let Ok(home) = std::env::var("HOME") {
                Some(PathBuf::from(home).join(".config"))
            } else {
                dirs::config_dir()
            }
        });

        config_base.map(|p| p.join(APP_DIR))
    }

    /// Default location of the resolution cache
    pub fn default_cache_path() -> PathBuf {
        user_config_dir()
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
            .join(CACHE_FILE)
    }

    /// Default location of the application config
    pub fn default_config_path() -> PathBuf {
        user_config_dir()
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
            .join(CONFIG_FILE)
    }

    /// Get home directory for a username from /etc/passwd
    fn get_user_home(username: &str) -> Option<PathBuf> {
        let passwd = std::fs::read_to_string("/etc/passwd").ok()?;
        passwd.lines().find_map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() >= 6 && parts[0] == username {
                Some(PathBuf::from(parts[5]))
            } else {
                None
            }
        })
    }
}

/// hwmon attribute units
pub mod units {
    /// tempN_input is reported in millidegrees Celsius
    pub const MILLIDEGREE_DIVISOR: f64 = 1000.0;

    /// inN_input is reported in millivolts
    pub const MILLIVOLT_DIVISOR: f64 = 1000.0;

    /// powerN_* is reported in microwatts
    pub const MICROWATT_DIVISOR: f64 = 1_000_000.0;

    /// freqN_input is reported in hertz
    pub const HERTZ_PER_MHZ: f64 = 1_000_000.0;

    /// mem_info_vram_* is reported in bytes
    pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
}

/// Candidate scoring constants
pub mod scoring {
    /// Score for a search term found literally in the sensor name
    pub const EXACT_MATCH_SCORE: f32 = 1.0;

    /// Score for a priority term found literally in the sensor name
    pub const PRIORITY_EXACT_SCORE: f32 = 1.2;

    /// Similarity ratio a fuzzy match must exceed to count
    pub const FUZZY_ACCEPT_RATIO: f32 = 0.6;

    /// Bonus added to an accepted fuzzy match of a priority term
    pub const PRIORITY_FUZZY_BONUS: f32 = 0.1;

    /// Candidates at or below this score are discarded
    pub const MIN_CANDIDATE_SCORE: f32 = 0.3;
}

/// Sensor health (circuit breaker) constants
pub mod health {
    /// Consecutive failures before a sensor is disabled
    pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

    /// First cooldown window in seconds
    pub const INITIAL_BACKOFF_SECS: u64 = 15;

    /// Upper bound of the cooldown window in seconds
    pub const MAX_BACKOFF_SECS: u64 = 300;
}

/// File size limits for inputs other than the cache
pub mod limits {
    /// Largest hardware snapshot accepted (16MB)
    pub const MAX_SNAPSHOT_FILE_SIZE: u64 = 16 * 1024 * 1024;

    /// Largest application config accepted (1MB)
    pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
}

/// Resolution cache constants
pub mod cache {
    /// Current on-disk format version
    pub const CACHE_VERSION: &str = "2.0";

    /// Version assumed for files without a version stamp
    pub const LEGACY_VERSION: &str = "1.0";

    /// Prefix that marks metadata keys
    pub const METADATA_PREFIX: char = '_';

    /// Shortest sensor identifier accepted as a cache value
    pub const MIN_SENSOR_ID_LEN: usize = 5;

    /// Age after which a cache is reported as stale
    pub const STALE_AFTER_DAYS: f64 = 30.0;

    /// Refuse to read cache files larger than this
    pub const MAX_CACHE_FILE_SIZE: u64 = 10 * 1024 * 1024;

    pub const KEY_VERSION: &str = "_cache_version";
    pub const KEY_CREATED: &str = "_created_timestamp";
    pub const KEY_LAST_UPDATED: &str = "_last_updated";
    pub const KEY_SENSOR_COUNT: &str = "_sensor_count";
    pub const KEY_FINGERPRINT: &str = "_hardware_fingerprint";
    pub const KEY_MIGRATED_FROM: &str = "_migrated_from";
    pub const KEY_INVALIDATED_REASON: &str = "_invalidated_reason";
    pub const KEY_PREVIOUS_FINGERPRINT: &str = "_previous_fingerprint";

    /// Metadata keys a cache must carry to pass validation
    pub const REQUIRED_METADATA: [&str; 3] = [KEY_VERSION, KEY_CREATED, KEY_LAST_UPDATED];

    /// Reason recorded when a fingerprint change resets the cache
    pub const REASON_HARDWARE_CHANGE: &str = "hardware_change";
}

/// Hardware classification keywords (matched against the lower-cased kind string)
pub mod classify {
    pub const CPU_KEYWORDS: &[&str] = &["cpu", "processor", "amd", "intel"];
    pub const GPU_KEYWORDS: &[&str] = &["gpu", "graphics", "nvidia", "amd", "radeon", "geforce", "quadro"];
    pub const STORAGE_KEYWORDS: &[&str] = &["storage", "hdd", "ssd", "nvme", "m2", "disk"];
    pub const MOTHERBOARD_KEYWORDS: &[&str] = &["motherboard", "mainboard", "controller", "superio"];

    /// Keywords naming the device type itself rather than a vendor.
    /// These decide first when a kind string matches both CPU and GPU sets.
    pub const CPU_TYPE_KEYWORDS: &[&str] = &["cpu", "processor"];
    pub const GPU_TYPE_KEYWORDS: &[&str] = &["gpu", "graphics", "radeon", "geforce", "quadro"];
}

/// Selection values
pub mod selection {
    /// Selects the first enumerated device of a category
    pub const AUTO: &str = "auto";
}

/// Read loop defaults used by the host
pub mod monitor {
    /// Default tick interval
    pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 1000;

    /// Smallest accepted tick interval
    pub const MIN_UPDATE_INTERVAL_MS: u64 = 100;

    /// Default soft timeout for one tick
    pub const DEFAULT_TICK_TIMEOUT_MS: u64 = 5000;

    /// Consecutive failed ticks before the loop stops
    pub const DEFAULT_MAX_CONSECUTIVE_TICK_ERRORS: u32 = 5;
}
