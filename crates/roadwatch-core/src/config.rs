use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::region::{OTHER_REGION, Region, RegionRegistry};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "roadwatch.toml";

/// Environment variable that overrides the config path.
pub const CONFIG_ENV: &str = "ROADWATCH_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadwatchConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Inline registry; takes precedence over `regions_file`.
    #[serde(default)]
    pub regions: Vec<Region>,
    /// External registry file, resolved relative to the config file.
    #[serde(default)]
    pub regions_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Tunables for the reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_debounce_threshold_minutes")]
    pub debounce_threshold_minutes: f64,
    #[serde(default = "default_debounce_jitter_minutes")]
    pub debounce_jitter_minutes: f64,
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            debounce_threshold_minutes: default_debounce_threshold_minutes(),
            debounce_jitter_minutes: default_debounce_jitter_minutes(),
            scan_page_size: default_scan_page_size(),
        }
    }
}

impl RoadwatchConfig {
    /// Reject values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.feed.url.trim().is_empty() {
            bail!("feed.url must not be empty");
        }
        if self.feed.timeout_secs == 0 {
            bail!("feed.timeout_secs must be > 0");
        }
        let reconcile = &self.reconcile;
        if reconcile.retention_days == 0 {
            bail!("reconcile.retention_days must be >= 1");
        }
        if !(reconcile.debounce_threshold_minutes.is_finite()
            && reconcile.debounce_threshold_minutes >= 0.0)
        {
            bail!("reconcile.debounce_threshold_minutes must be a non-negative number");
        }
        if !(reconcile.debounce_jitter_minutes.is_finite()
            && reconcile.debounce_jitter_minutes >= 0.0)
        {
            bail!("reconcile.debounce_jitter_minutes must be a non-negative number");
        }
        if reconcile.scan_page_size == 0 {
            bail!("reconcile.scan_page_size must be >= 1");
        }

        let mut names = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() || region.name == OTHER_REGION {
                bail!("region name '{}' is reserved or empty", region.name);
            }
            if !names.insert(region.name.as_str()) {
                bail!("region '{}' is defined twice", region.name);
            }
        }
        Ok(())
    }

    /// Resolve the region registry: inline regions, then `regions_file`,
    /// then the bundled Alberta registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file cannot be read or is invalid.
    pub fn region_registry(&self, config_dir: &Path) -> Result<RegionRegistry> {
        if !self.regions.is_empty() {
            return RegionRegistry::new(self.regions.clone()).context("invalid inline regions");
        }

        if let Some(file) = &self.regions_file {
            let path = config_dir.join(file);
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return RegionRegistry::from_toml_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()));
        }

        RegionRegistry::alberta().context("bundled region registry is corrupt")
    }
}

/// Load a config file; a missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed, or
/// validated.
pub fn load_config(path: &Path) -> Result<RoadwatchConfig> {
    if !path.exists() {
        return Ok(RoadwatchConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<RoadwatchConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

/// Pick the config path: explicit flag, then `ROADWATCH_CONFIG`, then
/// `roadwatch.toml` in `cwd`.
#[must_use]
pub fn resolve_config_path(flag: Option<&Path>, env_value: Option<&str>, cwd: &Path) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return PathBuf::from(value);
    }
    cwd.join(DEFAULT_CONFIG_FILE)
}

fn default_feed_url() -> String {
    "https://511.alberta.ca/api/v2/get/event".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_store_path() -> PathBuf {
    PathBuf::from("roadwatch.sqlite3")
}

const fn default_retention_days() -> u32 {
    5
}

const fn default_debounce_threshold_minutes() -> f64 {
    5.0
}

const fn default_debounce_jitter_minutes() -> f64 {
    2.0
}

const fn default_scan_page_size() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).expect("write file");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load_config(&dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(config.reconcile, ReconcileConfig::default());
        assert_eq!(config.reconcile.retention_days, 5);
        assert!((config.reconcile.debounce_threshold_minutes - 5.0).abs() < f64::EPSILON);
        assert!((config.reconcile.debounce_jitter_minutes - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.store.path, PathBuf::from("roadwatch.sqlite3"));
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(
            &dir,
            "roadwatch.toml",
            "[reconcile]\nretention_days = 9\n\n[store]\npath = \"state/db.sqlite3\"\n",
        );
        let config = load_config(&path).expect("load");
        assert_eq!(config.reconcile.retention_days, 9);
        assert_eq!(config.reconcile.scan_page_size, 100);
        assert_eq!(config.store.path, PathBuf::from("state/db.sqlite3"));
        assert!(config.feed.url.starts_with("https://"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(&dir, "bad.toml", "[reconcile]\nretention_days = 0\n");
        let err = load_config(&path).expect_err("zero retention");
        assert!(format!("{err:#}").contains("retention_days"));

        let path = write(&dir, "neg.toml", "[reconcile]\ndebounce_jitter_minutes = -1.0\n");
        assert!(load_config(&path).is_err());

        let path = write(&dir, "syntax.toml", "[reconcile\n");
        let err = load_config(&path).expect_err("syntax");
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn reserved_region_name_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write(
            &dir,
            "regions.toml",
            "[[regions]]\nname = \"Other\"\npoints = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn registry_resolution_order() {
        let dir = tempfile::tempdir().expect("temp dir");

        let bundled = RoadwatchConfig::default()
            .region_registry(dir.path())
            .expect("bundled");
        assert_eq!(bundled.regions().len(), 4);

        write(
            &dir,
            "custom_regions.toml",
            "[[regions]]\nname = \"Box\"\npoints = [[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]\n",
        );
        let from_file = RoadwatchConfig {
            regions_file: Some(PathBuf::from("custom_regions.toml")),
            ..RoadwatchConfig::default()
        };
        let registry = from_file.region_registry(dir.path()).expect("file");
        assert_eq!(registry.classify(5.0, 5.0), "Box");

        let inline = RoadwatchConfig {
            regions: vec![Region::new(
                "Inline",
                vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]],
            )],
            ..from_file
        };
        let registry = inline.region_registry(dir.path()).expect("inline");
        assert_eq!(registry.classify(5.0, 5.0), "Inline");
    }

    #[test]
    fn config_path_precedence() {
        let cwd = Path::new("/work");
        assert_eq!(
            resolve_config_path(Some(Path::new("/etc/rw.toml")), Some("/env.toml"), cwd),
            PathBuf::from("/etc/rw.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some("/env.toml"), cwd),
            PathBuf::from("/env.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some("  "), cwd),
            PathBuf::from("/work/roadwatch.toml")
        );
    }
}
