pub mod regions;
pub mod run;
pub mod status;
pub mod sweep;

use anyhow::{Context, Result};
use roadwatch_core::RegionRegistry;
use roadwatch_core::config::{RoadwatchConfig, load_config};
use roadwatch_core::error::ErrorCode;
use roadwatch_core::store::SqliteStore;
use std::path::{Path, PathBuf};

use crate::output::{CliError, OutputMode, render_error};

/// Config plus the directory relative paths inside it resolve against.
pub struct Loaded {
    pub config: RoadwatchConfig,
    pub base_dir: PathBuf,
}

impl Loaded {
    pub fn regions(&self, output: OutputMode) -> Result<RegionRegistry> {
        self.config.region_registry(&self.base_dir).or_else(|err| {
            render_error(output, &CliError::from_code(ErrorCode::InvalidRegionRegistry, format!("{err:#}")))?;
            Err(err)
        })
    }

    /// Open the store at `db` or the configured path.
    pub fn open_store(&self, db: Option<&Path>, output: OutputMode) -> Result<SqliteStore> {
        let path = db.map_or_else(|| self.base_dir.join(&self.config.store.path), Path::to_path_buf);
        SqliteStore::open(&path).or_else(|err| {
            render_error(output, &CliError::from_code(ErrorCode::StoreUnavailable, format!("{err:#}")))?;
            Err(err)
        })
    }
}

pub fn load(config_path: &Path, output: OutputMode) -> Result<Loaded> {
    let config = load_config(config_path).or_else(|err| {
        render_error(output, &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")))?;
        Err(err)
    })?;
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(std::env::current_dir, |p| Ok(p.to_path_buf()))
        .context("resolve config directory")?;
    Ok(Loaded { config, base_dir })
}
