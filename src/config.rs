use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mapsmith_coords::MapVariant;
use mapsmith_runtime::SchedulerConfig;
use mapsmith_tiles::TileCacheConfig;
use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MapsmithConfig {
    pub world: WorldSection,
    pub tiles: TilesSection,
    pub cache: CacheSection,
    pub scan: ScanSection,
    pub automap: AutoMapSection,
    pub log: LogSection,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub path: Option<PathBuf>,
    pub dimension: i32,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TilesSection {
    /// Defaults to `<world>/mapsmith` when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub capacity: usize,
    pub flush_interval_secs: u64,
    pub max_age_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        let d = TileCacheConfig::default();
        Self {
            capacity: d.capacity,
            flush_interval_secs: d.flush_interval.as_secs(),
            max_age_secs: d.max_age.as_secs(),
        }
    }
}

impl CacheSection {
    pub fn to_cache_config(&self) -> TileCacheConfig {
        TileCacheConfig {
            capacity: self.capacity.max(1),
            flush_interval: Duration::from_secs(self.flush_interval_secs),
            max_age: Duration::from_secs(self.max_age_secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub include_all: bool,
    /// Variant names as accepted on the command line (`day`, `topo`, `slice:3`).
    pub variants: Vec<String>,
    pub underground_slices: Vec<i32>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            include_all: false,
            variants: vec!["day".to_string()],
            underground_slices: Vec::new(),
        }
    }
}

impl ScanSection {
    /// Configured variants followed by one underground variant per listed slice.
    pub fn map_variants(&self) -> Result<Vec<MapVariant>, Box<dyn Error>> {
        let mut out = Vec::new();
        for name in &self.variants {
            let v: MapVariant = name.parse()?;
            if !out.contains(&v) {
                out.push(v);
            }
        }
        for &slice in &self.underground_slices {
            let v = MapVariant::underground(slice)?;
            if !out.contains(&v) {
                out.push(v);
            }
        }
        Ok(out)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AutoMapSection {
    /// Minimum pause between two region tasks.
    pub poll_delay_ms: u64,
    /// Write tiles after every region; otherwise `[cache] flush_interval_secs` paces writes.
    pub flush_each_task: bool,
}

impl Default for AutoMapSection {
    fn default() -> Self {
        Self {
            poll_delay_ms: 0,
            flush_each_task: true,
        }
    }
}

impl AutoMapSection {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            flush_each_task: self.flush_each_task,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

pub fn load_config_from_path(path: &Path) -> Result<MapsmithConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let cfg: MapsmithConfig = toml::from_str(&s)?;
    Ok(cfg)
}
