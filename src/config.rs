use std::collections::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub regions: HashMap<String, RegionConfig>,
    pub map: MapConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub inventory_csv: PathBuf,
    pub boundaries: PathBuf,
    /// SPA code column in the CSV.
    pub join_column_csv: String,
    /// SPA code property in the GeoJSON features.
    pub join_column_geo: String,
    pub columns: ColumnConfig,
}

/// Names of the value columns in the inventory CSV.
#[derive(Debug, Deserialize, Clone)]
pub struct ColumnConfig {
    pub housing_type: String,
    pub utilization_rate: String,
    pub pit_count: String,
    pub total_beds: String,
}

/// Display name and chart color for one SPA code.
#[derive(Debug, Deserialize, Clone)]
pub struct RegionConfig {
    pub name: String,
    pub color: String, // Hex code
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
