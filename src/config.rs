//! Where the catalog and run configuration come from.
//!
//! Both are plain JSON documents on disk, or built-in defaults when no file
//! is configured. Missing files are not fatal: the catalog comes back empty
//! and the configuration falls back to its defaults.

use crate::data::{Catalog, Configuration};
use crate::error::{Result, SchedulerError};
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait CatalogProvider: Send + Sync {
    fn get_catalog(&self) -> Result<Catalog>;
}

pub trait ConfigurationProvider: Send + Sync {
    fn get_configuration(&self) -> Result<Configuration>;
}

/// The two-day, six-class table used when no catalog file is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCatalog;

impl CatalogProvider for StaticCatalog {
    fn get_catalog(&self) -> Result<Catalog> {
        Ok(Catalog::new()
            .with_offering("Day1", "Math", 5, &[1, 3, 5])
            .with_offering("Day1", "Science", 6, &[2, 4])
            .with_offering("Day1", "History", 4, &[1, 4])
            .with_offering("Day1", "Art", 5, &[3, 5])
            .with_offering("Day1", "Music", 5, &[2, 4, 6])
            .with_offering("Day1", "PE", 8, &[1, 3, 5, 6])
            .with_offering("Day2", "Math", 5, &[1, 3, 5])
            .with_offering("Day2", "Biology", 6, &[2, 4])
            .with_offering("Day2", "English", 6, &[1, 3, 4])
            .with_offering("Day2", "ComputerSci", 5, &[2, 5, 6])
            .with_offering("Day2", "Music", 5, &[3, 4, 6])
            .with_offering("Day2", "PE", 8, &[1, 2, 5]))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticConfiguration(pub Configuration);

impl ConfigurationProvider for StaticConfiguration {
    fn get_configuration(&self) -> Result<Configuration> {
        Ok(self.0.clone())
    }
}

/// Reads a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SchedulerError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn write_pretty<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|source| SchedulerError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!("Saved {}", path.display());
    Ok(())
}

/// Catalog persisted as `{"Day1": {"Math": {"capacity": 5, "periods": [1, 3]}}}`.
#[derive(Debug, Clone)]
pub struct JsonCatalogFile {
    path: PathBuf,
}

impl JsonCatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        write_pretty(&self.path, catalog)
    }
}

impl CatalogProvider for JsonCatalogFile {
    fn get_catalog(&self) -> Result<Catalog> {
        match read_optional(&self.path)? {
            Some(text) => {
                let catalog = Catalog::from_json(&text)?;
                info!(
                    "Loaded catalog from {} ({} day(s))",
                    self.path.display(),
                    catalog.days().count()
                );
                Ok(catalog)
            }
            None => {
                warn!("Catalog file {} not found; starting empty", self.path.display());
                Ok(Catalog::new())
            }
        }
    }
}

/// Run configuration persisted with the keys `num_students`, `classes_per_student`,
/// `num_days`, `periods_per_day` and `min_classes_per_day`.
#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save(&self, config: &Configuration) -> Result<()> {
        config.validate()?;
        write_pretty(&self.path, config)
    }
}

impl ConfigurationProvider for JsonConfigFile {
    fn get_configuration(&self) -> Result<Configuration> {
        let Some(text) = read_optional(&self.path)? else {
            warn!("Config file {} not found; using defaults", self.path.display());
            return Ok(Configuration::default());
        };
        match serde_json::from_str(&text) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("Config file {} unreadable ({e}); using defaults", self.path.display());
                Ok(Configuration::default())
            }
        }
    }
}

/// Settings for the service binary, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub addr: String,
    pub catalog_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

impl ServerSettings {
    pub const DEFAULT_ADDR: &'static str = "127.0.0.1:8080";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            addr: lookup("SCHEDULER_ADDR").unwrap_or_else(|| Self::DEFAULT_ADDR.to_string()),
            catalog_path: path("SCHEDULER_CATALOG"),
            config_path: path("SCHEDULER_CONFIG"),
        }
    }

    pub fn catalog_provider(&self) -> Box<dyn CatalogProvider> {
        match &self.catalog_path {
            Some(path) => Box::new(JsonCatalogFile::new(path)),
            None => Box::new(StaticCatalog),
        }
    }

    pub fn configuration_provider(&self) -> Box<dyn ConfigurationProvider> {
        match &self.config_path {
            Some(path) => Box::new(JsonConfigFile::new(path)),
            None => Box::new(StaticConfiguration::default()),
        }
    }
}
