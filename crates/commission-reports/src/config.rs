//! Configuration for the commission report generator

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::reference::LookupSource;

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml. Every field has a default.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub lookup: LookupNames,
}

/// Directory locations
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the lookup workbooks
    pub lookup_dir: PathBuf,
    /// Directory receiving generated reports
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            lookup_dir: PathBuf::from(constants::DEFAULT_LOOKUP_DIR),
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Workbook and sheet names of the lookup files
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LookupNames {
    pub report_columns: String,
    pub columns_sheet: String,
    pub principal_list: String,
    pub active_sheet: String,
    pub inactive_sheet: String,
}

impl Default for LookupNames {
    fn default() -> Self {
        Self {
            report_columns: constants::REPORT_COLUMNS_WORKBOOK.to_string(),
            columns_sheet: constants::REPORT_COLUMNS_SHEET.to_string(),
            principal_list: constants::PRINCIPAL_WORKBOOK.to_string(),
            active_sheet: constants::ACTIVE_PRINCIPALS_SHEET.to_string(),
            inactive_sheet: constants::INACTIVE_PRINCIPALS_SHEET.to_string(),
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Load the file if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| {
            "Failed to parse config.toml. Check for:\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Incorrect data types (paths and sheet names are strings)\n\n\
             See config.toml.example for the expected format."
        })
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Where the lookup sheets live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    pub dir: PathBuf,
    pub names: LookupNames,
}

impl LookupConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            names: LookupNames::default(),
        }
    }

    pub fn report_columns(&self) -> LookupSource {
        LookupSource::new(&self.dir, &self.names.report_columns, &self.names.columns_sheet)
    }

    pub fn active_principals(&self) -> LookupSource {
        LookupSource::new(&self.dir, &self.names.principal_list, &self.names.active_sheet)
    }

    pub fn inactive_principals(&self) -> LookupSource {
        LookupSource::new(&self.dir, &self.names.principal_list, &self.names.inactive_sheet)
    }
}

/// Main configuration struct with CLI overrides applied
#[derive(Debug, Clone)]
pub struct Config {
    pub lookup: LookupConfig,
    pub output_dir: PathBuf,
}

impl Config {
    /// Create config from file config and optional directory overrides
    pub fn from_file(file_config: FileConfig, lookup_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        let FileConfig { paths, lookup } = file_config;

        Self {
            lookup: LookupConfig {
                dir: lookup_dir.unwrap_or(paths.lookup_dir),
                names: lookup,
            },
            output_dir: output_dir.unwrap_or(paths.output_dir),
        }
    }
}
