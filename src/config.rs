//! Application settings.
//!
//! Loaded from `sellsnap.toml` in the app's config directory (optional) and
//! then from `SELLSNAP__*` environment variables, e.g. `SELLSNAP__LOG_LEVEL=debug`.
//! Keys sit at the root of the file, not under a table.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "sellsnap.toml";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_database_file")]
    pub database_file: String,
    /// Written after the quantity of every sold line, e.g. `"Juice: 4 قطعة"`.
    #[serde(default = "default_unit_label")]
    pub unit_label: String,
    #[serde(default = "default_currency_label")]
    pub currency_label: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_file() -> String {
    "sellsnap.db".to_string()
}

fn default_unit_label() -> String {
    "قطعة".to_string()
}

fn default_currency_label() -> String {
    "شيكل".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            unit_label: default_unit_label(),
            currency_label: default_currency_label(),
            log_level: default_log_level(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("SELLSNAP").separator("__")
}

impl AppConfig {
    /// Load `sellsnap.toml` from `dir` and the environment.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from(&dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: &Path, env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env)
            .build()?;
        Ok(settings.try_deserialize::<AppConfig>()?)
    }

    /// Formats an amount the way the history screen shows totals.
    pub fn format_amount(&self, amount: f64) -> String {
        format!("{:.2} {}", amount, self.currency_label)
    }
}
