use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use contactsync_source::SourceConfig;
use contactsync_storage::TableName;

use crate::error::SyncError;

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "contactsync.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub target_table: TableName,
    pub staging_table: TableName,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("contactsync.db"),
            target_table: TableName::default_target(),
            staging_table: TableName::default_staging(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub store: StoreConfig,
}

impl SyncConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, SyncError> {
        toml::from_str(contents).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.store.target_table == self.store.staging_table {
            return Err(SyncError::Config(format!(
                "target and staging tables must differ (both are {})",
                self.store.target_table
            )));
        }
        if self.source.page_limit == 0 {
            return Err(SyncError::Config("source.page_limit must be positive".into()));
        }
        Ok(())
    }
}

/// Environment variables applied on top of the file, in precedence order
/// per key.
const API_KEY_VARS: [&str; 2] = ["CONTACTSYNC_API_KEY", "SYSTEME_API_KEY"];
const DATABASE_VAR: &str = "CONTACTSYNC_DATABASE";
const CONTACTS_URL_VAR: &str = "CONTACTSYNC_CONTACTS_URL";
const TAGS_URL_VAR: &str = "CONTACTSYNC_TAGS_URL";

pub fn apply_env_overrides(config: &mut SyncConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

pub fn apply_overrides_from(config: &mut SyncConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(key) = API_KEY_VARS.iter().find_map(|var| get(*var)) {
        config.source.api_key = Some(key);
    }
    if let Some(path) = get(DATABASE_VAR) {
        config.store.database_path = PathBuf::from(path);
    }
    if let Some(url) = get(CONTACTS_URL_VAR) {
        config.source.contacts_url = url;
    }
    if let Some(url) = get(TAGS_URL_VAR) {
        config.source.tags_url = url;
    }
}

pub fn load_file(path: &Path) -> Result<SyncConfig, SyncError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| SyncError::Config(format!("failed to read {}: {e}", path.display())))?;
    SyncConfig::from_toml_str(&contents)
        .map_err(|e| SyncError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Load configuration: the explicit file if given (it must exist), else
/// `contactsync.toml` if present, else defaults. Environment overrides are
/// applied last.
pub fn load(path: Option<&Path>) -> Result<SyncConfig, SyncError> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                load_file(default_path)?
            } else {
                SyncConfig::default()
            }
        }
    };
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}
