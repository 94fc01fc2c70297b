use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::from_str;

use crate::error::{Error, Result};

const APP_DIR: &str = "virtual-tourist";
const CONFIG_FILE: &str = "virtual-tourist/config.json";

static CONFIG: OnceCell<Arc<RwLock<Config>>> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub picture_path: PathBuf,
    pub api_key: String,
    pub search_url: String,
    pub photos_per_page: u32,
    pub downloader_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(PathBuf::new).join(APP_DIR);
        Self {
            db_path: data_dir.join("virtual-tourist.db"),
            picture_path: data_dir.join("pictures"),
            api_key: String::new(),
            search_url: "https://api.flickr.com/services/rest/".to_string(),
            photos_per_page: 24,
            downloader_buffer: 100,
        }
    }
}

/// Loads the configuration file, creating a default one in the user's local
/// config directory when none exists. Call once at startup.
pub fn init() -> Result<()> {
    let config = match find_config_file()? {
        Some(path) => {
            debug!("Loading configuration from {path:?}");
            read_config(&path)?
        }
        None => load_or_create(&default_config_dir())?,
    };
    set_global(config);
    Ok(())
}

/// Like [`init`], but only looks in `config_dir`.
pub fn init_in(config_dir: &Path) -> Result<()> {
    let config = load_or_create(config_dir)?;
    set_global(config);
    Ok(())
}

fn set_global(config: Config) {
    // Already initialised by another thread: keep the first value.
    let _ = CONFIG.set(Arc::new(RwLock::new(config)));
}

/// Returns the global configuration.
///
/// Without a prior `init()` the known paths are searched once; any failure
/// falls back to the in-memory default and nothing is written.
pub fn get_config() -> Arc<RwLock<Config>> {
    CONFIG
        .get_or_init(|| {
            let config = load_from_files().unwrap_or_default();
            Arc::new(RwLock::new(config))
        })
        .clone()
}

/// Writes `config` to the user's local config directory and replaces the
/// global copy.
pub fn save_config(config: &Config) -> Result<()> {
    save_config_in(&default_config_dir(), config)
}

pub fn save_config_in(config_dir: &Path, config: &Config) -> Result<()> {
    let path = config_dir.join(CONFIG_FILE);
    write_config(&path, config)?;
    *get_config().write()? = config.clone();
    info!("Configuration saved to {path:?}");
    Ok(())
}

pub fn read_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Ok(from_str(&content)?)
}

pub fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}

fn load_from_files() -> Result<Config> {
    let config_path =
        find_config_file()?.ok_or(Error::Other("config file not found".to_string()))?;
    read_config(&config_path)
}

fn default_config_dir() -> PathBuf {
    dirs::config_local_dir().unwrap_or_default()
}

fn load_or_create(config_dir: &Path) -> Result<Config> {
    let path = config_dir.join(CONFIG_FILE);
    if path.is_file() {
        debug!("Loading configuration from {path:?}");
        return read_config(&path);
    }

    let config = Config::default();
    write_config(&path, &config)?;
    debug!("Default configuration file created at: {path:?}");

    Ok(config)
}

fn find_config_file() -> Result<Option<PathBuf>> {
    let exe_path = std::env::current_exe()?;
    let exe_dir = exe_path.parent().unwrap_or(&exe_path);

    let paths = [
        default_config_dir().join(CONFIG_FILE),
        dirs::config_dir().unwrap_or_default().join(CONFIG_FILE),
        exe_dir.join(CONFIG_FILE),
    ];

    Ok(paths.into_iter().find(|p| p.exists()))
}
