/// Persisted agent configuration and the baseline/credential write path
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::{Baseline, Calibration, Credentials};

pub const CONFIG_FILE_NAME: &str = "apiConf.json";
pub const CONFIG_PATH_ENV: &str = "MIEF_CONFIG_PATH";

// Sensirion-recommended starting baseline for a fresh SGP30
const DEFAULT_ECO2_BASE: u16 = 0x8973;
const DEFAULT_TVOC_BASE: u16 = 0x8aae;
const DEFAULT_DHT11_PIN: u8 = 4;
const DEFAULT_API_URL: &str = "https://mief-is-in-the-air.tk";
const UNSET_CREDENTIAL: &str = "-1";

/// On-disk record. Every field is required; a file missing any of them is
/// regenerated from defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "PiID")]
    pub pi_id: String,
    #[serde(rename = "PiSecret")]
    pub pi_secret: String,
    #[serde(rename = "Dht11Pin")]
    pub dht11_pin: u8,
    #[serde(rename = "TempOffset")]
    pub temp_offset: i32,
    #[serde(rename = "HumidityOffset")]
    pub humidity_offset: i32,
    #[serde(rename = "ApiUrl")]
    pub api_url: String,
    #[serde(rename = "DebugMode")]
    pub debug_mode: bool,
    #[serde(rename = "ECO2Base")]
    pub eco2_base: u16,
    #[serde(rename = "TVOCBase")]
    pub tvoc_base: u16,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            pi_id: UNSET_CREDENTIAL.to_string(),
            pi_secret: UNSET_CREDENTIAL.to_string(),
            dht11_pin: DEFAULT_DHT11_PIN,
            temp_offset: 0,
            humidity_offset: 0,
            api_url: DEFAULT_API_URL.to_string(),
            debug_mode: false,
            eco2_base: DEFAULT_ECO2_BASE,
            tvoc_base: DEFAULT_TVOC_BASE,
        }
    }
}

/// Write-through store for [`Configuration`]
///
/// Every mutation serializes the complete record, atomically replaces the
/// file, and re-reads it before the in-memory copy is updated.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Configuration,
}

impl ConfigStore {
    /// Load the record at `path`, recreating it with defaults when the file
    /// is absent or unparseable.
    ///
    /// Only fails if the defaults cannot be written and confirmed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();

        if !path.is_file() {
            info!("No config at {}, creating defaults", path.display());
            return Self::create_default(path);
        }

        match read_config(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                Ok(ConfigStore { path, config })
            }
            Err(e) => {
                error!("Create config error: {}", e);
                warn!("Overriding broken config at {}", path.display());
                Self::create_default(path)
            }
        }
    }

    /// Write a complete default record to `path` and return a store over it
    pub fn create_default(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = Configuration::default();
        write_and_verify(&path, &config)?;
        Ok(ConfigStore { path, config })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baseline(&self) -> Baseline {
        Baseline {
            eco2: self.config.eco2_base,
            tvoc: self.config.tvoc_base,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            id: self.config.pi_id.clone(),
            secret: self.config.pi_secret.clone(),
        }
    }

    pub fn calibration(&self) -> Calibration {
        Calibration {
            temperature_offset: self.config.temp_offset,
            humidity_offset: self.config.humidity_offset,
        }
    }

    /// Persist a new sensor baseline
    pub fn set_baseline(&mut self, baseline: Baseline) -> Result<(), ConfigError> {
        self.update(|config| {
            config.eco2_base = baseline.eco2;
            config.tvoc_base = baseline.tvoc;
        })
    }

    /// Persist a new device identity and shared secret
    pub fn set_identity(&mut self, id: &str, secret: &str) -> Result<(), ConfigError> {
        self.update(|config| {
            config.pi_id = id.to_string();
            config.pi_secret = secret.to_string();
        })
    }

    fn update<F>(&mut self, apply: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut Configuration),
    {
        let mut next = self.config.clone();
        apply(&mut next);
        write_and_verify(&self.path, &next)?;
        self.config = next;
        Ok(())
    }
}

/// Resolve where the config file lives
///
/// `MIEF_CONFIG_PATH` (environment or `.env`) wins; otherwise the file sits
/// next to the executable, falling back to the working directory.
pub fn resolve_config_path() -> PathBuf {
    dotenv::dotenv().ok();

    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path.trim());
        }
    }

    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn read_config(path: &Path) -> Result<Configuration, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically replace `path` with `config`, then re-read it to confirm
fn write_and_verify(path: &Path, config: &Configuration) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let replaced = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));
    if let Err(source) = replaced {
        fs::remove_file(&tmp_path).ok();
        return Err(io_err(source));
    }

    let written = read_config(path)?;
    if &written != config {
        return Err(ConfigError::Verification(path.to_path_buf()));
    }

    Ok(())
}
