//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "INKFEED_ROOT_FOLDER";
/// Environment variable naming an explicit config file
pub const CONFIG_FILE_ENV: &str = "INKFEED_CONFIG";

/// Upload folder name below the root folder
pub const UPLOADS_DIR: &str = "uploads";
/// Record store file name below the root folder
pub const RECORDS_FILE: &str = "records.json";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/inkfeed (or /var/lib/inkfeed for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("inkfeed"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/inkfeed"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("inkfeed"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/inkfeed"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("inkfeed"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\inkfeed"))
    } else {
        PathBuf::from("./inkfeed_data")
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. `info` or `inkfeed_server=debug`
    #[serde(default)]
    pub level: Option<String>,
}

/// `[service]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Public base URL used for image links and archive links
    pub public_base_url: Option<String>,
    pub school_name: Option<String>,
    /// Watermark line drawn at the bottom of every composite
    pub watermark: Option<String>,
    pub max_upload_mb: Option<usize>,
}

/// `[ai]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AiSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// `[webhook]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebhookSection {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[composite]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompositeSection {
    pub target_width: Option<u32>,
    pub footer_height: Option<u32>,
    pub jpeg_quality: Option<u8>,
    /// Largest composite, in pixels
    pub max_canvas_pixels: Option<u64>,
    /// Font files tried before the platform fonts
    #[serde(default)]
    pub font_paths: Vec<PathBuf>,
}

/// On-disk TOML configuration; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub webhook: WebhookSection,
    #[serde(default)]
    pub composite: CompositeSection,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the config file, degrading to defaults on any problem
    ///
    /// `explicit` (from the command line) wins over `INKFEED_CONFIG`, which
    /// wins over the platform config locations.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var(CONFIG_FILE_ENV)
                .ok()
                .map(PathBuf::from)
                .or_else(|| locate_config_file().ok()),
        };

        let Some(path) = path else {
            debug!("No config file found, using compiled defaults");
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} - continuing with compiled defaults", e);
                Self::default()
            }
        }
    }
}

/// Find the platform config file
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("inkfeed").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/inkfeed/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Resolves the data root folder by priority order
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from config file");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on startup
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding raw photos and composites
    pub fn uploads_path(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    /// Path of the record store file
    pub fn records_path(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    pub fn records_exist(&self) -> bool {
        self.records_path().exists()
    }

    /// Create root and uploads folders if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }
}
