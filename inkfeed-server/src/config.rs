//! Service configuration resolution
//!
//! Merges command line, environment and TOML values into one
//! [`ServiceConfig`] built once at startup and shared read-only.

use std::path::PathBuf;
use std::time::Duration;

use inkfeed_common::config::TomlConfig;
use tracing::{info, warn};

/// Environment variable holding the inference API credential
pub const API_KEY_ENV: &str = "DASHSCOPE_API_KEY";
/// Environment variable overriding the group-chat webhook URL
pub const WEBHOOK_URL_ENV: &str = "INKFEED_WEBHOOK_URL";
/// Environment variable overriding the public base URL
pub const PUBLIC_URL_ENV: &str = "INKFEED_PUBLIC_URL";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SCHOOL_NAME: &str = "雅趣堂书画";
/// Largest composite, in pixels
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 50_000_000;
pub const DEFAULT_MODEL: &str = "qwen-vl-max";
pub const DEFAULT_AI_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/multimodal-generation/generation";

/// Inference client settings
#[derive(Debug, Clone)]
pub struct AiSettings {
    /// `None` means comment generation is not configured
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_AI_ENDPOINT.to_string(),
            max_attempts: 2,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Group-chat webhook settings
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Empty means notification is not configured
    pub url: String,
    pub timeout: Duration,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Composite rendering settings
#[derive(Debug, Clone)]
pub struct CompositeSettings {
    pub target_width: u32,
    pub footer_height: u32,
    pub jpeg_quality: u8,
    /// Extra font files tried before the platform fonts
    pub font_paths: Vec<PathBuf>,
    pub watermark: String,
    /// Upper bound on composite pixels; also bounds decoder allocations
    pub max_canvas_pixels: u64,
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            target_width: 750,
            footer_height: 250,
            jpeg_quality: 95,
            font_paths: Vec::new(),
            watermark: default_watermark(DEFAULT_SCHOOL_NAME),
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

fn default_watermark(school_name: &str) -> String {
    format!("雅趣堂｜{school_name}")
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Data root: holds `uploads/` and `records.json`
    pub root_folder: PathBuf,
    /// Base for links sent to parents; no trailing slash
    pub public_base_url: String,
    pub school_name: String,
    pub max_upload_bytes: usize,
    pub ai: AiSettings,
    pub webhook: WebhookSettings,
    pub composite: CompositeSettings,
}

/// Command-line overrides (already merged with their env fallbacks by clap)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub root_folder: PathBuf,
}

impl ServiceConfig {
    /// Resolve the final configuration
    ///
    /// **Priority:** command line → environment → TOML → compiled default
    pub fn resolve(cli: CliOverrides, toml: &TomlConfig) -> Self {
        let service = &toml.service;

        let public_base_url = non_empty_env(PUBLIC_URL_ENV)
            .or_else(|| service.public_base_url.clone())
            .unwrap_or_else(|| {
                format!("http://127.0.0.1:{}", cli.port.or(service.port).unwrap_or(DEFAULT_PORT))
            });
        let public_base_url = public_base_url.trim_end_matches('/').to_string();

        let school_name = service
            .school_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SCHOOL_NAME.to_string());

        let ai_defaults = AiSettings::default();
        let ai = AiSettings {
            api_key: resolve_api_key(toml.ai.api_key.as_deref()),
            model: toml.ai.model.clone().unwrap_or(ai_defaults.model),
            endpoint: toml.ai.endpoint.clone().unwrap_or(ai_defaults.endpoint),
            max_attempts: toml.ai.max_attempts.unwrap_or(ai_defaults.max_attempts).max(1),
            retry_delay: toml
                .ai
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(ai_defaults.retry_delay),
            timeout: toml
                .ai
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(ai_defaults.timeout),
        };

        let webhook = WebhookSettings {
            url: non_empty_env(WEBHOOK_URL_ENV)
                .or_else(|| toml.webhook.url.clone())
                .unwrap_or_default(),
            timeout: toml
                .webhook
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| WebhookSettings::default().timeout),
        };

        let composite_defaults = CompositeSettings::default();
        let composite = CompositeSettings {
            target_width: toml.composite.target_width.unwrap_or(composite_defaults.target_width),
            footer_height: toml.composite.footer_height.unwrap_or(composite_defaults.footer_height),
            jpeg_quality: toml
                .composite
                .jpeg_quality
                .unwrap_or(composite_defaults.jpeg_quality)
                .clamp(1, 100),
            font_paths: toml.composite.font_paths.clone(),
            watermark: service
                .watermark
                .clone()
                .unwrap_or_else(|| default_watermark(&school_name)),
            max_canvas_pixels: toml
                .composite
                .max_canvas_pixels
                .unwrap_or(composite_defaults.max_canvas_pixels),
        };

        Self {
            host: cli
                .host
                .or_else(|| service.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(service.port).unwrap_or(DEFAULT_PORT),
            root_folder: cli.root_folder,
            public_base_url,
            school_name,
            max_upload_bytes: service.max_upload_mb.unwrap_or(32) * 1024 * 1024,
            ai,
            webhook,
            composite,
        }
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.root_folder.join(inkfeed_common::config::UPLOADS_DIR)
    }

    pub fn records_path(&self) -> PathBuf {
        self.root_folder.join(inkfeed_common::config::RECORDS_FILE)
    }

    /// Public URL of a stored upload
    pub fn public_file_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_base_url, file_name)
    }

    /// Archive page link for one student
    pub fn archive_url(&self, student: &str, class_name: &str) -> String {
        format!(
            "{}/archive?student={}&class={}",
            self.public_base_url,
            urlencoding::encode(student),
            urlencoding::encode(class_name)
        )
    }

    /// Test configuration rooted at `root_folder` with nothing external configured
    pub fn for_root(root_folder: PathBuf) -> Self {
        Self::resolve(
            CliOverrides {
                root_folder,
                ..Default::default()
            },
            &TomlConfig::default(),
        )
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the inference API key: environment first, then TOML
pub fn resolve_api_key(toml_key: Option<&str>) -> Option<String> {
    let env_key = non_empty_env(API_KEY_ENV);
    let toml_key = toml_key.filter(|k| is_valid_key(k)).map(str::to_string);

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Inference API key found in both {} and TOML config. Using environment variable.",
            API_KEY_ENV
        );
    }

    match (env_key, toml_key) {
        (Some(key), _) => {
            info!("Inference API key loaded from environment variable");
            Some(key)
        }
        (None, Some(key)) => {
            info!("Inference API key loaded from TOML config");
            Some(key)
        }
        (None, None) => {
            warn!(
                "Inference API key not configured ({} or [ai] api_key); blank comments will use the default text",
                API_KEY_ENV
            );
            None
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
