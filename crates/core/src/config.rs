//! Application configuration loaded from `config.yaml`.
//!
//! Keys are PascalCase. Every section is optional and falls back to its
//! default; [`AppConfig::check`] runs after deserialisation and rejects
//! values the rest of the system cannot work with.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::poster::ImageType;

/// Directory used when `CONFIG_PATH` is unset.
pub const DEFAULT_CONFIG_DIR: &str = "/config";

/// Sweep schedule used when `AutoDownload.Cron` is unset.
pub const DEFAULT_CRON: &str = "0 0 * * *";

/// Accepted `Logging.Level` values.
pub const VALID_LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Database file name inside the config directory.
pub const DB_FILE_NAME: &str = "AURA.db";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    #[validate(nested)]
    pub media_server: MediaServerConfig,
    pub mediux: MediuxConfig,
    pub auto_download: AutoDownloadConfig,
    pub images: ImagesConfig,
    #[serde(rename = "TMDB")]
    pub tmdb: TmdbConfig,
    pub labels_and_tags: LabelsAndTagsConfig,
    pub notifications: NotificationsConfig,
    pub sonarr_radarr: SonarrRadarrConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// argon2id hash.
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional log file; empty disables file output.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: String::new(),
        }
    }
}

impl LoggingConfig {
    /// `tracing` filter directive for the configured level.
    pub fn filter_directive(&self) -> String {
        self.level.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaServerType {
    #[default]
    Plex,
    Emby,
    Jellyfin,
}

impl MediaServerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaServerType::Plex => "Plex",
            MediaServerType::Emby => "Emby",
            MediaServerType::Jellyfin => "Jellyfin",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LibraryConfig {
    pub name: String,
    #[serde(rename = "SectionID")]
    pub section_id: String,
    #[serde(rename = "Type")]
    pub section_type: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaServerConfig {
    #[serde(rename = "Type")]
    pub server_type: MediaServerType,
    #[serde(rename = "URL")]
    pub url: String,
    pub token: String,
    pub libraries: Vec<LibraryConfig>,
    /// Plex season folder naming: 1 = `Season 1`, 2 = `Season 01`.
    #[validate(range(min = 1, max = 2))]
    pub season_naming_convention: u8,
    #[serde(rename = "UserID")]
    pub user_id: String,
}

impl Default for MediaServerConfig {
    fn default() -> Self {
        Self {
            server_type: MediaServerType::Plex,
            url: String::new(),
            token: String::new(),
            libraries: Vec::new(),
            season_naming_convention: 2,
            user_id: String::new(),
        }
    }
}

impl MediaServerConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadQuality {
    Original,
    #[default]
    Optimized,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediuxConfig {
    pub token: String,
    pub download_quality: DownloadQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AutoDownloadConfig {
    pub enabled: bool,
    pub cron: String,
}

impl Default for AutoDownloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: DEFAULT_CRON.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImagesConfig {
    pub cache_images: CacheImagesConfig,
    pub save_images_locally: SaveImagesLocallyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CacheImagesConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SaveImagesLocallyConfig {
    pub enabled: bool,
    /// Separate images root; empty means next to the media files.
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    #[serde(rename = "APIKey")]
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelApplication {
    Plex,
    Sonarr,
    Radarr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LabelRule {
    pub application: LabelApplication,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub add_labels_for_selected_types: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LabelsAndTagsConfig {
    pub applications: Vec<LabelRule>,
}

impl LabelsAndTagsConfig {
    /// The enabled rule for one application, if any.
    pub fn rule_for(&self, app: LabelApplication) -> Option<&LabelRule> {
        self.applications
            .iter()
            .find(|r| r.application == app && r.enabled)
    }
}

/// Label added for a selected image type, e.g. `aura-seasonPoster`.
pub fn selected_type_label(image_type: ImageType) -> String {
    format!("aura-{}", image_type.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationProviderKind {
    Discord,
    Pushover,
    Gotify,
    Webhook,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DiscordConfig {
    pub webhook: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PushoverConfig {
    pub token: String,
    pub user_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GotifyConfig {
    #[serde(rename = "URL")]
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WebhookConfig {
    #[serde(rename = "URL")]
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationProviderConfig {
    pub provider: NotificationProviderKind,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub pushover: Option<PushoverConfig>,
    #[serde(default)]
    pub gotify: Option<GotifyConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub providers: Vec<NotificationProviderConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrType {
    Sonarr,
    Radarr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrApplication {
    #[serde(rename = "Type")]
    pub app_type: ArrType,
    #[serde(rename = "Library", default)]
    pub library: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "APIKey", default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SonarrRadarrConfig {
    pub applications: Vec<ArrApplication>,
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Parse YAML text and validate the result.
    pub fn from_yaml(text: &str) -> Result<Self, CoreError> {
        let config: AppConfig = serde_yaml::from_str(text)
            .map_err(|e| CoreError::Validation(format!("Invalid config YAML: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Load `config.yaml` (or `config.yml`) from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Self, CoreError> {
        let path = find_config_file(dir).ok_or_else(|| {
            CoreError::Validation(format!(
                "No config.yaml or config.yml found in {}",
                dir.display()
            ))
        })?;
        let text = std::fs::read_to_string(&path).map_err(|e| {
            CoreError::Validation(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Validate everything serde cannot express.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid config: {e}")))?;

        let level = self.logging.level.trim().to_uppercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(CoreError::Validation(format!(
                "Logging.Level must be one of {}, got: '{}'",
                VALID_LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        validate_http_url("MediaServer.URL", &self.media_server.url)?;

        validate_cron(&self.auto_download.cron)?;

        for provider in self.notifications.providers.iter().filter(|p| p.enabled) {
            validate_provider(provider)?;
        }

        Ok(())
    }
}

fn find_config_file(dir: &Path) -> Option<PathBuf> {
    ["config.yaml", "config.yml"]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Require an absolute `http://` or `https://` URL.
pub fn validate_http_url(field: &str, url: &str) -> Result<(), CoreError> {
    let trimmed = url.trim();
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(CoreError::Validation(format!(
            "{field} must start with http:// or https://, got: '{trimmed}'"
        )));
    }
    Ok(())
}

/// Parse a standard 5-field cron expression.
pub fn validate_cron(expr: &str) -> Result<(), CoreError> {
    croner::Cron::new(expr)
        .parse()
        .map(|_| ())
        .map_err(|e| CoreError::Validation(format!("AutoDownload.Cron '{expr}' is invalid: {e}")))
}

fn validate_provider(provider: &NotificationProviderConfig) -> Result<(), CoreError> {
    let missing = |what: &str| {
        CoreError::Validation(format!(
            "Notification provider {:?} is enabled but {what} is missing",
            provider.provider
        ))
    };
    match provider.provider {
        NotificationProviderKind::Discord => {
            let cfg = provider.discord.as_ref().ok_or_else(|| missing("Discord"))?;
            validate_http_url("Discord.Webhook", &cfg.webhook)
        }
        NotificationProviderKind::Pushover => {
            let cfg = provider.pushover.as_ref().ok_or_else(|| missing("Pushover"))?;
            if cfg.token.trim().is_empty() || cfg.user_key.trim().is_empty() {
                return Err(missing("Pushover.Token or Pushover.UserKey"));
            }
            Ok(())
        }
        NotificationProviderKind::Gotify => {
            let cfg = provider.gotify.as_ref().ok_or_else(|| missing("Gotify"))?;
            if cfg.token.trim().is_empty() {
                return Err(missing("Gotify.Token"));
            }
            validate_http_url("Gotify.URL", &cfg.url)
        }
        NotificationProviderKind::Webhook => {
            let cfg = provider.webhook.as_ref().ok_or_else(|| missing("Webhook"))?;
            validate_http_url("Webhook.URL", &cfg.url)
        }
    }
}

/// Config directory from `CONFIG_PATH`, defaulting to [`DEFAULT_CONFIG_DIR`].
pub fn config_dir_from_env() -> PathBuf {
    std::env::var("CONFIG_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR))
}

// ---------------------------------------------------------------------------
// On-disk layout
// ---------------------------------------------------------------------------

/// Well-known paths under the config directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
}

impl AppPaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn database(&self) -> PathBuf {
        self.config_dir.join(DB_FILE_NAME)
    }

    pub fn backups(&self) -> PathBuf {
        self.config_dir.join("backups")
    }

    pub fn migration_warnings(&self, version: i64) -> PathBuf {
        self.config_dir.join(format!("migration_warning_v{version}.txt"))
    }

    pub fn mediux_thumbs(&self) -> PathBuf {
        self.config_dir.join("temp-images").join("mediux").join("thumbs")
    }

    pub fn mediux_full(&self) -> PathBuf {
        self.config_dir.join("temp-images").join("mediux").join("full")
    }

    pub fn plex_images(&self) -> PathBuf {
        self.config_dir.join("temp-images").join("plex")
    }

    pub fn emby_jellyfin_images(&self) -> PathBuf {
        self.config_dir.join("temp-images").join("emby-jellyfin")
    }

    pub fn download_queue(&self) -> PathBuf {
        self.config_dir.join("download-queue")
    }

    /// Every directory the service writes into.
    pub fn all_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.backups(),
            self.mediux_thumbs(),
            self.mediux_full(),
            self.plex_images(),
            self.emby_jellyfin_images(),
            self.download_queue(),
        ]
    }
}
