//! Layered settings: built-in defaults, then an optional config file, then
//! `TANKOBON_*` environment variables, then command-line overrides.

use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Default destination template for uploaded images. The file extension is
/// appended after rendering.
pub const DEFAULT_UPLOAD_TEMPLATE: &str = "{{ kind }}/{{ comic|slug }}/{{ hash|truncate: 16 }}";
pub const ENV_PREFIX: &str = "TANKOBON_";
const CONFIG_STEM: &str = "tankobon";
const PROVIDERS: [&str; 2] = ["local", "mock"];

/// Filename patterns (relative to `data_dir`, or absolute) for each entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub users: Vec<String>,
    pub comics: Vec<String>,
    pub chapters: Vec<String>,
}
impl Default for Sources {
    fn default() -> Self {
        let patterns = |entity: &str| vec![format!("{entity}.json"), format!("{entity}/**/*.json")];
        Self {
            users: patterns("users"),
            comics: patterns("comics"),
            chapters: patterns("chapters"),
        }
    }
}

/// Where uploaded images go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum UploadSettings {
    /// Write into a directory served by the web application.
    Local {
        /// Defaults to `<public_dir>/uploads`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        root: Option<PathBuf>,
        base_url: String,
    },
    /// Keep uploads in memory. Useful for trying out source data.
    Mock,
}
impl Default for UploadSettings {
    fn default() -> Self {
        Self::Local { root: None, base_url: "/uploads".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database file.
    pub database: PathBuf,
    /// Root directory of the seed JSON files.
    pub data_dir: PathBuf,
    /// Directory that local image paths (`/images/a.jpg`) resolve against.
    pub public_dir: PathBuf,
    /// Progress file for external pollers.
    pub status_file: PathBuf,
    pub sources: Sources,
    pub batch_size: usize,
    pub concurrency: usize,
    pub image_concurrency: usize,
    /// Per-record time limit in seconds; `0` disables it.
    pub item_timeout_secs: u64,
    pub upload_template: String,
    pub upload: UploadSettings,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("tankobon.db"),
            data_dir: PathBuf::from("data"),
            public_dir: PathBuf::from("public"),
            status_file: PathBuf::from("seed-status.json"),
            sources: Sources::default(),
            batch_size: 10,
            concurrency: 5,
            image_concurrency: 5,
            item_timeout_secs: 120,
            upload_template: DEFAULT_UPLOAD_TEMPLATE.to_string(),
            upload: UploadSettings::default(),
        }
    }
}

/// Command-line values that take precedence over every other layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

/// The config file used when none is given explicitly: the first of
/// `tankobon.{toml,yaml,yml,json}` that exists in the platform config
/// directory.
pub fn default_config_file() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", CONFIG_STEM)?;
    ["toml", "yaml", "yml", "json"]
        .iter()
        .map(|ext| dirs.config_dir().join(format!("{CONFIG_STEM}.{ext}")))
        .find(|path| path.is_file())
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

impl Settings {
    /// Build the layered figment without extracting it.
    ///
    /// An explicit `config_file` must exist. Without one, the default config
    /// file is used if present.
    pub fn figment(config_file: Option<&Path>, overrides: &Overrides) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        match config_file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::MissingFile(path.to_path_buf())),
            Some(path) => figment = merge_file(figment, path)?,
            None => {
                if let Some(path) = default_config_file() {
                    tracing::debug!(path = %path.display(), "Using default config file");
                    figment = merge_file(figment, &path)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")).merge(Serialized::defaults(overrides)))
    }

    /// Load and validate settings from every layer.
    #[instrument(level = "debug", skip(overrides))]
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::from_figment(&Self::figment(config_file, overrides)?)
    }

    /// Extract and validate settings from an already-built figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        // Checked up front so an unknown provider gets a clear error rather
        // than a generic "unknown variant" deserialization failure.
        let provider: String = figment.extract_inner("upload.provider").or_raise(|| ErrorKind::Load)?;
        if !PROVIDERS.contains(&provider.as_str()) {
            exn::bail!(ErrorKind::UnknownProvider(provider));
        }
        let settings: Settings = figment.extract().or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("batch_size", self.batch_size),
            ("concurrency", self.concurrency),
            ("image_concurrency", self.image_concurrency),
        ] {
            if value == 0 {
                exn::bail!(ErrorKind::InvalidValue { field, reason: "must be at least 1".to_string() });
            }
        }
        if self.upload_template.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidValue { field: "upload_template", reason: "must not be empty".to_string() });
        }
        Ok(())
    }

    /// Source patterns for an entity, resolved against `data_dir`.
    pub fn source_patterns(&self, entity: crate::Entity) -> Vec<PathBuf> {
        let patterns = match entity {
            crate::Entity::Users => &self.sources.users,
            crate::Entity::Comics => &self.sources.comics,
            crate::Entity::Chapters => &self.sources.chapters,
        };
        patterns.iter().map(|p| self.data_dir.join(p)).collect()
    }

    /// Root directory for the local upload provider.
    pub fn upload_root(&self) -> Option<PathBuf> {
        match &self.upload {
            UploadSettings::Local { root, .. } => Some(root.clone().unwrap_or_else(|| self.public_dir.join("uploads"))),
            UploadSettings::Mock => None,
        }
    }
}
