//! Layered configuration loading with figment.
//!
//! Later layers override earlier ones:
//!
//! 1. [`SluiceConfig::default`]
//! 2. Values passed to [`ConfigLoader::merge`]
//! 3. The profile file, e.g. `sluice.production.toml`
//! 4. The main file, `sluice.toml` or `sluice.yaml`
//! 5. `SLUICE_*` environment variables, `__` separating nested keys
//!
//! ```text
//! SLUICE_NEGOTIATION__FAVOR_PARAMETER=true  →  negotiation.favor_parameter = true
//! SLUICE_ASYNC__TIMEOUT_MS=5000             →  async.timeout_ms = 5000
//! ```
//!
//! Which file formats are read depends on the `toml-config` and
//! `yaml-config` features. The loaded configuration is validated before it is
//! returned.

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::SluiceConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "SLUICE_";
const PROFILE_VAR: &str = "SLUICE_PROFILE";
const FILE_STEM: &str = "sluice";
const DEFAULT_PROFILE: &str = "development";

/// File extensions read for the enabled formats, in lookup order.
const EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

/// Normalizes profile aliases: `prod` is `production`, `dev` is `development`.
fn canonical_profile(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "" | "dev" | "development" => DEFAULT_PROFILE.to_string(),
        "prod" | "production" => "production".to_string(),
        other => other.to_string(),
    }
}

/// Builds a [`SluiceConfig`] from defaults, files and the environment.
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .profile("production")
///     .file("./config/sluice.toml")
///     .load()?;
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    overrides: Figment,
    profile: String,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    read_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader for the profile named by `SLUICE_PROFILE`, or
    /// `development`.
    pub fn new() -> Self {
        let profile = std::env::var(PROFILE_VAR)
            .map(|p| canonical_profile(&p))
            .unwrap_or_else(|_| DEFAULT_PROFILE.to_string());
        Self {
            overrides: Figment::new(),
            profile,
            search_paths: Vec::new(),
            file: None,
            read_env: true,
        }
    }

    /// Selects the profile whose `sluice.{profile}.*` file is layered under
    /// the main file.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = canonical_profile(profile.as_ref());
        self
    }

    /// Returns the selected profile.
    pub fn profile_name(&self) -> &str {
        &self.profile
    }

    /// Adds a directory to search for `sluice.*` files.
    ///
    /// Without search paths the working directory and the user config
    /// directory (`~/.config/sluice` on Linux) are searched.
    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    /// Adds the working directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Reads exactly this file instead of searching. A missing file is an error.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skips `SLUICE_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Layers `config` directly above the defaults.
    pub fn merge(mut self, config: SluiceConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads and validates the configuration.
    pub fn load(self) -> ConfigResult<SluiceConfig> {
        let figment = self.figment()?;
        let config: SluiceConfig = figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        validate_config(&config)?;

        debug!(
            profile = %self.profile,
            level = config.logging.level.as_str(),
            trailing_slash = config.mapping.use_trailing_slash_match,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SluiceConfig::default()))
            .merge(self.overrides.clone());

        match &self.file {
            Some(path) if path.is_file() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = merge_file(figment, path)?;
            }
            Some(path) => return Err(ConfigError::FileNotFound(path.clone())),
            None => figment = self.merge_discovered(figment)?,
        }

        if self.read_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    /// Merges the profile and main file of the first directory that has a
    /// main file.
    fn merge_discovered(&self, mut figment: Figment) -> ConfigResult<Figment> {
        for dir in self.directories() {
            let Some(main) = find_file(&dir, FILE_STEM) else {
                continue;
            };
            if let Some(profiled) = find_file(&dir, &format!("{FILE_STEM}.{}", self.profile)) {
                debug!(path = %profiled.display(), "Loading profile configuration");
                figment = merge_file(figment, &profiled)?;
            }
            info!(path = %main.display(), "Loading configuration file");
            return merge_file(figment, &main);
        }

        warn!("No configuration file found, using defaults");
        Ok(figment)
    }

    fn directories(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(FILE_STEM)))
            .collect()
    }
}

fn find_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        other => Err(ConfigError::ParseError(format!(
            "unsupported configuration format '.{other}' for {}",
            path.display()
        ))),
    }
}

/// Loads configuration from the working directory, the user config
/// directory and the environment.
pub fn load_config() -> ConfigResult<SluiceConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, overlaid with the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<SluiceConfig> {
    ConfigLoader::new().file(path).load()
}
