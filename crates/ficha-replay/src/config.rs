use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

pub const ENV_DEFINITION: &str = "FICHA_DEFINITION";
pub const ENV_SESSION: &str = "FICHA_SESSION";
pub const ENV_LOG_JSON: &str = "FICHA_LOG_JSON";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Wizard definition JSON.
    #[serde(default)]
    pub definition: PathBuf,
    /// Recorded session JSON.
    #[serde(default)]
    pub session: PathBuf,
    /// Quiescence window before a postal-code lookup fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Emit logs as JSON lines instead of the human-readable format.
    #[serde(default)]
    pub log_json: bool,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            definition: PathBuf::new(),
            session: PathBuf::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            log_json: false,
        }
    }
}

/// `~/.config/ficha/replay.json` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("ficha").join("replay.json"))
}

impl ReplayConfig {
    /// Load from `path`, or from the default location when it exists, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> eyre::Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let mut config = match &file {
            Some(file) => Self::from_file(file)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.check()?;
        Ok(config)
    }

    /// Parse a config file. Relative paths inside it are taken relative to
    /// the file's directory.
    pub fn from_file(path: &Path) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;
        let mut config = Self::from_json_str(&contents)?;
        if let Some(base) = path.parent() {
            config.definition = resolve(base, &config.definition);
            config.session = resolve(base, &config.session);
        }
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Override fields from environment variables, read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(definition) = var(ENV_DEFINITION) {
            self.definition = PathBuf::from(definition);
        }
        if let Some(session) = var(ENV_SESSION) {
            self.session = PathBuf::from(session);
        }
        if let Some(flag) = var(ENV_LOG_JSON) {
            self.log_json = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn check(&self) -> eyre::Result<()> {
        if self.definition.as_os_str().is_empty() {
            return Err(eyre::eyre!(
                "no wizard definition configured (set `definition` or {ENV_DEFINITION})"
            ));
        }
        if self.session.as_os_str().is_empty() {
            return Err(eyre::eyre!(
                "no session configured (set `session` or {ENV_SESSION})"
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
