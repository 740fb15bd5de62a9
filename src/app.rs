use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use directories::BaseDirs;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppState {
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    /// Requests have no timeout unless this is set.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    // TOML is the settings format; an older JSON file is read once and migrated.
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let cfg_dir = base.config_dir();
        Some(cfg_dir.join("botchat.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("com", "example", "BotChat")?;
        Some(proj.config_dir().join("state.json"))
    }

    pub fn load() -> Self {
        let (Some(toml_path), legacy) = (Self::toml_path(), Self::legacy_json_path()) else {
            return Self::new();
        };
        match Self::load_from(&toml_path, legacy.as_deref()) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("ignoring unreadable settings: {e}");
                Self::new()
            }
        }
    }

    /// Reads `toml_path`, falling back to `legacy_json` (and rewriting it as
    /// TOML) when the TOML file does not exist yet.
    pub fn load_from(toml_path: &Path, legacy_json: Option<&Path>) -> Result<Self> {
        if toml_path.exists() {
            let text = fs::read_to_string(toml_path)?;
            return toml::from_str::<AppState>(&text)
                .map_err(|e| ClientError::Config(e.to_string()));
        }

        if let Some(legacy) = legacy_json.filter(|p| p.exists()) {
            let bytes = fs::read(legacy)?;
            let state = serde_json::from_slice::<AppState>(&bytes)?;
            if let Err(e) = state.save_to(toml_path) {
                log::warn!("could not migrate {}: {e}", legacy.display());
            }
            return Ok(state);
        }

        Ok(Self::new())
    }

    pub fn save(&self) -> Result<()> {
        match Self::toml_path() {
            Some(path) => self.save_to(&path),
            None => Err(ClientError::Config("no config dir".into())),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))?;
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.email.is_empty() && !self.password.is_empty()
    }

    pub fn forget_credentials(&mut self) {
        self.email.clear();
        self.password.clear();
        self.csrf_token = None;
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(crate::storage::default_export_dir)
    }
}

#[cfg(feature = "gui")]
pub fn build_ui(app: &adw::Application) {
    let state = AppState::load();
    if state.is_configured() {
        crate::ui::main_window::show_main_window(app);
    } else {
        crate::ui::login::show_login_window(app);
    }
}
