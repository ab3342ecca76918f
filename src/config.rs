use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Per-user directory holding `config.json` and `log.txt`.
pub static APP_DIR: Lazy<PathBuf> = Lazy::new(|| match dirs::config_dir() {
    Some(dir) => dir.join("Rewrite"),
    None => {
        // Same fallback as a portable install: next to the executable
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        exe.parent().unwrap_or(Path::new(".")).to_path_buf()
    }
});

/// The three models offered in the tray menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Model {
    #[default]
    Gpt4o,
    Gpt4oMini,
    Gpt45Preview,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::Gpt4o, Model::Gpt4oMini, Model::Gpt45Preview];

    /// Identifier sent to the API and stored in the settings file.
    pub fn id(self) -> &'static str {
        match self {
            Model::Gpt4o => "gpt-4o",
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Gpt45Preview => "gpt-4.5-preview-2025-02-27",
        }
    }

    /// Menu title.
    pub fn label(self) -> &'static str {
        match self {
            Model::Gpt4o => "GPT-4o",
            Model::Gpt4oMini => "GPT-4o mini",
            Model::Gpt45Preview => "GPT-4.5 (Preview)",
        }
    }

    /// Position in [`Model::ALL`], used as a direct index into menu handles.
    pub fn index(self) -> usize {
        match self {
            Model::Gpt4o => 0,
            Model::Gpt4oMini => 1,
            Model::Gpt45Preview => 2,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }
}

impl From<String> for Model {
    fn from(id: String) -> Self {
        Model::from_id(&id).unwrap_or_else(|| {
            log::warn!("Unknown model '{}' in settings, using {}", id, Model::default().id());
            Model::default()
        })
    }
}

impl From<Model> for String {
    fn from(model: Model) -> Self {
        model.id().to_string()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub selected_model: Model,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            selected_model: Model::default(),
            base_url: default_base_url(),
        }
    }
}

// Keeps the key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<set>" })
            .field("selected_model", &self.selected_model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    pub fn path() -> PathBuf {
        APP_DIR.join("config.json")
    }

    /// Reads the settings file, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str::<Config>(&s).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Applies `OPENAI_API_KEY` (only when no key is stored) and
    /// `OPENAI_BASE_URL`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if !self.has_api_key() {
            if let Some(v) = set("OPENAI_API_KEY") {
                self.api_key = v;
            }
        }
        if let Some(v) = set("OPENAI_BASE_URL") {
            self.base_url = v;
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let s = serde_json::to_string_pretty(self)?;
        fs::write(path, s).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
