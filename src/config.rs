use crate::env::{env_bool, env_optional};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder shipped in the config template.
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

const KNOWN_PROVIDERS: &[&str] = &["openai", "openai-compatible", "anthropic", "google", "gemini"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no API key for provider '{provider}' (set DOTAGENT_API_KEY or the provider's key in .env)")]
    MissingApiKey { provider: String },
    #[error("provider '{provider}' requires a base_url (config or DOTAGENT_BASE_URL)")]
    MissingBaseUrl { provider: String },
    #[error("base_url must start with http:// or https://, got '{0}'")]
    InvalidBaseUrl(String),
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            model: default_model(),
            base_url: None,
            organization: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "dotagent=info,warn".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn load_from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // An empty file deserializes to unit, not a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// YAML (explicit, else discovered, else defaults) with environment
    /// overrides on top. Precedence: CLI > ENV > YAML > defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::find_config_file("config.yaml"),
        };
        let mut cfg = match &path {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading config");
                Self::load_from_yaml(p)?
            }
            None => Self::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn user_config_dir() -> PathBuf {
        user_config_dir_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn find_config_file(filename: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        find_config_file_in(&cwd, dirs::home_dir().as_deref(), filename)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(p) = env_optional("DOTAGENT_PROVIDER", &[]) {
            self.llm.provider = p;
        }
        if let Some(m) = env_optional("DOTAGENT_MODEL", &["OPENAI_MODEL"]) {
            self.llm.model = m;
        }
        if let Some(u) = env_optional("DOTAGENT_BASE_URL", &["OPENAI_BASE_URL", "OPENAI_API_BASE"]) {
            self.llm.base_url = Some(u);
        }
        if let Some(o) = env_optional("OPENAI_ORGANIZATION", &["OPENAI_ORG_ID"]) {
            self.llm.organization = Some(o);
        }

        // Priority: DOTAGENT_API_KEY > provider-specific > existing
        let provider_key = match self.llm.provider.to_lowercase().as_str() {
            "openai" | "openai-compatible" => Some("OPENAI_API_KEY"),
            "anthropic" => Some("ANTHROPIC_API_KEY"),
            "google" | "gemini" => Some("GEMINI_API_KEY"),
            _ => None,
        };
        let aliases: Vec<&str> = provider_key.into_iter().collect();
        if let Some(k) = env_optional("DOTAGENT_API_KEY", &aliases) {
            self.llm.api_key = Some(k);
        }

        if let Some(level) = env_optional("DOTAGENT_LOG", &[]) {
            self.log.level = level;
        }
        self.log.json = env_bool("DOTAGENT_LOG_JSON", &[], self.log.json);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.llm.provider.to_lowercase();
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::UnknownProvider(self.llm.provider.clone()));
        }
        match self.llm.api_key.as_deref().map(str::trim) {
            None | Some("") | Some(API_KEY_PLACEHOLDER) => {
                return Err(ConfigError::MissingApiKey { provider });
            }
            Some(_) => {}
        }
        match &self.llm.base_url {
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                return Err(ConfigError::InvalidBaseUrl(url.clone()));
            }
            None if provider == "openai-compatible" => {
                return Err(ConfigError::MissingBaseUrl { provider });
            }
            _ => {}
        }
        Ok(())
    }

    /// Copy suitable for printing: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        cfg.llm.api_key = cfg.llm.api_key.as_deref().map(mask_secret);
        cfg
    }
}

fn user_config_dir_in(home: &Path) -> PathBuf {
    home.join(".dotagent").join("config")
}

/// Search order: `<cwd>/dotagent/config`, `<home>/.dotagent/config`, `<cwd>/config`.
fn find_config_file_in(cwd: &Path, home: Option<&Path>, filename: &str) -> Option<PathBuf> {
    let dev = cwd.join("dotagent").join("config").join(filename);
    let user = home.map(|h| user_config_dir_in(h).join(filename));
    let pkg = cwd.join("config").join(filename);
    [Some(dev), user, Some(pkg)]
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
}

/// Keep at most the first 3 and last 4 characters; short values are fully hidden.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Commented starter file written by `config init`.
pub const CONFIG_TEMPLATE: &str = include_str!("../config/config-example.yaml");
