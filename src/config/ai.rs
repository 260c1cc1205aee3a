// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "llama3.2".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_host() -> String {
    "http://localhost:11434".to_string()
}
fn default_daily_limit() -> u32 {
    500
}
fn default_max_tokens() -> u32 {
    800
}
fn default_cache_dir() -> Option<PathBuf> {
    Some(PathBuf::from("cache/ai"))
}

/// Settings for the generative annotator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerativeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "ollama" | "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Base URL of the generation service.
    #[serde(default = "default_host")]
    pub host: String,
    /// "ENV" means: read from OPENAI_API_KEY (openai only).
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Response cache; `null` disables it.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            host: default_host(),
            api_key: String::new(),
            daily_limit: default_daily_limit(),
            max_tokens: default_max_tokens(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl GenerativeConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: GenerativeConfig = serde_json::from_str(&data)?;
        cfg.normalize()?;
        Ok(cfg)
    }

    /// `config/ai.json` if present, else defaults; env overrides on top.
    pub fn load_default() -> anyhow::Result<Self> {
        let mut cfg = if Path::new(DEFAULT_AI_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_AI_CONFIG_PATH)?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.normalize()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(m) = env::var("OLLAMA_MODEL") {
            if !m.trim().is_empty() {
                self.model = m.trim().to_string();
            }
        }
        if let Ok(h) = env::var("OLLAMA_HOST") {
            if !h.trim().is_empty() {
                self.host = h.trim().to_string();
            }
        }
        if let Ok(t) = env::var("OLLAMA_TEMPERATURE") {
            self.temperature = t
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("OLLAMA_TEMPERATURE must be a number"))?;
        }
        Ok(())
    }

    fn normalize(&mut self) -> anyhow::Result<()> {
        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                "ollama" | "mock" => String::new(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("temperature must be between 0 and 2");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ai.json");
        fs::write(&p, r#"{ "enabled": true, "provider": "Ollama" }"#).unwrap();

        let cfg = GenerativeConfig::load_from_file(&p).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, "ollama");
        assert_eq!(cfg.model, "llama3.2");
        assert_eq!(cfg.max_tokens, 800);
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ai.json");
        fs::write(&p, r#"{ "enabled": true, "temperature": 3.5 }"#).unwrap();
        assert!(GenerativeConfig::load_from_file(&p).is_err());
    }
}
