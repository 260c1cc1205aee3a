// src/config/mod.rs
//! Engine configuration: TOML file with serde defaults, then env overrides.
//!
//! Lookup order for the file:
//! 1) $ENGINE_CONFIG_PATH
//! 2) config/engine.toml
//! 3) built-in defaults

pub mod ai;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::PeriodType;

pub const ENV_ENGINE_CONFIG_PATH: &str = "ENGINE_CONFIG_PATH";
pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/engine.toml";

/// Polarity cut-offs: `> positive` is positive, `< negative` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentThresholds {
    pub positive: f64,
    pub negative: f64,
}

impl Default for SentimentThresholds {
    fn default() -> Self {
        Self {
            positive: 0.1,
            negative: -0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    pub thresholds: SentimentThresholds,
    /// Suggestions below this are not kept as secondary associations.
    pub min_category_confidence: f64,
    pub default_period: PeriodType,
    /// Annotator input is cut to this many chars.
    pub max_input_chars: usize,
    /// Keyword buckets need this many articles in an unfiltered sweep.
    pub keyword_min_articles: u64,
    pub momentum_polarity_tolerance: f64,
    pub annotator_timeout_secs: u64,
    pub max_keywords: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("news.db"),
            thresholds: SentimentThresholds::default(),
            min_category_confidence: 0.3,
            default_period: PeriodType::Daily,
            max_input_chars: 4000,
            keyword_min_articles: 2,
            momentum_polarity_tolerance: 0.01,
            annotator_timeout_secs: 60,
            max_keywords: 10,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML file. Missing keys take defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        let cfg: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing engine config {}", path.display()))?;
        Ok(cfg)
    }

    /// File lookup, env overrides, validation.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_ENGINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_ENGINE_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = parse_env_f64("SENTIMENT_POSITIVE_THRESHOLD")? {
            self.thresholds.positive = v;
        }
        if let Some(v) = parse_env_f64("SENTIMENT_NEGATIVE_THRESHOLD")? {
            self.thresholds.negative = v;
        }
        if let Some(v) = parse_env_f64("MIN_CATEGORY_CONFIDENCE")? {
            self.min_category_confidence = v;
        }
        if let Ok(raw) = std::env::var("DEFAULT_PERIOD") {
            self.default_period = PeriodType::parse(&raw)
                .ok_or_else(|| anyhow!("DEFAULT_PERIOD must be daily, weekly or monthly"))?;
        }
        if let Ok(raw) = std::env::var("DB_PATH") {
            if !raw.trim().is_empty() {
                self.db_path = PathBuf::from(raw.trim());
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.thresholds.positive <= self.thresholds.negative {
            errors.push("positive threshold must be greater than negative threshold".to_string());
        }
        if !(-1.0..=1.0).contains(&self.thresholds.positive)
            || !(-1.0..=1.0).contains(&self.thresholds.negative)
        {
            errors.push("thresholds must lie within [-1, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_category_confidence) {
            errors.push("min_category_confidence must lie within [0, 1]".to_string());
        }
        if self.max_input_chars == 0 {
            errors.push("max_input_chars must be positive".to_string());
        }
        if self.momentum_polarity_tolerance < 0.0 {
            errors.push("momentum_polarity_tolerance must not be negative".to_string());
        }
        if !errors.is_empty() {
            bail!(
                "configuration validation failed:\n{}",
                errors
                    .iter()
                    .map(|e| format!("  - {e}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
        }
        Ok(())
    }

    pub fn annotator_timeout(&self) -> Duration {
        Duration::from_secs(self.annotator_timeout_secs.max(1))
    }
}

fn parse_env_f64(name: &str) -> Result<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        Err(_) => Ok(None),
    }
}
