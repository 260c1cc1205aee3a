//! Annotator contract: `text -> Analysis`.
//!
//! Two implementations share it: [`HeuristicAnnotator`] (lexicon, pure) and
//! [`GenerativeAnnotator`] (prompt + external [`TextGenerator`]). Both funnel
//! their raw numbers through [`RawScores::finish`], which enforces bounds and
//! records every clamp as a [`QualityEvent`].

pub mod generative;
pub mod generator;
pub mod lexicon;
pub mod response;

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::AnnotateError;
use crate::model::{AnalysisMethod, Analysis, Emotion, QualityEvent, Suggestions};

pub use generative::GenerativeAnnotator;
pub use generator::{
    build_generator, CachingGenerator, DynGenerator, GenerateOptions, MockGenerator,
    OllamaGenerator, OpenAiGenerator, TextGenerator,
};
pub use lexicon::HeuristicAnnotator;

pub const DEFAULT_POLARITY: f64 = 0.0;
pub const DEFAULT_SUBJECTIVITY: f64 = 0.5;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[async_trait]
pub trait Annotator: Send + Sync {
    fn method(&self) -> AnalysisMethod;

    /// `text` should already have gone through [`prepare_input`].
    async fn analyze(&self, text: &str) -> Result<Analysis, AnnotateError>;
}

pub type DynAnnotator = Arc<dyn Annotator>;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize article text for an annotator: decode entities, strip tags,
/// ASCII quotes, collapse whitespace, cut to `max_chars`.
pub fn prepare_input(text: &str, max_chars: usize) -> Result<String, AnnotateError> {
    let decoded = html_escape::decode_html_entities(text);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let quoted = stripped
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let mut out = RE_WS.replace_all(&quoted, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
        out.truncate(out.trim_end().len());
    }

    if out.is_empty() {
        return Err(AnnotateError::EmptyInput);
    }
    Ok(out)
}

/// Analyzer output before bounds are enforced. `None` means the analyzer
/// produced nothing for that field.
#[derive(Debug, Clone, Default)]
pub struct RawScores {
    pub polarity: Option<f64>,
    pub subjectivity: Option<f64>,
    pub confidence: Option<f64>,
    pub emotion: Option<String>,
    pub reasoning: Option<String>,
    pub summary: Option<String>,
    pub suggestions: Suggestions,
}

impl RawScores {
    /// True when at least one of the four scored fields came through.
    pub fn recovered_any(&self) -> bool {
        self.polarity.is_some()
            || self.subjectivity.is_some()
            || self.confidence.is_some()
            || self.emotion.is_some()
    }

    /// Apply defaults and clamp into bounds.
    pub fn finish(self) -> Analysis {
        let mut quality = Vec::new();
        let polarity = bounded("polarity", self.polarity, -1.0, 1.0, DEFAULT_POLARITY, &mut quality);
        let subjectivity = bounded(
            "subjectivity",
            self.subjectivity,
            0.0,
            1.0,
            DEFAULT_SUBJECTIVITY,
            &mut quality,
        );
        let confidence = bounded(
            "confidence",
            self.confidence,
            0.0,
            1.0,
            DEFAULT_CONFIDENCE,
            &mut quality,
        );

        let emotion = match self.emotion.as_deref() {
            None => Emotion::Neutral,
            Some(label) => Emotion::parse_label(label).unwrap_or_else(|| {
                debug!(target: "quality", label, "unrecognized emotion label, using neutral");
                Emotion::Neutral
            }),
        };

        Analysis {
            polarity,
            subjectivity,
            emotion,
            confidence,
            reasoning: non_blank(self.reasoning),
            summary: non_blank(self.summary),
            suggestions: self.suggestions,
            quality,
        }
    }
}

fn bounded(
    field: &'static str,
    raw: Option<f64>,
    lo: f64,
    hi: f64,
    default: f64,
    quality: &mut Vec<QualityEvent>,
) -> f64 {
    let Some(v) = raw else {
        return default;
    };
    if !v.is_finite() {
        warn!(target: "quality", field, "non-finite value replaced by default");
        return default;
    }
    let clamped = v.clamp(lo, hi);
    if clamped != v {
        warn!(target: "quality", field, raw = v, clamped, "value out of bounds, clamped");
        metrics::counter!("quality_clamps_total", "field" => field).increment(1);
        quality.push(QualityEvent {
            field: field.to_string(),
            raw: v,
            clamped,
        });
    }
    clamped
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
