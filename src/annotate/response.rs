//! Parsing of generative responses into [`RawScores`].
//!
//! Accepted shapes, in order:
//! 1. the outermost `{...}` parses as JSON: nested `sentiment` /
//!    `categorization` / `keywords` blocks or flat keys, numbers as numbers or
//!    strings;
//! 2. otherwise field-by-field regex recovery over the raw text.
//!
//! Nothing recovered from the four scored fields is [`AnnotateError::Malformed`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::RawScores;
use crate::error::AnnotateError;
use crate::model::{Suggestion, Suggestions};

/// Entities and technical terms rank below the model's own keyword list.
pub const SECONDARY_KEYWORD_RELEVANCE: f64 = 0.6;

const RAW_KEEP_CHARS: usize = 2000;

static RE_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("object regex"));

pub fn parse_response(raw: &str) -> Result<RawScores, AnnotateError> {
    let scores = match RE_OBJECT.find(raw) {
        Some(m) => match serde_json::from_str::<Envelope>(m.as_str()) {
            Ok(env) => env.into_raw(),
            Err(e) => {
                debug!(target: "annotate", error = %e, "response is not valid JSON, trying field recovery");
                recover_fields(raw)
            }
        },
        None => recover_fields(raw),
    };

    if !scores.recovered_any() {
        return Err(AnnotateError::malformed(
            "no sentiment fields recoverable",
            raw.chars().take(RAW_KEEP_CHARS).collect::<String>(),
        ));
    }
    Ok(scores)
}

// ------------------------------------------------------------
// Lenient schema
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Num {
    F(f64),
    S(String),
}

impl Num {
    fn value(&self) -> Option<f64> {
        match self {
            Num::F(v) => Some(*v),
            Num::S(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Scored {
    #[serde(alias = "category", alias = "topic", alias = "keyword", alias = "text")]
    name: String,
    #[serde(default, alias = "confidence", alias = "relevance")]
    score: Option<Num>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Item {
    Name(String),
    Scored(Scored),
}

impl Item {
    fn into_suggestion(self) -> Suggestion {
        match self {
            Item::Name(n) => Suggestion::new(n, None),
            Item::Scored(s) => Suggestion::new(s.name, s.score.as_ref().and_then(Num::value)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SentimentBlock {
    #[serde(default)]
    polarity: Option<Num>,
    #[serde(default)]
    subjectivity: Option<Num>,
    #[serde(default)]
    emotion: Option<String>,
    #[serde(default)]
    confidence: Option<Num>,
}

#[derive(Debug, Default, Deserialize)]
struct CategorizationBlock {
    #[serde(default)]
    primary_category: Option<String>,
    #[serde(default)]
    category_confidence: Option<Num>,
    #[serde(default, alias = "categories")]
    all_categories: Vec<Item>,
    #[serde(default)]
    primary_topic: Option<String>,
    #[serde(default)]
    topic_confidence: Option<Num>,
    #[serde(default, alias = "topics")]
    all_topics: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
struct KeywordBlock {
    #[serde(default, alias = "keywords")]
    primary_keywords: Vec<Item>,
    #[serde(default)]
    entities: Vec<Item>,
    #[serde(default)]
    technical_terms: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeywordsField {
    Flat(Vec<Item>),
    Nested(KeywordBlock),
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    sentiment: Option<SentimentBlock>,
    #[serde(default)]
    categorization: Option<CategorizationBlock>,
    #[serde(default)]
    keywords: Option<KeywordsField>,

    // flat variants
    #[serde(default)]
    polarity: Option<Num>,
    #[serde(default)]
    subjectivity: Option<Num>,
    #[serde(default)]
    emotion: Option<String>,
    #[serde(default)]
    confidence: Option<Num>,
    #[serde(default)]
    categories: Vec<Item>,
    #[serde(default)]
    topics: Vec<Item>,
    #[serde(default)]
    entities: Vec<Item>,
    #[serde(default)]
    technical_terms: Vec<Item>,

    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

impl Envelope {
    fn into_raw(self) -> RawScores {
        let s = self.sentiment.unwrap_or_default();
        let num = |nested: &Option<Num>, flat: &Option<Num>| {
            nested
                .as_ref()
                .and_then(Num::value)
                .or_else(|| flat.as_ref().and_then(Num::value))
        };

        let polarity = num(&s.polarity, &self.polarity);
        let subjectivity = num(&s.subjectivity, &self.subjectivity);
        let confidence = num(&s.confidence, &self.confidence);
        let emotion = s.emotion.or(self.emotion).filter(|e| !e.trim().is_empty());

        let mut categories = Vec::new();
        let mut topics = Vec::new();
        if let Some(c) = self.categorization {
            let cat_conf = c.category_confidence.as_ref().and_then(Num::value);
            if let Some(p) = c.primary_category {
                categories.push(Suggestion::new(p, cat_conf.or(Some(super::DEFAULT_CONFIDENCE))));
            }
            categories.extend(c.all_categories.into_iter().map(Item::into_suggestion));

            let topic_conf = c
                .topic_confidence
                .as_ref()
                .and_then(Num::value)
                .or(cat_conf);
            if let Some(p) = c.primary_topic {
                topics.push(Suggestion::new(p, topic_conf.or(Some(super::DEFAULT_CONFIDENCE))));
            }
            topics.extend(c.all_topics.into_iter().map(Item::into_suggestion));
        }
        categories.extend(self.categories.into_iter().map(Item::into_suggestion));
        topics.extend(self.topics.into_iter().map(Item::into_suggestion));

        let mut keywords = Vec::new();
        let mut secondary: Vec<Item> = self.entities;
        secondary.extend(self.technical_terms);
        match self.keywords {
            Some(KeywordsField::Flat(items)) => {
                keywords.extend(items.into_iter().map(Item::into_suggestion));
            }
            Some(KeywordsField::Nested(b)) => {
                keywords.extend(b.primary_keywords.into_iter().map(Item::into_suggestion));
                secondary.extend(b.entities);
                secondary.extend(b.technical_terms);
            }
            None => {}
        }
        keywords.extend(secondary.into_iter().map(|i| {
            let mut s = i.into_suggestion();
            s.score = s.score.or(Some(SECONDARY_KEYWORD_RELEVANCE));
            s
        }));

        RawScores {
            polarity,
            subjectivity,
            confidence,
            emotion,
            reasoning: self.reasoning,
            summary: self.summary,
            suggestions: Suggestions {
                categories,
                topics,
                keywords,
            },
        }
    }
}

// ------------------------------------------------------------
// Regex recovery
// ------------------------------------------------------------

// Keys must start at a word edge so `confidence` never matches
// `category_confidence` and `emotion` never matches `dominant_emotion`.
const KEY_EDGE: &str = r"(?:^|[^A-Za-z0-9_])";

fn number_field(name: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i){KEY_EDGE}["']?{name}["']?\s*[:=]\s*["']?(-?\d+(?:\.\d+)?)"#
    ))
    .expect("number field regex")
}

fn string_field(name: &str) -> Regex {
    Regex::new(&format!(r#"(?i){KEY_EDGE}["']?{name}["']?\s*:\s*"((?:[^"\\]|\\.)*)""#))
        .expect("string field regex")
}

static RE_POLARITY: Lazy<Regex> = Lazy::new(|| number_field("polarity"));
static RE_SUBJECTIVITY: Lazy<Regex> = Lazy::new(|| number_field("subjectivity"));
static RE_CONFIDENCE: Lazy<Regex> = Lazy::new(|| number_field("confidence"));
static RE_EMOTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"(?i){KEY_EDGE}["']?emotion["']?\s*[:=]\s*["']?([a-z]+)"#))
        .expect("emotion regex")
});
static RE_REASONING: Lazy<Regex> = Lazy::new(|| string_field("reasoning"));
static RE_SUMMARY: Lazy<Regex> = Lazy::new(|| string_field("summary"));
static RE_PRIMARY_CATEGORY: Lazy<Regex> = Lazy::new(|| string_field("primary_category"));
static RE_PRIMARY_TOPIC: Lazy<Regex> = Lazy::new(|| string_field("primary_topic"));

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("\\\"", "\""))
}

fn recover_fields(raw: &str) -> RawScores {
    let number = |re: &Regex| capture(re, raw).and_then(|s| s.parse::<f64>().ok());

    let mut suggestions = Suggestions::default();
    if let Some(c) = capture(&RE_PRIMARY_CATEGORY, raw) {
        suggestions.categories.push(Suggestion::new(c, None));
    }
    if let Some(t) = capture(&RE_PRIMARY_TOPIC, raw) {
        suggestions.topics.push(Suggestion::new(t, None));
    }

    RawScores {
        polarity: number(&RE_POLARITY),
        subjectivity: number(&RE_SUBJECTIVITY),
        confidence: number(&RE_CONFIDENCE),
        emotion: capture(&RE_EMOTION, raw),
        reasoning: capture(&RE_REASONING, raw),
        summary: capture(&RE_SUMMARY, raw),
        suggestions,
    }
}
