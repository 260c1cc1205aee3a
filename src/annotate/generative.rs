//! LLM-backed annotator: structured prompt, [`TextGenerator`] call, lenient parse.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::generator::{DynGenerator, GenerateOptions};
use super::response::parse_response;
use super::Annotator;
use crate::error::AnnotateError;
use crate::model::{AnalysisMethod, Analysis, Emotion};
use crate::taxonomy::{Category, Topic};

pub struct GenerativeAnnotator {
    generator: DynGenerator,
    options: GenerateOptions,
}

impl GenerativeAnnotator {
    pub fn new(generator: DynGenerator, options: GenerateOptions) -> Self {
        Self { generator, options }
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }
}

#[async_trait]
impl Annotator for GenerativeAnnotator {
    fn method(&self) -> AnalysisMethod {
        AnalysisMethod::Generative
    }

    async fn analyze(&self, text: &str) -> Result<Analysis, AnnotateError> {
        if text.trim().is_empty() {
            return Err(AnnotateError::EmptyInput);
        }
        let prompt = build_prompt(text);
        let raw = self.generator.generate(&prompt, &self.options).await?;
        debug!(target: "annotate", provider = self.generator.name(), bytes = raw.len(), "generator replied");

        match parse_response(&raw) {
            Ok(scores) => Ok(scores.finish()),
            Err(e) => {
                if let AnnotateError::Malformed { raw, .. } = &e {
                    warn!(target: "annotate", provider = self.generator.name(), raw = %raw, "unparseable response");
                }
                Err(e)
            }
        }
    }
}

/// Prompt asking for a single JSON object with nested blocks.
pub fn build_prompt(text: &str) -> String {
    let categories = Category::ALL.map(Category::name).join(", ");
    let topics = Topic::ALL.map(Topic::name).join(", ");
    let emotions = Emotion::ALL.map(Emotion::as_str).join(", ");

    format!(
        r#"Analyze the following news article and answer with ONE JSON object only.

Article:
{text}

Required structure:
{{
  "sentiment": {{
    "polarity": <float -1..1, -1 very negative, 0 neutral, 1 very positive>,
    "subjectivity": <float 0..1, 0 objective, 1 subjective>,
    "emotion": "<one of: {emotions}>",
    "confidence": <float 0..1>
  }},
  "categorization": {{
    "primary_category": "<one of: {categories}>",
    "category_confidence": <float 0..1>,
    "all_categories": ["<relevant categories from the same list>"],
    "primary_topic": "<one of: {topics}>",
    "all_topics": ["<relevant topics from the same list>"]
  }},
  "keywords": {{
    "primary_keywords": ["<5-10 most important keywords or phrases>"],
    "entities": ["<people, organizations, locations>"],
    "technical_terms": ["<industry-specific terms>"]
  }},
  "summary": "<1-2 sentence summary>",
  "reasoning": "<why this sentiment and category>"
}}

Polarity scale:
- very positive (breakthroughs, major wins): 0.7 to 1.0
- moderately positive (good news, improvements): 0.3 to 0.7
- slightly positive: 0.1 to 0.3
- neutral factual reporting: -0.1 to 0.1
- slightly negative (minor concerns, delays): -0.3 to -0.1
- moderately negative (problems, failures): -0.7 to -0.3
- very negative (disasters, major failures): -1.0 to -0.7"#
    )
}
