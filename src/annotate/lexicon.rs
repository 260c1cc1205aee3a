//! Lexicon-based annotator. Pure and deterministic: no I/O, no clock.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::{Annotator, RawScores};
use crate::error::AnnotateError;
use crate::model::{AnalysisMethod, Analysis, Emotion, Suggestion, Suggestions};
use crate::taxonomy::{Category, Topic};

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

static EMOTIONS: Lazy<HashMap<String, Emotion>> = Lazy::new(|| {
    let raw = include_str!("../../emotion_lexicon.json");
    serde_json::from_str::<HashMap<String, Emotion>>(raw).expect("valid emotion lexicon")
});

/// Normalization constant for the lexicon sum, `s / sqrt(s^2 + ALPHA)`.
const ALPHA: f64 = 15.0;
const BOOST: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct HeuristicAnnotator {
    max_keywords: usize,
}

impl Default for HeuristicAnnotator {
    fn default() -> Self {
        Self { max_keywords: 10 }
    }
}

impl HeuristicAnnotator {
    pub fn new(max_keywords: usize) -> Self {
        Self { max_keywords }
    }

    /// Synchronous core, also used directly by tests.
    pub fn score(&self, text: &str) -> Result<Analysis, AnnotateError> {
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            return Err(AnnotateError::EmptyInput);
        }

        let mut sum = 0.0f64;
        let mut sentiment_hits = 0usize;
        let mut opinion_tokens = 0usize;
        let mut emotion_counts = [0usize; 7];

        for i in 0..tokens.len() {
            let w = tokens[i].as_str();
            // negator within the previous 1..=3 tokens flips the sign
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let boosted = i >= 1 && is_booster(tokens[i - 1].as_str());

            if let Some(&base) = LEXICON.get(w) {
                let mut v = base as f64;
                if boosted {
                    v *= BOOST;
                }
                sum += if negated { -v } else { v };
                sentiment_hits += 1;
                opinion_tokens += 1;
            } else if is_opinion_marker(w) {
                opinion_tokens += 1;
            }

            if let Some(e) = EMOTIONS.get(w) {
                // "not happy" is not joy; drop it rather than guess the opposite
                if !negated {
                    emotion_counts[e.index()] += 1;
                }
            }
        }

        let content = tokens.iter().filter(|t| !is_stopword(t)).count().max(1);
        let emotion_hits: usize = emotion_counts.iter().sum();
        let emotion = dominant(&emotion_counts);

        let polarity = sum / (sum * sum + ALPHA).sqrt();
        let subjectivity = (opinion_tokens as f64 / content as f64 * 2.0).min(1.0);
        let evidence = (sentiment_hits + emotion_hits).min(5) as f64;
        let confidence = 0.35 + 0.1 * evidence;

        let raw = RawScores {
            polarity: Some(polarity),
            subjectivity: Some(subjectivity),
            confidence: Some(confidence),
            emotion: Some(emotion.as_str().to_string()),
            reasoning: Some(format!(
                "lexicon: {sentiment_hits} sentiment terms (sum {sum:+.1}), {emotion_hits} emotion cues"
            )),
            summary: None,
            suggestions: Suggestions {
                categories: cue_suggestions(&tokens, Category::ALL.iter().copied(), |c| c.cues(), |c| {
                    c.name()
                }),
                topics: cue_suggestions(&tokens, Topic::ALL.iter().copied(), |t| t.cues(), |t| t.name()),
                keywords: top_keywords(&tokens, self.max_keywords),
            },
        };
        Ok(raw.finish())
    }
}

#[async_trait]
impl Annotator for HeuristicAnnotator {
    fn method(&self) -> AnalysisMethod {
        AnalysisMethod::Heuristic
    }

    async fn analyze(&self, text: &str) -> Result<Analysis, AnnotateError> {
        self.score(text)
    }
}

/// Lower-cased word tokens; inner apostrophes kept so "isn't" stays one token.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "nor"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "weren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "hardly"
            | "without"
    )
}

fn is_booster(tok: &str) -> bool {
    matches!(
        tok,
        "very" | "extremely" | "highly" | "deeply" | "hugely" | "sharply" | "massively"
    )
}

fn is_opinion_marker(tok: &str) -> bool {
    matches!(
        tok,
        "should"
            | "must"
            | "believe"
            | "think"
            | "feel"
            | "seems"
            | "apparently"
            | "clearly"
            | "obviously"
            | "arguably"
            | "surely"
            | "probably"
            | "perhaps"
            | "i"
            | "we"
            | "opinion"
    )
}

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "being", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just",
    "last", "more", "most", "new", "of", "on", "one", "or", "other", "our", "out", "over", "said",
    "says", "she", "so", "some", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "to", "under", "up", "us", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "will", "with", "would", "year", "years", "you", "your",
];

fn is_stopword(tok: &str) -> bool {
    STOPWORDS.binary_search(&tok).is_ok()
}

/// Most frequent emotion; ties go to the earlier variant, no hits means neutral.
fn dominant(counts: &[usize; 7]) -> Emotion {
    let mut best = Emotion::Neutral;
    let mut best_n = 0usize;
    for e in Emotion::ALL {
        let n = counts[e.index()];
        if n > best_n {
            best = e;
            best_n = n;
        }
    }
    best
}

fn cue_suggestions<T: Copy>(
    tokens: &[String],
    items: impl Iterator<Item = T>,
    cues: impl Fn(T) -> &'static [&'static str],
    name: impl Fn(T) -> &'static str,
) -> Vec<Suggestion> {
    let hits: Vec<(T, usize)> = items
        .map(|item| {
            let c = cues(item);
            (item, tokens.iter().filter(|t| c.contains(&t.as_str())).count())
        })
        .filter(|(_, n)| *n > 0)
        .collect();
    let total: usize = hits.iter().map(|(_, n)| n).sum();

    let mut out: Vec<Suggestion> = hits
        .into_iter()
        .map(|(item, n)| {
            let share = n as f64 / total as f64;
            let support = (n as f64 / 2.0).min(1.0);
            Suggestion::new(name(item), Some(share * support))
        })
        .collect();
    // stable: equal scores keep enumeration order
    out.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

fn top_keywords(tokens: &[String], limit: usize) -> Vec<Suggestion> {
    let mut freq: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, t) in tokens.iter().enumerate() {
        let t = t.as_str();
        if t.chars().count() < 4
            || is_stopword(t)
            || is_negator(t)
            || t.contains('\'')
            || t.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        freq.entry(t).or_insert((0, i)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = freq.into_iter().map(|(w, (n, first))| (w, n, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(limit);

    let max = ranked.first().map(|r| r.1).unwrap_or(1) as f64;
    ranked
        .into_iter()
        .map(|(w, n, _)| Suggestion::new(w, Some(n as f64 / max)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwords_are_sorted_for_binary_search() {
        let mut sorted = STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOPWORDS);
    }

    #[test]
    fn negation_flips_sign() {
        let h = HeuristicAnnotator::default();
        let pos = h.score("The results were good").unwrap();
        let neg = h.score("The results were not good").unwrap();
        assert!(pos.polarity > 0.0);
        assert!(neg.polarity < 0.0);
    }

    #[test]
    fn negated_emotion_cue_is_ignored() {
        let h = HeuristicAnnotator::default();
        let a = h.score("Investors were not happy").unwrap();
        assert_eq!(a.emotion, Emotion::Neutral);
    }

    #[test]
    fn emotion_ties_follow_enumeration_order() {
        let mut counts = [0usize; 7];
        counts[Emotion::Fear.index()] = 2;
        counts[Emotion::Anger.index()] = 2;
        assert_eq!(dominant(&counts), Emotion::Anger);
        assert_eq!(dominant(&[0; 7]), Emotion::Neutral);
    }

    #[test]
    fn polarity_stays_in_bounds_on_heavy_text() {
        let h = HeuristicAnnotator::default();
        let text = "amazing brilliant wonderful triumph ".repeat(50);
        let a = h.score(&text).unwrap();
        assert!(a.polarity > 0.9 && a.polarity <= 1.0);
        assert!(a.quality.is_empty());
    }

    #[test]
    fn suggests_categories_and_keywords() {
        let h = HeuristicAnnotator::new(3);
        let a = h
            .score("Chip makers rally as semiconductor demand lifts chip stocks; chip shortage eases")
            .unwrap();
        assert_eq!(a.suggestions.keywords[0].name, "chip");
        assert_eq!(a.suggestions.keywords[0].score, Some(1.0));
        assert!(a.suggestions.keywords.len() <= 3);
        assert!(a
            .suggestions
            .topics
            .iter()
            .any(|t| t.name == "Semiconductors"));
    }

    #[test]
    fn punctuation_only_is_empty_input() {
        let h = HeuristicAnnotator::default();
        assert!(matches!(h.score("?!, ..."), Err(AnnotateError::EmptyInput)));
    }
}
