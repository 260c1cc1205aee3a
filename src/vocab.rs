//! # Vocabulary resolution
//!
//! Maps free-form category/topic names from an annotator onto the closed
//! [`Category`] / [`Topic`] enums and canonicalizes keywords.
//!
//! - Lookup order: alias → exact → substring → fuzzy (Jaro-Winkler).
//! - Case-insensitive, punctuation and dashes folded to spaces.
//! - Nothing is ever added to the vocabulary. Unknown categories become
//!   `Other` with confidence 0; unknown topics are dropped.

use std::collections::HashMap;

use strsim::jaro_winkler;
use tracing::debug;

use crate::config::EngineConfig;
use crate::model::{Assigned, Associations, KeywordLink, Suggestion, Suggestions};
use crate::taxonomy::{Category, Topic};

/// Minimum Jaro-Winkler similarity accepted by the fuzzy step.
pub const FUZZY_THRESHOLD: f64 = 0.88;

/// Closed enumeration that free text can be resolved against.
pub trait Vocabulary: Copy + Ord + std::hash::Hash + 'static {
    fn all() -> &'static [Self];
    fn name(self) -> &'static str;
    fn aliases() -> &'static [(&'static str, Self)];
}

impl Vocabulary for Category {
    fn all() -> &'static [Self] {
        &Category::ALL
    }
    fn name(self) -> &'static str {
        Category::name(self)
    }
    fn aliases() -> &'static [(&'static str, Self)] {
        Category::aliases()
    }
}

impl Vocabulary for Topic {
    fn all() -> &'static [Self] {
        &Topic::ALL
    }
    fn name(self) -> &'static str {
        Topic::name(self)
    }
    fn aliases() -> &'static [(&'static str, Self)] {
        Topic::aliases()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Alias,
    Exact,
    Substring,
    Fuzzy,
}

/// A resolved name. `similarity` scales the suggested confidence
/// (1.0 for everything but fuzzy matches).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<T> {
    pub value: T,
    pub kind: MatchKind,
    pub similarity: f64,
}

pub fn resolve<T: Vocabulary>(raw: &str) -> Option<Match<T>> {
    let s = normalize(raw);
    if s.is_empty() {
        return None;
    }
    let exact = |value| {
        Some(Match {
            value,
            kind: MatchKind::Exact,
            similarity: 1.0,
        })
    };

    // 1) alias
    if let Some(&(_, value)) = T::aliases().iter().find(|(a, _)| normalize(a) == s) {
        return Some(Match {
            value,
            kind: MatchKind::Alias,
            similarity: 1.0,
        });
    }

    // 2) exact
    if let Some(&value) = T::all().iter().find(|v| normalize(v.name()) == s) {
        return exact(value);
    }

    // 3) substring, either direction; longest name wins, ties by enum order
    if s.chars().count() >= 3 {
        let hit = T::all()
            .iter()
            .copied()
            .filter(|v| {
                let n = normalize(v.name());
                s.contains(&n) || n.contains(&s)
            })
            .min_by_key(|v| (std::cmp::Reverse(v.name().len()), *v));
        if let Some(value) = hit {
            return Some(Match {
                value,
                kind: MatchKind::Substring,
                similarity: 1.0,
            });
        }
    }

    // 4) fuzzy over names and aliases
    let candidates = T::all()
        .iter()
        .map(|v| (normalize(v.name()), *v))
        .chain(T::aliases().iter().map(|(a, v)| (normalize(a), *v)));
    let mut best: Option<(f64, T)> = None;
    for (name, value) in candidates {
        let sim = jaro_winkler(&s, &name);
        let better = match best {
            None => true,
            Some((b, bv)) => sim > b || (sim == b && value < bv),
        };
        if better {
            best = Some((sim, value));
        }
    }
    match best {
        Some((sim, value)) if sim >= FUZZY_THRESHOLD => Some(Match {
            value,
            kind: MatchKind::Fuzzy,
            similarity: sim,
        }),
        _ => None,
    }
}

/// Lowercase, fold separators and punctuation to spaces, collapse.
fn normalize(s: &str) -> String {
    let folded: String = s
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical keyword form: lower-case, punctuation to spaces, whitespace
/// collapsed. Empty result means "drop it".
pub fn normalize_keyword(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Turns annotator suggestions into stored associations.
#[derive(Debug, Clone)]
pub struct Categorizer {
    /// Secondary associations below this are dropped; also the confidence
    /// given to suggestions that carry no score.
    pub min_confidence: f64,
    pub max_keywords: usize,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_keywords: 10,
        }
    }
}

impl Categorizer {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            min_confidence: cfg.min_category_confidence,
            max_keywords: cfg.max_keywords,
        }
    }

    pub fn categorize(&self, s: &Suggestions) -> Associations {
        let mut categories = self.resolve_all::<Category>(&s.categories, Some(Category::Other));
        if categories.is_empty() {
            categories.push(Assigned {
                value: Category::Other,
                confidence: 0.0,
                primary: true,
            });
        }
        let topics = self.resolve_all::<Topic>(&s.topics, None);

        Associations {
            categories,
            topics,
            keywords: self.keywords(&s.keywords),
        }
    }

    /// Resolve, merge duplicates (max confidence), pick primary, drop weak
    /// secondaries. Output: primary first, then descending confidence.
    fn resolve_all<T: Vocabulary>(&self, raw: &[Suggestion], sentinel: Option<T>) -> Vec<Assigned<T>> {
        let mut merged: HashMap<T, f64> = HashMap::new();
        for sug in raw {
            let base = clamp01(sug.score.unwrap_or(self.min_confidence));
            let (value, conf) = match resolve::<T>(&sug.name) {
                Some(m) => (m.value, base * m.similarity),
                None => match sentinel {
                    Some(other) => {
                        debug!(target: "annotate", name = %sug.name, "unresolvable name mapped to sentinel");
                        (other, 0.0)
                    }
                    None => {
                        debug!(target: "annotate", name = %sug.name, "unresolvable name dropped");
                        continue;
                    }
                },
            };
            let slot = merged.entry(value).or_insert(conf);
            if conf > *slot {
                *slot = conf;
            }
        }

        let mut ranked: Vec<(T, f64)> = merged.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        ranked
            .into_iter()
            .enumerate()
            .filter(|(i, (_, c))| *i == 0 || *c >= self.min_confidence)
            .map(|(i, (value, confidence))| Assigned {
                value,
                confidence,
                primary: i == 0,
            })
            .collect()
    }

    fn keywords(&self, raw: &[Suggestion]) -> Vec<KeywordLink> {
        let mut out: Vec<KeywordLink> = Vec::new();
        for sug in raw {
            let keyword = normalize_keyword(&sug.name);
            if keyword.is_empty() {
                continue;
            }
            let relevance = sug.score.map(clamp01).unwrap_or(1.0);
            match out.iter_mut().find(|k| k.keyword == keyword) {
                Some(existing) => existing.relevance = existing.relevance.max(relevance),
                None => out.push(KeywordLink { keyword, relevance }),
            }
        }
        out.truncate(self.max_keywords);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sug(name: &str, score: Option<f64>) -> Suggestion {
        Suggestion::new(name, score)
    }

    #[test]
    fn alias_exact_substring_fuzzy() {
        let m = resolve::<Category>("Tech").unwrap();
        assert_eq!((m.value, m.kind), (Category::Technology, MatchKind::Alias));

        let m = resolve::<Category>("  POLITICS ").unwrap();
        assert_eq!((m.value, m.kind), (Category::Politics, MatchKind::Exact));

        let m = resolve::<Topic>("Generative Artificial Intelligence").unwrap();
        assert_eq!((m.value, m.kind), (Topic::ArtificialIntelligence, MatchKind::Substring));

        let m = resolve::<Category>("Technolgy").unwrap();
        assert_eq!((m.value, m.kind), (Category::Technology, MatchKind::Fuzzy));
        assert!(m.similarity >= FUZZY_THRESHOLD && m.similarity < 1.0);

        assert!(resolve::<Category>("Gardening").is_none());
        assert!(resolve::<Topic>("").is_none());
    }

    #[test]
    fn dash_and_case_folding() {
        assert_eq!(
            resolve::<Topic>("k-12 EDUCATION").map(|m| m.value),
            Some(Topic::Schools)
        );
        assert_eq!(
            resolve::<Topic>("Mergers and Acquisitions").map(|m| m.value),
            Some(Topic::MergersAcquisitions)
        );
    }

    #[test]
    fn primary_is_highest_confidence_and_weak_secondaries_drop() {
        let c = Categorizer::default();
        let a = c.categorize(&Suggestions {
            categories: vec![
                sug("Business", Some(0.6)),
                sug("Technology", Some(0.9)),
                sug("Politics", Some(0.1)),
            ],
            ..Default::default()
        });
        assert_eq!(a.primary_category(), Some(Category::Technology));
        assert_eq!(a.categories.len(), 2);
        assert!(!a.categories[1].primary);
    }

    #[test]
    fn confidence_ties_break_by_enum_order() {
        let c = Categorizer::default();
        let a = c.categorize(&Suggestions {
            categories: vec![sug("Travel", Some(0.5)), sug("Health", Some(0.5))],
            ..Default::default()
        });
        assert_eq!(a.primary_category(), Some(Category::Health));
    }

    #[test]
    fn unknown_category_is_other_with_zero_confidence() {
        let c = Categorizer::default();
        let a = c.categorize(&Suggestions {
            categories: vec![sug("Gardening", Some(0.9))],
            topics: vec![sug("Roses", Some(0.9))],
            ..Default::default()
        });
        assert_eq!(a.categories.len(), 1);
        assert_eq!(a.categories[0].value, Category::Other);
        assert_eq!(a.categories[0].confidence, 0.0);
        assert!(a.topics.is_empty());

        let empty = c.categorize(&Suggestions::default());
        assert_eq!(empty.primary_category(), Some(Category::Other));
    }

    #[test]
    fn keywords_normalize_and_merge() {
        let c = Categorizer::default();
        let a = c.categorize(&Suggestions {
            keywords: vec![
                sug("Interest-Rates", Some(0.4)),
                sug("  interest   rates!", Some(0.8)),
                sug("...", None),
                sug("Fed", None),
            ],
            ..Default::default()
        });
        assert_eq!(a.keywords.len(), 2);
        assert_eq!(a.keywords[0].keyword, "interest rates");
        assert_eq!(a.keywords[0].relevance, 0.8);
        assert_eq!(a.keywords[1].relevance, 1.0);
    }

    #[test]
    fn categorize_is_deterministic() {
        let c = Categorizer::default();
        let s = Suggestions {
            categories: vec![sug("science", Some(0.7)), sug("Space", Some(0.7))],
            topics: vec![sug("astronomy", None), sug("Physics", Some(0.8))],
            keywords: vec![sug("Mars", None)],
        };
        assert_eq!(c.categorize(&s), c.categorize(&s));
    }
}
