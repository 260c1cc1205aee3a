// tests/annotator_properties.rs
//
// Contract-level checks for both annotators:
// - lexicon annotator is deterministic and always in bounds (seeded word salad)
// - generative replies missing emotion fall back to neutral
// - replies with nothing recoverable are Malformed

use std::sync::Arc;

use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};

use news_trend_analyzer::annotate::{
    Annotator, GenerateOptions, GenerativeAnnotator, HeuristicAnnotator, MockGenerator,
};
use news_trend_analyzer::model::Emotion;
use news_trend_analyzer::AnnotateError;

const WORDS: &[&str] = &[
    "great", "terrible", "not", "very", "crisis", "growth", "storm", "joy", "fear", "markets",
    "the", "and", "never", "extremely", "win", "loss", "happy", "angry", "surprising", "vaccine",
    "election", "shocking", "calm", "!", "rates", "strike", "hope", "disaster", "record", "no",
];

fn salad(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| *WORDS.choose(rng).unwrap())
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn lexicon_annotator_is_deterministic_and_bounded() {
    let annotator = HeuristicAnnotator::default();
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..200 {
        let len = rng.random_range(1..=60usize);
        let text = salad(&mut rng, len);
        let a = annotator.analyze(&text).await;
        let b = annotator.analyze(&text).await;
        match (a, b) {
            (Ok(a), Ok(b)) => {
                assert_eq!(a, b, "{text}");
                assert!((-1.0..=1.0).contains(&a.polarity), "{text}");
                assert!((0.0..=1.0).contains(&a.subjectivity), "{text}");
                assert!((0.0..=1.0).contains(&a.confidence), "{text}");
            }
            (Err(AnnotateError::EmptyInput), Err(AnnotateError::EmptyInput)) => {}
            other => panic!("non-deterministic outcome for {text:?}: {other:?}"),
        }
    }
}

#[tokio::test]
async fn missing_emotion_defaults_to_neutral() {
    let gen = Arc::new(MockGenerator::new(
        r#"{"sentiment": {"polarity": -0.3, "subjectivity": 0.2, "confidence": 0.8}}"#,
    ));
    let a = GenerativeAnnotator::new(gen, GenerateOptions::default())
        .analyze("Factory output slipped in March.")
        .await
        .unwrap();
    assert_eq!(a.emotion, Emotion::Neutral);
    assert!((a.polarity + 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn out_of_range_reply_is_clamped_with_quality_event() {
    let gen = Arc::new(MockGenerator::new(
        r#"{"polarity": 1.7, "subjectivity": -2, "emotion": "surprise", "confidence": 0.5}"#,
    ));
    let a = GenerativeAnnotator::new(gen, GenerateOptions::default())
        .analyze("Stocks doubled overnight.")
        .await
        .unwrap();
    assert_eq!(a.polarity, 1.0);
    assert_eq!(a.subjectivity, 0.0);
    assert_eq!(a.emotion, Emotion::Surprise);
    let fields: Vec<_> = a.quality.iter().map(|q| q.field.as_str()).collect();
    assert_eq!(fields, vec!["polarity", "subjectivity"]);
}

#[tokio::test]
async fn nothing_recoverable_is_malformed() {
    let gen = Arc::new(MockGenerator::new("Sorry, the model is warming up."));
    let err = GenerativeAnnotator::new(gen, GenerateOptions::default())
        .analyze("Anything at all.")
        .await
        .unwrap_err();
    match err {
        AnnotateError::Malformed { raw, .. } => assert!(raw.contains("warming up")),
        other => panic!("expected malformed, got {other:?}"),
    }
}
