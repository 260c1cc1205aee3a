// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod annotate;
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod taxonomy;
pub mod trend;
pub mod vocab;

// ---- Re-exports for stable public API ----
pub use crate::annotate::{Annotator, GenerativeAnnotator, HeuristicAnnotator};
pub use crate::api::{router, AppState};
pub use crate::config::EngineConfig;
pub use crate::error::{AnnotateError, StoreError, TrendError};
pub use crate::pipeline::{BatchRunner, RunReport};
pub use crate::store::{ArticleStore, MemoryStore, SqliteStore};
pub use crate::trend::{TrendAggregator, TrendRequest, TrendSettings};

use std::sync::Arc;

use crate::annotate::{build_generator, DynAnnotator, GenerateOptions};
use crate::config::ai::GenerativeConfig;
use crate::model::AnalysisMethod;

/// Annotator for `method`. The generative one reads `config/ai.json`.
pub fn build_annotator(method: AnalysisMethod, cfg: &EngineConfig) -> anyhow::Result<DynAnnotator> {
    Ok(match method {
        AnalysisMethod::Heuristic => Arc::new(HeuristicAnnotator::new(cfg.max_keywords)),
        AnalysisMethod::Generative => {
            let ai = GenerativeConfig::load_default()?;
            let generator = build_generator(&ai)?;
            Arc::new(GenerativeAnnotator::new(generator, GenerateOptions::from_config(&ai)))
        }
    })
}
