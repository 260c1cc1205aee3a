//! Read-only HTTP surface over stored annotations and trends.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use crate::error::{StoreError, TrendError};
use crate::model::{AnalysisMethod, PeriodType};
use crate::report::{self, ArticleReport, TrendRow};
use crate::store::{ArticleStore, TrendQuery};
use crate::trend::{
    DimensionFilter, Momentum, MomentumMetric, TrendAggregator, TrendRequest, TrendSummary, TrendingEntry,
};

const DEFAULT_ARTICLE_LIMIT: usize = 50;
const DEFAULT_TRENDING_LIMIT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub trends: Arc<TrendAggregator>,
    pub default_method: AnalysisMethod,
    pub default_period: PeriodType,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>, trends: TrendAggregator, default_period: PeriodType) -> Self {
        Self {
            store,
            trends: Arc::new(trends),
            default_method: AnalysisMethod::Heuristic,
            default_period,
        }
    }

    pub fn with_method(mut self, method: AnalysisMethod) -> Self {
        self.default_method = method;
        self
    }

    fn method(&self, raw: Option<&str>) -> Result<AnalysisMethod, ApiError> {
        match raw {
            None => Ok(self.default_method),
            Some(s) => AnalysisMethod::parse(s).ok_or_else(|| ApiError::bad_request(format!("unknown method '{s}'"))),
        }
    }

    fn period(&self, raw: Option<&str>) -> Result<PeriodType, ApiError> {
        match raw {
            None => Ok(self.default_period),
            Some(s) => PeriodType::parse(s).ok_or_else(|| ApiError::bad_request(format!("unknown period '{s}'"))),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/trends", get(trends))
        .route("/articles", get(articles))
        .route("/summary", get(summary))
        .route("/momentum", get(momentum))
        .route("/trending", get(trending))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(target: "api", error = %e, "store error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "storage error".into(),
        }
    }
}

impl From<TrendError> for ApiError {
    fn from(e: TrendError) -> Self {
        match e {
            TrendError::Store(s) => s.into(),
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

fn filter_from(kind: Option<&str>, value: Option<&str>) -> Result<Option<DimensionFilter>, ApiError> {
    match (kind, value) {
        (None, None) | (Some("overall"), None) => Ok(None),
        (Some(k), Some(v)) => DimensionFilter::parse(k, v)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("unknown dimension kind '{k}'"))),
        (None, Some(_)) => Err(ApiError::bad_request("'value' needs 'kind'")),
        (Some(k), None) => Err(ApiError::bad_request(format!("'{k}' needs a 'value'"))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TrendParams {
    method: Option<String>,
    period: Option<String>,
    kind: Option<String>,
    value: Option<String>,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
}

async fn trends(State(state): State<AppState>, Query(q): Query<TrendParams>) -> Result<Json<Vec<TrendRow>>, ApiError> {
    let method = state.method(q.method.as_deref())?;
    let period_type = state.period(q.period.as_deref())?;
    if let (Some(s), Some(u)) = (q.since, q.until) {
        if s > u {
            return Err(TrendError::InvalidRange { since: s, until: u }.into());
        }
    }

    let mut query = TrendQuery {
        method: Some(method),
        period_type: Some(period_type),
        since: q.since,
        until: q.until,
        ..Default::default()
    };
    match (q.kind.as_deref(), q.value.as_deref()) {
        // kind alone lists a whole dimension family
        (Some(kind), None) => {
            if !matches!(kind, "overall" | "category" | "topic" | "keyword") {
                return Err(ApiError::bad_request(format!("unknown dimension kind '{kind}'")));
            }
            query.kind = Some(kind.to_string());
        }
        (kind, value) => {
            if let Some(f) = filter_from(kind, value)? {
                let probe = TrendRequest::new(method, period_type, NaiveDate::MIN, NaiveDate::MIN).with_filter(f);
                query.dimension = state.trends.validate(&probe)?;
            }
        }
    }

    let rows = report::trend_table(state.store.as_ref(), &query)?;
    debug!(target: "api", rows = rows.len(), "trends served");
    Ok(Json(rows))
}

#[derive(Debug, Default, Deserialize)]
struct ArticleParams {
    method: Option<String>,
    limit: Option<usize>,
}

async fn articles(
    State(state): State<AppState>,
    Query(q): Query<ArticleParams>,
) -> Result<Json<Vec<ArticleReport>>, ApiError> {
    let method = state.method(q.method.as_deref())?;
    let rows = report::article_reports(state.store.as_ref(), method, q.limit.unwrap_or(DEFAULT_ARTICLE_LIMIT))?;
    Ok(Json(rows))
}

#[derive(Debug, Default, Deserialize)]
struct SummaryParams {
    method: Option<String>,
}

async fn summary(State(state): State<AppState>, Query(q): Query<SummaryParams>) -> Result<Json<TrendSummary>, ApiError> {
    let method = state.method(q.method.as_deref())?;
    let today = Utc::now().date_naive();
    Ok(Json(report::summary(&state.trends, method, today)?))
}

#[derive(Debug, Default, Deserialize)]
struct MomentumParams {
    method: Option<String>,
    period: Option<String>,
    kind: Option<String>,
    value: Option<String>,
    metric: Option<String>,
    limit: Option<usize>,
}

fn metric(raw: Option<&str>) -> Result<MomentumMetric, ApiError> {
    match raw {
        None => Ok(MomentumMetric::ArticleCount),
        Some(s) => MomentumMetric::parse(s).ok_or_else(|| ApiError::bad_request(format!("unknown metric '{s}'"))),
    }
}

async fn momentum(State(state): State<AppState>, Query(q): Query<MomentumParams>) -> Result<Json<Momentum>, ApiError> {
    let method = state.method(q.method.as_deref())?;
    let period_type = state.period(q.period.as_deref())?;
    let filter = filter_from(q.kind.as_deref(), q.value.as_deref())?;
    let m = state
        .trends
        .momentum(method, period_type, filter.as_ref(), metric(q.metric.as_deref())?)?;
    Ok(Json(m))
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<MomentumParams>,
) -> Result<Json<Vec<TrendingEntry>>, ApiError> {
    let method = state.method(q.method.as_deref())?;
    let period_type = state.period(q.period.as_deref())?;
    let kind = q.kind.as_deref().unwrap_or("keyword");
    if !matches!(kind, "category" | "topic" | "keyword") {
        return Err(ApiError::bad_request(format!("unknown dimension kind '{kind}'")));
    }
    let rows = state.trends.trending(
        method,
        period_type,
        kind,
        metric(q.metric.as_deref())?,
        q.limit.unwrap_or(DEFAULT_TRENDING_LIMIT),
    )?;
    Ok(Json(rows))
}
