use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use catalog_core::persist::{load_index_set, IndexPaths};
use catalog_core::query::MatchMode;
use catalog_core::{DocMeta, Field, IndexState, ReviewAggregate, SearchConfig, SearchError, SearchResponse, SynonymTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct ServerOptions {
    pub index_dir: PathBuf,
    pub synonyms: Option<PathBuf>,
    pub admin_token: Option<String>,
}

impl ServerOptions {
    pub fn new<P: Into<PathBuf>>(index_dir: P) -> Self {
        Self { index_dir: index_dir.into(), synonyms: None, admin_token: None }
    }
}

/// Query string of `GET /search`. Anything left out falls back to the
/// defaults of [`SearchConfig`].
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k1: Option<f64>,
    pub b: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    #[serde(default)]
    pub match_all: bool,
    /// Comma-separated candidate fields, e.g. `title,brand`.
    pub fields: Option<String>,
    /// Comma-separated `feature:value` pairs, e.g. `color:red,size:M`.
    pub filter: Option<String>,
    pub limit: Option<usize>,
}

impl SearchParams {
    pub fn to_config(&self) -> Result<SearchConfig, String> {
        let mut config = SearchConfig::default();
        if let Some(k1) = self.k1 { config.scorer.k1 = k1; }
        if let Some(b) = self.b { config.scorer.b = b; }
        if let Some(alpha) = self.alpha { config.weights.alpha = alpha; }
        if let Some(beta) = self.beta { config.weights.beta = beta; }
        if let Some(gamma) = self.gamma { config.weights.gamma = gamma; }
        if self.match_all { config.match_mode = MatchMode::All; }
        if let Some(fields) = &self.fields {
            config.fields = fields
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse::<Field>)
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(filter) = &self.filter {
            let mut filters = BTreeMap::new();
            for pair in filter.split(',').filter(|s| !s.trim().is_empty()) {
                let (name, value) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("filter '{pair}' is not of the form feature:value"))?;
                filters.insert(name.trim().to_string(), value.trim().to_string());
            }
            config.filters = filters;
        }
        config.limit = self.limit;
        Ok(config)
    }
}

#[derive(Serialize)]
pub struct SearchEnvelope {
    pub query: String,
    pub took_s: f64,
    #[serde(flatten)]
    pub response: SearchResponse,
}

#[derive(Deserialize)]
pub struct DocParams {
    pub key: String,
}

#[derive(Serialize)]
pub struct DocView {
    #[serde(flatten)]
    pub meta: DocMeta,
    pub reviews: Option<ReviewAggregate>,
}

#[derive(Clone)]
pub struct AppState {
    pub index_dir: PathBuf,
    pub index: Arc<IndexState>,
    pub admin_token: Option<String>,
}

pub fn build_app(options: ServerOptions) -> Result<Router> {
    // Startup fails here if a core artifact is missing or corrupt.
    let set = load_index_set(&IndexPaths::new(&options.index_dir))?;
    let synonyms = match &options.synonyms {
        Some(path) => SynonymTable::load(path)?,
        None => SynonymTable::new(),
    };
    let app_state = AppState {
        index_dir: options.index_dir,
        index: Arc::new(IndexState::from_index_set(set, synonyms)),
        admin_token: options.admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc", get(doc_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchEnvelope>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let config = params.to_config().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let response = state.index.search(&params.q, &config).map_err(|e| match e {
        SearchError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;
    let elapsed = start.elapsed();
    tracing::debug!(q = %params.q, filtered = response.filtered_documents, took_ms = elapsed.as_millis() as u64, "search");
    Ok(Json(SearchEnvelope { query: params.q, took_s: elapsed.as_secs_f64(), response }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Query(params): Query<DocParams>,
) -> Result<Json<DocView>, (StatusCode, String)> {
    let snapshot = state.index.snapshot();
    let meta = snapshot.doc(&params.key).cloned().ok_or((StatusCode::NOT_FOUND, "not found".to_string()))?;
    Ok(Json(DocView { meta, reviews: snapshot.review(&params.key).cloned() }))
}

/// Re-read the index directory and swap the new snapshot in. On failure the
/// current snapshot keeps serving.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let dir = state.index_dir.clone();
    let set = tokio::task::spawn_blocking(move || load_index_set(&IndexPaths::new(dir)))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            tracing::error!(error = %e, "reload failed, keeping current index");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    let num_docs = set.num_docs;
    state.index.replace(set);
    Ok(Json(serde_json::json!({ "num_docs": num_docs })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
