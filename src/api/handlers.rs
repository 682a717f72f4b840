use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{CatalogInfo, SimilarityRequest, SimilarityResponse},
    services::similarity::{self, TOP_K},
};

use super::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Ranks the catalog against a free-text mood or description
pub async fn find_similarity(
    State(state): State<AppState>,
    payload: Result<Json<SimilarityRequest>, JsonRejection>,
) -> AppResult<Json<SimilarityResponse>> {
    let Json(request) = payload.map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
    tracing::debug!(input_len = request.input.len(), "Similarity request");
    let query = similarity::normalize_query(&request.input, state.strip_non_alpha)?;

    let embedder = state.embedder.clone();
    let catalog = state.catalog.clone();
    let results = tokio::task::spawn_blocking(move || {
        similarity::find_similar(embedder.as_ref(), &catalog, &query)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Similarity task join error");
        AppError::Internal(e.to_string())
    })??;

    tracing::debug!(
        matches = results.len(),
        best = results.first().map(|m| m.movie.as_str()).unwrap_or_default(),
        "Ranked catalog"
    );

    Ok(Json(SimilarityResponse { results }))
}

/// Describes the loaded catalog and model
pub async fn catalog_info(State(state): State<AppState>) -> Json<CatalogInfo> {
    Json(CatalogInfo {
        movies: state.catalog.movie_count(),
        dimension: state.catalog.dimension(),
        model: state.embedder.model_name().to_string(),
        top_k: TOP_K,
        loaded_at: state.catalog.loaded_at(),
    })
}
