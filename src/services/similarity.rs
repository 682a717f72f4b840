use std::{cmp::Ordering, sync::LazyLock};

use candle_core::Tensor;
use regex::Regex;

use crate::{
    error::{AppError, AppResult},
    models::MovieMatch,
    services::{
        catalog::{normalize_rows, Catalog},
        embedder::Embedder,
    },
};

/// Number of matches returned per query
pub const TOP_K: usize = 30;

static NON_ALPHA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z#]").expect("valid character class"));

/// Prepares free text for embedding
///
/// Input is lowercased. With `strip_non_alpha`, every character outside
/// `[a-z#]` becomes a space. Inputs with nothing left to embed are rejected.
pub fn normalize_query(input: &str, strip_non_alpha: bool) -> AppResult<String> {
    let mut query = input.to_lowercase();
    if strip_non_alpha {
        query = NON_ALPHA_RE.replace_all(&query, " ").into_owned();
    }

    if query.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "input must contain text to match against".to_string(),
        ));
    }
    Ok(query)
}

/// Cosine similarity of `query` against every catalog row, in catalog order
pub fn cosine_scores(query: &[f32], catalog: &Catalog) -> AppResult<Vec<f32>> {
    if query.len() != catalog.dimension() {
        return Err(AppError::Embedding(format!(
            "Query embedding has {} dimensions, catalog expects {}",
            query.len(),
            catalog.dimension()
        )));
    }

    let embeddings_t = catalog.embeddings_t();
    let query = Tensor::from_slice(query, (1, query.len()), embeddings_t.device())?;
    let scores = normalize_rows(&query)?
        .matmul(embeddings_t)?
        .squeeze(0)?
        .to_vec1::<f32>()?;
    Ok(scores)
}

/// Highest-scoring `(row, score)` pairs, best first
///
/// Equal scores keep catalog order; NaN ranks below everything.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    if ranked.len() > k {
        ranked.select_nth_unstable_by(k - 1, rank_order);
        ranked.truncate(k);
    }
    ranked.sort_by(rank_order);
    ranked
}

fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    key(b.1).total_cmp(&key(a.1)).then(a.0.cmp(&b.0))
}

/// Embeds `query` and returns the [`TOP_K`] closest movies
///
/// Blocking: runs the embedding model inline.
pub fn find_similar(
    embedder: &dyn Embedder,
    catalog: &Catalog,
    query: &str,
) -> AppResult<Vec<MovieMatch>> {
    let embedding = embedder.embed(query)?;
    let scores = cosine_scores(&embedding, catalog)?;

    let movies = catalog.movies();
    let matches = top_k(&scores, TOP_K)
        .into_iter()
        .map(|(row, score)| MovieMatch::new(&movies[row], score))
        .collect();
    Ok(matches)
}
