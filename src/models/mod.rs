use serde::{Deserialize, Serialize};

mod movie;

pub use movie::{parse_rating, parse_year, Movie};

/// Request body for the similarity endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityRequest {
    /// Free-text mood or description
    pub input: String,
}

/// One ranked catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieMatch {
    pub movie: String,
    pub score: f64,
    pub year: Option<i32>,
    pub rating: Option<f64>,
}

impl MovieMatch {
    pub fn new(movie: &Movie, score: f32) -> Self {
        Self {
            movie: movie.name.clone(),
            score: f64::from(score),
            year: movie.year,
            rating: movie.rating,
        }
    }
}

/// Response body for the similarity endpoint, ordered by descending score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResponse {
    pub results: Vec<MovieMatch>,
}

/// Summary of the loaded catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogInfo {
    pub movies: usize,
    pub dimension: usize,
    pub model: String,
    pub top_k: usize,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}
