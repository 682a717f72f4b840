//! The movie catalog: metadata rows plus a row-aligned embedding matrix
//!
//! Both halves are static files read once at startup. Metadata comes from a
//! CSV that may live on disk or behind a URL; embeddings come from a
//! safetensors file or a PyTorch checkpoint.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::Movie,
};

pub mod pytorch;
pub mod sources;

pub use sources::{is_remote, source_for, CatalogSource, LocalFile, RemoteUrl};

use pytorch::PthContents;

/// Floor applied to vector norms before dividing, matching torch's `F.normalize`
const NORM_EPS: f32 = 1e-12;

/// Loaded catalog, immutable after construction
#[derive(Debug)]
pub struct Catalog {
    movies: Vec<Movie>,
    /// Unit-length embeddings transposed to `[dim, rows]`, ready for `query @ matrix`
    embeddings_t: Tensor,
    dimension: usize,
    loaded_at: DateTime<Utc>,
}

impl Catalog {
    /// Builds a catalog from metadata rows and a `[rows, dim]` embedding tensor
    pub fn new(movies: Vec<Movie>, embeddings: Tensor) -> AppResult<Self> {
        let (rows, dimension) = embeddings.dims2().map_err(|_| {
            AppError::Catalog(format!(
                "Expected [rows, dim] embeddings, got shape {:?}",
                embeddings.dims()
            ))
        })?;

        if rows != movies.len() {
            return Err(AppError::Catalog(format!(
                "Embedding rows ({}) do not match catalog rows ({})",
                rows,
                movies.len()
            )));
        }
        if rows == 0 || dimension == 0 {
            return Err(AppError::Catalog("Catalog is empty".to_string()));
        }

        let normalized = normalize_rows(&embeddings.to_dtype(DType::F32)?)?;
        let embeddings_t = normalized.t()?.contiguous()?;

        Ok(Self {
            movies,
            embeddings_t,
            dimension,
            loaded_at: Utc::now(),
        })
    }

    /// Builds a catalog from plain vectors, one per movie
    pub fn from_rows(movies: Vec<Movie>, rows: Vec<Vec<f32>>) -> AppResult<Self> {
        let dimension = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != dimension) {
            return Err(AppError::Catalog(
                "Embedding rows have inconsistent lengths".to_string(),
            ));
        }
        let count = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let embeddings = Tensor::from_vec(flat, (count, dimension), &Device::Cpu)?;
        Self::new(movies, embeddings)
    }

    /// Reads metadata and embeddings from their configured locations
    pub async fn load(csv_location: &str, embeddings_location: &str, key: Option<&str>) -> AppResult<Self> {
        let csv_source = source_for(csv_location);
        let movies = parse_movies(&csv_source.fetch().await?)?;
        tracing::info!(source = csv_source.location(), movies = movies.len(), "Loaded movie metadata");

        let embeddings = load_embeddings(embeddings_location, key).await?;
        tracing::info!(
            source = embeddings_location,
            shape = ?embeddings.dims(),
            dtype = ?embeddings.dtype(),
            "Loaded catalog embeddings"
        );

        Self::new(movies, embeddings)
    }

    /// Fails unless query embeddings of `dimension` can be compared against this catalog
    pub fn ensure_dimension(&self, dimension: usize) -> AppResult<()> {
        if dimension != self.dimension {
            return Err(AppError::Catalog(format!(
                "Model produces {}-dim embeddings but catalog holds {}-dim embeddings",
                dimension, self.dimension
            )));
        }
        Ok(())
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn movie_count(&self) -> usize {
        self.movies.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub(crate) fn embeddings_t(&self) -> &Tensor {
        &self.embeddings_t
    }
}

/// Scales each row of a 2-D tensor to unit L2 norm
pub(crate) fn normalize_rows(matrix: &Tensor) -> AppResult<Tensor> {
    let norms = matrix
        .sqr()?
        .sum_keepdim(1)?
        .sqrt()?
        .clamp(NORM_EPS, f32::MAX)?;
    Ok(matrix.broadcast_div(&norms)?)
}

/// Parses catalog CSV bytes into movies, in file order
pub fn parse_movies(bytes: &[u8]) -> AppResult<Vec<Movie>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let movies = reader
        .deserialize()
        .collect::<Result<Vec<Movie>, csv::Error>>()?;
    Ok(movies)
}

/// Lowercased file extension of a path or URL, ignoring any query string
fn embeddings_extension(location: &str) -> AppResult<String> {
    let path = if is_remote(location) {
        reqwest::Url::parse(location)
            .map_err(|e| AppError::Catalog(format!("Invalid embeddings URL {}: {}", location, e)))?
            .path()
            .to_string()
    } else {
        location.to_string()
    };

    Ok(Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default())
}

/// Loads the embedding matrix from a safetensors file or a PyTorch checkpoint
pub async fn load_embeddings(location: &str, key: Option<&str>) -> AppResult<Tensor> {
    let extension = embeddings_extension(location)?;

    let source = source_for(location);
    let named = match extension.as_str() {
        "safetensors" => {
            let bytes = source.fetch().await?;
            candle_core::safetensors::load_buffer(&bytes, &Device::Cpu)?
                .into_iter()
                .collect::<Vec<_>>()
        }
        "pt" | "pth" | "bin" => {
            let path = source.local_path().ok_or_else(|| {
                AppError::Catalog(format!(
                    "PyTorch embeddings must be a local file, got {}",
                    location
                ))
            })?;
            let contents = tokio::task::spawn_blocking(move || pytorch::read_pth(&path))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))??;
            match contents {
                PthContents::Named(named) => named,
                PthContents::Bare(tensor) => return Ok(tensor),
            }
        }
        other => {
            return Err(AppError::Catalog(format!(
                "Unsupported embeddings format '{}' for {}",
                other, location
            )))
        }
    };

    pick_tensor(named, key)
}

/// Selects the embedding tensor by name, or the only tensor when no name is given
fn pick_tensor(mut named: Vec<(String, Tensor)>, key: Option<&str>) -> AppResult<Tensor> {
    match key {
        Some(key) => named
            .into_iter()
            .find(|(name, _)| name == key)
            .map(|(_, tensor)| tensor)
            .ok_or_else(|| AppError::Catalog(format!("No tensor named '{}' in embeddings file", key))),
        None if named.len() == 1 => Ok(named.remove(0).1),
        None if named.is_empty() => Err(AppError::Catalog(
            "Embeddings file contains no tensors".to_string(),
        )),
        None => {
            let mut names: Vec<String> = named.into_iter().map(|(name, _)| name).collect();
            names.sort();
            Err(AppError::Catalog(format!(
                "Embeddings file holds several tensors ({}); set EMBEDDINGS_KEY",
                names.join(", ")
            )))
        }
    }
}
