use std::sync::Arc;

use crate::services::{catalog::Catalog, embedder::Embedder};

/// Shared application state
///
/// Everything in here is loaded at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn Embedder>,
    pub catalog: Arc<Catalog>,
    pub strip_non_alpha: bool,
}

impl AppState {
    /// Creates state around a loaded model and catalog
    pub fn new(embedder: Arc<dyn Embedder>, catalog: Arc<Catalog>) -> Self {
        Self {
            embedder,
            catalog,
            strip_non_alpha: false,
        }
    }

    /// Enables replacing non-alphabetic query characters with spaces
    pub fn with_strip_non_alpha(mut self, strip_non_alpha: bool) -> Self {
        self.strip_non_alpha = strip_non_alpha;
        self
    }
}
