pub mod catalog;
pub mod embedder;
pub mod similarity;

pub use catalog::Catalog;
pub use embedder::{Embedder, FastEmbedder};
