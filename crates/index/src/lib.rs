pub mod cache;
pub mod embeddings;
pub mod keyword;
pub mod selector;

pub use cache::{CacheStats, CachedEmbedder, EmbeddingCache};
pub use embeddings::{Embedder, EmbeddingClient};
pub use keyword::KeywordEmbedder;
pub use selector::{DEFAULT_TOP_K, RelevanceSelector, cosine_similarity, rank};
