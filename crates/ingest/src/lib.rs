pub mod chunk;
pub mod chunker;
pub mod document;
pub mod error;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{ChunkWindows, Chunker, ChunkerConfig, Window};
pub use document::{Document, DocumentFetcher, DocumentFormat, HttpFetcher};
pub use error::{ChunkError, IngestError};
pub use reader::TextExtractor;

use sha2::{Digest, Sha256};
use tracing::info;

/// Generate a stable document ID from its source URL
pub fn generate_doc_id(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub doc_id: String,
    pub source: String,
    pub chunks: Vec<Chunk>,
}

/// Fetch, extract and chunk one document. The downloaded file is released
/// before chunking starts, on success and on every error path.
pub async fn ingest_document(
    fetcher: &dyn DocumentFetcher,
    url: &str,
    chunker: &Chunker,
) -> Result<IngestedDocument, IngestError> {
    let text = {
        let document = fetcher.fetch(url).await?;
        document.extract_text().await?
    };

    let doc_id = generate_doc_id(url);
    let chunks = chunker.chunk_text(&doc_id, &text, url);
    info!(url, doc_id = %doc_id, chunks = chunks.len(), "Ingested document");

    Ok(IngestedDocument {
        doc_id,
        source: url.to_string(),
        chunks,
    })
}
