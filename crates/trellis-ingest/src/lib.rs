//! Markdown to vector-store ingestion.
//!
//! A one-shot batch pipeline: recover page numbers from converted markdown,
//! split each page into overlapping chunks, embed the chunks, and persist
//! them in SQLite for similarity search.

pub mod embeddings;
pub mod pages;
pub mod splitter;
pub mod store;

pub use embeddings::{cosine_similarity, EmbeddingProvider, HttpEmbeddingProvider};
pub use pages::{split_pages, PageSegment};
pub use splitter::TextSplitter;
pub use store::{Chunk, ScoredChunk, VectorStore};

use std::path::Path;

use tracing::info;

use trellis_core::error::{Result, TrellisError};

/// Number of chunks embedded per provider call.
const EMBED_BATCH: usize = 64;

/// Summary of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub chunks: usize,
}

/// Ingest every `.md` file in a directory into the vector store.
pub fn ingest_dir(
    dir: &Path,
    splitter: &TextSplitter,
    provider: &dyn EmbeddingProvider,
    store: &VectorStore,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    for path in paths {
        let text = std::fs::read_to_string(&path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(file = %source, bytes = text.len(), "ingesting file");

        let mut pending: Vec<Chunk> = Vec::new();
        for segment in split_pages(&text) {
            for content in splitter.split(&segment.content) {
                pending.push(Chunk {
                    source: source.clone(),
                    page: segment.page,
                    content,
                });
            }
        }

        for batch in pending.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = provider.embed(&texts)?;
            if vectors.len() != texts.len() {
                return Err(TrellisError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            let items: Vec<(Chunk, Vec<f32>)> =
                batch.iter().cloned().zip(vectors).collect();
            store.insert_chunks(&items)?;
        }

        report.files += 1;
        report.chunks += pending.len();
    }

    info!(files = report.files, chunks = report.chunks, "ingestion complete");
    Ok(report)
}
