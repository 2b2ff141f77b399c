use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::debug;

use trellis_core::error::{Result, TrellisError};

use crate::embeddings::cosine_similarity;

/// A chunk of document text bound for the vector store.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub source: String,
    pub page: u32,
    pub content: String,
}

/// A chunk returned from similarity search.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub source: String,
    pub page: u32,
    pub content: String,
    pub similarity: f32,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    page INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    ingested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);";

/// SQLite-backed vector store. Embeddings are little-endian f32 BLOBs;
/// search is a full scan ranked by cosine similarity.
pub struct VectorStore {
    conn: Mutex<Connection>,
}

impl VectorStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrellisError::Database(format!("failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| TrellisError::Database(e.to_string()))?;

        // WAL for better concurrent read performance
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| TrellisError::Database(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| TrellisError::Database(e.to_string()))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| TrellisError::Database(e.to_string()))?;

        debug!(path = %path.display(), "vector store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| TrellisError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| TrellisError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a batch of chunks with their embeddings in one transaction.
    pub fn insert_chunks(&self, items: &[(Chunk, Vec<f32>)]) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| TrellisError::Database(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| TrellisError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        for (chunk, embedding) in items {
            let blob: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
            tx.execute(
                "INSERT INTO chunks (source, page, content, embedding, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![chunk.source, chunk.page, chunk.content, blob, now],
            )
            .map_err(|e| TrellisError::Database(e.to_string()))?;
        }
        tx.commit()
            .map_err(|e| TrellisError::Database(e.to_string()))?;

        debug!(count = items.len(), "inserted chunks");
        Ok(())
    }

    /// Number of stored chunks.
    pub fn count(&self) -> Result<u64> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TrellisError::Database(e.to_string()))?;
        conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(|e| TrellisError::Database(e.to_string()))
    }

    /// Find the chunks most similar to a query vector, best first.
    pub fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TrellisError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare("SELECT source, page, content, embedding FROM chunks")
            .map_err(|e| TrellisError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let source: String = row.get(0)?;
                let page: u32 = row.get(1)?;
                let content: String = row.get(2)?;
                let blob: Vec<u8> = row.get(3)?;
                Ok((source, page, content, blob))
            })
            .map_err(|e| TrellisError::Database(e.to_string()))?;

        let mut scored = Vec::new();
        for row in rows {
            let (source, page, content, blob) =
                row.map_err(|e| TrellisError::Database(e.to_string()))?;
            let embedding = decode_embedding(&blob);
            let similarity = cosine_similarity(query_vec, &embedding);
            scored.push(ScoredChunk {
                source,
                page,
                content,
                similarity,
            });
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Decode a little-endian f32 BLOB back into a vector.
fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, page: u32, content: &str) -> Chunk {
        Chunk {
            source: source.to_string(),
            page,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_insert_and_count() {
        let store = VectorStore::in_memory().unwrap();
        store
            .insert_chunks(&[
                (chunk("doc.md", 1, "alpha"), vec![1.0, 0.0]),
                (chunk("doc.md", 2, "beta"), vec![0.0, 1.0]),
            ])
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_search_ranks_exact_match_first() {
        let store = VectorStore::in_memory().unwrap();
        store
            .insert_chunks(&[
                (chunk("doc.md", 1, "about cats"), vec![1.0, 0.0, 0.0]),
                (chunk("doc.md", 2, "about dogs"), vec![0.0, 1.0, 0.0]),
                (chunk("doc.md", 3, "about fish"), vec![0.0, 0.0, 1.0]),
            ])
            .unwrap();

        let results = store.search(&[0.0, 1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "about dogs");
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn test_embedding_roundtrip() {
        let store = VectorStore::in_memory().unwrap();
        let embedding = vec![0.25, -0.5, 0.125];
        store
            .insert_chunks(&[(chunk("doc.md", 1, "payload"), embedding.clone())])
            .unwrap();

        let results = store.search(&embedding, 1).unwrap();
        assert_eq!(results[0].page, 1);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/store.db");
        let store = VectorStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(path.exists());
    }
}
