//! SQLite-backed chunk store with scoped nearest-neighbor search.
//!
//! Similarity queries are a flat scored scan: filter rows by scope in SQL,
//! decode the stored vectors, rank by cosine similarity in memory. No
//! approximate index; the target scale is thousands of chunks per scope.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::schema::SCHEMA_SQL;
use crate::types::{NewChunk, ScoredChunk, TextChunk};
use notegraph_core::vector::{cosine_similarity, decode_vector, encode_vector};
use notegraph_core::{Error, Result};

/// Scoped persistence and similarity search over text chunks.
pub struct ChunkStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
}

impl ChunkStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory; the file will be `db_dir/notegraph.db`.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("notegraph.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
        };

        let chunk_count = store.count_chunks()?;
        info!(
            "ChunkStore initialized: {} chunks, dim={}, path={}",
            chunk_count,
            embedding_dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    /// The fixed embedding dimension this store enforces.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    // ---------------------------------------------------------------
    // Write path
    // ---------------------------------------------------------------

    /// Remove all chunks for an owner. Idempotent; returns the number deleted.
    pub fn delete_by_owner(&self, owner_id: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM text_chunks WHERE owner_id = ?1", params![owner_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        debug!("Deleted {} chunks for owner {}", count, owner_id);
        Ok(count)
    }

    /// Remove all chunks for an owner+page pair. Idempotent; returns the
    /// number deleted.
    pub fn delete_by_owner_and_page(&self, owner_id: i64, page_id: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "DELETE FROM text_chunks WHERE owner_id = ?1 AND page_id = ?2",
                params![owner_id, page_id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        debug!(
            "Deleted {} chunks for owner {} page {}",
            count, owner_id, page_id
        );
        Ok(count)
    }

    /// Insert a batch of chunks in a single transaction (all-or-nothing).
    ///
    /// Every vector is dimension-checked up front; a mismatch rejects the
    /// whole batch with `DimensionMismatch` and writes nothing.
    pub fn insert_batch(&self, chunks: &[NewChunk]) -> Result<usize> {
        for chunk in chunks {
            if chunk.vector.len() != self.embedding_dim {
                return Err(Error::DimensionMismatch {
                    expected: self.embedding_dim,
                    actual: chunk.vector.len(),
                });
            }
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let now = now_millis();
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO text_chunks (text, owner_id, workspace_id, page_id, vector, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.text,
                    chunk.owner_id,
                    chunk.workspace_id,
                    chunk.page_id,
                    encode_vector(&chunk.vector),
                    now,
                ])
                .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        Ok(chunks.len())
    }

    // ---------------------------------------------------------------
    // Similarity search
    // ---------------------------------------------------------------

    /// Top-`k` chunks for an owner, ordered by descending cosine similarity
    /// to `query`. `owner_id = None` searches across all owners. An empty
    /// scope yields an empty result, never an error.
    pub fn find_nearest(
        &self,
        query: &[f64],
        owner_id: Option<i64>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let candidates = match owner_id {
            Some(owner) => self.select_chunks(
                "SELECT id, text, owner_id, workspace_id, page_id, vector, created_at \
                 FROM text_chunks WHERE owner_id = ?1",
                params![owner],
            )?,
            None => self.select_chunks(
                "SELECT id, text, owner_id, workspace_id, page_id, vector, created_at \
                 FROM text_chunks",
                params![],
            )?,
        };
        rank_by_similarity(query, candidates, k)
    }

    /// Top-`k` chunks within a single page, ordered by descending cosine
    /// similarity to `query`.
    pub fn find_nearest_in_page(
        &self,
        query: &[f64],
        page_id: i64,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let candidates = self.select_chunks(
            "SELECT id, text, owner_id, workspace_id, page_id, vector, created_at \
             FROM text_chunks WHERE page_id = ?1",
            params![page_id],
        )?;
        rank_by_similarity(query, candidates, k)
    }

    // ---------------------------------------------------------------
    // Bulk scans
    // ---------------------------------------------------------------

    /// All chunks in a workspace, unranked. Used by the graph builder.
    pub fn find_all_by_workspace(&self, workspace_id: i64) -> Result<Vec<TextChunk>> {
        self.select_chunks(
            "SELECT id, text, owner_id, workspace_id, page_id, vector, created_at \
             FROM text_chunks WHERE workspace_id = ?1",
            params![workspace_id],
        )
    }

    /// All chunks for an owner+page pair, unranked.
    pub fn find_by_owner_and_page(&self, owner_id: i64, page_id: i64) -> Result<Vec<TextChunk>> {
        self.select_chunks(
            "SELECT id, text, owner_id, workspace_id, page_id, vector, created_at \
             FROM text_chunks WHERE owner_id = ?1 AND page_id = ?2",
            params![owner_id, page_id],
        )
    }

    /// Count all stored chunks.
    pub fn count_chunks(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM text_chunks", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Row mapping
    // ---------------------------------------------------------------

    fn select_chunks(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<TextChunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut chunks = Vec::new();
        for row in rows {
            let (id, text, owner_id, workspace_id, page_id, stored, created_at) =
                row.map_err(|e| Error::Database(e.to_string()))?;
            chunks.push(TextChunk {
                id,
                text,
                owner_id,
                workspace_id,
                page_id,
                vector: decode_vector(&stored)?,
                created_at,
            });
        }
        Ok(chunks)
    }
}

/// Rank candidates by descending cosine similarity to the query, keeping
/// storage order on ties (stable sort), and truncate to `k`.
fn rank_by_similarity(
    query: &[f64],
    candidates: Vec<TextChunk>,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let mut scored = Vec::with_capacity(candidates.len());
    for chunk in candidates {
        if chunk.vector.len() != query.len() {
            return Err(Error::DimensionMismatch {
                expected: query.len(),
                actual: chunk.vector.len(),
            });
        }
        let score = cosine_similarity(query, &chunk.vector);
        scored.push(ScoredChunk { chunk, score });
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
