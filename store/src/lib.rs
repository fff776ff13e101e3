//! Durable persistence for files, chunks, the FTS5 lexical index, and
//! embedding vectors. One [`Store`] wraps one SQLite connection in WAL mode;
//! callers that need concurrent readers and a writer open separate `Store`
//! handles against the same `db_path` (SQLite's WAL mode is what makes that
//! safe, not anything this crate does internally).

mod codec;
mod error;
mod schema;

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub use chunk_model::{ChunkRecord, EmbeddingRecord, FileRecord};
pub use error::StoreError;

/// Input for creating or refreshing a file's metadata row.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: String,
    pub mtime_ns: i64,
    pub size_bytes: i64,
    pub sha256: String,
}

/// Input for one chunk about to be inserted as part of a file rebuild.
/// `chunk_id` and `chunk_index` are expected to already be assigned by the
/// chunker; the store does not recompute them.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_id: String,
    pub chunk_index: u32,
    pub heading_path: String,
    pub content: String,
    pub token_count: u32,
}

/// Input for one embedding row, keyed by `chunk_id`.
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub chunk_id: String,
    pub model: String,
    pub dim: u32,
    pub vec: Vec<f32>,
}

/// A lexical search hit: the chunk plus its owning path and raw BM25 score
/// (more negative is better, per the FTS5 convention).
#[derive(Debug, Clone)]
pub struct FtsHit {
    pub chunk: ChunkRecord,
    pub path: String,
    pub bm25: f64,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if absent) the database at `path`, enabling WAL mode,
    /// foreign keys, and the schema described in the engine's configuration
    /// surface. Safe to call from multiple processes/handles concurrently.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests that do not need a file on disk.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn get_file(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, path, mtime_ns, size_bytes, sha256 FROM files WHERE path = ?1",
                params![path],
                |row| {
                    Ok(FileRecord {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        mtime_ns: row.get(2)?,
                        size_bytes: row.get(3)?,
                        sha256: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_file_paths(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT path FROM files")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Updates only `(mtime_ns, size_bytes)` for a file whose content hash is
    /// unchanged (the hash short-circuit path, §4.4 step 2 / property 5).
    pub fn touch_file(&self, path: &str, mtime_ns: i64, size_bytes: i64) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE files SET mtime_ns = ?2, size_bytes = ?3 WHERE path = ?1",
            params![path, mtime_ns, size_bytes],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(())
    }

    /// Replaces a file's full chunk set (and their embeddings) atomically:
    /// upsert the file row, delete prior chunks for the file id (cascading
    /// to their FTS rows and embeddings via triggers/foreign keys), insert
    /// the new chunk set with contiguous `chunk_index`, then insert the new
    /// embeddings. All of this commits together or not at all.
    pub fn rebuild_file(
        &mut self,
        file: NewFile,
        chunks: Vec<NewChunk>,
        embeddings: Vec<NewEmbedding>,
    ) -> Result<(FileRecord, Vec<ChunkRecord>), StoreError> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO files (path, mtime_ns, size_bytes, sha256) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET mtime_ns = excluded.mtime_ns, size_bytes = excluded.size_bytes, sha256 = excluded.sha256",
            params![file.path, file.mtime_ns, file.size_bytes, file.sha256],
        )?;
        let file_id: i64 = tx.query_row(
            "SELECT id FROM files WHERE path = ?1",
            params![file.path],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM chunks WHERE file_id = ?1", params![file_id])?;

        let mut inserted = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            tx.execute(
                "INSERT INTO chunks (chunk_id, file_id, chunk_index, heading_path, content, token_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    chunk.chunk_id,
                    file_id,
                    chunk.chunk_index,
                    chunk.heading_path,
                    chunk.content,
                    chunk.token_count
                ],
            )?;
            let id: i64 = tx.last_insert_rowid();
            inserted.push(ChunkRecord {
                id,
                chunk_id: chunk.chunk_id.clone(),
                file_id,
                chunk_index: chunk.chunk_index,
                heading_path: chunk.heading_path.clone(),
                content: chunk.content.clone(),
                token_count: chunk.token_count,
            });
        }

        for embedding in &embeddings {
            let bytes = codec::encode_vec(&embedding.vec);
            tx.execute(
                "INSERT INTO embeddings (chunk_id, model, dim, vec, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(chunk_id) DO UPDATE SET model = excluded.model, dim = excluded.dim, vec = excluded.vec, updated_at = excluded.updated_at",
                params![embedding.chunk_id, embedding.model, embedding.dim, bytes, now],
            )?;
        }

        tx.commit()?;

        let record = FileRecord {
            id: file_id,
            path: file.path,
            mtime_ns: file.mtime_ns,
            size_bytes: file.size_bytes,
            sha256: file.sha256,
        };
        Ok((record, inserted))
    }

    /// Deletes a file row, cascading to its chunks (and their FTS rows and
    /// embeddings). Returns `false` if no such file was tracked.
    pub fn delete_file(&self, path: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Ok(changed > 0)
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, chunk_id, file_id, chunk_index, heading_path, content, token_count
                 FROM chunks WHERE chunk_id = ?1",
                params![chunk_id],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// Fetches a chunk along with the path of its owning file, used for
    /// result assembly in search.
    pub fn get_chunk_with_path(&self, chunk_id: &str) -> Result<Option<(ChunkRecord, String)>, StoreError> {
        self.conn
            .query_row(
                "SELECT c.id, c.chunk_id, c.file_id, c.chunk_index, c.heading_path, c.content, c.token_count, f.path
                 FROM chunks c JOIN files f ON f.id = c.file_id
                 WHERE c.chunk_id = ?1",
                params![chunk_id],
                |row| {
                    let chunk = Self::row_to_chunk(row)?;
                    let path: String = row.get(7)?;
                    Ok((chunk, path))
                },
            )
            .optional()
            .map_err(StoreError::from)
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
        Ok(ChunkRecord {
            id: row.get(0)?,
            chunk_id: row.get(1)?,
            file_id: row.get(2)?,
            chunk_index: row.get(3)?,
            heading_path: row.get(4)?,
            content: row.get(5)?,
            token_count: row.get(6)?,
        })
    }

    /// FTS5 MATCH query, ordered ascending by raw BM25 (rank 1 = best). A
    /// blank or unparseable query yields an empty list rather than an error.
    pub fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>, StoreError> {
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.chunk_id, c.file_id, c.chunk_index, c.heading_path, c.content, c.token_count,
                    f.path, bm25(chunks_fts) AS score
             FROM chunks_fts
             JOIN chunks c ON c.id = chunks_fts.rowid
             JOIN files f ON f.id = c.file_id
             WHERE chunks_fts MATCH ?1
             ORDER BY score
             LIMIT ?2",
        )?;

        let result = stmt.query_map(params![sanitized, limit as i64], |row| {
            let chunk = Self::row_to_chunk(row)?;
            let path: String = row.get(7)?;
            let score: f64 = row.get(8)?;
            Ok(FtsHit { chunk, path, bm25: score })
        });

        let rows = match result {
            Ok(rows) => rows,
            Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(hit) => out.push(hit),
                Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out)
    }

    /// All stored embeddings for cosine scoring against a query vector.
    /// The caller (semantic search) is responsible for the cosine math;
    /// the store just hands back decoded vectors.
    pub fn iter_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT chunk_id, vec FROM embeddings")?;
        let rows = stmt.query_map([], |row| {
            let chunk_id: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((chunk_id, bytes))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (chunk_id, bytes) = row?;
            out.push((chunk_id, codec::decode_vec(&bytes)));
        }
        Ok(out)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO index_metadata (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row("SELECT value FROM index_metadata WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(StoreError::from)
    }

    /// `(file_count, chunk_count)`, used by `index_status`.
    pub fn counts(&self) -> Result<(i64, i64), StoreError> {
        let file_count: i64 = self.conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        let chunk_count: i64 = self.conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok((file_count, chunk_count))
    }

    /// Truncating WAL checkpoint, run on `Engine::shutdown` so the main
    /// database file is left consistent without a lingering `-wal` file.
    pub fn checkpoint_wal(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

/// Escapes FTS5-reserved characters so a user query never raises a syntax
/// error back to the caller (§4.5: "implementations should sanitize/escape").
fn sanitize_fts_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    trimmed
        .split_whitespace()
        .map(|term| {
            let cleaned: String = term.chars().filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-').collect();
            if cleaned.is_empty() {
                String::new()
            } else {
                format!("\"{cleaned}\"")
            }
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
