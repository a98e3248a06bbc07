//! SQLite-backed vector storage.
//!
//! One database file per storage directory. Collections are rows in
//! `collections`; records carry JSON metadata and a little-endian f32 blob.
//! Similarity is brute-force cosine over the collection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use super::{CollectionInfo, ScoredRecord, StoredRecord, VectorBackend};
use crate::error::VectorStoreError;
use crate::models::Metadata;

/// Database file created inside the storage directory.
pub const DATABASE_FILE: &str = "vectors.sqlite3";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    dimension INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    record_id TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    UNIQUE(collection_id, record_id)
);

CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection_id);
"#;

pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (creating if needed) the database inside `dir`.
    pub async fn open(dir: &Path) -> Result<Self, VectorStoreError> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::open_blocking(&dir))
            .await
            .map_err(|e| VectorStoreError::StorageInit(format!("storage task failed: {}", e)))?
    }

    fn open_blocking(dir: &Path) -> Result<Self, VectorStoreError> {
        let init_err = |e: &dyn std::fmt::Display| {
            VectorStoreError::StorageInit(format!("{}: {}", dir.display(), e))
        };

        if dir.exists() && !dir.is_dir() {
            return Err(init_err(&"storage path is not a directory"));
        }
        std::fs::create_dir_all(dir).map_err(|e| init_err(&e))?;

        let path = dir.join(DATABASE_FILE);
        let conn = Connection::open(&path).map_err(|e| init_err(&e))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| init_err(&e))?;
        conn.pragma_update(None, "foreign_keys", 1)
            .map_err(|e| init_err(&e))?;
        conn.execute_batch(SCHEMA).map_err(|e| init_err(&e))?;

        tracing::debug!(path = %path.display(), "vector database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run<T, F>(&self, f: F) -> Result<T, VectorStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, VectorStoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| VectorStoreError::CollectionError(format!("storage task failed: {}", e)))?
    }
}

fn find_collection(conn: &Connection, name: &str) -> rusqlite::Result<Option<CollectionInfo>> {
    conn.query_row(
        "SELECT c.name, c.dimension, c.created_at,
                (SELECT COUNT(*) FROM records r WHERE r.collection_id = c.id)
         FROM collections c WHERE c.name = ?1",
        params![name],
        |row| {
            Ok(CollectionInfo {
                name: row.get(0)?,
                dimension: row.get::<_, i64>(1)? as usize,
                created_at: row.get(2)?,
                count: row.get::<_, i64>(3)? as u64,
            })
        },
    )
    .optional()
}

fn collection_id(conn: &Connection, name: &str) -> Result<(i64, usize), VectorStoreError> {
    conn.query_row(
        "SELECT id, dimension FROM collections WHERE name = ?1",
        params![name],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as usize)),
    )
    .optional()?
    .ok_or_else(|| VectorStoreError::CollectionError(format!("collection not found: {}", name)))
}

#[async_trait]
impl VectorBackend for SqliteBackend {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
    ) -> Result<CollectionInfo, VectorStoreError> {
        let name = name.to_string();
        self.run(move |conn| {
            if let Some(info) = find_collection(conn, &name)? {
                if info.dimension != dimension {
                    return Err(VectorStoreError::StorageInit(format!(
                        "collection {} stores {}-dimensional vectors, embedder produces {}",
                        name, info.dimension, dimension
                    )));
                }
                return Ok(info);
            }

            let created_at = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO collections (name, dimension, created_at) VALUES (?1, ?2, ?3)",
                params![name, dimension as i64, created_at],
            )?;
            tracing::info!(collection = %name, dimension, "collection created");

            Ok(CollectionInfo {
                name,
                dimension,
                count: 0,
                created_at,
            })
        })
        .await
    }

    async fn drop_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        let name = name.to_string();
        self.run(move |conn| {
            let removed = conn.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let name = name.to_string();
        self.run(move |conn| Ok(find_collection(conn, &name)?)).await
    }

    async fn upsert(
        &self,
        collection: &str,
        records: Vec<StoredRecord>,
    ) -> Result<usize, VectorStoreError> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let (id, dimension) = collection_id(&tx, &collection)?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO records (collection_id, record_id, content, metadata, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(collection_id, record_id) DO UPDATE SET
                         content = excluded.content,
                         metadata = excluded.metadata,
                         embedding = excluded.embedding",
                )?;
                for record in &records {
                    if record.embedding.len() != dimension {
                        return Err(VectorStoreError::InsertError(format!(
                            "record {} has dimension {}, collection expects {}",
                            record.id,
                            record.embedding.len(),
                            dimension
                        )));
                    }
                    let metadata = serde_json::to_string(&record.metadata)
                        .map_err(|e| VectorStoreError::InsertError(e.to_string()))?;
                    stmt.execute(params![
                        id,
                        record.id,
                        record.content,
                        metadata,
                        encode_embedding(&record.embedding)
                    ])?;
                }
            }
            tx.commit()?;
            Ok(records.len())
        })
        .await
    }

    async fn query(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let (id, _) = collection_id(conn, &collection)?;
            let mut stmt = conn.prepare(
                "SELECT content, metadata, embedding FROM records
                 WHERE collection_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?;

            let mut hits = Vec::new();
            for row in rows {
                let (content, metadata, blob) = row?;
                let metadata: Metadata = serde_json::from_str(&metadata)
                    .map_err(|e| VectorStoreError::SearchError(format!("corrupt metadata: {}", e)))?;
                let score = cosine_similarity(&vector, &decode_embedding(&blob)?);
                hits.push(ScoredRecord {
                    content,
                    metadata,
                    score,
                });
            }

            // stable sort keeps insertion order among equal scores
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            hits.truncate(limit);
            Ok(hits)
        })
        .await
    }
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>, VectorStoreError> {
    if blob.len() % 4 != 0 {
        return Err(VectorStoreError::SearchError(format!(
            "invalid embedding byte length: {}",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine similarity, or 0 when either vector has no magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom) as f32
}
