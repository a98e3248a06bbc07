use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse content category used to pick chunking separators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    Default,
    Academic,
    Technical,
    Legal,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Default => "default",
            DocumentType::Academic => "academic",
            DocumentType::Technical => "technical",
            DocumentType::Legal => "legal",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a chunk sits within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkPosition {
    Start,
    Middle,
    End,
}

impl ChunkPosition {
    /// Position of chunk `chunk_id` in a document of `total_chunks` chunks.
    pub fn of(chunk_id: usize, total_chunks: usize) -> Self {
        if chunk_id == 0 {
            ChunkPosition::Start
        } else if chunk_id + 1 == total_chunks {
            ChunkPosition::End
        } else {
            ChunkPosition::Middle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkPosition::Start => "start",
            ChunkPosition::Middle => "middle",
            ChunkPosition::End => "end",
        }
    }
}

impl std::fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded slice of a document plus the metadata derived for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub filename: String,
    pub chunk_id: usize,
    pub total_chunks: usize,
    pub document_type: DocumentType,
    pub chunk_size: usize,
    pub chunk_position: ChunkPosition,
    pub contains_structure: bool,
    pub keywords: Vec<String>,
}

impl Chunk {
    /// Deterministic record id: identical chunks of the same file map to the
    /// same id, so re-ingesting replaces instead of duplicating.
    pub fn record_id(&self) -> String {
        use sha2::{Digest, Sha256};
        use uuid::Uuid;

        let digest = Sha256::digest(self.content.as_bytes());
        let name = format!(
            "{}:{}:{}",
            self.filename,
            self.chunk_id,
            hex::encode(&digest[..16])
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Metadata map in its rich form; keywords are still a list here.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("filename".into(), Value::from(self.filename.clone()));
        map.insert("chunk_id".into(), Value::from(self.chunk_id as u64));
        map.insert("total_chunks".into(), Value::from(self.total_chunks as u64));
        map.insert("document_type".into(), Value::from(self.document_type.as_str()));
        map.insert("chunk_size".into(), Value::from(self.chunk_size as u64));
        map.insert("chunk_position".into(), Value::from(self.chunk_position.as_str()));
        map.insert("contains_structure".into(), Value::from(self.contains_structure));
        if !self.keywords.is_empty() {
            map.insert("keywords".into(), Value::from(self.keywords.clone()));
        }
        map
    }
}

/// Summary returned after adding a document's chunks to a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddSummary {
    pub total_chunks: usize,
    pub document_type: DocumentType,
    pub average_chunk_size: f64,
    pub keywords_extracted: bool,
    /// Number of chunks that contain structural markers.
    pub structure_preserved: usize,
}

impl AddSummary {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let total = chunks.len();
        let average_chunk_size = if total == 0 {
            0.0
        } else {
            chunks.iter().map(|c| c.content.chars().count()).sum::<usize>() as f64 / total as f64
        };
        Self {
            total_chunks: total,
            document_type: chunks.first().map(|c| c.document_type).unwrap_or_default(),
            average_chunk_size,
            keywords_extracted: chunks.iter().any(|c| !c.keywords.is_empty()),
            structure_preserved: chunks.iter().filter(|c| c.contains_structure).count(),
        }
    }
}
