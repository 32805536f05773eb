//! Persistent embedding index for the semantic retrieval tier.
//!
//! Embeddings live in redb (`embeddings`: encoded [`TripleKey`] → little-endian
//! `f32` bytes, `embedding_meta`: `"dim"` → vector length). The tables are the
//! source of truth; an in-memory [`VectorIndex`] mirrors them for search and
//! is rebuilt from them on every open.
//!
//! The index never computes embeddings itself; callers pass vectors in.

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::vector::{check_dim, TripleKey, VectorIndex};
use crate::{Result, SonoError};

const EMBEDDINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("embeddings");
const EMBEDDING_META: TableDefinition<&str, u64> = TableDefinition::new("embedding_meta");

pub struct SemanticIndex {
    db: Database,
    vectors: Mutex<VectorIndex>,
}

impl SemanticIndex {
    /// Open or create an index file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;
        Self::init(db)
    }

    /// An index backed by memory only.
    pub fn open_in_memory() -> Result<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder().create_with_backend(backend)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        {
            let write_txn = db.begin_write()?;
            write_txn.open_table(EMBEDDINGS)?;
            write_txn.open_table(EMBEDDING_META)?;
            write_txn.commit()?;
        }
        let vectors = Self::load(&db)?;
        info!(entries = vectors.len(), "semantic index opened");
        Ok(Self {
            db,
            vectors: Mutex::new(vectors),
        })
    }

    fn load(db: &Database) -> Result<VectorIndex> {
        let mut idx = VectorIndex::new();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(EMBEDDINGS)?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            let raw_key = key.value();
            let triple = TripleKey::decode(raw_key).ok_or_else(|| {
                SonoError::Storage(format!("malformed embedding key {raw_key:?}"))
            })?;
            idx.insert(triple, decode_vector(value.value())?)?;
        }
        Ok(idx)
    }

    /// Store the embedding of one triple, replacing any previous one.
    ///
    /// The first vector ever stored fixes the dimension; later vectors of a
    /// different length are rejected with [`SonoError::InvalidEmbedding`].
    pub fn insert(&self, key: TripleKey, embedding: Vec<f32>) -> Result<()> {
        let mut vectors = self.lock()?;
        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(EMBEDDING_META)?;
            let stored: Option<u64> = meta.get("dim")?.map(|g| g.value());
            check_dim(stored.map(|d| d as usize), &embedding)?;
            if stored.is_none() {
                meta.insert("dim", embedding.len() as u64)?;
            }
        }
        {
            let bytes: Vec<u8> = embedding.iter().flat_map(|x| x.to_le_bytes()).collect();
            let mut table = write_txn.open_table(EMBEDDINGS)?;
            table.insert(key.encode().as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        debug!(triple = %key, "embedding stored");
        vectors.insert(key, embedding)
    }

    pub fn contains(&self, key: &TripleKey) -> Result<bool> {
        Ok(self.lock()?.contains(key))
    }

    /// Drop every embedding of one `(subject, relation)` slot.
    pub fn remove_relation(&self, subject: &str, relation: &str) -> Result<usize> {
        self.remove_where(|k| k.subject == subject && k.relation == relation)
    }

    /// Drop every embedding about a subject.
    pub fn remove_subject(&self, subject: &str) -> Result<usize> {
        self.remove_where(|k| k.subject == subject)
    }

    /// Drop every embedding about a subject that is not in `keep`.
    pub fn retain_subject(&self, subject: &str, keep: &HashSet<TripleKey>) -> Result<usize> {
        self.remove_where(|k| k.subject == subject && !keep.contains(k))
    }

    /// Drop everything, dimension included.
    pub fn clear(&self) -> Result<()> {
        self.remove_where(|_| true).map(|_| ())
    }

    fn remove_where(&self, pred: impl Fn(&TripleKey) -> bool) -> Result<usize> {
        let mut vectors = self.lock()?;
        let doomed: Vec<TripleKey> = vectors.keys().filter(|k| pred(k)).cloned().collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(EMBEDDINGS)?;
            for key in &doomed {
                table.remove(key.encode().as_str())?;
            }
            if table.is_empty()? {
                let mut meta = write_txn.open_table(EMBEDDING_META)?;
                meta.remove("dim")?;
            }
        }
        write_txn.commit()?;
        vectors.remove_where(&pred);
        debug!(removed = doomed.len(), "embeddings removed");
        Ok(doomed.len())
    }

    /// Highest-scoring triple among `allowed` for a query vector.
    ///
    /// A query whose length disagrees with the stored dimension is an
    /// [`SonoError::InvalidEmbedding`], not a silent zero score.
    pub fn best_match(
        &self,
        query: &[f32],
        allowed: &HashSet<TripleKey>,
    ) -> Result<Option<(TripleKey, f32)>> {
        let vectors = self.lock()?;
        if let Some(d) = vectors.dim() {
            if query.len() != d {
                return Err(SonoError::InvalidEmbedding(format!(
                    "query dimension mismatch: index has dim {d}, query has {}",
                    query.len()
                )));
            }
        }
        Ok(vectors.best(query, allowed))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, VectorIndex>> {
        self.vectors
            .lock()
            .map_err(|_| SonoError::Internal("semantic index lock poisoned".into()))
    }
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SonoError::Storage(format!(
            "corrupt embedding: byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
