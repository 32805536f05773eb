//! Sono: personal natural-language fact memory.
//!
//! The core primitive is a fact: a canonical `(subject, relation, value)`
//! triple, where the value is either a single string or an ordered,
//! case-insensitively de-duplicated list, depending on the relation's
//! declared shape.
//!
//! Loosely phrased statements ("Pam's husband is Rickey") are turned into
//! [`Intent`]s by the [`IntentParser`], written to a [`FactStore`], and
//! later answered by the [`RetrievalEngine`] through a strict tier chain:
//! exact, alias-variant, fuzzy lexical, then semantic.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sono::{Canonicalizer, FactStore, RetrievalEngine};
//!
//! let canon = Arc::new(Canonicalizer::default());
//! let store = FactStore::open("facts.json", canon.clone()).unwrap();
//!
//! store.remember("Pamela", "spouse", "Rickey").unwrap();
//! assert_eq!(store.recall("pam", "husband").unwrap().unwrap().to_string(), "Rickey");
//!
//! let engine = RetrievalEngine::new(canon);
//! let answer = engine.answer(&store, "pam", "hubby").unwrap();
//! assert!(answer.is_some());
//! ```

pub mod canonical;
pub mod consolidate;
pub mod intent;
pub mod normalize;
pub mod retrieval;
pub mod semantic;
pub mod similarity;
mod vector;

pub use canonical::{CanonicalIndex, Canonicalizer, RelationShape};
pub use consolidate::{Consolidator, EntityConsolidator};
pub use intent::{Intent, IntentKind, IntentParser};
pub use retrieval::{Answer, Embedder, RetrievalEngine, Tier};
pub use semantic::SemanticIndex;
pub use similarity::Thresholds;
pub use vector::TripleKey;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SonoError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<redb::DatabaseError> for SonoError {
    fn from(e: redb::DatabaseError) -> Self {
        SonoError::Storage(e.to_string())
    }
}
impl From<redb::TransactionError> for SonoError {
    fn from(e: redb::TransactionError) -> Self {
        SonoError::Storage(e.to_string())
    }
}
impl From<redb::TableError> for SonoError {
    fn from(e: redb::TableError) -> Self {
        SonoError::Storage(e.to_string())
    }
}
impl From<redb::StorageError> for SonoError {
    fn from(e: redb::StorageError) -> Self {
        SonoError::Storage(e.to_string())
    }
}
impl From<redb::CommitError> for SonoError {
    fn from(e: redb::CommitError) -> Self {
        SonoError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SonoError>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// The value held in one `(subject, relation)` slot.
///
/// Serialized untagged, so the persisted document reads as plain JSON:
/// a string for scalar relations, an array of strings for list relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Text(String),
    List(Vec<String>),
}

impl FactValue {
    /// The individual strings, one for a scalar.
    pub fn items(&self) -> Vec<&str> {
        match self {
            FactValue::Text(s) => vec![s.as_str()],
            FactValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Case-insensitive membership.
    pub fn contains(&self, needle: &str) -> bool {
        self.items()
            .iter()
            .any(|item| item.eq_ignore_ascii_case(needle.trim()))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FactValue::List(_))
    }

    fn is_empty(&self) -> bool {
        self.items().iter().all(|item| item.trim().is_empty())
    }

    /// Drop blanks and case-insensitive duplicates, keeping first-seen order.
    fn cleaned(self) -> Self {
        match self {
            FactValue::Text(s) => FactValue::Text(s.trim().to_string()),
            FactValue::List(items) => {
                let mut out: Vec<String> = Vec::with_capacity(items.len());
                for item in items {
                    push_unique(&mut out, &item);
                }
                FactValue::List(out)
            }
        }
    }

    fn into_items(self) -> Vec<String> {
        match self {
            FactValue::Text(s) => vec![s],
            FactValue::List(items) => items,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Text(s) => write!(f, "{s}"),
            FactValue::List(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        FactValue::Text(s.to_string())
    }
}
impl From<String> for FactValue {
    fn from(s: String) -> Self {
        FactValue::Text(s)
    }
}
impl From<Vec<String>> for FactValue {
    fn from(items: Vec<String>) -> Self {
        FactValue::List(items)
    }
}
impl From<Vec<&str>> for FactValue {
    fn from(items: Vec<&str>) -> Self {
        FactValue::List(items.into_iter().map(str::to_string).collect())
    }
}

/// What a write did to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The slot did not exist and now holds the value.
    Created,
    /// A scalar slot (or a wholesale update) now holds a different value.
    Replaced,
    /// This many new items were appended to a list slot.
    Appended(usize),
    /// The value was already present; nothing changed.
    Duplicate,
    /// One slot or a whole subject was deleted.
    Removed,
    /// Empty subject, relation or value, or nothing to forget; nothing was
    /// written.
    Ignored,
}

/// Result of a mutating call.
///
/// `persisted == false` means the change lives only in memory, either
/// because this write failed to reach disk or because the store had already
/// fallen back to memory-only mode. `warning` then says why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub outcome: WriteOutcome,
    pub persisted: bool,
    pub warning: Option<String>,
}

/// Full-state backup of a [`FactStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub exported_at: DateTime<Utc>,
    pub facts: Document,
}

/// canonical subject → canonical relation → value
pub type Document = BTreeMap<String, BTreeMap<String, FactValue>>;

// ---------------------------------------------------------------------------
// FactStore
// ---------------------------------------------------------------------------

/// Persistent `(subject, relation) → value` map.
///
/// Every mutating call holds the write lock for its whole
/// read-modify-write-persist cycle; reads share the lock and see a consistent
/// document. Each persist writes a temporary file in the store's directory
/// and renames it over the store file, so the file on disk is always either
/// the previous or the new complete document.
///
/// If a persist fails the store keeps working in memory and stops touching
/// the disk for the rest of the process; [`Status::warning`] reports it.
pub struct FactStore {
    path: Option<PathBuf>,
    canon: Arc<Canonicalizer>,
    facts: RwLock<Document>,
    memory_only: AtomicBool,
}

impl FactStore {
    /// Open or create a store at `path`.
    ///
    /// The parent directory is created if missing; failing to create it is
    /// the only error. A file that cannot be parsed, or whose top level is
    /// not an object, is treated as an empty store and left as-is until the
    /// next write replaces it.
    pub fn open(path: impl AsRef<Path>, canon: Arc<Canonicalizer>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut memory_only = false;
        let facts = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => sanitize_document(&value).unwrap_or_else(|| {
                    warn!(path = %path.display(), "fact store has the wrong shape; starting empty");
                    Document::new()
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "fact store is not valid JSON; starting empty");
                    Document::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let empty = Document::new();
                if let Err(e) = write_atomic(&path, &empty) {
                    warn!(path = %path.display(), error = %e, "cannot create fact store; memory-only mode");
                    memory_only = true;
                }
                empty
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read fact store; memory-only mode");
                memory_only = true;
                Document::new()
            }
        };

        info!(path = %path.display(), subjects = facts.len(), "fact store opened");
        Ok(Self {
            path: Some(path),
            canon,
            facts: RwLock::new(facts),
            memory_only: AtomicBool::new(memory_only),
        })
    }

    /// A store that never touches the disk.
    pub fn open_in_memory(canon: Arc<Canonicalizer>) -> Self {
        Self {
            path: None,
            canon,
            facts: RwLock::new(Document::new()),
            memory_only: AtomicBool::new(true),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn canonicalizer(&self) -> &Arc<Canonicalizer> {
        &self.canon
    }

    /// True once the store has stopped writing to disk (or never did).
    pub fn is_memory_only(&self) -> bool {
        self.memory_only.load(Ordering::SeqCst)
    }

    /// Store a fact under canonical keys.
    ///
    /// Scalar relations are overwritten. List relations get each new item
    /// appended unless an equal item (ignoring case) is already there;
    /// re-adding is reported as [`WriteOutcome::Duplicate`].
    pub fn remember(
        &self,
        subject: &str,
        relation: &str,
        value: impl Into<FactValue>,
    ) -> Result<Status> {
        let Some((subject, relation, value)) = self.canonical_triple(subject, relation, value.into())
        else {
            return Ok(self.ignored());
        };
        let shape = self.canon.shape(&relation);

        let mut doc = self.write()?;
        let slots = doc.entry(subject.clone()).or_default();
        let outcome = match (shape, slots.get_mut(&relation)) {
            (RelationShape::Scalar, None) => {
                slots.insert(relation.clone(), as_scalar(value));
                WriteOutcome::Created
            }
            (RelationShape::Scalar, Some(existing)) => {
                let value = as_scalar(value);
                if existing.to_string().eq_ignore_ascii_case(&value.to_string()) {
                    WriteOutcome::Duplicate
                } else {
                    *existing = value;
                    WriteOutcome::Replaced
                }
            }
            (RelationShape::List, None) => {
                slots.insert(relation.clone(), FactValue::List(value.into_items()).cleaned());
                WriteOutcome::Created
            }
            (RelationShape::List, Some(existing)) => {
                let mut items = existing.clone().into_items();
                let before = items.len();
                for item in value.into_items() {
                    push_unique(&mut items, &item);
                }
                let added = items.len() - before;
                *existing = FactValue::List(items);
                if added == 0 {
                    WriteOutcome::Duplicate
                } else {
                    WriteOutcome::Appended(added)
                }
            }
        };
        debug!(%subject, %relation, ?outcome, "remember");
        Ok(self.persist(&doc, outcome))
    }

    /// Replace a slot wholesale, list relations included.
    pub fn update(
        &self,
        subject: &str,
        relation: &str,
        value: impl Into<FactValue>,
    ) -> Result<Status> {
        let Some((subject, relation, value)) = self.canonical_triple(subject, relation, value.into())
        else {
            return Ok(self.ignored());
        };
        let value = match self.canon.shape(&relation) {
            RelationShape::Scalar => as_scalar(value),
            RelationShape::List => FactValue::List(value.into_items()).cleaned(),
        };

        let mut doc = self.write()?;
        let outcome = match doc
            .entry(subject.clone())
            .or_default()
            .insert(relation.clone(), value)
        {
            None => WriteOutcome::Created,
            Some(_) => WriteOutcome::Replaced,
        };
        debug!(%subject, %relation, ?outcome, "update");
        Ok(self.persist(&doc, outcome))
    }

    /// Exact lookup on canonical keys.
    pub fn recall(&self, subject: &str, relation: &str) -> Result<Option<FactValue>> {
        let subject = self.canon.subject_key(subject);
        let relation = self.canon.relation(relation);
        self.get_raw(&subject, &relation)
    }

    /// Lookup on store keys exactly as given (already lowercase).
    pub fn get_raw(&self, subject_key: &str, relation_key: &str) -> Result<Option<FactValue>> {
        Ok(self
            .read()?
            .get(subject_key)
            .and_then(|slots| slots.get(relation_key))
            .cloned())
    }

    /// Every `(relation, value)` stored under a subject key.
    pub fn relations_of(&self, subject_key: &str) -> Result<Vec<(String, FactValue)>> {
        Ok(self
            .read()?
            .get(subject_key)
            .map(|slots| {
                slots
                    .iter()
                    .map(|(r, v)| (r.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Everything known about a subject, keyed by canonical relation.
    pub fn facts_about(&self, subject: &str) -> Result<BTreeMap<String, FactValue>> {
        let subject = self.canon.subject_key(subject);
        Ok(self.read()?.get(&subject).cloned().unwrap_or_default())
    }

    /// Subject keys currently holding at least one fact.
    pub fn subjects(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// Remove one slot; drops the subject once it has no relations left.
    ///
    /// The outcome is [`WriteOutcome::Removed`], or `Ignored` when there was
    /// nothing to remove.
    pub fn forget(&self, subject: &str, relation: &str) -> Result<Status> {
        let subject = self.canon.subject_key(subject);
        let relation = self.canon.relation(relation);

        let mut doc = self.write()?;
        let Some(slots) = doc.get_mut(&subject) else {
            return Ok(self.ignored());
        };
        if slots.remove(&relation).is_none() {
            return Ok(self.ignored());
        }
        if slots.is_empty() {
            doc.remove(&subject);
        }
        debug!(%subject, %relation, "forget");
        Ok(self.persist(&doc, WriteOutcome::Removed))
    }

    /// Remove every fact about a subject.
    pub fn forget_subject(&self, subject: &str) -> Result<Status> {
        let subject = self.canon.subject_key(subject);
        let mut doc = self.write()?;
        if doc.remove(&subject).is_none() {
            return Ok(self.ignored());
        }
        debug!(%subject, "forget subject");
        Ok(self.persist(&doc, WriteOutcome::Removed))
    }

    /// Remove everything.
    pub fn clear_all(&self) -> Result<Status> {
        let mut doc = self.write()?;
        doc.clear();
        Ok(self.persist(&doc, WriteOutcome::Replaced))
    }

    /// Copy of the whole document, timestamped.
    pub fn export(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            exported_at: Utc::now(),
            facts: self.read()?.clone(),
        })
    }

    /// Replace the whole document with a snapshot's facts.
    pub fn import(&self, snapshot: Snapshot) -> Result<Status> {
        let facts = snapshot
            .facts
            .into_iter()
            .filter_map(|(subject, slots)| {
                let slots: BTreeMap<String, FactValue> = slots
                    .into_iter()
                    .map(|(r, v)| (key_form(&r), v.cleaned()))
                    .filter(|(r, v)| !r.is_empty() && !v.is_empty())
                    .collect();
                let subject = key_form(&subject);
                (!subject.is_empty() && !slots.is_empty()).then_some((subject, slots))
            })
            .collect();
        self.replace_all(facts)
    }

    /// Replace the whole document from loosely-shaped JSON: either a
    /// snapshot (`{"facts": {...}}`) or a bare subject → relation → value
    /// object. Primitive values are stringified; nested objects, nulls and
    /// non-object subjects are dropped. Returns `Ok(None)` when the top level
    /// has the wrong shape, leaving the store untouched.
    pub fn import_value(&self, value: &serde_json::Value) -> Result<Option<Status>> {
        let body = value
            .get("facts")
            .filter(|facts| facts.is_object())
            .unwrap_or(value);
        match sanitize_document(body) {
            Some(doc) => self.replace_all(doc).map(Some),
            None => Ok(None),
        }
    }

    fn replace_all(&self, facts: Document) -> Result<Status> {
        let mut doc = self.write()?;
        *doc = facts;
        info!(subjects = doc.len(), "fact store imported");
        Ok(self.persist(&doc, WriteOutcome::Replaced))
    }

    fn canonical_triple(
        &self,
        subject: &str,
        relation: &str,
        value: FactValue,
    ) -> Option<(String, String, FactValue)> {
        let subject = self.canon.subject_key(subject);
        let mut relation = self.canon.relation(relation);
        let mut value = value.cleaned();
        if let FactValue::Text(text) = &value {
            let (folded, rest) = self.canon.fold_favorite(&relation, text);
            if folded != relation {
                relation = folded;
                value = FactValue::Text(rest);
            }
        }
        if subject.is_empty() || relation.is_empty() || value.is_empty() {
            return None;
        }
        Some((subject, relation, value))
    }

    fn ignored(&self) -> Status {
        Status {
            outcome: WriteOutcome::Ignored,
            persisted: !self.is_memory_only(),
            warning: None,
        }
    }

    /// Write `doc` to disk unless memory-only. The caller still holds the
    /// write lock, so no other mutation can interleave.
    fn persist(&self, doc: &Document, outcome: WriteOutcome) -> Status {
        let Some(path) = self.path.as_deref().filter(|_| !self.is_memory_only()) else {
            return Status {
                outcome,
                persisted: false,
                warning: self
                    .path
                    .as_ref()
                    .map(|_| "fact store is in memory-only mode".to_string()),
            };
        };
        match write_atomic(path, doc) {
            Ok(()) => Status {
                outcome,
                persisted: true,
                warning: None,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "persist failed; switching to memory-only mode");
                self.memory_only.store(true, Ordering::SeqCst);
                Status {
                    outcome,
                    persisted: false,
                    warning: Some(format!(
                        "could not save to {}: {e}; changes are kept in memory only",
                        path.display()
                    )),
                }
            }
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Document>> {
        self.facts
            .read()
            .map_err(|_| SonoError::Internal("fact store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Document>> {
        self.facts
            .write()
            .map_err(|_| SonoError::Internal("fact store lock poisoned".into()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serialize to a temporary file beside `path`, flush it to disk, then
/// rename it over `path`.
fn write_atomic(path: &Path, doc: &Document) -> Result<()> {
    replace_file(path, |file| Ok(serde_json::to_writer_pretty(file, doc)?))
}

/// Fill a temporary file beside `path` with `fill`, then rename it over
/// `path`. On any error the temporary file is deleted and `path` is left
/// as it was.
fn replace_file(path: &Path, fill: impl FnOnce(&mut fs::File) -> Result<()>) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".sono-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SonoError::Io(e.error))?;
    Ok(())
}

/// Trimmed, lowercase, single-spaced store key.
fn key_form(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn push_unique(items: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() && !items.iter().any(|i| i.eq_ignore_ascii_case(item)) {
        items.push(item.to_string());
    }
}

fn as_scalar(value: FactValue) -> FactValue {
    match value {
        FactValue::Text(_) => value,
        FactValue::List(_) => FactValue::Text(value.to_string()),
    }
}

fn stringify(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Accept any JSON object of objects, keeping only the parts that fit the
/// document shape. `None` when the top level is not an object.
fn sanitize_document(value: &serde_json::Value) -> Option<Document> {
    let subjects = value.as_object()?;
    let mut doc = Document::new();
    for (subject, slots) in subjects {
        let (subject, Some(slots)) = (key_form(subject), slots.as_object()) else {
            continue;
        };
        let mut clean = BTreeMap::new();
        for (relation, value) in slots {
            let relation = key_form(relation);
            let value = match value {
                serde_json::Value::Array(items) => {
                    let mut out = Vec::new();
                    for item in items.iter().filter_map(stringify) {
                        push_unique(&mut out, &item);
                    }
                    (!out.is_empty()).then_some(FactValue::List(out))
                }
                other => stringify(other).map(FactValue::Text),
            };
            if let (false, Some(value)) = (relation.is_empty(), value) {
                clean.insert(relation, value);
            }
        }
        if !subject.is_empty() && !clean.is_empty() {
            doc.entry(subject).or_insert_with(BTreeMap::new).extend(clean);
        }
    }
    Some(doc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
