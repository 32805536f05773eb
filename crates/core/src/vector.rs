//! Flat cosine-similarity index over triple embeddings.
//!
//! One entry per stored `(subject, relation, value item)`; list relations
//! contribute one entry per item. The index is a read-optimised cache of the
//! redb `embeddings` table owned by [`SemanticIndex`](crate::SemanticIndex)
//! and is rebuilt from it on open.
//!
//! Search is brute force (`O(n·d)`), which is plenty for a personal memory
//! of a few thousand triples.

use crate::{Result, SonoError};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Identity of one embedded triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripleKey {
    pub subject: String,
    pub relation: String,
    pub value: String,
}

/// Field separator for the flat string form (ASCII unit separator).
const SEP: char = '\u{1f}';

impl TripleKey {
    pub fn new(subject: &str, relation: &str, value: &str) -> Self {
        Self {
            subject: subject.to_string(),
            relation: relation.to_string(),
            value: value.to_string(),
        }
    }

    /// Flat form used as the redb key.
    pub fn encode(&self) -> String {
        format!("{}{SEP}{}{SEP}{}", self.subject, self.relation, self.value)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, SEP);
        let subject = parts.next()?;
        let relation = parts.next()?;
        let value = parts.next()?;
        Some(Self::new(subject, relation, value))
    }

    /// Text handed to the embedder for this triple: "Pam husband: Rickey".
    pub fn embedding_text(&self) -> String {
        format!("{} {}: {}", self.subject, self.relation, self.value)
    }
}

impl fmt::Display for TripleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.relation, self.value)
    }
}

/// Brute-force embedding index keyed by [`TripleKey`].
#[derive(Debug, Default, Clone)]
pub struct VectorIndex {
    keys: Vec<TripleKey>,
    vectors: Vec<Vec<f32>>,
    /// Fixed by the first insert.
    dim: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite the embedding for `key`.
    pub fn insert(&mut self, key: TripleKey, embedding: Vec<f32>) -> Result<()> {
        check_dim(self.dim, &embedding)?;
        self.dim.get_or_insert(embedding.len());
        match self.keys.iter().position(|k| k == &key) {
            Some(pos) => self.vectors[pos] = embedding,
            None => {
                self.keys.push(key);
                self.vectors.push(embedding);
            }
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &TripleKey> {
        self.keys.iter()
    }

    pub fn contains(&self, key: &TripleKey) -> bool {
        self.keys.contains(key)
    }

    /// Drop every entry matching `pred`; returns the dropped keys.
    pub fn remove_where(&mut self, pred: impl Fn(&TripleKey) -> bool) -> Vec<TripleKey> {
        let mut removed = Vec::new();
        let mut i = 0;
        while i < self.keys.len() {
            if pred(&self.keys[i]) {
                self.vectors.swap_remove(i);
                removed.push(self.keys.swap_remove(i));
            } else {
                i += 1;
            }
        }
        if self.keys.is_empty() {
            self.dim = None;
        }
        removed
    }

    /// Best-scoring entry among `allowed`, or `None` when nothing scores.
    pub fn best(&self, query: &[f32], allowed: &HashSet<TripleKey>) -> Option<(TripleKey, f32)> {
        self.search(query, 1, allowed).into_iter().next()
    }

    /// Up to `k` entries from `allowed`, highest cosine similarity first.
    ///
    /// A zero query vector has no direction and matches nothing.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allowed: &HashSet<TripleKey>,
    ) -> Vec<(TripleKey, f32)> {
        let query_norm = norm(query);
        if k == 0 || allowed.is_empty() || query_norm == 0.0 {
            return Vec::new();
        }
        let mut hits: Vec<(TripleKey, f32)> = self
            .keys
            .iter()
            .zip(&self.vectors)
            .filter(|(key, _)| allowed.contains(*key))
            .map(|(key, v)| (key.clone(), cosine(query, query_norm, v)))
            .collect();
        // Ties break on key order so results are deterministic.
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits
    }

    pub(crate) fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Reject empty vectors and vectors whose length disagrees with `dim`.
pub(crate) fn check_dim(dim: Option<usize>, embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(SonoError::InvalidEmbedding(
            "embedding must not be empty".into(),
        ));
    }
    match dim {
        Some(d) if d != embedding.len() => Err(SonoError::InvalidEmbedding(format!(
            "embedding dimension mismatch: expected {d}, got {}",
            embedding.len()
        ))),
        _ => Ok(()),
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine of the angle between `a` (norm precomputed) and `b`; `0.0` for a
/// zero `b` or mismatched lengths.
fn cosine(a: &[f32], a_norm: f32, b: &[f32]) -> f32 {
    let b_norm = norm(b);
    if a.len() != b.len() || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}
