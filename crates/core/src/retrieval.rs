//! Tiered question answering over a [`FactStore`].
//!
//! [`RetrievalEngine::answer`] walks a fixed chain and stops at the first
//! tier that produces something:
//!
//! 0. **Consolidated**: relations with a registered [`Consolidator`] merge
//!    their scattered sources first.
//! 1. **Exact**: canonical subject × the relation as asked.
//! 2. **Alias-variant**: every subject spelling × every synonym of the
//!    relation.
//! 3. **Fuzzy**: the stored relation key with the best [`ratio`] to the
//!    question, if it clears [`Thresholds::fuzzy_relation`].
//! 4. **Semantic**: cosine similarity between the question's embedding and
//!    the subject's stored triple embeddings, if an [`Embedder`] and a
//!    [`SemanticIndex`] are attached and the best score clears
//!    [`Thresholds::semantic`].
//!
//! When every tier misses the answer is `None`; nothing is ever made up.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::canonical::{normalize_relation, Canonicalizer, RelationResolution};
use crate::consolidate::{Consolidator, EntityConsolidator};
use crate::semantic::SemanticIndex;
use crate::similarity::{accepts, is_prefixed_form, ratio, Thresholds};
use crate::vector::TripleKey;
use crate::{FactStore, FactValue, Result};

/// Turns text into an embedding vector. Implemented outside the core.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Which tier produced an [`Answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Consolidated,
    Exact,
    AliasVariant,
    Fuzzy,
    Semantic,
}

/// A stored value found for a question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Canonical display name ("Pam").
    pub subject: String,
    /// The relation key the value was found under.
    pub relation: String,
    pub value: FactValue,
    pub tier: Tier,
    /// Similarity score for the fuzzy and semantic tiers.
    pub score: Option<f32>,
}

pub struct RetrievalEngine {
    canon: Arc<Canonicalizer>,
    thresholds: Thresholds,
    consolidators: Vec<Box<dyn Consolidator>>,
    embedder: Option<Arc<dyn Embedder>>,
    semantic: Option<Arc<SemanticIndex>>,
}

impl RetrievalEngine {
    /// Engine with default thresholds, the pets consolidator, and no
    /// semantic tier.
    pub fn new(canon: Arc<Canonicalizer>) -> Self {
        Self {
            canon,
            thresholds: Thresholds::default(),
            consolidators: vec![Box::new(EntityConsolidator::pets())],
            embedder: None,
            semantic: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_consolidator(mut self, consolidator: Box<dyn Consolidator>) -> Self {
        self.consolidators.push(consolidator);
        self
    }

    pub fn without_consolidators(mut self) -> Self {
        self.consolidators.clear();
        self
    }

    /// Enable the semantic tier.
    pub fn with_semantic(mut self, embedder: Arc<dyn Embedder>, index: Arc<SemanticIndex>) -> Self {
        self.embedder = Some(embedder);
        self.semantic = Some(index);
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Answer "what is `subject`'s `relation`?" from `store`.
    ///
    /// Misses are `Ok(None)`. Errors only come from a poisoned store lock;
    /// embedding and semantic-index failures count as a semantic miss.
    pub fn answer(&self, store: &FactStore, subject: &str, relation: &str) -> Result<Option<Answer>> {
        let name = self.canon.subject(subject);
        let asked = normalize_relation(relation);
        if name.is_empty() || asked.is_empty() {
            return Ok(None);
        }
        let subject_key = name.to_lowercase();
        let resolved = self.canon.resolve_relation(relation);
        let subjects = self.canon.subject_variants(subject);
        let found = |relation: &str, value: FactValue, tier: Tier, score: Option<f32>| {
            debug!(subject = %name, %relation, ?tier, ?score, "answered");
            Some(Answer {
                subject: name.clone(),
                relation: relation.to_string(),
                value,
                tier,
                score,
            })
        };

        if let Some(consolidator) = self
            .consolidators
            .iter()
            .find(|c| c.relation() == resolved.key)
        {
            let mut slots = Vec::new();
            for s in &subjects {
                slots.extend(store.relations_of(s)?);
            }
            if let Some(items) = consolidator.consolidate(&slots) {
                return Ok(found(consolidator.relation(), FactValue::List(items), Tier::Consolidated, None));
            }
        }

        if let Some(value) = store.get_raw(&subject_key, &asked)? {
            return Ok(found(&asked, value, Tier::Exact, None));
        }

        // Guessed relation names stay out of the alias tier; fuzzy
        // matching is the next tier's job.
        let relations = match resolved.resolution {
            RelationResolution::Fuzzy => vec![asked.clone()],
            _ => self.canon.relation_variants(&resolved.key),
        };
        for s in &subjects {
            for r in &relations {
                if s == &subject_key && r == &asked {
                    continue;
                }
                if let Some(value) = store.get_raw(s, r)? {
                    return Ok(found(r, value, Tier::AliasVariant, None));
                }
            }
        }

        if let Some((key, value, score)) = self.fuzzy(store, &subjects, &asked, resolved.is_exact())? {
            return Ok(found(&key, value, Tier::Fuzzy, Some(score as f32)));
        }

        if let Some((key, value, score)) = self.semantic(store, &subjects, &name, &asked)? {
            return Ok(found(&key, value, Tier::Semantic, Some(score)));
        }

        debug!(subject = %name, relation = %asked, "no answer");
        Ok(None)
    }

    /// Best stored relation key by lexical similarity to the question.
    ///
    /// A question that names a registered relation never matches a different
    /// registered key: "godmother" is not a misspelling of "grandmother".
    fn fuzzy(
        &self,
        store: &FactStore,
        subjects: &[String],
        asked: &str,
        asked_is_registered: bool,
    ) -> Result<Option<(String, FactValue, f64)>> {
        let mut best: Option<(String, FactValue, f64)> = None;
        for s in subjects {
            for (key, value) in store.relations_of(s)? {
                if is_prefixed_form(asked, &key)
                    || (asked_is_registered && self.is_registered(&key))
                {
                    continue;
                }
                let score = ratio(asked, &key);
                if best.as_ref().map_or(true, |(_, _, b)| score > *b) {
                    best = Some((key, value, score));
                }
            }
        }
        Ok(best.filter(|(_, _, score)| accepts(*score, self.thresholds.fuzzy_relation)))
    }

    /// True when `key` is spelled exactly as a registered canonical relation.
    fn is_registered(&self, key: &str) -> bool {
        let resolved = self.canon.resolve_relation(key);
        resolved.resolution == RelationResolution::Canonical && resolved.key == key
    }

    /// Best stored triple by embedding similarity to the question.
    fn semantic(
        &self,
        store: &FactStore,
        subjects: &[String],
        name: &str,
        asked: &str,
    ) -> Result<Option<(String, FactValue, f32)>> {
        let (Some(embedder), Some(index)) = (&self.embedder, &self.semantic) else {
            return Ok(None);
        };

        let mut allowed = HashSet::new();
        for s in subjects {
            for (relation, value) in store.relations_of(s)? {
                for item in value.items() {
                    allowed.insert(TripleKey::new(s, &relation, item));
                }
            }
        }
        if allowed.is_empty() {
            return Ok(None);
        }

        let query = match embedder.embed(&format!("{name}'s {asked}")) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed; skipping semantic tier");
                return Ok(None);
            }
        };
        let (key, score) = match index.best_match(&query, &allowed) {
            Ok(Some(hit)) => hit,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "semantic search failed; skipping semantic tier");
                return Ok(None);
            }
        };
        if !accepts(f64::from(score), f64::from(self.thresholds.semantic)) {
            debug!(triple = %key, score, "semantic best below threshold");
            return Ok(None);
        }
        Ok(store
            .get_raw(&key.subject, &key.relation)?
            .map(|value| (key.relation, value, score)))
    }
}
