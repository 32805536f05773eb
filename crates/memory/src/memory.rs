//! High-level personal fact memory built on Sono.
//!
//! [`Memory`] owns one fact store, its canonicalizer, the intent parser, the
//! retrieval engine and the embedding index, and keeps them in step. It is
//! the one object a hosting application (HTTP handler, voice loop, CLI)
//! needs to hold.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sono_memory::{Memory, MemoryConfig, Reply};
//!
//! let memory = Memory::open(&MemoryConfig::at("./pam.json")).unwrap();
//!
//! memory.respond("Pam's husband is Rickey.").unwrap();
//! match memory.respond("who is pam's husband?").unwrap() {
//!     Reply::Answered { text, .. } => assert_eq!(text, "Rickey is Pam's husband."),
//!     other => panic!("unexpected {other:?}"),
//! }
//!
//! // Structured calls skip the parser.
//! memory.remember("pam", "children", vec!["Ty", "Aja"]).unwrap();
//! assert!(memory.recall("pam", "kids").unwrap().is_some());
//! ```
//!
//! Embeddings and answer rewriting are optional. Without an
//! [`Embedder`] the semantic tier is skipped; without a [`Rewriter`]
//! answers are the plain sentences from [`phrasing`].

pub mod config;
pub mod phrasing;
#[cfg(feature = "http-providers")]
pub mod providers;

pub use config::{MemoryConfig, ProviderConfig};
pub use phrasing::Rewriter;
pub use sono::{
    Answer, Embedder, FactValue, Intent, IntentKind, Snapshot, Status, Thresholds, Tier,
    WriteOutcome,
};

pub use sono::SonoError as Error;
pub type Result<T> = std::result::Result<T, Error>;

use sono::{CanonicalIndex, Canonicalizer, FactStore, IntentParser, RetrievalEngine, SemanticIndex, TripleKey};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What [`Memory::respond`] did with an utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A fact was stored (or was already there; see `status.outcome`).
    Taught { intent: Intent, status: Status },
    /// A slot was replaced.
    Updated { intent: Intent, status: Status },
    /// `relation` is `None` when the whole subject was forgotten.
    Forgotten {
        subject: String,
        relation: Option<String>,
        removed: bool,
    },
    Answered { answer: Answer, text: String },
    /// A well-formed question nothing in memory answers.
    NoAnswer { subject: String, relation: String },
    NotUnderstood,
}

/// Personal fact memory: parse, store, and answer.
pub struct Memory {
    canon: Arc<Canonicalizer>,
    parser: IntentParser,
    store: FactStore,
    thresholds: Thresholds,
    engine: RetrievalEngine,
    semantic: Arc<SemanticIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    rewriter: Option<Arc<dyn Rewriter>>,
}

impl Memory {
    /// Open the store (and embedding index, if configured) described by
    /// `config`, wiring in HTTP providers when the config names them.
    ///
    /// Fails only if the store directory cannot be created or the index
    /// file cannot be opened.
    pub fn open(config: &MemoryConfig) -> Result<Self> {
        let canon = Arc::new(canonicalizer(config));
        let store = FactStore::open(&config.store_path, canon.clone())?;
        let semantic = match &config.index_path {
            Some(path) => SemanticIndex::open(path)?,
            None => SemanticIndex::open_in_memory()?,
        };
        let memory = Self::assemble(canon, store, semantic, config.thresholds);
        info!(
            store = %config.store_path.display(),
            memory_only = memory.store.is_memory_only(),
            "memory opened"
        );
        Ok(memory.with_configured_providers(config))
    }

    /// A memory that never touches the disk.
    pub fn open_in_memory() -> Result<Self> {
        let config = MemoryConfig::default();
        let canon = Arc::new(canonicalizer(&config));
        let store = FactStore::open_in_memory(canon.clone());
        let semantic = SemanticIndex::open_in_memory()?;
        Ok(Self::assemble(canon, store, semantic, config.thresholds))
    }

    fn assemble(
        canon: Arc<Canonicalizer>,
        store: FactStore,
        semantic: SemanticIndex,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            parser: IntentParser::new(canon.clone()),
            engine: RetrievalEngine::new(canon.clone()).with_thresholds(thresholds),
            canon,
            store,
            thresholds,
            semantic: Arc::new(semantic),
            embedder: None,
            rewriter: None,
        }
    }

    #[cfg(feature = "http-providers")]
    fn with_configured_providers(mut self, config: &MemoryConfig) -> Self {
        if let Some(provider) = &config.embedding {
            self = self.with_embedder(Arc::new(providers::OpenAiEmbedder::new(provider.clone())));
        }
        if let Some(provider) = &config.rewrite {
            self = self.with_rewriter(Arc::new(providers::OpenAiRewriter::new(provider.clone())));
        }
        self
    }

    #[cfg(not(feature = "http-providers"))]
    fn with_configured_providers(self, config: &MemoryConfig) -> Self {
        if config.embedding.is_some() || config.rewrite.is_some() {
            warn!("providers configured but the http-providers feature is disabled");
        }
        self
    }

    /// Enable the semantic tier and write-time embedding.
    ///
    /// Facts already in the store are embedded now; failures are logged and
    /// leave those triples unembedded.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.engine = RetrievalEngine::new(self.canon.clone())
            .with_thresholds(self.thresholds)
            .with_semantic(embedder.clone(), self.semantic.clone());
        self.embedder = Some(embedder);
        match self.store.subjects() {
            Ok(subjects) => subjects.iter().for_each(|s| self.sync_embeddings(s)),
            Err(e) => warn!(error = %e, "could not list subjects for embedding"),
        }
        self
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn Rewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canon
    }

    /// Classify an utterance; never fails.
    pub fn parse_utterance(&self, text: &str) -> Intent {
        self.parser.parse(text)
    }

    /// Store a fact. Embedding it afterwards is best-effort.
    pub fn remember(
        &self,
        subject: &str,
        relation: &str,
        value: impl Into<FactValue>,
    ) -> Result<Status> {
        let status = self.store.remember(subject, relation, value)?;
        self.after_write(subject, &status);
        Ok(status)
    }

    /// Replace a slot wholesale.
    pub fn update(
        &self,
        subject: &str,
        relation: &str,
        value: impl Into<FactValue>,
    ) -> Result<Status> {
        let status = self.store.update(subject, relation, value)?;
        self.after_write(subject, &status);
        Ok(status)
    }

    /// Exact lookup on canonical keys.
    pub fn recall(&self, subject: &str, relation: &str) -> Result<Option<FactValue>> {
        self.store.recall(subject, relation)
    }

    /// Remove one slot. Returns whether anything was removed.
    pub fn forget(&self, subject: &str, relation: &str) -> Result<bool> {
        let status = self.store.forget(subject, relation)?;
        self.after_write(subject, &status);
        Ok(status.outcome == WriteOutcome::Removed)
    }

    /// Remove every fact about a subject.
    pub fn forget_subject(&self, subject: &str) -> Result<bool> {
        let status = self.store.forget_subject(subject)?;
        self.after_write(subject, &status);
        Ok(status.outcome == WriteOutcome::Removed)
    }

    /// Everything known about a subject.
    pub fn facts_about(&self, subject: &str) -> Result<BTreeMap<String, FactValue>> {
        self.store.facts_about(subject)
    }

    /// Tiered lookup; `None` when no tier matches.
    pub fn answer(&self, subject: &str, relation: &str) -> Result<Option<Answer>> {
        self.engine.answer(&self.store, subject, relation)
    }

    /// Parse an utterance and act on it.
    pub fn respond(&self, text: &str) -> Result<Reply> {
        let intent = self.parse_utterance(text);
        let reply = match intent.kind {
            IntentKind::Teach | IntentKind::Update => {
                let Some(value) = intent.value.clone() else {
                    return Ok(Reply::NotUnderstood);
                };
                if intent.kind == IntentKind::Teach {
                    let status = self.remember(&intent.subject, &intent.relation, value)?;
                    Reply::Taught { intent, status }
                } else {
                    let status = self.update(&intent.subject, &intent.relation, value)?;
                    Reply::Updated { intent, status }
                }
            }
            IntentKind::Forget if intent.relation.is_empty() => Reply::Forgotten {
                removed: self.forget_subject(&intent.subject)?,
                subject: intent.subject,
                relation: None,
            },
            IntentKind::Forget => Reply::Forgotten {
                removed: self.forget(&intent.subject, &intent.relation)?,
                subject: intent.subject,
                relation: Some(intent.relation),
            },
            IntentKind::Ask => match self.answer(&intent.subject, &intent.relation)? {
                Some(answer) => Reply::Answered {
                    text: self.phrase(&answer),
                    answer,
                },
                None => Reply::NoAnswer {
                    subject: intent.subject,
                    relation: intent.relation,
                },
            },
            IntentKind::Unknown => Reply::NotUnderstood,
        };
        debug!(?reply, "respond");
        Ok(reply)
    }

    /// One sentence for an answer, rewritten for fluency when a rewriter is
    /// attached. A failed or empty rewrite returns the plain sentence.
    pub fn phrase(&self, answer: &Answer) -> String {
        let relation = match answer.tier {
            Tier::Consolidated => answer.relation.clone(),
            _ => self.canon.relation(&answer.relation),
        };
        let plain = phrasing::sentence(&answer.subject, &relation, &answer.value);
        let Some(rewriter) = &self.rewriter else {
            return plain;
        };
        match rewriter.rewrite(&plain) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => plain,
            Err(e) => {
                warn!(error = %e, "rewrite failed; using plain answer");
                plain
            }
        }
    }

    pub fn export(&self) -> Result<Snapshot> {
        self.store.export()
    }

    /// Replace all facts with a snapshot and re-sync embeddings.
    pub fn import(&self, snapshot: Snapshot) -> Result<Status> {
        let status = self.store.import(snapshot)?;
        if let Err(e) = self.semantic.clear() {
            warn!(error = %e, "could not clear embedding index");
        }
        for subject in self.store.subjects()? {
            self.sync_embeddings(&subject);
        }
        Ok(status)
    }

    fn after_write(&self, subject: &str, status: &Status) {
        if let Some(warning) = &status.warning {
            warn!(%warning, "change kept in memory only");
        }
        if status.outcome != WriteOutcome::Ignored {
            self.sync_embeddings(&self.canon.subject_key(subject));
        }
    }

    /// Make the subject's embeddings match its stored triples: drop stale
    /// ones, embed missing ones. Never fails; problems are logged.
    fn sync_embeddings(&self, subject_key: &str) {
        let current: HashSet<TripleKey> = match self.store.relations_of(subject_key) {
            Ok(slots) => slots
                .iter()
                .flat_map(|(relation, value)| {
                    value
                        .items()
                        .into_iter()
                        .map(|item| TripleKey::new(subject_key, relation, item))
                        .collect::<Vec<_>>()
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, subject = subject_key, "could not read facts for embedding");
                return;
            }
        };
        if let Err(e) = self.semantic.retain_subject(subject_key, &current) {
            warn!(error = %e, subject = subject_key, "could not drop stale embeddings");
        }
        let Some(embedder) = &self.embedder else {
            return;
        };
        let mut missing: Vec<TripleKey> = current
            .into_iter()
            .filter(|k| !self.semantic.contains(k).unwrap_or(true))
            .collect();
        missing.sort();
        for key in missing {
            let vector = match embedder.embed(&key.embedding_text()) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, triple = %key, "embedding failed; semantic tier will miss this fact");
                    return;
                }
            };
            if let Err(e) = self.semantic.insert(key.clone(), vector) {
                warn!(error = %e, triple = %key, "could not store embedding");
            }
        }
    }
}

fn canonicalizer(config: &MemoryConfig) -> Canonicalizer {
    let mut index = CanonicalIndex::builtin();
    for (alias, canonical) in &config.subject_aliases {
        index.add_subject_alias(alias, canonical);
    }
    Canonicalizer::new(index).with_relation_threshold(config.thresholds.canonical_relation)
}
