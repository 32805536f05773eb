//! Subject and relation canonicalization.
//!
//! A [`CanonicalIndex`] holds the alias tables and the relation-shape
//! registry; a [`Canonicalizer`] resolves raw spellings against it.
//!
//! Subjects are open-world: a spelling missing from the alias table becomes
//! a new canonical subject (title-cased). Relations resolve through the
//! synonym table first, then by [`ratio`] against the known canonical keys,
//! and otherwise pass through as a new free-form key.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::similarity::{accepts, is_prefixed_form, ratio, CANONICAL_RELATION_THRESHOLD};

/// Declared value shape of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationShape {
    /// A single string; last write wins.
    Scalar,
    /// An ordered, case-insensitively de-duplicated list of strings.
    List,
}

/// How a relation spelling was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationResolution {
    /// The input already was a canonical key.
    Canonical,
    /// Found in the synonym table.
    Synonym,
    /// Closest canonical key by lexical similarity.
    Fuzzy,
    /// Unknown; kept as a new free-form key.
    Passthrough,
}

/// Result of [`Canonicalizer::resolve_relation`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRelation {
    pub key: String,
    pub resolution: RelationResolution,
}

impl ResolvedRelation {
    /// True when the key came from the tables rather than from guessing.
    pub fn is_exact(&self) -> bool {
        matches!(
            self.resolution,
            RelationResolution::Canonical | RelationResolution::Synonym
        )
    }

    /// True when the key names a registered relation.
    pub fn is_known(&self) -> bool {
        self.resolution != RelationResolution::Passthrough
    }
}

/// The bare "favorite" qualifier, before its noun has been folded in.
pub const FAVORITE: &str = "favorite";

const FAVORITE_QUALIFIERS: &[&str] = &["fav", "fave", "favorite", "favourite"];

static FAVORITE_NOUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:is\s+|are\s+)?(colou?r|drink|song|show|movie|team|sport|foods?|meals?|restaurants?)\s+(?:is\s+|are\s+|=\s*)?(.+)$",
    )
    .expect("favorite noun pattern")
});

/// A canonical relation: its key, declared shape, and synonyms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub key: String,
    pub shape: RelationShape,
    pub synonyms: Vec<String>,
}

const DEFAULT_RELATIONS: &[(&str, RelationShape, &[&str])] = {
    use RelationShape::{List, Scalar};
    &[
        ("full name", Scalar, &["fullname", "name"]),
        ("middle name", Scalar, &["middlename"]),
        ("nickname", Scalar, &["nick name", "nicknames"]),
        ("husband", Scalar, &["spouse", "hubby"]),
        ("wife", Scalar, &["wifey"]),
        ("mother", Scalar, &["mom", "mum", "mama", "mommy", "ma"]),
        ("father", Scalar, &["dad", "daddy", "papa", "pa", "pop"]),
        ("stepmother", Scalar, &["step mother", "stepmom", "step mom"]),
        ("stepfather", Scalar, &["step father", "stepdad", "step dad"]),
        ("grandmother", Scalar, &["grandma", "grandmom", "granny", "nana"]),
        ("grandfather", Scalar, &["grandpa", "granddad", "grandad", "granddaddy"]),
        ("grandparents", List, &["grandparent"]),
        ("godmother", Scalar, &["god mother"]),
        ("godfather", Scalar, &["god father"]),
        ("godparents", List, &["godparent", "god parents"]),
        ("children", List, &["child", "kid", "kids", "sons and daughters"]),
        ("grandchildren", List, &["grandkids", "grandkid", "grandchild"]),
        (
            "siblings",
            List,
            &["sibling", "brothers", "sisters", "brother", "sister", "brothers and sisters"],
        ),
        ("parents", List, &["parent"]),
        ("raised by", List, &["raised", "raisedby", "primary caregiver"]),
        ("birthday", Scalar, &["dob", "date of birth", "birth date", "birthdate"]),
        (
            "birthplace",
            Scalar,
            &["born", "from", "place of birth", "where born"],
        ),
        ("hometown", Scalar, &["home town", "home", "grew up", "grow up"]),
        (
            "favorite restaurants",
            List,
            &["restaurants", "favorite restaurant", "favourite restaurants"],
        ),
        (
            "favorite foods",
            List,
            &["foods", "meals", "favorite meals", "favorite meal", "favorite food", "favourite foods"],
        ),
        (
            "favorite color",
            Scalar,
            &["fav color", "fave color", "favourite color", "favorite colour", "color", "colour"],
        ),
        ("favorite drink", Scalar, &["fav drink", "drink"]),
        ("favorite song", Scalar, &["fav song", "song"]),
        ("favorite show", Scalar, &["fav show", "show", "comfort show", "tv show"]),
        ("favorite movie", Scalar, &["fav movie", "movie", "film"]),
        ("favorite team", Scalar, &["fav team", "team"]),
        ("favorite sport", Scalar, &["fav sport", "sport"]),
        ("coffee order", Scalar, &["coffee", "coffeeorder"]),
        (
            "schools attended",
            List,
            &["schools", "school", "education", "educated at"],
        ),
        ("pets", List, &["pet", "pet(s)", "animals", "dog", "dogs"]),
        ("occupation", Scalar, &["job", "work", "career", "profession"]),
        ("phone", Scalar, &["cell", "mobile", "telephone", "phone number"]),
        ("doctor", Scalar, &["doc", "physician"]),
        ("allergies", List, &["allergy"]),
        ("medications", List, &["meds", "medicine", "medicines"]),
        ("emergency contact", Scalar, &[]),
        ("church", Scalar, &[]),
        ("mission", Scalar, &[]),
        ("purpose", Scalar, &[]),
        ("goal", Scalar, &["goals"]),
    ]
};

const DEFAULT_SUBJECT_ALIASES: &[(&str, &str)] = &[
    ("pam", "Pam"),
    ("pams", "Pam"),
    ("pamela", "Pam"),
    ("pam butler", "Pam"),
    ("pamela butler", "Pam"),
    ("rickey", "Rickey"),
    ("ricky", "Rickey"),
    ("rickey butler", "Rickey"),
    ("ricky butler", "Rickey"),
    ("ty", "Ty"),
    ("tyease", "Ty"),
    ("big mama", "Mamie Sorrell"),
    ("mama lil", "Lillian Miller"),
];

/// Alias → canonical tables for subjects and relations, plus the shape
/// registry. Built once; read-mostly.
#[derive(Debug, Clone, Default)]
pub struct CanonicalIndex {
    /// Lowercased alias → canonical display name.
    subjects: HashMap<String, String>,
    /// Registered relations in declaration order.
    relations: Vec<RelationDef>,
    /// Normalized spelling (canonical or synonym) → index into `relations`.
    relation_lookup: HashMap<String, usize>,
}

impl CanonicalIndex {
    /// An index with no aliases and no registered relations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a subject alias. Both sides are trimmed; the alias is matched
    /// case-insensitively.
    pub fn with_subject_alias(mut self, alias: &str, canonical: &str) -> Self {
        self.add_subject_alias(alias, canonical);
        self
    }

    pub fn add_subject_alias(&mut self, alias: &str, canonical: &str) {
        let canonical = canonical.trim();
        let alias = clean_subject(alias).to_lowercase();
        if alias.is_empty() || canonical.is_empty() {
            return;
        }
        self.subjects
            .entry(canonical.to_lowercase())
            .or_insert_with(|| canonical.to_string());
        self.subjects.insert(alias, canonical.to_string());
    }

    /// Register a canonical relation with its shape and synonyms.
    ///
    /// Re-registering a key replaces its shape and adds the new synonyms.
    pub fn with_relation(mut self, key: &str, shape: RelationShape, synonyms: &[&str]) -> Self {
        let key = normalize_relation(key);
        if key.is_empty() {
            return self;
        }
        let idx = match self.relation_lookup.get(&key) {
            Some(&idx) if self.relations[idx].key == key => {
                self.relations[idx].shape = shape;
                idx
            }
            _ => {
                self.relations.push(RelationDef {
                    key: key.clone(),
                    shape,
                    synonyms: Vec::new(),
                });
                self.relations.len() - 1
            }
        };
        self.relation_lookup.insert(key, idx);
        for synonym in synonyms {
            let synonym = normalize_relation(synonym);
            if synonym.is_empty() || self.relation_lookup.contains_key(&synonym) {
                continue;
            }
            self.relations[idx].synonyms.push(synonym.clone());
            self.relation_lookup.insert(synonym, idx);
        }
        self
    }

    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Every (alias, canonical) subject pair.
    pub fn subject_aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.subjects.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    fn relation_def(&self, key: &str) -> Option<&RelationDef> {
        self.relation_lookup
            .get(key)
            .map(|&idx| &self.relations[idx])
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(CanonicalIndex::builtin())
    }
}

impl CanonicalIndex {
    /// The built-in family / personal-profile vocabulary.
    pub fn builtin() -> Self {
        let mut index = DEFAULT_RELATIONS
            .iter()
            .fold(Self::empty(), |index, (key, shape, synonyms)| {
                index.with_relation(key, *shape, synonyms)
            });
        for (alias, canonical) in DEFAULT_SUBJECT_ALIASES {
            index.add_subject_alias(alias, canonical);
        }
        index
    }
}

/// Resolves raw subject and relation spellings to canonical keys.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    index: CanonicalIndex,
    relation_threshold: f64,
}

impl Canonicalizer {
    pub fn new(index: CanonicalIndex) -> Self {
        Self {
            index,
            relation_threshold: CANONICAL_RELATION_THRESHOLD,
        }
    }

    /// Override the fuzzy acceptance threshold for unknown relation spellings.
    pub fn with_relation_threshold(mut self, threshold: f64) -> Self {
        self.relation_threshold = threshold;
        self
    }

    pub fn index(&self) -> &CanonicalIndex {
        &self.index
    }

    /// Canonical display name for a subject ("pamela" → "Pam").
    ///
    /// Unknown subjects are title-cased and treated as new canonical subjects.
    pub fn subject(&self, raw: &str) -> String {
        let cleaned = clean_subject(raw);
        if cleaned.is_empty() {
            return String::new();
        }
        match self.index.subjects.get(&cleaned.to_lowercase()) {
            Some(canonical) => canonical.clone(),
            None => title_case_subject(&cleaned),
        }
    }

    /// Store key for a subject: the canonical name, lowercased.
    pub fn subject_key(&self, raw: &str) -> String {
        self.subject(raw).to_lowercase()
    }

    /// Every store key under which facts about this subject might have been
    /// written: the canonical key first, then the raw spelling, then every
    /// alias of the same canonical subject (sorted).
    pub fn subject_variants(&self, raw: &str) -> Vec<String> {
        let canonical = self.subject(raw);
        if canonical.is_empty() {
            return Vec::new();
        }
        let mut variants = vec![canonical.to_lowercase()];
        push_unique(&mut variants, clean_subject(raw).to_lowercase());
        let mut aliases: Vec<&str> = self
            .index
            .subjects
            .iter()
            .filter(|(_, c)| c.eq_ignore_ascii_case(&canonical))
            .map(|(a, _)| a.as_str())
            .collect();
        aliases.sort_unstable();
        for alias in aliases {
            push_unique(&mut variants, alias.to_string());
        }
        variants
    }

    /// Canonical relation key for a raw spelling.
    pub fn relation(&self, raw: &str) -> String {
        self.resolve_relation(raw).key
    }

    /// Canonical relation key plus how it was found.
    pub fn resolve_relation(&self, raw: &str) -> ResolvedRelation {
        let norm = normalize_relation(raw);
        if norm.is_empty() {
            return ResolvedRelation {
                key: norm,
                resolution: RelationResolution::Passthrough,
            };
        }
        if FAVORITE_QUALIFIERS.contains(&norm.as_str()) {
            return ResolvedRelation {
                key: FAVORITE.to_string(),
                resolution: RelationResolution::Passthrough,
            };
        }
        if let Some(def) = self.index.relation_def(&norm) {
            let resolution = if def.key == norm {
                RelationResolution::Canonical
            } else {
                RelationResolution::Synonym
            };
            return ResolvedRelation {
                key: def.key.clone(),
                resolution,
            };
        }
        // Open-world favorites ("favorite book") must not be pulled onto a
        // neighbouring favorite ("favorite foods").
        if let Some((head, rest)) = norm.split_once(' ') {
            if FAVORITE_QUALIFIERS.contains(&head) {
                let spelled = format!("{FAVORITE} {rest}");
                return match self.index.relation_def(&spelled) {
                    Some(def) => ResolvedRelation {
                        key: def.key.clone(),
                        resolution: RelationResolution::Synonym,
                    },
                    None => ResolvedRelation {
                        key: spelled,
                        resolution: RelationResolution::Passthrough,
                    },
                };
            }
        }

        let best = self
            .index
            .relations
            .iter()
            .filter(|def| !is_prefixed_form(&norm, &def.key))
            .map(|def| (def, ratio(&norm, &def.key)))
            .fold(None::<(&RelationDef, f64)>, |best, (def, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((def, score)),
            });
        match best {
            Some((def, score)) if accepts(score, self.relation_threshold) => ResolvedRelation {
                key: def.key.clone(),
                resolution: RelationResolution::Fuzzy,
            },
            _ => ResolvedRelation {
                key: norm,
                resolution: RelationResolution::Passthrough,
            },
        }
    }

    /// The canonical key followed by its registered synonyms.
    pub fn relation_variants(&self, canonical: &str) -> Vec<String> {
        let key = normalize_relation(canonical);
        match self.index.relation_def(&key) {
            Some(def) => std::iter::once(def.key.clone())
                .chain(def.synonyms.iter().cloned())
                .collect(),
            None => vec![key],
        }
    }

    /// Declared shape of a canonical relation; unregistered keys are scalar.
    pub fn shape(&self, relation: &str) -> RelationShape {
        self.index
            .relation_def(&normalize_relation(relation))
            .map_or(RelationShape::Scalar, |def| def.shape)
    }

    /// Fold a dangling "favorite" qualifier into its noun.
    ///
    /// `("favorite", "color is royal blue")` becomes
    /// `("favorite color", "royal blue")`. Anything else is returned as-is.
    pub fn fold_favorite(&self, relation: &str, value: &str) -> (String, String) {
        if relation != FAVORITE {
            return (relation.to_string(), value.to_string());
        }
        match FAVORITE_NOUN.captures(value.trim()) {
            Some(caps) => {
                let noun = caps[1].to_lowercase().replace("colour", "color");
                let folded = self.relation(&format!("{FAVORITE} {noun}"));
                (folded, caps[2].trim().to_string())
            }
            None => (relation.to_string(), value.to_string()),
        }
    }
}

/// Lowercase, trim, fold separators and punctuation to single spaces.
pub fn normalize_relation(raw: &str) -> String {
    let mapped: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let joined = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    joined
        .strip_prefix("the ")
        .map(str::to_string)
        .unwrap_or(joined)
}

/// Trim quotes, surrounding punctuation and a trailing possessive.
fn clean_subject(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace() || c == ',');
    let without_possessive = trimmed
        .strip_suffix("'s")
        .or_else(|| trimmed.strip_suffix("'S"))
        .unwrap_or(trimmed);
    without_possessive
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_subject(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !item.is_empty() && !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon() -> Canonicalizer {
        Canonicalizer::default()
    }

    #[test]
    fn every_relation_alias_is_consistent_with_its_canonical_key() {
        let c = canon();
        for def in c.index().relations() {
            assert_eq!(c.relation(&def.key), def.key, "canonical {}", def.key);
            for synonym in &def.synonyms {
                assert_eq!(c.relation(synonym), def.key, "synonym {synonym}");
            }
        }
    }

    #[test]
    fn every_subject_alias_is_consistent_with_its_canonical_name() {
        let c = canon();
        for (alias, canonical) in c.index().subject_aliases() {
            assert_eq!(c.subject(alias), canonical, "alias {alias}");
            assert_eq!(c.subject(canonical), canonical, "canonical {canonical}");
        }
    }

    #[test]
    fn subject_aliases_are_case_insensitive() {
        let c = canon();
        assert_eq!(c.subject("PAMELA"), "Pam");
        assert_eq!(c.subject("Ricky Butler"), "Rickey");
        assert_eq!(c.subject_key("pam's"), "pam");
    }

    #[test]
    fn unknown_subject_is_title_cased_and_kept() {
        let c = canon();
        assert_eq!(c.subject("aunt  JOYCE"), "Aunt Joyce");
        assert_eq!(c.subject_key("aunt joyce"), "aunt joyce");
        assert_eq!(c.subject("   "), "");
    }

    #[test]
    fn synonyms_resolve_exactly() {
        let c = canon();
        assert_eq!(c.relation("dob"), "birthday");
        assert_eq!(c.relation("Mom"), "mother");
        assert_eq!(c.relation("raised_by"), "raised by");
        assert_eq!(c.relation("pet(s)"), "pets");
        let resolved = c.resolve_relation("kids");
        assert_eq!(resolved.resolution, RelationResolution::Synonym);
        assert!(resolved.is_exact());
    }

    #[test]
    fn misspelling_resolves_fuzzily_above_threshold() {
        let c = canon();
        let resolved = c.resolve_relation("husbands");
        assert_eq!(resolved.key, "husband");
        assert_eq!(resolved.resolution, RelationResolution::Fuzzy);
        assert_eq!(c.relation("occupaton"), "occupation");
    }

    #[test]
    fn unrelated_term_passes_through_unchanged() {
        let c = canon();
        let resolved = c.resolve_relation("Shoe Size");
        assert_eq!(resolved.key, "shoe size");
        assert_eq!(resolved.resolution, RelationResolution::Passthrough);
        assert!(!resolved.is_known());
    }

    #[test]
    fn kinship_compounds_keep_their_own_keys() {
        let c = canon();
        assert_eq!(c.relation("grandmother"), "grandmother");
        assert_eq!(c.relation("Grandma"), "grandmother");
        assert_eq!(c.relation("stepdad"), "stepfather");
        assert_eq!(c.relation("godmother"), "godmother");
        // Unregistered compounds pass through instead of landing on a parent.
        let resolved = c.resolve_relation("great grandmother");
        assert_eq!(resolved.key, "great grandmother");
        assert_eq!(resolved.resolution, RelationResolution::Passthrough);
        assert_eq!(c.relation("ex husband"), "ex husband");
    }

    #[test]
    fn fuzzy_threshold_is_configurable() {
        let strict = canon().with_relation_threshold(0.99);
        assert_eq!(strict.relation("husbands"), "husbands");
    }

    #[test]
    fn open_world_favorites_are_not_pulled_onto_known_ones() {
        let c = canon();
        assert_eq!(c.relation("favorite book"), "favorite book");
        assert_eq!(c.relation("favourite book"), "favorite book");
        assert_eq!(c.relation("fav"), FAVORITE);
        assert_eq!(c.relation("fave drink"), "favorite drink");
        assert_eq!(c.relation("fav book"), "favorite book");
    }

    #[test]
    fn dangling_favorite_is_folded_into_its_noun() {
        let c = canon();
        assert_eq!(
            c.fold_favorite("favorite", "color is royal blue"),
            ("favorite color".to_string(), "royal blue".to_string())
        );
        assert_eq!(
            c.fold_favorite("favorite", "colour royal blue"),
            ("favorite color".to_string(), "royal blue".to_string())
        );
        assert_eq!(
            c.fold_favorite("favorite", "restaurants are El Torito, Chili's"),
            ("favorite restaurants".to_string(), "El Torito, Chili's".to_string())
        );
        assert_eq!(
            c.fold_favorite("husband", "color is blue"),
            ("husband".to_string(), "color is blue".to_string())
        );
    }

    #[test]
    fn shapes_come_from_the_registry() {
        let c = canon();
        assert_eq!(c.shape("children"), RelationShape::List);
        assert_eq!(c.shape("pets"), RelationShape::List);
        assert_eq!(c.shape("favorite restaurants"), RelationShape::List);
        assert_eq!(c.shape("husband"), RelationShape::Scalar);
        assert_eq!(c.shape("shoe size"), RelationShape::Scalar);
    }

    #[test]
    fn variants_cover_aliases_and_synonyms() {
        let c = canon();
        let subjects = c.subject_variants("Pamela");
        assert_eq!(subjects[0], "pam");
        assert!(subjects.contains(&"pamela butler".to_string()));
        let relations = c.relation_variants("birthday");
        assert_eq!(relations[0], "birthday");
        assert!(relations.contains(&"birthdate".to_string()));
        assert_eq!(c.relation_variants("shoe size"), vec!["shoe size".to_string()]);
    }

    #[test]
    fn extra_aliases_extend_the_builtin_table() {
        let c = Canonicalizer::new(CanonicalIndex::builtin().with_subject_alias("Nana", "Pam"));
        assert_eq!(c.subject("nana"), "Pam");
        assert_eq!(c.subject("Pam"), "Pam");
    }
}
