//! Multi-source consolidation for relations whose facts are scattered over
//! several differently-worded stored keys.
//!
//! Older ingestion stored answers to whole questions ("what happened to
//! yasha") as relation keys. A [`Consolidator`] gathers those alongside the
//! canonical slot and merges them into one de-duplicated list.

use regex::Regex;
use std::collections::HashMap;

use crate::FactValue;

/// Merges one relation's facts from every place they may have been stored.
pub trait Consolidator: Send + Sync {
    /// Canonical relation this consolidator answers for.
    fn relation(&self) -> &str;

    /// Merge `slots` (every `(relation key, value)` stored for the subject's
    /// spellings) into one list, or `None` when nothing relevant is there.
    fn consolidate(&self, slots: &[(String, FactValue)]) -> Option<Vec<String>>;
}

/// Pulls named entities out of free-text answers with a fixed name pattern.
///
/// Values stored under `direct_keys` are taken as-is unless the pattern finds
/// names in them; values under `hint_keys` only contribute the names the
/// pattern finds. Names can be respelled (`renames`) and decorated
/// (`labels`). De-duplication compares the bare name, ignoring case and any
/// parenthesised label; a labelled spelling replaces a bare one.
#[derive(Debug, Clone)]
pub struct EntityConsolidator {
    relation: String,
    direct_keys: Vec<String>,
    hint_keys: Vec<String>,
    pattern: Regex,
    renames: HashMap<String, String>,
    labels: HashMap<String, String>,
}

impl EntityConsolidator {
    pub fn new(relation: &str, pattern: Regex) -> Self {
        Self {
            relation: relation.to_string(),
            direct_keys: vec![relation.to_string()],
            hint_keys: Vec::new(),
            pattern,
            renames: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    pub fn with_direct_keys(mut self, keys: &[&str]) -> Self {
        self.direct_keys
            .extend(keys.iter().map(|k| k.trim().to_lowercase()));
        self
    }

    pub fn with_hint_keys(mut self, keys: &[&str]) -> Self {
        self.hint_keys
            .extend(keys.iter().map(|k| k.trim().to_lowercase()));
        self
    }

    /// Treat `from` as a misspelling of `to`.
    pub fn with_rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(from.to_lowercase(), to.to_string());
        self
    }

    /// Show `name` as `label` in answers.
    pub fn with_label(mut self, name: &str, label: &str) -> Self {
        self.labels.insert(name.to_lowercase(), label.to_string());
        self
    }

    /// The household-pets consolidator.
    pub fn pets() -> Self {
        let pattern = Regex::new(r"(?i)\b(Bell|Bail|Yasha|Pierre)\b").expect("pet name pattern");
        Self::new("pets", pattern)
            .with_direct_keys(&["pet", "pet(s)", "animals", "dog", "dogs"])
            .with_hint_keys(&[
                "did you ever have a pet as a kid",
                "did pamela butler have any other family dogs",
                "what breed was the family dog yasha",
                "what happened to yasha",
            ])
            .with_rename("bail", "Bell")
            .with_label("yasha", "Yasha (Husky)")
            .with_label("bell", "Bell (German Shepherd)")
    }

    fn names_in(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| {
                let found = m.as_str();
                let name = match self.renames.get(&found.to_lowercase()) {
                    Some(renamed) => renamed.clone(),
                    None if found.chars().any(char::is_uppercase) => found.to_string(),
                    None => capitalize(found),
                };
                self.labels
                    .get(&name.to_lowercase())
                    .cloned()
                    .unwrap_or(name)
            })
            .collect()
    }
}

impl Consolidator for EntityConsolidator {
    fn relation(&self) -> &str {
        &self.relation
    }

    fn consolidate(&self, slots: &[(String, FactValue)]) -> Option<Vec<String>> {
        let mut merged: Vec<String> = Vec::new();
        for (key, value) in slots {
            let key = key.to_lowercase();
            let direct = self.direct_keys.contains(&key);
            if !direct && !self.hint_keys.contains(&key) {
                continue;
            }
            for item in value.items() {
                let names = self.names_in(item);
                if !names.is_empty() {
                    names.into_iter().for_each(|n| merge(&mut merged, n));
                } else if direct {
                    merge(&mut merged, item.trim().to_string());
                }
            }
        }
        (!merged.is_empty()).then_some(merged)
    }
}

fn base_name(label: &str) -> String {
    label
        .split(" (")
        .next()
        .unwrap_or(label)
        .trim()
        .to_lowercase()
}

fn merge(merged: &mut Vec<String>, candidate: String) {
    if candidate.is_empty() {
        return;
    }
    let base = base_name(&candidate);
    match merged.iter_mut().find(|m| base_name(m) == base) {
        Some(existing) if !existing.contains(" (") && candidate.contains(" (") => {
            *existing = candidate;
        }
        Some(_) => {}
        None => merged.push(candidate),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
