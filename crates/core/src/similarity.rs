//! Lexical similarity and the acceptance thresholds for every matching tier.
//!
//! [`ratio`] is the Ratcliff/Obershelp "gestalt" score: twice the number of
//! characters covered by the recursively-found longest common blocks, divided
//! by the combined length of both strings. It returns a value in `[0.0, 1.0]`
//! and is symmetric for the short keys this crate compares (relation names of
//! a few words).
//!
//! All thresholds are inclusive: a score *equal* to the threshold is accepted.

use serde::{Deserialize, Serialize};

/// Minimum ratio for the canonicalizer to map an unknown relation spelling
/// onto a known canonical key. Below it the term passes through unchanged.
pub const CANONICAL_RELATION_THRESHOLD: f64 = 0.68;

/// Minimum ratio for the fuzzy retrieval tier to accept a stored relation key.
///
/// Higher than [`CANONICAL_RELATION_THRESHOLD`]: the canonicalizer only picks
/// a *name*, while this tier hands back a stored *value*.
pub const FUZZY_RELATION_THRESHOLD: f64 = 0.70;

/// Minimum cosine similarity for the semantic retrieval tier.
pub const SEMANTIC_THRESHOLD: f32 = 0.72;

/// Per-tier acceptance thresholds, overridable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// See [`CANONICAL_RELATION_THRESHOLD`].
    pub canonical_relation: f64,
    /// See [`FUZZY_RELATION_THRESHOLD`].
    pub fuzzy_relation: f64,
    /// See [`SEMANTIC_THRESHOLD`].
    pub semantic: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            canonical_relation: CANONICAL_RELATION_THRESHOLD,
            fuzzy_relation: FUZZY_RELATION_THRESHOLD,
            semantic: SEMANTIC_THRESHOLD,
        }
    }
}

/// Inclusive threshold check shared by every tier.
pub fn accepts(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Shortest lead-in that counts as a separate word ("god", "step").
const MIN_PREFIX_CHARS: usize = 3;

/// True when one spelling is the other with a word put in front of it
/// ("grandmother" and "mother", "ex husband" and "husband"). Such pairs name
/// different relations however high their [`ratio`].
pub fn is_prefixed_form(a: &str, b: &str) -> bool {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    !short.is_empty() && long.len() >= short.len() + MIN_PREFIX_CHARS && long.ends_with(short)
}

/// Gestalt pattern-matching ratio between `a` and `b`.
///
/// Two empty strings are identical (`1.0`); one empty string scores `0.0`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matched_chars(&a, &b, 0, a.len(), 0, b.len());
    2.0 * matched as f64 / total as f64
}

/// Best (leftmost in `a`, then leftmost in `b`) longest common block inside
/// `a[alo..ahi]` × `b[blo..bhi]`, as `(start_a, start_b, len)`.
fn longest_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // Rolling row of run lengths ending at (i, j).
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[col - 1] + 1;
                cur[col] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                cur[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
        cur.iter_mut().for_each(|c| *c = 0);
    }
    best
}

fn matched_chars(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> usize {
    if alo >= ahi || blo >= bhi {
        return 0;
    }
    let (i, j, k) = longest_block(a, b, alo, ahi, blo, bhi);
    if k == 0 {
        return 0;
    }
    k + matched_chars(a, b, alo, i, blo, j) + matched_chars(a, b, i + k, ahi, j + k, bhi)
}
