//! Text normalizer: the first step for every utterance.
//!
//! [`normalize`] is idempotent and total: it never fails and maps empty input
//! to the empty string.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Apostrophe look-alikes folded to `'`.
const APOSTROPHES: [char; 6] = ['’', 'ʼ', '‘', '‛', '＇', '`'];
/// Double-quote look-alikes folded to `"`.
const DOUBLE_QUOTES: [char; 4] = ['“', '”', '„', '‟'];

/// Relation words that may follow a possessive written without its
/// apostrophe ("Pams husband"). Longest first so alternation prefers
/// multi-word relations.
const POSSESSIVE_RELATION_WORDS: &[&str] = &[
    "favorite restaurants",
    "schools attended",
    "favorite foods",
    "favorite color",
    "coffee order",
    "birth place",
    "birth date",
    "full name",
    "raised by",
    "birthplace",
    "birthdate",
    "birthday",
    "children",
    "brothers",
    "siblings",
    "daughter",
    "hometown",
    "favorite",
    "husband",
    "mission",
    "purpose",
    "sisters",
    "brother",
    "sibling",
    "father",
    "mother",
    "spouse",
    "doctor",
    "sister",
    "child",
    "phone",
    "kids",
    "goal",
    "name",
    "pets",
    "wife",
    "kid",
    "mom",
    "dad",
    "pet",
    "son",
];

/// Words ending in `s` that are never a name missing its apostrophe.
const NOT_POSSESSIVE: &[&str] = &[
    "as", "is", "us", "was", "has", "his", "its", "yes", "this", "thus", "does", "hers", "ours",
    "yours", "theirs", "whose", "always", "perhaps", "less", "unless",
];

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

static LOOSE_POSSESSIVE: LazyLock<Regex> = LazyLock::new(|| {
    let words = POSSESSIVE_RELATION_WORDS.join("|");
    Regex::new(&format!(r"(?i)\b([a-z]+s)\s+({words})\b")).expect("loose possessive pattern")
});

/// Clean an utterance: NFKC, unified quotes, collapsed whitespace, and
/// repaired possessives ("Pams birthday" → "Pam's birthday").
pub fn normalize(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let unified = unify_quotes(&text.nfkc().collect::<String>());
    let collapsed = WHITESPACE.replace_all(unified.trim(), " ");
    fix_loose_possessives(&collapsed)
}

/// Lowercased [`normalize`] with trailing sentence punctuation removed.
pub fn squash(text: &str) -> String {
    normalize(text)
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_lowercase()
}

fn unify_quotes(text: &str) -> String {
    text.chars()
        .map(|c| {
            if APOSTROPHES.contains(&c) {
                '\''
            } else if DOUBLE_QUOTES.contains(&c) {
                '"'
            } else {
                c
            }
        })
        .collect::<String>()
        .replace('…', "...")
}

/// Repairs possessives until nothing changes, so overlapping candidates
/// ("Bobs kids husband") settle in a single call.
fn fix_loose_possessives(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = fix_loose_possessives_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn fix_loose_possessives_once(text: &str) -> String {
    LOOSE_POSSESSIVE
        .replace_all(text, |caps: &Captures<'_>| {
            let token = &caps[1];
            let lower = token.to_lowercase();
            if token.len() < 3 || NOT_POSSESSIVE.contains(&lower.as_str()) {
                return caps[0].to_string();
            }
            format!("{}'s {}", &token[..token.len() - 1], &caps[2])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "Pams husband is Rickey",
        "Pam’s husband is Rickey.",
        "who   raised\tPam?",
        "“royal blue”… maybe",
        "what is ricky ʼs  birthday",
        "his kids are grown",
        "Tys mom",
        "ｆｕｌｌｗｉｄｔｈ text",
        "remember that ivy's fav color is royal blue",
        "Pamss children",
        "Bobs kids husband",
    ];

    #[test]
    fn normalize_is_idempotent() {
        for sample in SAMPLES {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn curly_quotes_are_unified() {
        assert_eq!(normalize("Pam’s husband"), "Pam's husband");
        assert_eq!(normalize("“hi”"), "\"hi\"");
        assert_eq!(normalize("wait…"), "wait...");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(normalize("  who   raised\tPam? "), "who raised Pam?");
    }

    #[test]
    fn loose_possessive_is_repaired() {
        assert_eq!(normalize("Pams husband is Rickey"), "Pam's husband is Rickey");
        assert_eq!(normalize("Tys mom"), "Ty's mom");
        assert_eq!(normalize("what are pams favorite restaurants"), "what are pam's favorite restaurants");
    }

    #[test]
    fn ordinary_words_ending_in_s_are_left_alone() {
        assert_eq!(normalize("his kids are grown"), "his kids are grown");
        assert_eq!(normalize("this name is odd"), "this name is odd");
    }

    #[test]
    fn possessive_needs_a_relation_word() {
        assert_eq!(normalize("Pams car is red"), "Pams car is red");
    }

    #[test]
    fn squash_lowercases_and_trims_punctuation() {
        assert_eq!(squash("Ty’s MOM?"), "ty's mom");
    }
}
