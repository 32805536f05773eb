//! Utterance → [`Intent`] classification.
//!
//! The parser runs an ordered list of [`Rule`]s over the normalized text;
//! the first rule that matches wins. Each rule is a pure function from text
//! to a raw (uncanonicalized) match, so rules can be exercised one at a time.
//! Canonicalization and value shaping happen once, after a rule matched.

use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::canonical::{Canonicalizer, RelationShape, FAVORITE};
use crate::normalize::normalize;
use crate::FactValue;

/// What the speaker wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Teach,
    Update,
    Forget,
    Ask,
    Unknown,
}

/// A classified utterance with canonical keys.
///
/// `subject` is the canonical subject key (lowercase) and `relation` the
/// canonical relation key. A `Forget` intent with an empty relation means
/// "forget everything about the subject". `value` is set only for `Teach`
/// and `Update`.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub kind: IntentKind,
    pub subject: String,
    pub relation: String,
    pub value: Option<FactValue>,
}

impl Intent {
    pub fn unknown() -> Self {
        Self {
            kind: IntentKind::Unknown,
            subject: String::new(),
            relation: String::new(),
            value: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == IntentKind::Unknown
    }
}

/// A rule match before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIntent {
    pub kind: IntentKind,
    pub subject: String,
    pub relation: String,
    pub value: Option<String>,
}

impl RawIntent {
    fn new(kind: IntentKind, subject: &str, relation: &str, value: Option<&str>) -> Self {
        Self {
            kind,
            subject: subject.trim().to_string(),
            relation: relation.trim().to_string(),
            value: value.map(|v| v.trim().to_string()),
        }
    }

    fn ask(subject: &str, relation: &str) -> Self {
        Self::new(IntentKind::Ask, subject, relation, None)
    }
}

/// One step of the cascade.
pub struct Rule {
    pub name: &'static str,
    pub matcher: fn(&str, &Canonicalizer) -> Option<RawIntent>,
}

/// The cascade, in priority order.
pub const RULES: &[Rule] = &[
    Rule { name: "fragment", matcher: fragment },
    Rule { name: "teach", matcher: explicit_teach },
    Rule { name: "update", matcher: explicit_update },
    Rule { name: "forget", matcher: explicit_forget },
    Rule { name: "assertion", matcher: natural_assertion },
    Rule { name: "who-raised", matcher: who_raised },
    Rule { name: "wh-possessive", matcher: wh_possessive },
    Rule { name: "wh-of", matcher: wh_of },
    Rule { name: "where-born", matcher: born_question },
    Rule { name: "yes-no", matcher: yes_no },
    Rule { name: "tell-me", matcher: tell_me },
    Rule { name: "bare-possessive", matcher: bare_possessive },
    Rule { name: "terse", matcher: terse },
];

// Subject names never contain an apostrophe here; it always starts the
// possessive suffix.
const SUB: &str = r"(?P<sub>[\w.\-]+(?:\s+[\w.\-]+)*?)";
const POSS: &str = r"['’ʼ]s";
const FAV: &str = r"(?:(?P<fav>fav|fave|favorite|favourite)\s+)?";
const REL: &str = r"(?P<rel>[\w\-]+(?:\s+[\w\-]+)*?)";
const END: &str = r"\s*[?.!]*\s*$";

fn rx(pattern: String) -> Regex {
    Regex::new(&pattern).expect("intent pattern")
}

static WAKE_WORD: LazyLock<Regex> =
    LazyLock::new(|| rx(r"(?i)^(?:hey\s+)?sono\b[\s,!.:]*".to_string()));

static DISCARD_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)^(?:actually|ok|okay|so|well|listen|correction)(?:\s*[,:\-]\s*|\s+)".to_string())
});

static TEACH_VERB: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)^(?:please\s+)?(?:remember|save|store|note)\s+(?:that\s+)?(?P<rest>.+)$".to_string())
});

static UPDATE: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?:please\s+)?(?:update|change|set)\s+(?:the\s+)?{SUB}(?P<poss>{POSS})?\s+{FAV}{REL}\s+(?:to|=)\s+(?P<obj>.+?){END}"
    ))
});

static FORGET: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?:please\s+)?forget\s+(?:about\s+)?{SUB}(?:(?P<poss>{POSS})?\s+{FAV}{REL})?{END}"
    ))
});

static POSSESSIVE_ASSERTION: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^{SUB}{POSS}\s+{FAV}{REL}\s*(?:\s(?:is|are|was|were)\s+|=\s*)(?P<obj>.+?){END}"
    ))
});

// Only after an explicit teach verb: "remember pam husband is rickey".
static LOOSE_ASSERTION: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^{SUB}\s+{FAV}{REL}\s*(?:\s(?:is|are|was|were)\s+|=\s*)(?P<obj>.+?){END}"
    ))
});

static OF_ASSERTION: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?P<obj>.+?)\s+(?:is|are|was|were)\s+(?:the\s+|a\s+|an\s+)?{FAV}{REL}\s+of\s+{SUB}{END}"
    ))
});

static HAS_ASSERTION: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^{SUB}\s+(?:has|had|have)\s+(?:a\s+|an\s+|the\s+)?(?P<rest>.+?){END}"
    ))
});

static BORN_ASSERTION: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^{SUB}\s+(?:was|is)\s+born\s+(?P<prep>in|at|on)\s+(?P<obj>.+?){END}"
    ))
});

static DATE_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    rx(r"(?i)^(?:\d{1,4}(?:[/\-]\d{1,2}(?:[/\-]\d{1,4})?)?|(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b.*)$".to_string())
});

static WHO_RAISED: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^who\s+(?:primarily\s+|mainly\s+|originally\s+)?raised\s+{SUB}{END}"
    ))
});

static WH_POSSESSIVE: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?:who|what|where|when|which)(?:{POSS}|\s+(?:is|are|was|were))\s+{SUB}{POSS}\s+{FAV}{REL}{END}"
    ))
});

static WH_OF: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?:who|what|where|when|which)(?:{POSS}|\s+(?:is|are|was|were))\s+the\s+{FAV}{REL}\s+of\s+{SUB}{END}"
    ))
});

static BORN_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?P<wh>where|when)\s+(?:was|is)\s+{SUB}\s+(?P<how>born|from){END}"
    ))
});

static YES_NO: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?:did|does|do|has|have)\s+{SUB}\s+(?:have|has|had)\s+(?:a\s+|an\s+|any\s+)?(?P<rel>pets?|dogs?|children|kids?|siblings?|brothers?|sisters?|husband|spouse|wife|grandchildren|grandkids){END}"
    ))
});

static TELL_ME: LazyLock<Regex> = LazyLock::new(|| {
    rx(format!(
        r"(?i)^(?:tell|remind)\s+me\s+(?:about\s+|of\s+|what\s+)?(?:the\s+)?{SUB}{POSS}\s+{FAV}{REL}(?:\s+(?:is|are|was|were))?{END}"
    ))
});

static BARE_POSSESSIVE: LazyLock<Regex> =
    LazyLock::new(|| rx(format!(r"(?i)^{SUB}{POSS}\s+{FAV}{REL}{END}")));

static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| rx(r"(?i)\s*(?:,|;|&|\band\b)\s*".to_string()));

static VALUE_LEAD_IN: LazyLock<Regex> =
    LazyLock::new(|| rx(r"(?i)^(?:named|called|:)\s*".to_string()));

const QUESTION_WORDS: &[&str] = &[
    "who", "who's", "what", "what's", "where", "where's", "when", "when's", "which", "why", "how",
    "did", "does", "do", "is", "are", "was", "were", "can", "could", "tell", "remind",
];

const COMMAND_WORDS: &[&str] = &[
    "remember", "save", "store", "note", "update", "change", "set", "forget", "import", "export",
];

const LINKING_WORDS: &[&str] = &["is", "are", "was", "were", "has", "have", "had", "="];

/// Classifies utterances against the shared alias tables.
#[derive(Debug, Clone)]
pub struct IntentParser {
    canon: Arc<Canonicalizer>,
}

impl IntentParser {
    pub fn new(canon: Arc<Canonicalizer>) -> Self {
        Self { canon }
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canon
    }

    /// Classify `text`. Never fails: anything unrecognized is
    /// [`IntentKind::Unknown`].
    pub fn parse(&self, text: &str) -> Intent {
        let cleaned = preclean(text);
        if cleaned.is_empty() {
            return Intent::unknown();
        }
        for rule in RULES {
            if let Some(raw) = (rule.matcher)(&cleaned, &self.canon) {
                debug!(rule = rule.name, subject = %raw.subject, relation = %raw.relation, "intent rule matched");
                return self.finish(raw);
            }
        }
        Intent::unknown()
    }

    /// Canonicalize keys, fold "favorite X", and shape the value.
    fn finish(&self, raw: RawIntent) -> Intent {
        let subject = self.canon.subject_key(&raw.subject);
        if subject.is_empty() {
            return Intent::unknown();
        }
        if raw.kind == IntentKind::Forget && raw.relation.is_empty() {
            return Intent {
                kind: IntentKind::Forget,
                subject,
                relation: String::new(),
                value: None,
            };
        }

        let mut relation = self.canon.relation(&raw.relation);
        let mut value = raw.value;
        if let Some(v) = value.as_deref() {
            let (folded, rest) = self.canon.fold_favorite(&relation, v);
            relation = folded;
            value = Some(rest);
        }
        if relation.is_empty() {
            return Intent::unknown();
        }

        let value = match value {
            Some(v) => match shape_value(self.canon.shape(&relation), &v) {
                Some(shaped) => Some(shaped),
                None => return Intent::unknown(),
            },
            None => None,
        };
        Intent {
            kind: raw.kind,
            subject,
            relation,
            value,
        }
    }
}

/// Normalize, then drop a wake word and filler prefixes.
pub fn preclean(text: &str) -> String {
    let mut current = normalize(text);
    loop {
        let stripped = DISCARD_PREFIX.replace(&current, "");
        let stripped = WAKE_WORD.replace(&stripped, "").trim().to_string();
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Shape a raw value for a relation: list relations split on loose
/// separators, scalar relations stay one string. Returns `None` when
/// nothing usable is left.
pub fn shape_value(shape: RelationShape, raw: &str) -> Option<FactValue> {
    let cleaned = clean_value(raw);
    if cleaned.is_empty() {
        return None;
    }
    match shape {
        RelationShape::Scalar => Some(FactValue::Text(title_case(&cleaned))),
        RelationShape::List => {
            let mut items: Vec<String> = Vec::new();
            for part in LIST_SEPARATOR.split(&cleaned) {
                let part = clean_value(part);
                if part.is_empty() {
                    continue;
                }
                let part = title_case(&part);
                if !items.iter().any(|i| i.eq_ignore_ascii_case(&part)) {
                    items.push(part);
                }
            }
            (!items.is_empty()).then_some(FactValue::List(items))
        }
    }
}

fn clean_value(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '[' || c == ']' || c.is_whitespace())
        .trim_end_matches(['.', '!', '?'])
        .trim();
    VALUE_LEAD_IN.replace(trimmed, "").trim().to_string()
}

/// Capitalize words that are entirely lowercase; leave mixed case alone.
fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            if word.chars().any(char::is_uppercase) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> Vec<String> {
    text.trim_end_matches(['?', '.', '!'])
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

fn is_question(text: &str) -> bool {
    text.trim_end().ends_with('?')
        || tokens(text)
            .first()
            .is_some_and(|t| QUESTION_WORDS.contains(&t.as_str()))
}

fn relation_of(caps: &Captures<'_>) -> String {
    let rel = caps.name("rel").map_or("", |m| m.as_str());
    match caps.name("fav") {
        Some(fav) => format!("{} {}", fav.as_str(), rel),
        None => rel.to_string(),
    }
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map_or("", |m| m.as_str())
}

/// True for relation spellings found in the tables (not guessed).
fn trusted_relation(rel: &str, canon: &Canonicalizer) -> bool {
    let resolved = canon.resolve_relation(rel);
    resolved.is_exact() || resolved.key == FAVORITE
}

fn has_linking_word(rel: &str) -> bool {
    rel.split_whitespace()
        .any(|w| LINKING_WORDS.contains(&w.to_lowercase().as_str()))
}

/// Split leading tokens into a subject (one or two words) and a trusted
/// relation made of the remaining words.
fn split_subject_relation(toks: &[String], canon: &Canonicalizer) -> Option<(String, String)> {
    (1..=toks.len().saturating_sub(1).min(2)).find_map(|k| {
        let subject = toks[..k].join(" ");
        let subject = subject.strip_suffix("'s").unwrap_or(&subject).to_string();
        let relation = toks[k..].join(" ");
        trusted_relation(&relation, canon).then_some((subject, relation))
    })
}

/// Subject and relation of a match with no possessive between them. The
/// lazy subject group only holds the first word, so the whole span is
/// re-split on a trusted relation; failing that the groups stand.
fn unmarked_subject_relation(
    text: &str,
    caps: &Captures<'_>,
    canon: &Canonicalizer,
) -> (String, String) {
    let span = match (caps.name("sub"), caps.name("rel")) {
        (Some(sub), Some(rel)) => &text[sub.start()..rel.end()],
        _ => "",
    };
    let toks: Vec<String> = span.split_whitespace().map(str::to_lowercase).collect();
    split_subject_relation(&toks, canon)
        .unwrap_or_else(|| (group(caps, "sub").to_string(), relation_of(caps)))
}

/// "ty mom", "ivy's fav color": short speech fragments read as questions.
pub fn fragment(text: &str, canon: &Canonicalizer) -> Option<RawIntent> {
    let toks = tokens(text);
    if !(2..=4).contains(&toks.len()) {
        return None;
    }
    if toks
        .iter()
        .any(|t| COMMAND_WORDS.contains(&t.as_str()) || LINKING_WORDS.contains(&t.as_str()))
    {
        return None;
    }
    if QUESTION_WORDS.contains(&toks[0].as_str()) {
        return None;
    }
    let (subject, relation) = split_subject_relation(&toks, canon)?;
    Some(RawIntent::ask(&subject, &relation))
}

/// "remember (that) X's Y is Z" and the other assertion shapes after a
/// teach verb.
pub fn explicit_teach(text: &str, canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = TEACH_VERB.captures(text)?;
    let rest = group(&caps, "rest");
    assertion(rest, canon, true)
}

/// "update/change X's Y to Z".
pub fn explicit_update(text: &str, canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = UPDATE.captures(text)?;
    let (subject, relation) = if caps.name("poss").is_some() {
        (group(&caps, "sub").to_string(), relation_of(&caps))
    } else {
        unmarked_subject_relation(text, &caps, canon)
    };
    Some(RawIntent::new(
        IntentKind::Update,
        &subject,
        &relation,
        Some(group(&caps, "obj")),
    ))
}

/// "forget X's Y", or "forget (about) X" for the whole subject.
pub fn explicit_forget(text: &str, canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = FORGET.captures(text)?;
    if caps.name("poss").is_some() {
        return Some(RawIntent::new(
            IntentKind::Forget,
            group(&caps, "sub"),
            &relation_of(&caps),
            None,
        ));
    }
    // Without a possessive the subject/relation boundary is only known once
    // the tail reads as a relation from the tables.
    let start = caps.name("sub")?.start();
    let whole = text[start..].trim_end_matches(['?', '.', '!', ' ']);
    let toks: Vec<String> = whole.split_whitespace().map(str::to_lowercase).collect();
    if let Some((s, r)) = split_subject_relation(&toks, canon) {
        return Some(RawIntent::new(IntentKind::Forget, &s, &r, None));
    }
    Some(RawIntent::new(IntentKind::Forget, whole, "", None))
}

/// Statements without a teach verb: "Pam's husband is Rickey",
/// "Rickey is the husband of Pam", "Pam has children Ty and Jade",
/// "Pam was born in Chicago".
pub fn natural_assertion(text: &str, canon: &Canonicalizer) -> Option<RawIntent> {
    if is_question(text) {
        return None;
    }
    assertion(text, canon, false)
}

fn assertion(text: &str, canon: &Canonicalizer, explicit: bool) -> Option<RawIntent> {
    let teach = |sub: &str, rel: &str, obj: &str| {
        Some(RawIntent::new(IntentKind::Teach, sub, rel, Some(obj)))
    };

    if let Some(caps) = BORN_ASSERTION.captures(text) {
        let obj = group(&caps, "obj");
        let rel = if group(&caps, "prep").eq_ignore_ascii_case("on") || DATE_LIKE.is_match(obj) {
            "birthday"
        } else {
            "birthplace"
        };
        return teach(group(&caps, "sub"), rel, obj);
    }

    if let Some(caps) = POSSESSIVE_ASSERTION.captures(text) {
        return teach(group(&caps, "sub"), &relation_of(&caps), group(&caps, "obj"));
    }

    if let Some(caps) = OF_ASSERTION.captures(text) {
        let rel = relation_of(&caps);
        if trusted_relation(&rel, canon) {
            return teach(group(&caps, "sub"), &rel, group(&caps, "obj"));
        }
    }

    if let Some(caps) = HAS_ASSERTION.captures(text) {
        let words: Vec<&str> = group(&caps, "rest").split_whitespace().collect();
        // Longest trusted relation prefix wins; the rest is the value.
        for n in (1..words.len().min(4)).rev() {
            let rel = words[..n].join(" ");
            if trusted_relation(&rel, canon) {
                return teach(group(&caps, "sub"), &rel, &words[n..].join(" "));
            }
        }
    }

    if explicit {
        if let Some(caps) = LOOSE_ASSERTION.captures(text) {
            let (subject, relation) = unmarked_subject_relation(text, &caps, canon);
            return teach(&subject, &relation, group(&caps, "obj"));
        }
    }
    None
}

/// "who (primarily) raised X".
pub fn who_raised(text: &str, _canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = WHO_RAISED.captures(text)?;
    Some(RawIntent::ask(group(&caps, "sub"), "raised by"))
}

/// "who/what/where/when/which is X's Y".
pub fn wh_possessive(text: &str, _canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = WH_POSSESSIVE.captures(text)?;
    Some(RawIntent::ask(group(&caps, "sub"), &relation_of(&caps)))
}

/// "what is the Y of X".
pub fn wh_of(text: &str, _canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = WH_OF.captures(text)?;
    Some(RawIntent::ask(group(&caps, "sub"), &relation_of(&caps)))
}

/// "where was X born", "where is X from" → birthplace; "when was X born"
/// → birthday.
pub fn born_question(text: &str, _canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = BORN_QUESTION.captures(text)?;
    let when = group(&caps, "wh").eq_ignore_ascii_case("when");
    let from = group(&caps, "how").eq_ignore_ascii_case("from");
    let rel = match (when, from) {
        (true, false) => "birthday",
        (false, _) => "birthplace",
        (true, true) => return None,
    };
    Some(RawIntent::ask(group(&caps, "sub"), rel))
}

/// "did X have (any) pets/children/...".
pub fn yes_no(text: &str, _canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = YES_NO.captures(text)?;
    Some(RawIntent::ask(group(&caps, "sub"), group(&caps, "rel")))
}

/// "tell me / remind me (of) X's Y".
pub fn tell_me(text: &str, _canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = TELL_ME.captures(text)?;
    Some(RawIntent::ask(group(&caps, "sub"), &relation_of(&caps)))
}

/// "X's Y?".
pub fn bare_possessive(text: &str, _canon: &Canonicalizer) -> Option<RawIntent> {
    let caps = BARE_POSSESSIVE.captures(text)?;
    let rel = relation_of(&caps);
    if has_linking_word(&rel) || is_command(text) {
        return None;
    }
    Some(RawIntent::ask(group(&caps, "sub"), &rel))
}

/// "X Y?" with a relation taken straight from the tables.
pub fn terse(text: &str, canon: &Canonicalizer) -> Option<RawIntent> {
    if !text.trim_end().ends_with('?') {
        return None;
    }
    let toks = tokens(text);
    if !(2..=6).contains(&toks.len())
        || QUESTION_WORDS.contains(&toks[0].as_str())
        || toks.iter().any(|t| LINKING_WORDS.contains(&t.as_str()))
    {
        return None;
    }
    let (subject, relation) = split_subject_relation(&toks, canon)?;
    Some(RawIntent::ask(&subject, &relation))
}

fn is_command(text: &str) -> bool {
    tokens(text)
        .first()
        .is_some_and(|t| COMMAND_WORDS.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> IntentParser {
        IntentParser::new(Arc::new(Canonicalizer::default()))
    }

    fn text(v: &str) -> Option<FactValue> {
        Some(FactValue::Text(v.to_string()))
    }

    fn list(items: &[&str]) -> Option<FactValue> {
        Some(FactValue::List(items.iter().map(|s| s.to_string()).collect()))
    }

    fn assert_intent(
        input: &str,
        kind: IntentKind,
        subject: &str,
        relation: &str,
        value: Option<FactValue>,
    ) {
        let intent = parser().parse(input);
        assert_eq!(
            intent,
            Intent {
                kind,
                subject: subject.to_string(),
                relation: relation.to_string(),
                value,
            },
            "input: {input:?}"
        );
    }

    #[test]
    fn possessive_statement_teaches() {
        assert_intent(
            "Pam's husband is Rickey.",
            IntentKind::Teach,
            "pam",
            "husband",
            text("Rickey"),
        );
    }

    #[test]
    fn curly_and_missing_apostrophes_both_work() {
        assert_intent("Pam’s husband is Rickey", IntentKind::Teach, "pam", "husband", text("Rickey"));
        assert_intent("Pams husband is Rickey", IntentKind::Teach, "pam", "husband", text("Rickey"));
    }

    #[test]
    fn has_statement_teaches_a_list_in_order() {
        assert_intent(
            "Pam has children Ty, Aja and Jade",
            IntentKind::Teach,
            "pam",
            "children",
            list(&["Ty", "Aja", "Jade"]),
        );
    }

    #[test]
    fn list_values_are_deduplicated_case_insensitively() {
        assert_intent(
            "remember that pam's kids are ty, Ty & aja",
            IntentKind::Teach,
            "pam",
            "children",
            list(&["Ty", "Aja"]),
        );
    }

    #[test]
    fn explicit_teach_with_favorite_qualifier() {
        assert_intent(
            "remember that ivy's fav color is royal blue",
            IntentKind::Teach,
            "ivy",
            "favorite color",
            text("Royal Blue"),
        );
    }

    #[test]
    fn dangling_favorite_is_folded() {
        assert_intent(
            "Ivy's favorite is color royal blue",
            IntentKind::Teach,
            "ivy",
            "favorite color",
            text("Royal Blue"),
        );
    }

    #[test]
    fn explicit_teach_without_possessive() {
        assert_intent(
            "hey sono, remember pamela mom is Mamie Sorrell",
            IntentKind::Teach,
            "pam",
            "mother",
            text("Mamie Sorrell"),
        );
    }

    #[test]
    fn multi_word_subjects_without_possessive() {
        assert_intent(
            "remember aunt joyce birthday is May 1",
            IntentKind::Teach,
            "aunt joyce",
            "birthday",
            text("May 1"),
        );
        assert_intent(
            "remember pamela butler mom is Mamie",
            IntentKind::Teach,
            "pam",
            "mother",
            text("Mamie"),
        );
        assert_intent(
            "update aunt joyce birthday to May 2",
            IntentKind::Update,
            "aunt joyce",
            "birthday",
            text("May 2"),
        );
        assert_intent(
            "set pam favorite color to green",
            IntentKind::Update,
            "pam",
            "favorite color",
            text("Green"),
        );
    }

    #[test]
    fn scalar_value_keeps_mixed_case_words() {
        assert_intent(
            "pam's birthday is June 4, 1954",
            IntentKind::Teach,
            "pam",
            "birthday",
            text("June 4, 1954"),
        );
    }

    #[test]
    fn of_statement_teaches() {
        assert_intent(
            "Rickey is the husband of Pam",
            IntentKind::Teach,
            "pam",
            "husband",
            text("Rickey"),
        );
        assert_eq!(parser().parse("Paris is the capital of France").kind, IntentKind::Unknown);
    }

    #[test]
    fn born_statements_pick_place_or_date() {
        assert_intent("Pam was born in Chicago", IntentKind::Teach, "pam", "birthplace", text("Chicago"));
        assert_intent("Pam was born on June 4", IntentKind::Teach, "pam", "birthday", text("June 4"));
        assert_intent("Pam was born in 1954", IntentKind::Teach, "pam", "birthday", text("1954"));
    }

    #[test]
    fn update_replaces() {
        assert_intent(
            "update Pam's husband to Richard",
            IntentKind::Update,
            "pam",
            "husband",
            text("Richard"),
        );
        assert_intent(
            "change ty's favorite color = green",
            IntentKind::Update,
            "ty",
            "favorite color",
            text("Green"),
        );
    }

    #[test]
    fn forget_slot_and_subject() {
        assert_intent("forget Pam's husband", IntentKind::Forget, "pam", "husband", None);
        assert_intent("forget pam husband", IntentKind::Forget, "pam", "husband", None);
        assert_intent("forget about Aunt Joyce", IntentKind::Forget, "aunt joyce", "", None);
    }

    #[test]
    fn filler_prefixes_are_discarded() {
        assert_intent(
            "Actually, Pam's husband is Rickey",
            IntentKind::Teach,
            "pam",
            "husband",
            text("Rickey"),
        );
        assert_intent("ok - forget pam's husband", IntentKind::Forget, "pam", "husband", None);
    }

    #[test]
    fn fragments_become_questions() {
        assert_intent("ty mom", IntentKind::Ask, "ty", "mother", None);
        assert_intent("ivy fav color", IntentKind::Ask, "ivy", "favorite color", None);
        assert_intent("big mama dob", IntentKind::Ask, "mamie sorrell", "birthday", None);
    }

    #[test]
    fn fragment_needs_a_known_relation() {
        assert!(fragment("over there", &Canonicalizer::default()).is_none());
        assert!(fragment("remember pam mom", &Canonicalizer::default()).is_none());
        assert!(fragment("pam is nice", &Canonicalizer::default()).is_none());
    }

    #[test]
    fn wh_possessive_questions() {
        assert_intent("who is Pam's husband?", IntentKind::Ask, "pam", "husband", None);
        assert_intent("what's ty's favorite color", IntentKind::Ask, "ty", "favorite color", None);
        assert_intent("when is pam's birthdate", IntentKind::Ask, "pam", "birthday", None);
        assert_intent("what are pams favorite restaurants?", IntentKind::Ask, "pam", "favorite restaurants", None);
    }

    #[test]
    fn who_raised_and_born_questions() {
        assert_intent("who raised Pam?", IntentKind::Ask, "pam", "raised by", None);
        assert_intent("who primarily raised Pamela", IntentKind::Ask, "pam", "raised by", None);
        assert_intent("where was Pam born?", IntentKind::Ask, "pam", "birthplace", None);
        assert_intent("when was Pam born?", IntentKind::Ask, "pam", "birthday", None);
        assert_intent("where is Pam from?", IntentKind::Ask, "pam", "birthplace", None);
        assert_intent("where was aunt joyce from", IntentKind::Ask, "aunt joyce", "birthplace", None);
    }

    #[test]
    fn yes_no_questions_map_to_relations() {
        assert_intent("did Pam have pets?", IntentKind::Ask, "pam", "pets", None);
        assert_intent("does ricky have any kids", IntentKind::Ask, "rickey", "children", None);
        assert_intent("has Pam got a husband?", IntentKind::Unknown, "", "", None);
    }

    #[test]
    fn of_and_tell_me_questions() {
        assert_intent("what is the birthday of Pam?", IntentKind::Ask, "pam", "birthday", None);
        assert_intent("remind me of Ty's coffee order", IntentKind::Ask, "ty", "coffee order", None);
        assert_intent("tell me Pam's middle name", IntentKind::Ask, "pam", "middle name", None);
    }

    #[test]
    fn bare_possessive_and_terse_questions() {
        assert_intent("Pam's husband?", IntentKind::Ask, "pam", "husband", None);
        assert_intent("Pam's shoe size?", IntentKind::Ask, "pam", "shoe size", None);
        assert_intent("aunt joyce birthday?", IntentKind::Ask, "aunt joyce", "birthday", None);
    }

    #[test]
    fn question_with_is_is_not_taught() {
        let intent = parser().parse("Pam's husband is Rickey?");
        assert_ne!(intent.kind, IntentKind::Teach);
    }

    #[test]
    fn garbage_is_unknown() {
        for input in [
            "",
            "   ",
            "???",
            "the weather is nice today and I like it",
            "asdf qwer zxcv uiop hjkl",
            "'s 's 's",
            "remember",
            "forget",
            "!!!!",
            "what is",
        ] {
            assert!(parser().parse(input).is_unknown(), "input: {input:?}");
        }
    }

    #[test]
    fn rules_are_named_and_unique() {
        let mut names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RULES.len());
    }
}
