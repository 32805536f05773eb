//! End-to-end conversations through `Memory::respond`.

use sono_memory::{FactValue, IntentKind, Memory, MemoryConfig, Reply, Tier, WriteOutcome};
use tempfile::TempDir;

fn open_temp_memory() -> (Memory, TempDir) {
    let dir = TempDir::new().unwrap();
    let memory = Memory::open(&MemoryConfig::at(dir.path().join("facts.json"))).unwrap();
    (memory, dir)
}

fn answered(reply: Reply) -> (Tier, FactValue, String) {
    match reply {
        Reply::Answered { answer, text } => (answer.tier, answer.value, text),
        other => panic!("expected an answer, got {other:?}"),
    }
}

#[test]
fn teach_then_recall() {
    let (memory, _dir) = open_temp_memory();
    let reply = memory.respond("Pam's husband is Rickey.").unwrap();
    match reply {
        Reply::Taught { intent, status } => {
            assert_eq!(intent.kind, IntentKind::Teach);
            assert_eq!((intent.subject.as_str(), intent.relation.as_str()), ("pam", "husband"));
            assert_eq!(status.outcome, WriteOutcome::Created);
            assert!(status.persisted);
        }
        other => panic!("expected a teach, got {other:?}"),
    }
    assert_eq!(memory.recall("pam", "husband").unwrap(), Some(FactValue::from("Rickey")));
}

#[test]
fn teach_list_keeps_order_without_duplicates() {
    let (memory, _dir) = open_temp_memory();
    memory.respond("Pam has children Ty, Aja and Jade").unwrap();
    let expected = FactValue::from(vec!["Ty", "Aja", "Jade"]);
    assert_eq!(memory.recall("pam", "children").unwrap(), Some(expected.clone()));

    memory.respond("remember pam's kids are ty and jade").unwrap();
    assert_eq!(memory.recall("pam", "children").unwrap(), Some(expected));

    let (_, _, text) = answered(memory.respond("who are pam's children?").unwrap());
    assert_eq!(text, "Pam's children are Ty, Aja, and Jade.");
}

#[test]
fn relation_alias_answers_through_alias_tier() {
    let (memory, _dir) = open_temp_memory();
    memory.respond("pam's birthday is June 4, 1954").unwrap();

    let (_, value, _) = answered(memory.respond("when is pam's birthdate").unwrap());
    assert_eq!(value, FactValue::from("June 4, 1954"));

    let answer = memory.answer("pam", "birthdate").unwrap().unwrap();
    assert_eq!(answer.tier, Tier::AliasVariant);
    assert_eq!(answer.value, FactValue::from("June 4, 1954"));
}

#[test]
fn unmapped_relation_answers_through_fuzzy_tier() {
    let (memory, _dir) = open_temp_memory();
    memory.remember("pam", "birthplace", "Chicago").unwrap();

    let answer = memory.answer("pam", "birth place").unwrap().unwrap();
    assert_eq!(answer.tier, Tier::Fuzzy);
    assert_eq!(answer.value, FactValue::from("Chicago"));

    let (_, _, text) = answered(memory.respond("where was pam born?").unwrap());
    assert_eq!(text, "Pam was born in Chicago.");
}

#[test]
fn where_from_finds_the_birthplace() {
    let (memory, _dir) = open_temp_memory();
    memory.respond("Pam was born in Chicago").unwrap();
    let (tier, value, text) = answered(memory.respond("where is Pam from?").unwrap());
    assert_eq!(tier, Tier::Exact);
    assert_eq!(value, FactValue::from("Chicago"));
    assert_eq!(text, "Pam was born in Chicago.");
}

#[test]
fn kinship_compounds_stay_apart_from_parents() {
    let (memory, _dir) = open_temp_memory();
    memory.respond("Ty's mother is Pam").unwrap();
    memory.respond("Ty's father is Rickey").unwrap();
    memory.respond("Ty's grandmother is Mamie Sorrell").unwrap();
    memory.respond("Ty's stepfather is Bob").unwrap();

    assert_eq!(memory.recall("ty", "mother").unwrap(), Some(FactValue::from("Pam")));
    assert_eq!(memory.recall("ty", "father").unwrap(), Some(FactValue::from("Rickey")));
    assert_eq!(
        memory.recall("ty", "grandma").unwrap(),
        Some(FactValue::from("Mamie Sorrell"))
    );
    assert_eq!(memory.recall("ty", "stepdad").unwrap(), Some(FactValue::from("Bob")));
    assert_eq!(memory.answer("ty", "godmother").unwrap(), None);
    assert!(matches!(
        memory.respond("who is ty's great grandmother?").unwrap(),
        Reply::NoAnswer { .. }
    ));
}

#[test]
fn unknown_questions_get_no_answer() {
    let (memory, _dir) = open_temp_memory();
    memory.respond("Pam's husband is Rickey.").unwrap();

    for question in [
        "who is aunt joyce's husband?",
        "what is pam's favorite song?",
        "where was ty born?",
    ] {
        assert!(
            matches!(memory.respond(question).unwrap(), Reply::NoAnswer { .. }),
            "question: {question}"
        );
    }
    assert_eq!(memory.answer("nobody", "anything").unwrap(), None);
}

#[test]
fn forget_then_ask() {
    let (memory, _dir) = open_temp_memory();
    memory.respond("Pam's husband is Rickey.").unwrap();
    assert!(memory.forget("pam", "husband").unwrap());
    assert_eq!(memory.recall("pam", "husband").unwrap(), None);
    assert!(matches!(
        memory.respond("who is pam's husband?").unwrap(),
        Reply::NoAnswer { .. }
    ));
    assert!(!memory.forget("pam", "husband").unwrap());
}

#[test]
fn conversation_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = MemoryConfig::at(dir.path().join("nested").join("facts.json"));
    {
        let memory = Memory::open(&config).unwrap();
        memory.respond("Pam's husband is Rickey.").unwrap();
        memory.respond("note that pam's favorite color is royal blue").unwrap();
        memory.respond("Pam was born in Chicago").unwrap();
    }
    let memory = Memory::open(&config).unwrap();
    assert_eq!(
        memory.recall("pam", "favorite color").unwrap(),
        Some(FactValue::from("Royal Blue"))
    );
    let (tier, value, _) = answered(memory.respond("what is pam's fave colour").unwrap());
    assert_eq!(tier, Tier::Exact);
    assert_eq!(value, FactValue::from("Royal Blue"));
    assert_eq!(memory.recall("pam", "birthplace").unwrap(), Some(FactValue::from("Chicago")));
}

#[test]
fn garbage_is_not_understood() {
    let (memory, _dir) = open_temp_memory();
    for text in ["", "???", "asdf qwer zxcv uiop hjkl", "the weather is nice today and I like it"] {
        assert_eq!(memory.respond(text).unwrap(), Reply::NotUnderstood, "text: {text:?}");
    }
    assert!(memory.store().subjects().unwrap().is_empty());
}
