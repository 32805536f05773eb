//! Plain-English sentences for answers.

use sono::FactValue;

use crate::Result;

/// Rewrites a sentence for fluency. Implemented outside this crate or by
/// [`OpenAiRewriter`](crate::providers::OpenAiRewriter).
pub trait Rewriter: Send + Sync {
    fn rewrite(&self, text: &str) -> Result<String>;
}

/// One sentence stating `subject`'s `relation` (a canonical key).
pub fn sentence(subject: &str, relation: &str, value: &FactValue) -> String {
    let s = subject.trim();
    match value {
        FactValue::List(items) => {
            let items: Vec<&str> = items.iter().map(|i| i.trim()).collect();
            let j = join_items(&items);
            match relation {
                "schools attended" => format!("{s} attended {j}."),
                "raised by" => format!("{s} was raised by {j}."),
                _ => format!("{s}'s {relation} are {j}."),
            }
        }
        FactValue::Text(text) => {
            let o = text.trim().trim_end_matches('.');
            match relation {
                "husband" | "wife" => format!("{o} is {s}'s {relation}."),
                "mother" | "father" => format!("{o} is the {relation} of {s}."),
                "mission" | "purpose" | "goal" => format!("{s}'s {relation} is: {o}"),
                "birthplace" => format!("{s} was born in {o}."),
                "hometown" => format!("{s} grew up in {o}."),
                "raised by" => format!("{s} was raised by {o}."),
                "full name" | "birthday" | "nickname" | "occupation" => {
                    format!("{s}'s {relation} is {o}.")
                }
                _ => format!("{o} is the {relation} of {s}."),
            }
        }
    }
}

/// "A", "A and B", "A, B, and C".
pub fn join_items(items: &[&str]) -> String {
    let items: Vec<&str> = items.iter().copied().filter(|i| !i.is_empty()).collect();
    match items.as_slice() {
        [] => String::new(),
        [one] => one.to_string(),
        [a, b] => format!("{a} and {b}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}
