//! Evaluation of `query_string` expressions against JSON documents for the
//! in-memory index.
//!
//! Supported: whitespace-separated clauses (OR by default), explicit `OR` and
//! `AND`, `field:value` with dotted paths into nested objects, bare terms
//! matched against every scalar field, `"quoted phrases"`, trailing `*`
//! prefix wildcards, and `*` / `*:*` for everything. Matching ignores case.

use itertools::Itertools;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Pattern {
    Everything,
    Term(String),
    Prefix(String),
    Phrase(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    path: Option<Vec<String>>,
    pattern: Pattern,
}

/// A parsed query: a disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryString {
    groups: Vec<Vec<Clause>>,
}

impl QueryString {
    pub fn parse(input: &str) -> Self {
        let mut groups: Vec<Vec<Clause>> = Vec::new();
        let mut join_next = false;

        for token in split_tokens(input) {
            match token.as_str() {
                "OR" | "||" => join_next = false,
                "AND" | "&&" => join_next = true,
                _ => {
                    let clause = parse_clause(&token);
                    match groups.last_mut() {
                        Some(group) if join_next => group.push(clause),
                        _ => groups.push(vec![clause]),
                    }
                    join_next = false;
                }
            }
        }

        Self { groups }
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|clause| clause.matches(document)))
    }
}

impl Clause {
    fn matches(&self, document: &Value) -> bool {
        if self.pattern == Pattern::Everything && self.path.is_none() {
            return true;
        }
        let mut leaves = Vec::new();
        match &self.path {
            Some(path) => collect_at_path(document, path, &mut leaves),
            None => collect_leaves(document, &mut leaves),
        }
        leaves.iter().any(|leaf| self.pattern.matches(leaf))
    }
}

impl Pattern {
    fn matches(&self, leaf: &str) -> bool {
        match self {
            Pattern::Everything => true,
            Pattern::Phrase(phrase) => leaf.contains(phrase.as_str()),
            Pattern::Term(term) => leaf == term || words(leaf).any(|word| word == term),
            Pattern::Prefix(prefix) => {
                leaf.starts_with(prefix.as_str()) || words(leaf).any(|word| word.starts_with(prefix.as_str()))
            }
        }
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

fn split_tokens(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_clause(token: &str) -> Clause {
    if token == "*" || token == "*:*" {
        return Clause {
            path: None,
            pattern: Pattern::Everything,
        };
    }

    // A colon inside a quoted phrase is not a field separator.
    let field_split = token
        .find(':')
        .filter(|&pos| !token[..pos].contains('"') && pos > 0);

    match field_split {
        Some(pos) => Clause {
            path: Some(token[..pos].split('.').map(str::to_string).collect_vec()),
            pattern: parse_pattern(&token[pos + 1..]),
        },
        None => Clause {
            path: None,
            pattern: parse_pattern(token),
        },
    }
}

fn parse_pattern(raw: &str) -> Pattern {
    let lowered = raw.to_lowercase();
    if lowered == "*" {
        Pattern::Everything
    } else if lowered.len() >= 2 && lowered.starts_with('"') && lowered.ends_with('"') {
        Pattern::Phrase(lowered[1..lowered.len() - 1].to_string())
    } else if let Some(prefix) = lowered.strip_suffix('*') {
        Pattern::Prefix(prefix.to_string())
    } else {
        Pattern::Term(lowered.trim_matches('"').to_string())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn collect_leaves(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => map.values().for_each(|v| collect_leaves(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_leaves(v, out)),
        other => out.extend(scalar_text(other)),
    }
}

fn collect_at_path(value: &Value, path: &[String], out: &mut Vec<String>) {
    let Some((head, rest)) = path.split_first() else {
        collect_leaves(value, out);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(head.as_str()) {
                collect_at_path(child, rest, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_at_path(v, path, out)),
        _ => {}
    }
}
