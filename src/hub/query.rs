//! Abstract segment (query) evaluation (§4.A, §4.C): `{?key=value}`
//! filters, `{-?:re}` key-regex filters, `{:first}`/`{:last}`/numeric
//! positional selection, and the `|{...}` pipe/select syntax (an alternate
//! spelling of the same query forms, used to chain a query after another
//! address segment).

use regex::Regex;

use crate::error::AppError;
use crate::node::{Mapping, Node, Sequence};

/// Evaluates one abstract segment against `node`, returning the selected
/// Node. Abstract segments are valid for read/query only (§3).
pub fn evaluate(node: &Node, segment: &str) -> Result<Node, AppError> {
    let inner = strip_braces(segment)?;

    if let Some(pos) = inner.strip_prefix(':') {
        return evaluate_positional(node, pos);
    }
    if let Some(predicate) = inner.strip_prefix('?') {
        return evaluate_filter(node, predicate);
    }
    if let Some(pattern) = inner.strip_prefix("-?:") {
        return evaluate_key_regex(node, pattern);
    }

    Err(AppError::Logical(format!("unrecognized query segment: {segment}")))
}

fn strip_braces(segment: &str) -> Result<&str, AppError> {
    let segment = segment.strip_prefix('|').unwrap_or(segment);
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| AppError::Logical(format!("malformed query segment: {segment}")))
}

fn evaluate_positional(node: &Node, pos: &str) -> Result<Node, AppError> {
    match node {
        Node::Sequence(Sequence(items)) => {
            let index = match pos {
                "first" => 0,
                "last" => items.len().checked_sub(1).ok_or_else(|| {
                    AppError::DoesNotExist("empty sequence has no last element".into())
                })?,
                n => n
                    .parse::<usize>()
                    .map_err(|_| AppError::IllegalArg(format!("not a valid index: {n}")))?,
            };
            items
                .get(index)
                .cloned()
                .ok_or_else(|| AppError::DoesNotExist(format!("index {index} out of range")))
        }
        Node::Mapping(m) => {
            let index = match pos {
                "first" => 0,
                "last" => m.len().checked_sub(1).ok_or_else(|| {
                    AppError::DoesNotExist("empty mapping has no last element".into())
                })?,
                n => n
                    .parse::<usize>()
                    .map_err(|_| AppError::IllegalArg(format!("not a valid index: {n}")))?,
            };
            m.0.get_index(index)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| AppError::DoesNotExist(format!("index {index} out of range")))
        }
        _ => Err(AppError::Logical(
            "positional selection requires a Mapping or Sequence".into(),
        )),
    }
}

/// `{?key op value}` — filters a Mapping to entries whose child at `key`
/// matches, returning a Mapping of the survivors.
fn evaluate_filter(node: &Node, predicate: &str) -> Result<Node, AppError> {
    let mapping = node
        .as_mapping()
        .ok_or_else(|| AppError::Logical("{?...} filter requires a Mapping".into()))?;

    let (key, op, value) = parse_predicate(predicate)?;

    let mut out = Mapping::new();
    for (entry_key, entry) in mapping.0.iter() {
        let Some(child) = entry.as_mapping().and_then(|m| m.get(key)) else {
            continue;
        };
        let Some(child_text) = child.as_scalar().and_then(|s| match s {
            crate::node::Scalar::Text(t) => Some(t.as_str()),
            _ => None,
        }) else {
            continue;
        };

        let matches = match op {
            "=" => child_text == value,
            "!=" => child_text != value,
            "~" => Regex::new(value)
                .map_err(|e| AppError::IllegalArg(e.to_string()))?
                .is_match(child_text),
            other => return Err(AppError::IllegalArg(format!("unknown operator {other}"))),
        };

        if matches {
            out.insert(entry_key.clone(), entry.clone());
        }
    }

    Ok(Node::Mapping(out))
}

fn parse_predicate(predicate: &str) -> Result<(&str, &str, &str), AppError> {
    for op in ["!=", "~", "="] {
        if let Some(idx) = predicate.find(op) {
            let key = predicate[..idx].trim();
            let value = predicate[idx + op.len()..].trim();
            return Ok((key, op, value));
        }
    }
    Err(AppError::IllegalArg(format!(
        "malformed predicate: {predicate}"
    )))
}

/// `{-?:re}` — filters a Mapping's keys by regex, returning survivors.
fn evaluate_key_regex(node: &Node, pattern: &str) -> Result<Node, AppError> {
    let mapping = node
        .as_mapping()
        .ok_or_else(|| AppError::Logical("{-?:re} filter requires a Mapping".into()))?;
    let re = Regex::new(pattern).map_err(|e| AppError::IllegalArg(e.to_string()))?;

    let mut out = Mapping::new();
    for (key, value) in mapping.0.iter() {
        if re.is_match(key) {
            out.insert(key.clone(), value.clone());
        }
    }
    Ok(Node::Mapping(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn sample_sequence() -> Node {
        let mut seq = crate::node::Sequence::new();
        for label in ["a", "b", "c"] {
            seq.append(Node::text(label));
        }
        Node::Sequence(seq)
    }

    #[test]
    fn positional_first_last() {
        let seq = sample_sequence();
        assert!(matches!(evaluate(&seq, "{:first}").unwrap(), Node::Scalar(_)));
        let last = evaluate(&seq, "{:last}").unwrap();
        match last {
            Node::Scalar(crate::node::Scalar::Text(t)) => assert_eq!(t, "c"),
            _ => panic!(),
        }
    }

    #[test]
    fn filter_by_equality() {
        let mut people = Mapping::new();
        let mut alice = Mapping::new();
        alice.insert("status", Node::text("active"));
        people.insert("alice", Node::Mapping(alice));
        let mut bob = Mapping::new();
        bob.insert("status", Node::text("inactive"));
        people.insert("bob", Node::Mapping(bob));

        let result = evaluate(&Node::Mapping(people), "{?status=active}").unwrap();
        let result = result.as_mapping().unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["alice"]);
    }

    #[test]
    fn key_regex_filter() {
        let mut m = Mapping::new();
        m.insert("foo_1", Node::text("x"));
        m.insert("bar_1", Node::text("y"));
        let result = evaluate(&Node::Mapping(m), "{-?:^foo}").unwrap();
        assert_eq!(
            result.as_mapping().unwrap().keys().collect::<Vec<_>>(),
            vec!["foo_1"]
        );
    }
}
