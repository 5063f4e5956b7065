//! Label selector: the predicate that picks "comparable" tasks.
//!
//! Syntax is a comma separated list of requirements, all of which must hold:
//!
//! | form            | matches when                                   |
//! |-----------------|------------------------------------------------|
//! | `k=v`, `k==v`   | label `k` is present and equals `v`            |
//! | `k!=v`          | label `k` is absent or differs from `v`        |
//! | `k in (a,b)`    | label `k` is present and one of the values     |
//! | `k notin (a,b)` | label `k` is absent or none of the values      |
//! | `k`             | label `k` is present                           |
//! | `!k`            | label `k` is absent                            |
//!
//! The empty selector matches every task.

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty requirement in selector")]
    EmptyRequirement,

    #[error("unbalanced parentheses in {0:?}")]
    UnbalancedParens(String),

    #[error("invalid label key {0:?}")]
    InvalidKey(String),

    #[error("invalid label value {0:?}")]
    InvalidValue(String),

    #[error("set requirement {0:?} needs at least one value")]
    MissingValues(String),

    #[error("unknown set operator {0:?} (expected in or notin)")]
    UnknownOperator(String),

    #[error("malformed requirement {0:?}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    NotExists(String),
}

impl Requirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::In(k, values) => labels.get(k).is_some_and(|x| values.contains(x)),
            Requirement::NotIn(k, values) => labels.get(k).is_none_or(|x| !values.contains(x)),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::NotExists(k) => !labels.contains_key(k),
        }
    }
}

/// A parsed label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector that matches every task.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::everything());
        }
        let requirements = split_top_level(s)?
            .into_iter()
            .map(parse_requirement)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }
}

/// Split on commas that are not inside a `( ... )` value list.
fn split_top_level(s: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::UnbalancedParens(s.to_string()))?;
            }
            ',' if depth == 0 => {
                terms.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::UnbalancedParens(s.to_string()));
    }
    terms.push(&s[start..]);
    Ok(terms)
}

fn parse_requirement(term: &str) -> Result<Requirement, SelectorError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(SelectorError::EmptyRequirement);
    }

    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement::NotExists(key_of(key)?));
    }

    if let Some(open) = term.find('(') {
        let Some(inner) = term[open + 1..].strip_suffix(')') else {
            return Err(SelectorError::UnbalancedParens(term.to_string()));
        };
        let mut head = term[..open].split_whitespace();
        let (Some(key), Some(op), None) = (head.next(), head.next(), head.next()) else {
            return Err(SelectorError::Malformed(term.to_string()));
        };
        let values = inner
            .split(',')
            .map(str::trim)
            .map(|v| {
                if v.is_empty() {
                    Err(SelectorError::MissingValues(term.to_string()))
                } else {
                    value_of(v)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let key = key_of(key)?;
        return match op {
            "in" => Ok(Requirement::In(key, values)),
            "notin" => Ok(Requirement::NotIn(key, values)),
            other => Err(SelectorError::UnknownOperator(other.to_string())),
        };
    }

    if let Some((k, v)) = term.split_once("!=") {
        return Ok(Requirement::NotEquals(key_of(k)?, value_of(v)?));
    }
    if let Some((k, v)) = term.split_once("==").or_else(|| term.split_once('=')) {
        return Ok(Requirement::Equals(key_of(k)?, value_of(v)?));
    }
    Ok(Requirement::Exists(key_of(term)?))
}

fn key_of(raw: &str) -> Result<String, SelectorError> {
    let key = raw.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if valid {
        Ok(key.to_string())
    } else {
        Err(SelectorError::InvalidKey(raw.to_string()))
    }
}

fn value_of(raw: &str) -> Result<String, SelectorError> {
    let value = raw.trim();
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        Ok(value.to_string())
    } else {
        Err(SelectorError::InvalidValue(raw.to_string()))
    }
}
