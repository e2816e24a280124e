//! Label selectors
//!
//! A [`Selector`] is a conjunction of [`Requirement`]s evaluated against a
//! [`LabelSet`]. The textual form is a comma-separated list of requirements:
//!
//! ```text
//! type notin (aggregate), description!=hans1, env=prod, rir, !deprecated
//! ```
//!
//! Negative requirements (`!=`, `notin`) are satisfied by a missing key.

use std::fmt;
use std::str::FromStr;

use ahash::AHashSet;

use crate::Error;
use crate::labels::LabelSet;

/// A single predicate over one label key
#[derive(Clone, Debug, PartialEq)]
pub enum Requirement {
    /// `key=value` or `key==value`
    Equals {
        /// Label key
        key: String,
        /// Required value
        value: String,
    },
    /// `key!=value`
    NotEquals {
        /// Label key
        key: String,
        /// Excluded value
        value: String,
    },
    /// `key in (a, b)`
    In {
        /// Label key
        key: String,
        /// Accepted values
        values: AHashSet<String>,
    },
    /// `key notin (a, b)`
    NotIn {
        /// Label key
        key: String,
        /// Excluded values
        values: AHashSet<String>,
    },
    /// `key`
    Exists {
        /// Label key
        key: String,
    },
    /// `!key`
    NotExists {
        /// Label key
        key: String,
    },
}

impl Requirement {
    /// `key=value`
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Requirement::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `key!=value`
    pub fn not_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Requirement::NotEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `key in (values...)`
    pub fn in_set<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Requirement::In {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `key notin (values...)`
    pub fn not_in_set<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Requirement::NotIn {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `key`
    pub fn exists(key: impl Into<String>) -> Self {
        Requirement::Exists { key: key.into() }
    }

    /// `!key`
    pub fn not_exists(key: impl Into<String>) -> Self {
        Requirement::NotExists { key: key.into() }
    }

    /// The label key this requirement inspects
    pub fn key(&self) -> &str {
        match self {
            Requirement::Equals { key, .. }
            | Requirement::NotEquals { key, .. }
            | Requirement::In { key, .. }
            | Requirement::NotIn { key, .. }
            | Requirement::Exists { key }
            | Requirement::NotExists { key } => key,
        }
    }

    /// Evaluate against a label set
    pub fn matches(&self, labels: &LabelSet) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value.as_str()),
            Requirement::NotEquals { key, value } => labels.get(key) != Some(value.as_str()),
            Requirement::In { key, values } => labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn { key, values } => {
                !labels.get(key).is_some_and(|v| values.contains(v))
            }
            Requirement::Exists { key } => labels.has(key),
            Requirement::NotExists { key } => !labels.has(key),
        }
    }
}

fn sorted(values: &AHashSet<String>) -> Vec<&str> {
    let mut values: Vec<&str> = values.iter().map(String::as_str).collect();
    values.sort_unstable();
    values
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals { key, value } => write!(f, "{}={}", key, value),
            Requirement::NotEquals { key, value } => write!(f, "{}!={}", key, value),
            Requirement::In { key, values } => {
                write!(f, "{} in ({})", key, sorted(values).join(","))
            }
            Requirement::NotIn { key, values } => {
                write!(f, "{} notin ({})", key, sorted(values).join(","))
            }
            Requirement::Exists { key } => write!(f, "{}", key),
            Requirement::NotExists { key } => write!(f, "!{}", key),
        }
    }
}

/// Conjunction of requirements. The empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector with no requirements
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the textual selector grammar
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut selector = Selector::new();
        if input.trim().is_empty() {
            return Ok(selector);
        }
        for clause in split_clauses(input)? {
            selector.requirements.push(parse_requirement(clause)?);
        }
        Ok(selector)
    }

    /// Add a requirement, builder style
    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Add a requirement in place
    pub fn push(&mut self, requirement: Requirement) {
        self.requirements.push(requirement);
    }

    /// Requirements in insertion order
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Whether the selector has no requirements
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// True iff every requirement holds
    pub fn matches(&self, labels: &LabelSet) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

fn syntax_error(clause: &str, reason: &str) -> Error {
    Error::InvalidSelectorSyntax {
        clause: clause.trim().to_string(),
        reason: reason.to_string(),
    }
}

/// Split on commas outside parentheses
fn split_clauses(input: &str) -> Result<Vec<&str>, Error> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '(' => {
                if depth > 0 {
                    let end = clause_end(input, i, depth);
                    return Err(syntax_error(&input[start..end], "nested parentheses"));
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    let end = clause_end(input, i + 1, 0);
                    return Err(syntax_error(&input[start..end], "unbalanced ')'"));
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                clauses.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(syntax_error(&input[start..], "missing ')'"));
    }
    clauses.push(&input[start..]);

    for clause in &clauses {
        if clause.trim().is_empty() {
            return Err(syntax_error(clause, "empty requirement"));
        }
    }
    Ok(clauses)
}

/// End of the clause containing `from`: the next comma at depth zero, or the
/// end of input. Parentheses may nest here.
fn clause_end(input: &str, from: usize, mut depth: usize) -> usize {
    for (i, c) in input[from..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return from + i,
            _ => {}
        }
    }
    input.len()
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

fn parse_key<'a>(clause: &str, key: &'a str) -> Result<&'a str, Error> {
    let key = key.trim();
    if key.is_empty() {
        return Err(syntax_error(clause, "missing key"));
    }
    if !key.chars().all(is_label_char) {
        return Err(syntax_error(clause, &format!("invalid key '{}'", key)));
    }
    Ok(key)
}

fn parse_value<'a>(clause: &str, value: &'a str) -> Result<&'a str, Error> {
    let value = value.trim();
    if !value.chars().all(is_label_char) {
        return Err(syntax_error(clause, &format!("invalid value '{}'", value)));
    }
    Ok(value)
}

fn parse_requirement(clause: &str) -> Result<Requirement, Error> {
    let text = clause.trim();

    if let Some(rest) = text.strip_prefix('!') {
        if rest.trim_start().starts_with('=') {
            return Err(syntax_error(clause, "missing key"));
        }
        return Ok(Requirement::not_exists(parse_key(clause, rest)?));
    }

    if let Some(pos) = text.find(['!', '=']) {
        let key = parse_key(clause, &text[..pos])?;
        let op = &text[pos..];
        let (negated, value) = if let Some(v) = op.strip_prefix("!=") {
            (true, v)
        } else if let Some(v) = op.strip_prefix("==") {
            (false, v)
        } else if let Some(v) = op.strip_prefix('=') {
            (false, v)
        } else {
            return Err(syntax_error(clause, "expected '=', '==' or '!='"));
        };
        let value = parse_value(clause, value)?;
        return Ok(if negated {
            Requirement::not_equals(key, value)
        } else {
            Requirement::equals(key, value)
        });
    }

    if let Some((head, tail)) = text.split_once('(') {
        let mut tokens = head.split_whitespace();
        let (Some(key), Some(op), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(syntax_error(clause, "expected 'key in (...)' or 'key notin (...)'"));
        };
        let key = parse_key(clause, key)?;
        let Some(body) = tail.trim_end().strip_suffix(')') else {
            return Err(syntax_error(clause, "missing ')'"));
        };
        if body.trim().is_empty() {
            return Err(syntax_error(clause, "empty value set"));
        }
        let values = body
            .split(',')
            .map(|v| parse_value(clause, v))
            .collect::<Result<Vec<_>, _>>()?;
        return match op {
            "in" => Ok(Requirement::in_set(key, values)),
            "notin" => Ok(Requirement::not_in_set(key, values)),
            other => Err(syntax_error(clause, &format!("unknown operator '{}'", other))),
        };
    }

    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(key), None) => Ok(Requirement::exists(parse_key(clause, key)?)),
        (Some(_), Some(op)) if op == "in" || op == "notin" => {
            Err(syntax_error(clause, "missing '('"))
        }
        _ => Err(syntax_error(clause, "unexpected token")),
    }
}
