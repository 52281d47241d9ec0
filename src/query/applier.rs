use std::collections::BTreeMap;

use serde_json::Value;

use super::error::{ApplyError, EvalError};
use super::Query;

/// Largest integer magnitude an `f64` represents exactly
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Outcome of applying a crawl's queries to one response body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub matched: bool,
    pub variables: BTreeMap<String, String>,
}

/// Compiled check query plus the named variable queries of one crawl
#[derive(Debug)]
pub struct Applier {
    check: Query,
    variables: BTreeMap<String, Query>,
}

impl Applier {
    pub fn new(check: &str, variables: &BTreeMap<String, String>) -> Result<Self, ApplyError> {
        let check = Query::compile(check).map_err(ApplyError::CheckQuery)?;

        let variables = variables
            .iter()
            .map(|(name, source)| {
                Query::compile(source)
                    .map(|query| (name.clone(), query))
                    .map_err(|source| ApplyError::VariableQuery {
                        name: name.clone(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { check, variables })
    }

    pub fn apply(&self, body: &[u8]) -> Result<QueryResult, ApplyError> {
        let document: Value = serde_json::from_slice(body)?;

        let check = first_item(&self.check, &document).map_err(ApplyError::Check)?;

        let mut variables = BTreeMap::new();
        for (name, query) in &self.variables {
            let text = first_item(query, &document).map_err(|source| ApplyError::Variable {
                name: name.clone(),
                source,
            })?;
            variables.insert(name.clone(), text);
        }

        Ok(QueryResult {
            matched: is_truthy_text(&check),
            variables,
        })
    }
}

/// Compact JSON text of the first output; `""` when the query yields nothing
fn first_item(query: &Query, document: &Value) -> Result<String, EvalError> {
    match query.first(document.clone()) {
        Some(Ok(value)) => Ok(normalize(value).to_string()),
        Some(Err(e)) => Err(e),
        None => Ok(String::new()),
    }
}

/// Rewrite integral floats as integers, recursively, so `4 / 2` prints as `2`
fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}

/// `true` in any ASCII case, or a base-10 integer greater than zero
pub fn is_truthy_text(text: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        return true;
    }
    text.parse::<i64>().map_or(false, |n| n > 0)
}
