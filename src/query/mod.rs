//! jq queries over JSON documents.
//!
//! Parsing, compilation and evaluation are done by jaq with the jq standard
//! library loaded. A [`Query`] is compiled once and evaluated lazily, so
//! callers that only want the first output never run the rest.

mod applier;
mod error;

use std::fmt;

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, Filter, Native, RcIter};
use jaq_json::Val;
use serde_json::Value;

use crate::utils::catch_panic_sync;

pub use applier::{Applier, QueryResult};
pub use error::{ApplyError, EvalError, QueryError};

/// A compiled query expression
pub struct Query {
    source: String,
    filter: Filter<Native<Val>>,
}

impl Query {
    /// Parse and compile a query source
    pub fn compile(source: &str) -> Result<Self, QueryError> {
        let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
        let arena = Arena::default();
        let program = File { code: source, path: () };

        let modules = loader
            .load(&arena, program)
            .map_err(|errs| QueryError::Parse(report(errs)))?;

        let filter = Compiler::default()
            .with_funs(jaq_std::funs().chain(jaq_json::funs()))
            .compile(modules)
            .map_err(|errs| QueryError::Compile(report(errs)))?;

        Ok(Self {
            source: source.to_string(),
            filter,
        })
    }

    /// First output of the query on `input`, `None` when it yields nothing
    pub fn first(&self, input: Value) -> Option<Result<Value, EvalError>> {
        // Arithmetic edge cases inside the engine must not take the cycle down
        catch_panic_sync(|| {
            let inputs = RcIter::new(std::iter::empty());
            let mut outputs = self.filter.run((Ctx::new([], &inputs), Val::from(input)));
            let first = outputs.next();
            first.map(|out| out.map(Value::from).map_err(|e| EvalError::new(e.to_string())))
        })
        .unwrap_or_else(|panic| Some(Err(EvalError::new(format!("query panicked: {}", panic)))))
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("source", &self.source).finish()
    }
}

fn report<P, E: fmt::Debug>(errs: Vec<(File<&str, P>, E)>) -> String {
    errs.iter()
        .map(|(_, e)| format!("{:?}", e))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn first(source: &str, input: Value) -> Value {
        Query::compile(source).unwrap().first(input).unwrap().unwrap()
    }

    #[test]
    fn test_compile_once_run_many() {
        let query = Query::compile(".count > 1").unwrap();
        assert_eq!(query.first(json!({"count": 2})).unwrap().unwrap(), json!(true));
        assert_eq!(query.first(json!({"count": 0})).unwrap().unwrap(), json!(false));
        assert!(query.first(json!("text")).unwrap().is_err());
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(Query::compile("1 +"), Err(QueryError::Parse(_))));
        assert!(matches!(Query::compile("frobnicate"), Err(QueryError::Compile(_))));
    }

    #[test]
    fn test_no_output() {
        assert!(Query::compile("empty").unwrap().first(json!(1)).is_none());
    }

    #[test]
    fn test_jq_language() {
        let fruit = json!({"name": "apple", "tags": ["a", "b"]});
        assert_eq!(first(r#""\(.name) found""#, fruit.clone()), json!("apple found"));
        assert_eq!(first(r#"try error("x") catch "none""#, json!(null)), json!("none"));
        assert_eq!(first(r#".name | sub("p"; "P")"#, fruit.clone()), json!("aPple"));
        assert_eq!(first("del(.name)", fruit.clone()), json!({"tags": ["a", "b"]}));
        assert_eq!(first("[paths] | length", fruit.clone()), json!(4));
        assert_eq!(first(r#".name | test("APPLE"; "i")"#, fruit.clone()), json!(true));
        assert_eq!(first(".name | @base64", fruit), json!("YXBwbGU="));
        assert_eq!(first("now | type", json!(null)), json!("number"));
        assert_eq!(first("reduce .[] as $x (0; . + $x)", json!([1, 2, 3])), json!(6));
    }
}
