use thiserror::Error;

/// Failure to turn a query source into an executable filter
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("parsing jq query: {0}")]
    Parse(String),

    #[error("compiling jq query: {0}")]
    Compile(String),
}

/// Runtime failure raised while a filter produces its outputs
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct EvalError {
    message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure while compiling or applying the queries of one crawl
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("compiling check query: {0}")]
    CheckQuery(#[source] QueryError),

    #[error("compiling query of variable {name}: {source}")]
    VariableQuery { name: String, source: QueryError },

    #[error("unmarshaling into json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("applying check query: {0}")]
    Check(#[source] EvalError),

    #[error("applying variable '{name}' query: {source}")]
    Variable { name: String, source: EvalError },
}
