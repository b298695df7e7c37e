use thiserror::Error;

#[derive(Error, Debug)]
pub enum GloggError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Parse error on line '{line}': expected {expected}")]
    Parse { expected: String, line: String },
    #[error("Unbound variable '{variable}' in query {query}")]
    UnboundVariable { variable: String, query: usize },
    #[error("Variable '{variable}' is not allowed in an unconditional commit (query {query})")]
    VariableInUnconditional { variable: String, query: usize },
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, GloggError>;

// Helper conversions
impl From<rusqlite::Error> for GloggError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<config::ConfigError> for GloggError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<std::io::Error> for GloggError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
