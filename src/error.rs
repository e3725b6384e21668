//! Error type shared by the whole pipeline.

use thiserror::Error;

/// Everything that can stop a flowchart from being generated.
#[derive(Debug, Error)]
pub enum FlowchartError {
    /// Malformed JSON or a type mismatch inside the AST document.
    #[error("invalid AST JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The program has no function with the requested entry name.
    #[error("{name} not found")]
    MissingEntry { name: String },

    /// A statement kind the builder cannot translate.
    #[error("unsupported statement: {kind}")]
    UnsupportedStatement { kind: String },

    /// An expression kind the builder cannot label.
    #[error("unsupported expression: {kind}")]
    UnsupportedExpression { kind: String },

    /// The built graph broke a structural invariant.
    #[error("invalid flowchart graph: {0}")]
    InvalidGraph(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlowchartError>;
