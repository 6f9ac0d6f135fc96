use thiserror::Error;

/// Failures of discovery, synthesis and lifting. All of them are deterministic
/// results of symbolic analysis; retrying the same request never helps.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrnamentError {
    #[error("Unsupported declaration shape: {0}")]
    UnsupportedShape(String),
    #[error("No index position relates {before} to {after}")]
    NoIndexCandidate { before: String, after: String },
    #[error("Ambiguous index between {before} and {after}: positions {positions:?} all qualify")]
    AmbiguousIndex { before: String, after: String, positions: Vec<usize> },
    #[error("Cannot align constructor {ctor}: {reason}")]
    AlignmentFailure { ctor: String, reason: String },
    #[error("Cannot lift {node}: it scrutinizes a value of {ty} directly")]
    UnliftableNode { node: String, ty: String },
    #[error("Unknown declaration: {0}")]
    UnknownDeclaration(String),
    #[error("Malformed declaration {name}: {reason}")]
    MalformedDeclaration { name: String, reason: String },
}

pub type OrnResult<A> = Result<A, OrnamentError>;

pub(crate) fn malformed(name: String, reason: impl Into<String>) -> OrnamentError {
    OrnamentError::MalformedDeclaration { name, reason: reason.into() }
}
