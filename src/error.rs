use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CuratorError {
    #[error("object store request failed: {0}")]
    Http(String),

    #[error("object store returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode object store response: {0}")]
    Decode(String),

    #[error("object store response is missing `{field}` ({context})")]
    MissingField { field: String, context: String },

    #[error("invalid entity kind: {0}")]
    InvalidKind(String),

    #[error("invalid entity reference (expected kind:id): {0}")]
    InvalidEntityRef(String),

    #[error("frequency `{0}` has no schedule timing")]
    UnknownFrequency(String),

    #[error("cannot walk metadata below a {0}")]
    #[diagnostic(help("metadata walks start from a collection, folder, item or file"))]
    UnsupportedTraversal(String),

    #[error("missing config file girder-curator.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no profile named `{0}` in config")]
    UnknownProfile(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
