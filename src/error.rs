//! Error types shared by the project parsers and the tree model.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while reading a project file.
///
/// These never leave a project parse task: [`crate::project::parse_project_file`]
/// turns them into a [`crate::project::ProjectOutcome`].
#[derive(Debug, Error)]
pub enum VcprojError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML Error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("unsupported project format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("expected <{expected}> root element, found <{found}>")]
    UnexpectedRoot { expected: &'static str, found: String },

    #[error("invalid condition '{input}': {message}")]
    Condition { input: String, message: String },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("parse canceled")]
    Canceled,
}

impl VcprojError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Failure of a structural operation on the [`crate::tree::Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("filters cannot be renamed")]
    RenameRefused,

    #[error("node is not a project")]
    NotAProject,
}
