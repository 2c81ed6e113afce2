//! Project file entry point: dialect selection and outcome reporting.

use std::path::{Component, Path, PathBuf};

use log::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::VcprojError;
use crate::tree::Tree;
use crate::{vcproj, vcxproj};

/// Result of one project parse task.
#[derive(Debug)]
pub enum ProjectOutcome {
    /// A complete Project subtree.
    Completed(Tree),
    /// Cancellation was observed; nothing was built.
    Canceled,
    /// Unsupported or unreadable input.
    Empty,
}

impl ProjectOutcome {
    pub fn into_tree(self) -> Option<Tree> {
        match self {
            Self::Completed(tree) => Some(tree),
            Self::Canceled | Self::Empty => None,
        }
    }
}

/// Project file dialect, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `.vcproj`
    Legacy,
    /// `.vcxproj` with an optional `.vcxproj.filters`
    Modern,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("vcproj") {
            Some(Self::Legacy)
        } else if ext.eq_ignore_ascii_case("vcxproj") {
            Some(Self::Modern)
        } else {
            None
        }
    }
}

/// Parse one project file.
///
/// Never fails: errors are logged and reported as [`ProjectOutcome::Empty`].
pub fn parse_project_file(path: &Path, cancel: &CancellationToken) -> ProjectOutcome {
    let Some(dialect) = Dialect::from_path(path) else {
        let err = VcprojError::UnsupportedFormat(path.to_path_buf());
        warn!(err:err; "Not parsing project file");
        return ProjectOutcome::Empty;
    };

    let result = match dialect {
        Dialect::Legacy => vcproj::parse_file(path, cancel),
        Dialect::Modern => vcxproj::parse_file(path, cancel),
    };

    match result {
        Ok(tree) => ProjectOutcome::Completed(tree),
        Err(VcprojError::Canceled) => {
            debug!(path = path.display().to_string(); "Project parse canceled");
            ProjectOutcome::Canceled
        }
        Err(err) => {
            warn!(path = path.display().to_string(), err:err; "Failed to parse project file");
            ProjectOutcome::Empty
        }
    }
}

/// Join `relative` onto `dir`, folding `.` and `..` components.
pub(crate) fn resolve_relative(dir: &Path, relative: &str) -> PathBuf {
    let mut result = dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    result.components().next_back(),
                    None | Some(Component::ParentDir | Component::RootDir | Component::Prefix(_))
                );
                if at_root {
                    result.push("..");
                } else {
                    result.pop();
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}
