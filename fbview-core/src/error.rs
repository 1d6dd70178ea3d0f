use std::path::PathBuf;

use thiserror::Error;

/// Failures that end a viewing session.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("cannot open <{}>: {reason}", path.display())]
    Open { path: PathBuf, reason: String },
    #[error("cannot open <{}>: document has no pages", path.display())]
    Empty { path: PathBuf },
    #[error("display failure: {0}")]
    Display(String),
}

impl ViewerError {
    pub fn open(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Open {
            path: path.into(),
            reason: format!("{err:#}"),
        }
    }

    pub fn display(err: &anyhow::Error) -> Self {
        Self::Display(format!("{err:#}"))
    }
}

/// A page load that was refused; the current view stays as it was.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("page {page} outside 1..={count}")]
    OutOfRange { page: i64, count: usize },
    #[error("failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },
}
