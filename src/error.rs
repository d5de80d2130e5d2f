use std::sync::PoisonError;

use arcstr::ArcStr;
use thiserror::Error;

use crate::layout::CellId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("layer `{layer}` is not defined by technology `{tech}`")]
    UnknownLayer { tech: ArcStr, layer: String },

    #[error("no `{kind}` device model in technology `{tech}`")]
    UnknownModel { tech: ArcStr, kind: String },

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("no cell with id {0:?}")]
    UnknownCell(CellId),

    #[error("cell `{cell}` has no port named `{port}`")]
    UnknownPort { cell: ArcStr, port: String },

    #[error("invalid technology data: {0}")]
    Tech(String),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("layout error: {0}")]
    Layout(String),

    #[error("gds error: {0}")]
    Gds(#[from] gds21::GdsError),

    #[error("poisoned lock: {0}")]
    Lock(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(e: PoisonError<T>) -> Self {
        Self::Lock(e.to_string())
    }
}

// Carried as text: `LayoutError` boxes errors that are not `Send`.
impl From<layout21raw::LayoutError> for Error {
    fn from(e: layout21raw::LayoutError) -> Self {
        Self::Layout(format!("{e:?}"))
    }
}

impl Error {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
