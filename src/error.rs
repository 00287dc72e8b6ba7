use std::io;

use thiserror::Error;

/// Errors surfaced by the import, merge and similarity stages.
///
/// Data-quality problems (missing regions, unknown runs, empty merges) are not
/// errors; they are logged and a sentinel is substituted instead.
#[derive(Debug, Error)]
pub enum BiosysError {
    /// The input has the wrong shape or an unexpected schema
    #[error("incompatible format: {0}")]
    IncompatibleFormat(String),

    /// A precondition inside the pipeline was violated
    #[error("logic error: {0}")]
    Logic(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("cannot read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),

    #[error("cannot write workbook: {0}")]
    WorkbookWrite(#[from] xlsxwriter::XlsxError),

    #[error("cannot parse settings: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BiosysError>;
