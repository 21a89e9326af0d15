//! Error taxonomy for the extraction pipeline.

use crate::page::PageError;

/// Top-level error type.
///
/// `Auth`, `Navigation` and `SessionExpired` abort a whole batch; `Filter`
/// errors are caught at the per-combination boundary and attributed to a
/// unit/kelompok in the batch aggregate. A recognized "no data" dialog is not
/// an error at all -- see [`crate::export::ExportOutcome::NoData`].
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The portal silently dropped the session mid-navigation. Distinct from
    /// `Navigation` so callers can choose to re-authenticate and resume.
    #[error("session expired during navigation")]
    SessionExpired,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{dimension} filter failed: {detail}")]
    Filter {
        dimension: &'static str,
        detail: String,
    },

    #[error("page error: {0}")]
    Page(#[from] PageError),

    /// The whole batch finished without producing a single file.
    #[error("no files were downloaded for this batch")]
    NothingDownloaded,

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
