//! Error types shared by the practice engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by document loading and editing.
///
/// `Format` and `Parse` abort a load attempt and leave any previously loaded
/// document in place. The remaining variants reject a single edit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid timestamp: {0}")]
    Format(String),

    #[error("no subtitles found in the document")]
    Parse,

    #[error("unknown segment id {0}")]
    UnknownSegment(u32),

    #[error("segment {0} would have empty text")]
    EmptyText(u32),

    #[error("no document loaded")]
    NoDocument,

    #[error("configuration error: {0}")]
    Config(String),
}
