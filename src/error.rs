use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while training, comparing, aligning and exporting term models.
#[derive(Debug, Error)]
pub enum Error {
    /// A queried term is not part of the model vocabulary.
    #[error("unknown term: '{0}' is not in the model vocabulary")]
    UnknownTerm(String),

    /// A term set does not have the expected nested or flat shape.
    #[error("malformed term set '{tag}': {reason}")]
    MalformedTermSet { tag: String, reason: String },

    /// Export was given a different number of vocabularies than models.
    #[error("vocabulary count mismatch: {models} models but {vocabularies} vocabularies")]
    VocabCountMismatch { models: usize, vocabularies: usize },

    /// Writing an exported table failed.
    #[error("could not export '{tag}' to {}: {source}", .path.display())]
    ExportIo {
        tag: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid tag '{0}': tags must be non-empty and contain no path separators")]
    InvalidTag(String),

    #[error("query needs at least one word")]
    EmptyQuery,

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("invalid term file: {0}")]
    InvalidTermFile(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("corpus '{0}' produced an empty vocabulary")]
    EmptyCorpus(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    NpyRead(#[from] ndarray_npy::ReadNpyError),

    #[error(transparent)]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::VocabCountMismatch { models: 2, vocabularies: 1 };
        assert!(err.to_string().contains("2 models"));
        assert!(err.to_string().contains("1 vocabularies"));

        let err = Error::MalformedTermSet { tag: "tag1".to_string(), reason: "missing \"nodes\"".to_string() };
        assert!(err.to_string().contains("tag1"));
    }
}
