use std::path::PathBuf;

use thiserror::Error;

/// Every error kind the resolver/linker core can surface.
#[derive(Debug, Error)]
pub enum SpmError {
    #[error("failed to fetch {reference}: {source}")]
    Fetch {
        reference: String,
        #[source]
        source: reqwest_middleware::Error,
    },

    #[error("failed to read response from {reference}: {source}")]
    FetchBody {
        reference: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch of {reference} returned HTTP {status}")]
    FetchStatus { reference: String, status: u16 },

    #[error("{file} not found in archive")]
    NotFoundInArchive { file: String },

    #[error("failed to parse {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: ParseSource,
    },

    #[error("no published version of {name} satisfies {range}")]
    UnsatisfiedRange { name: String, range: String },

    #[error("script `{phase}` for {package} exited with status {status}")]
    ScriptFailure {
        package: String,
        phase: &'static str,
        status: i32,
    },

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Wraps the two payload shapes that get parsed: tar framing and JSON.
#[derive(Debug, Error)]
pub enum ParseSource {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpmError>;

impl SpmError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SpmError::Filesystem {
            path: path.into(),
            source,
        }
    }
}
