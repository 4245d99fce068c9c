use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All variants are fatal and are never retried: validation failures are
/// reported before any output-tree mutation, and an `Io` failure during
/// fabrication leaves the partial output tree in place for the caller to
/// inspect or delete.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("at least two input stores are required for concatenation")]
    NotEnoughInputs,

    #[error("unknown driver {0:?}, expected \"n5\" or \"zarr\"")]
    UnknownDriver(String),

    #[error("invalid zarr dimension separator {0:?}, expected \"/\" or \".\"")]
    InvalidDimensionSeparator(String),

    #[error("incompatible inputs: {0}")]
    IncompatibleInputs(String),

    #[error("malformed metadata at {path:?}: {source}")]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed_metadata(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::MalformedMetadata {
            path: path.into(),
            source,
        }
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::IncompatibleInputs(message.into())
    }
}
