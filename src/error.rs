//! Error taxonomy for the bundler pipeline.
//!
//! Every variant here is fatal for the stage that raises it. Recoverable
//! conditions never reach this type: sourcemap stitch failures degrade to an
//! unmapped prepend inside the stitcher, and per-file move failures during
//! reconciliation are logged and skipped.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or unsatisfiable entrypoint configuration. Raised before any
    /// bundling work starts.
    #[error("missing entrypoints: {reason}")]
    Config { reason: String },

    /// The compiler rejected a source file. The message is passed through
    /// unmodified; the file is not retried.
    #[error("{file}: compiler error: {message}")]
    Compile { file: String, message: String },

    /// The bundler rejected the project. The structured messages were already
    /// printed by the bundle stage; this only carries the count.
    #[error("bundler failed with {errors} error(s)")]
    Bundle { errors: usize },

    /// A directory walk or a required file read failed.
    #[error("{}: {}", path.display(), source)]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Filesystem {
            path: path.into(),
            source,
        }
    }
}
