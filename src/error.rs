//! Error types for the privileged-process, log and GeoIP boundaries.

use std::time::Duration;

use thiserror::Error;

use crate::patterns::JailCategory;

/// Failure of a privileged subprocess call.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The process could not be started at all
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The process outlived its deadline and was killed
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The process ran but exited non-zero
    #[error("{program} exited with status {code:?}: {stderr}")]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Failure to locate or read a jail's log file.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("no log file found for category {0}")]
    NotFound(JailCategory),

    #[error("reading {path} failed: {source}")]
    Read {
        path: String,
        source: ProcessError,
    },
}

/// Failure of the upstream geolocation service.
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("geolocation lookup timed out")]
    Timeout,

    #[error("geolocation service answered HTTP {0}")]
    Status(u16),

    #[error("geolocation request failed: {0}")]
    Request(#[from] reqwest::Error),
}
