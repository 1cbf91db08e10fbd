//! Locating and tailing the log file behind a jail.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LogError;
use crate::patterns::{self, JailCategory};
use crate::runner::{CommandRunner, COMMAND_TIMEOUT, PROBE_TIMEOUT};

/// Size of the log window scanned per request.
pub const TAIL_LINES: usize = 10_000;

#[derive(Clone)]
pub struct LogReader {
    runner: Arc<dyn CommandRunner>,
}

impl LogReader {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// First candidate path for `category` that exists on the host. A probe
    /// that fails or times out counts as "does not exist".
    pub async fn locate(&self, category: JailCategory) -> Result<&'static str, LogError> {
        for &path in category.log_paths() {
            match self.runner.run("test", &["-f", path], PROBE_TIMEOUT).await {
                Ok(_) => return Ok(path),
                Err(err) => debug!(%category, path, error = %err, "log candidate rejected"),
            }
        }
        Err(LogError::NotFound(category))
    }

    /// Most recent `max_lines` lines of `path`.
    pub async fn read_tail(&self, path: &str, max_lines: usize) -> Result<Vec<String>, LogError> {
        let count = max_lines.to_string();
        let stdout = self
            .runner
            .run("tail", &["-n", count.as_str(), path], COMMAND_TIMEOUT)
            .await
            .map_err(|source| LogError::Read {
                path: path.to_string(),
                source,
            })?;

        Ok(stdout.lines().map(str::to_string).collect())
    }

    /// The jail's category and the last [`TAIL_LINES`] lines of its log.
    /// No lines when the log is missing or unreadable.
    pub async fn recent_lines(&self, jail: &str) -> (JailCategory, Vec<String>) {
        let category = patterns::resolve(jail);
        let lines = match self.locate(category).await {
            Ok(path) => self.read_tail(path, TAIL_LINES).await,
            Err(err) => Err(err),
        };

        match lines {
            Ok(lines) => (category, lines),
            Err(err) => {
                warn!(jail, error = %err, "no log lines available");
                (category, Vec::new())
            }
        }
    }
}
