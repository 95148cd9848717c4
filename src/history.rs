//! JSON-backed roll history.
//!
//! The history is an external store in the sense of the core contract: it
//! only ever receives already-computed summaries and never feeds anything
//! back into parsing or evaluation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;
use crate::expression::Value;
use crate::stats::StatisticsSummary;

/// One recorded evaluation run, summarized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollSession {
    pub expression: String,
    pub iterations: u64,
    pub seed: Option<u64>,
    pub mean: f64,
    pub theoretical_mean: f64,
    pub min: Value,
    pub max: Value,
    pub timestamp: DateTime<Utc>,
}

impl RollSession {
    /// Builds a session entry from a finished run. Timestamped now.
    pub fn from_summary(expression: &str, seed: Option<u64>, summary: &StatisticsSummary) -> Self {
        RollSession {
            expression: expression.to_string(),
            iterations: summary.count,
            seed,
            mean: summary.mean,
            theoretical_mean: summary.theoretical_mean,
            min: summary.min,
            max: summary.max,
            timestamp: Utc::now(),
        }
    }
}

/// All recorded sessions, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollHistory {
    pub sessions: Vec<RollSession>,
}

impl RollHistory {
    /// Appends a session, trimming the oldest entries beyond `limit`.
    pub fn add(&mut self, session: RollSession, limit: usize) {
        self.sessions.push(session);
        if self.sessions.len() > limit {
            let excess = self.sessions.len() - limit;
            self.sessions.drain(..excess);
        }
    }

    /// The `n` most recent sessions, newest last.
    pub fn recent(&self, n: usize) -> &[RollSession] {
        let start = self.sessions.len().saturating_sub(n);
        &self.sessions[start..]
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Loads and saves [`RollHistory`] as JSON next to the config file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        HistoryStore { dir: dir.into() }
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    /// Missing or unreadable history degrades to empty; losing history must
    /// never block a roll.
    pub fn load(&self) -> RollHistory {
        let path = self.history_path();
        if !path.exists() {
            debug!(path = %path.display(), "no history file yet");
            return RollHistory::default();
        }
        match fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(Error::from))
        {
            Ok(history) => history,
            Err(err) => {
                warn!(path = %path.display(), %err, "could not load history, starting empty");
                RollHistory::default()
            }
        }
    }

    /// # Errors
    /// [`Error::Io`] when the directory or file cannot be written.
    pub fn save(&self, history: &RollHistory) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        let raw = serde_json::to_string_pretty(history)?;
        fs::write(self.history_path(), raw)?;
        Ok(())
    }

    /// Removes the history file if present.
    pub fn clear(&self) -> Result<(), Error> {
        let path = self.history_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
