use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::errors::DeskPilotResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub ts: i64,
    pub role: Role,
    pub content: String,
}

/// Conversation log for one planning session.
///
/// Owned by the caller and lent to the planner. Holds at most `max_turns`
/// turns; the oldest are dropped first.
pub struct Session {
    pub session_id: String,
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
    transcript: Option<PathBuf>,
}

impl Session {
    pub fn new(max_turns: usize) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
            transcript: None,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let session = Self::new(config.max_turns);
        if !config.persist_transcript {
            return session;
        }
        let dir = config
            .transcript_dir
            .clone()
            .unwrap_or_else(default_transcript_dir);
        session.with_transcript_dir(&dir)
    }

    /// Also append every turn as a JSON line to `session_<id>.jsonl` under `dir`.
    pub fn with_transcript_dir(mut self, dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "transcript dir unavailable, not persisting"
            );
            return self;
        }
        self.transcript = Some(dir.join(format!("session_{}.jsonl", self.session_id)));
        self
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        let turn = ConversationTurn {
            ts: chrono::Utc::now().timestamp_millis(),
            role,
            content: content.into(),
        };
        if let Err(e) = self.flush(&turn) {
            tracing::warn!(session = %self.session_id, error = %e, "transcript write failed");
        }
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript.as_deref()
    }

    fn flush(&self, turn: &ConversationTurn) -> DeskPilotResult<()> {
        let Some(path) = &self.transcript else {
            return Ok(());
        };
        let line = serde_json::to_string(turn)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %path.display(), "transcript entry flushed");
        Ok(())
    }
}

/// `<data dir>/deskpilot/sessions`, or the working directory when the
/// platform has no data dir.
fn default_transcript_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("deskpilot").join("sessions"),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
