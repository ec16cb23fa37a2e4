//! Problem state shared between the foreground session and the poller.
//!
//! The session publishes a fresh [`ProblemBoard`] after every fetch from the
//! grading site; the poller reads whatever was published last. Values are
//! only ever replaced whole, never mutated in place, so a reader always sees
//! one consistent snapshot. Last write wins.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::watch;

use crate::error::CommandError;
use crate::grader::Problem;
use crate::policy::AcceptPattern;
use crate::registry::TIMESTAMP_FORMAT;

/// Problems and the accept pattern in force, as of one fetch.
#[derive(Debug, Clone)]
pub struct ProblemBoard {
    pub problems: Vec<Problem>,
    pub accept: AcceptPattern,
}

impl ProblemBoard {
    pub fn new(problems: Vec<Problem>, accept: AcceptPattern) -> Self {
        Self { problems, accept }
    }

    /// Problem by its 1-based number on the board.
    pub fn problem(&self, number: i64) -> Result<&Problem, CommandError> {
        if number < 1 {
            return Err(CommandError::ProblemBelowMinimum);
        }
        self.problems
            .get((number - 1) as usize)
            .ok_or(CommandError::ProblemOutOfRange {
                requested: number,
                total: self.problems.len(),
            })
    }

    /// Terminal listing of the board for `username`.
    pub fn render(&self, username: &str) -> String {
        let mut out = format!(
            "==== [{}] {} ====\nTotal {} problems",
            username,
            Local::now().format(TIMESTAMP_FORMAT),
            self.problems.len()
        );
        for (idx, problem) in self.problems.iter().enumerate() {
            out.push_str(&format!("\n{:2}> {}", idx + 1, problem.name));
            if let Some(description) = &problem.description {
                out.push_str(&format!("\n    Description: {}", description));
            }
            out.push_str(&format!("\n    Results: {}", problem.status));
        }
        out
    }
}

/// Publishing side of the shared board. Cloning shares the same slot.
#[derive(Debug, Clone)]
pub struct SharedBoard {
    tx: Arc<watch::Sender<Option<Arc<ProblemBoard>>>>,
}

impl Default for SharedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the published board.
    pub fn publish(&self, board: Arc<ProblemBoard>) {
        self.tx.send_replace(Some(board));
    }

    /// Last published board, `None` before the first fetch.
    pub fn current(&self) -> Option<Arc<ProblemBoard>> {
        self.tx.borrow().clone()
    }
}
