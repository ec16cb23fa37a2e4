//! Grading website collaborator.
//!
//! The relay only needs four things from the grading site: log in, list the
//! gradable problems with their results, fetch a compiler message, and
//! submit a file. [`HttpGrader`] scrapes the real site; tests script the
//! trait directly.

pub mod http;
pub mod page;

use std::path::Path;

use async_trait::async_trait;

use crate::error::GraderError;

pub use http::HttpGrader;

/// Problem id sent for a submission that names no problem.
pub const UNSPECIFIED_PROBLEM: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Accepted,
    WrongPassword,
}

/// One gradable item as shown on the problem list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub id: i64,
    pub name: String,
    /// Link to the problem statement, when the site offers one
    pub description: Option<String>,
    /// Latest result text
    pub status: String,
    /// Link to the compiler message page, once a submission was graded
    pub compiler_msg: Option<String>,
}

impl Problem {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            status: String::new(),
            compiler_msg: None,
        }
    }
}

/// Compiler or judge output for one problem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerMessage {
    pub title: String,
    pub lines: Vec<String>,
}

impl CompilerMessage {
    /// Multi-line rendering for the terminal.
    pub fn render(&self) -> String {
        let mut out = format!("==== {} ====", self.title);
        for line in &self.lines {
            out.push_str("\n  ");
            out.push_str(line);
        }
        out
    }

    /// Single-line rendering for a spreadsheet cell.
    pub fn render_compact(&self) -> String {
        let mut out = format!("==== {} ====", self.title);
        for line in &self.lines {
            out.push_str("  ");
            out.push_str(line);
        }
        out
    }
}

#[async_trait]
pub trait GradingSurface: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, GraderError>;

    async fn problems(&self) -> Result<Vec<Problem>, GraderError>;

    /// `link` is a [`Problem::compiler_msg`] value.
    async fn compiler_message(&self, link: &str) -> Result<CompilerMessage, GraderError>;

    /// Submit `file` to `problem_id` ([`UNSPECIFIED_PROBLEM`] when none was named).
    async fn submit(&self, problem_id: i64, file: &Path) -> Result<(), GraderError>;
}
