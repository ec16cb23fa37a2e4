//! Login policy resolution.
//!
//! The policy sheet is read as a flat, row-major stream of non-comment cells
//! (see [`CellStream`]) and parsed with one token of lookahead. Recognized
//! directives:
//!
//! | Directive             | Effect                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `Default Mode`        | next cell is the global [`LoginMode`]               |
//! | `Accept File Pattern` | next cell is the submission filename pattern        |
//! | `Override Mode`       | following `(username, mode)` pairs override a user  |
//! | `User List`           | following `(username, password)` pairs form the roster |
//!
//! Pair sections end at the next directive or at a run of empty cells as long
//! as one sheet row ([`SECTION_END_EMPTY_ROWS`]).

pub mod stream;

use std::collections::HashMap;

use regex::Regex;

use crate::error::{RelayError, Result};

pub use stream::CellStream;

/// A pair section ends after this many rows' worth of consecutive empty cells.
pub const SECTION_END_EMPTY_ROWS: usize = 1;

/// Pattern used when the sheet names none.
pub const MATCH_ALL: &str = ".*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    /// Nobody may log in.
    #[default]
    Disabled,
    /// Password typed by the user on every login.
    Homework,
    /// Password looked up in the roster.
    Exam,
}

impl LoginMode {
    /// Parse a mode cell. Unknown or empty text fails closed to `Disabled`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "homework" | "hw" => LoginMode::Homework,
            "exam" => LoginMode::Exam,
            _ => LoginMode::Disabled,
        }
    }

    pub fn allows_login(&self) -> bool {
        !matches!(self, LoginMode::Disabled)
    }
}

impl std::fmt::Display for LoginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginMode::Disabled => write!(f, "disabled"),
            LoginMode::Homework => write!(f, "homework"),
            LoginMode::Exam => write!(f, "exam"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    DefaultMode,
    AcceptFilePattern,
    OverrideMode,
    UserList,
}

impl Directive {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "Default Mode" => Some(Directive::DefaultMode),
            "Accept File Pattern" => Some(Directive::AcceptFilePattern),
            "Override Mode" => Some(Directive::OverrideMode),
            "User List" => Some(Directive::UserList),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    TopLevel,
    Overrides,
    Roster,
}

/// Login policy derived from the policy sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub login_mode: LoginMode,
    /// Regular expression a submitted path must match (anchored at the start).
    pub accept_pattern: String,
    pub overrides: HashMap<String, LoginMode>,
    /// Username to password. Only consulted for users resolved to `Exam`.
    pub roster: HashMap<String, String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            login_mode: LoginMode::Disabled,
            accept_pattern: MATCH_ALL.to_string(),
            overrides: HashMap::new(),
            roster: HashMap::new(),
        }
    }
}

impl PolicyConfig {
    /// Resolve the policy from all rows of the policy sheet.
    pub fn resolve(rows: &[Vec<String>]) -> Self {
        Self::parse(CellStream::from_rows(rows))
    }

    /// Resolve the policy from an already flattened cell stream.
    pub fn parse(mut stream: CellStream) -> Self {
        let mut config = PolicyConfig::default();
        let section_end = stream.row_width() * SECTION_END_EMPTY_ROWS;
        let mut section = Section::TopLevel;
        let mut empty_run = 0usize;

        while let Some(token) = stream.next() {
            if let Some(directive) = Directive::parse(&token) {
                empty_run = 0;
                section = match directive {
                    Directive::DefaultMode => {
                        config.login_mode = LoginMode::parse(&take_value(&mut stream));
                        Section::TopLevel
                    }
                    Directive::AcceptFilePattern => {
                        config.accept_pattern = take_value(&mut stream);
                        Section::TopLevel
                    }
                    Directive::OverrideMode => Section::Overrides,
                    Directive::UserList => Section::Roster,
                };
                continue;
            }

            if section == Section::TopLevel {
                continue;
            }

            if token.is_empty() {
                empty_run += 1;
                if section_end > 0 && empty_run >= section_end {
                    section = Section::TopLevel;
                    empty_run = 0;
                }
                continue;
            }
            empty_run = 0;

            let value = take_value(&mut stream);
            match section {
                Section::Overrides => {
                    config
                        .overrides
                        .entry(token)
                        .or_insert_with(|| LoginMode::parse(&value));
                }
                Section::Roster => {
                    config.roster.entry(token).or_insert(value);
                }
                Section::TopLevel => {}
            }
        }

        config
    }

    /// Mode and accept pattern that apply to `username`. Overrides win over the
    /// default mode; the accept pattern is global.
    pub fn resolve_for_user(&self, username: &str) -> (LoginMode, &str) {
        let mode = self
            .overrides
            .get(username)
            .copied()
            .unwrap_or(self.login_mode);
        (mode, &self.accept_pattern)
    }

    pub fn password_for(&self, username: &str) -> Option<&str> {
        self.roster.get(username).map(String::as_str)
    }
}

/// Value cell following a directive or a pair key. A directive in that
/// position is left in the stream and the value reads as empty.
fn take_value(stream: &mut CellStream) -> String {
    match stream.peek() {
        Some(next) if Directive::parse(next).is_some() => String::new(),
        Some(_) => stream.next().unwrap_or_default(),
        None => String::new(),
    }
}

/// Compiled submission filename filter.
///
/// Matches like a prefix match: the pattern must match starting at the first
/// character of the path but may stop before its end unless it says `$`.
#[derive(Debug, Clone)]
pub struct AcceptPattern {
    source: String,
    regex: Regex,
}

impl AcceptPattern {
    pub fn compile(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})", source)).map_err(|e| {
            RelayError::configuration("pattern", format!("Invalid accept pattern {source:?}: {e}"))
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn match_all() -> Self {
        Self {
            source: MATCH_ALL.to_string(),
            regex: Regex::new("^(?:.*)").expect("static pattern is valid"),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn accepts(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl PartialEq for AcceptPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
