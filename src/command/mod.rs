//! Command grammar and execution.
//!
//! The same command language is typed by the logged-in user (foreground) and
//! written into the registry sheet by the administrator (background):
//!
//! - `os <shell>`: run a local shell command, gated by [`OsCommandPolicy`](crate::config::OsCommandPolicy)
//! - `bg <command>`: run `<command>` in background context
//! - `help`, `logout`, empty line (refresh)
//! - `<n>`: view problem `n`'s compiler message
//! - `<path>`, `<n> <path>`, `<path> <n>`, `-p <n> -f <path>`: submit

pub mod executor;
pub mod grammar;
pub mod os;

pub use executor::{CommandExecutor, Origin, Outcome};
pub use grammar::Command;
pub use os::OsCommandRunner;
