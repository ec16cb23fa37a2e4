pub mod board;
pub mod command;
pub mod config;
pub mod error;
pub mod grader;
pub mod policy;
pub mod poller;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod store;
