//! Forum MCP server library.
//!
//! An MCP server that adapts tool invocations (search, post and comment
//! creation, replies, notification management) into REST calls against a
//! forum backend.

pub mod backend;
pub mod config;
pub mod models;
pub mod server;
pub mod token_cache;
pub mod tools;
