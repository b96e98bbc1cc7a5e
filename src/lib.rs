//! # MSSQL Data MCP Server
//!
//! A Model Context Protocol (MCP) server exposing table operations on a
//! Microsoft SQL Server database.
//!
//! This crate provides:
//! - **Tools**: create/drop/describe/list tables, create indexes, and
//!   insert/read/update rows, with a read-only mode exposing only the reads
//! - **Connection lifecycle**: one shared pool, reopened when it drops and,
//!   with Azure AD authentication, before the access token expires
//! - **Security**: argument validation before any database access, bracket
//!   escaping of identifiers, bound parameters for values, and credential
//!   redaction in logs
//!
//! ## Architecture
//!
//! An MCP `tools/call` flows through the [`Dispatcher`]: tool lookup, argument
//! validation, [`ConnectionManager::ensure_connection`], then the tool itself.

pub mod config;
pub mod constants;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod tools;

pub use config::Config;
pub use database::ConnectionManager;
pub use dispatch::{Dispatcher, ToolResponse};
pub use error::ServerError;
pub use server::MssqlMcpServer;
