//! Collaborator contracts and side-effecting adapters.

pub mod backend;
pub mod command_conn;
pub mod compare;
pub mod config;
pub mod loader;
pub mod process;
pub mod reporter;
pub mod schema;
pub mod trace_writer;
pub mod version;
