// Public modules
pub mod command;
pub mod deploy;
pub mod error;
pub mod git;
pub mod hooks;
pub mod output;
pub mod pipeline;
pub mod release;
pub mod server;
pub mod site;
pub mod ssh;
pub mod tasks;

// Internal modules - not part of public API
pub(crate) mod config;
pub(crate) mod local_files;
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use output::{MergeResult, RemoveResult};
