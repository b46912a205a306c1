//! Side-effecting collaborators: completion backends, prompts and persistence.

pub mod atomic;
pub mod completion;
pub mod config;
pub mod history;
pub mod init;
pub mod process;
pub mod prompt;
pub mod state_store;
