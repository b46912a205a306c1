//! Autonomous development-loop controller.
//!
//! Given a natural-language requirement, the loop repeatedly asks a completion
//! service what to do next, executes that decision, and folds the result into a
//! [`core::types::ProjectState`] until the project completes, fails, runs out
//! of steps, or needs a human answer. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, output extraction,
//!   repair and validation, decision resolution, state folding). No I/O.
//! - **[`io`]**: Side-effecting collaborators (completion backends, child
//!   processes, prompt rendering, config, persistence).
//!
//! Orchestration modules ([`decision`], [`step`], [`looping`], [`start`])
//! combine the two to implement CLI commands.

pub mod core;
pub mod decision;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod start;
pub mod status;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
