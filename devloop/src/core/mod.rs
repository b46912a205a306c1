//! Deterministic, pure logic shared by the development loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return new values, which keeps every transition testable from
//! fixed completion replies.

pub mod action;
pub mod error;
pub mod extract;
pub mod output;
pub mod policy;
pub mod repair;
pub mod state_update;
pub mod types;
pub mod validator;
