//! Shared test utilities for macwatch integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an orchestrator to a scripted transport and a
//!   temporary database
//! - Builders for jobs and switch table output

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{Response, ScriptedTransport, TestHarness};
