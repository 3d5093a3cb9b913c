//! LLM agent for answering questions about a repository.
//!
//! This module provides the tool-calling loop and the read-only tools it
//! exposes to the model.

pub mod agent_loop;
pub mod tools;

pub use agent_loop::{AgentConfig, QaAgent};
