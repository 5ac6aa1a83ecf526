//! Agent pipeline - LLM-backed specification extraction and refinement
//!
//! This crate is the contract layer between free-text problem descriptions
//! and schema-validated optimization specifications:
//! - **Model invocation** (`llm`, `invoker`) - one round-trip per turn to a
//!   pluggable model client
//! - **Session state** (`session`) - conversation history plus the current
//!   specification, rebuilt into context for every call
//! - **Meaning stage** (`meaning`) - natural language → `ProblemSpecification`,
//!   gated by the problem schema contract
//! - **Refinement stage** (`refinement`) - strengthens a confirmed
//!   specification under the stricter refined contract
//! - **Orchestration** (`orchestrator`) - the Meaning → Refinement →
//!   Downstream state machine with its human-in-the-loop confirm gate
//!
//! # Degradation principle
//!
//! Malformed model output never crashes a turn. Parse and schema failures
//! collapse into the canonical invalid specification whose `clarification`
//! asks the user to try again; only a missing credential ends a session.

pub mod invoker;
pub mod llm;
pub mod meaning;
pub mod orchestrator;
pub mod prompts;
pub mod refinement;
pub mod session;
