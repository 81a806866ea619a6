//! Order Agent Assistant
//!
//! A conversational order assistant that:
//! - Routes each user message to a create/query/update/cancel handler
//! - Keeps a bounded message window per (session, handler)
//! - Carries what the user told the router over to the chosen handler
//! - Expires idle sessions and caps the number of live ones
//!
//! FLOW:
//! MESSAGE → TRIAGE → CLASSIFY → HANDOFF → HANDLER → REPLY

pub mod agents;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod orders;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agents::{RouteOutcome, TriageAgent};
pub use config::{AppConfig, MemoryConfig};
pub use memory::{MemoryStore, Reaper};
