//! Agent module for Acervo
//!
//! This module contains the session logic: the conversation store, streamed
//! turns, usage tracking, batch cataloguing and the generation state machine.

pub mod analysis;
pub mod conversation;
pub mod core;
pub mod state;
pub mod streaming;
pub mod usage;

pub use analysis::{AnalysisResult, BatchOutcome};
pub use conversation::{Conversation, Message, MessageRole};
pub use core::{Session, View};
pub use state::{BatchProgress, GenerationPhase, GenerationState};
pub use streaming::TurnOutcome;
pub use usage::{UsageStat, UsageTracker};
