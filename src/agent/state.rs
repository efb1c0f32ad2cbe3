//! Generation state machine
//!
//! A session runs at most one generation at a time: either a streamed chat
//! turn or a catalog run. Starting one hands out a [`GenerationGuard`];
//! dropping the guard (on success, on error, or when the owning future is
//! dropped) returns the state to idle and clears any catalog progress.

use crate::error::{AcervoError, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// What the session is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    /// Ready for a new turn or catalog run
    #[default]
    Idle,
    /// A chat turn is streaming
    Streaming,
    /// A catalog run is in progress
    BatchRunning,
}

impl std::fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
            Self::BatchRunning => write!(f, "cataloguing"),
        }
    }
}

/// Position of a catalog run (1-based `current`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Document being processed, starting at 1
    pub current: usize,
    /// Documents in the run
    pub total: usize,
}

impl std::fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.current, self.total)
    }
}

#[derive(Debug, Default)]
struct Inner {
    phase: GenerationPhase,
    progress: Option<BatchProgress>,
}

/// Shared handle to the current generation phase
///
/// Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct GenerationState {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

impl GenerationState {
    /// Creates an idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    pub fn current(&self) -> GenerationPhase {
        lock(&self.inner).phase
    }

    /// Progress of the running catalog run, if any
    pub fn progress(&self) -> Option<BatchProgress> {
        lock(&self.inner).progress
    }

    /// Whether a turn or catalog run is active
    pub fn is_generating(&self) -> bool {
        self.current() != GenerationPhase::Idle
    }

    /// Enters `phase`
    ///
    /// # Errors
    ///
    /// Returns `Busy` unless the state is idle.
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::agent::state::{GenerationPhase, GenerationState};
    ///
    /// let state = GenerationState::new();
    /// {
    ///     let _guard = state.begin(GenerationPhase::Streaming).unwrap();
    ///     assert!(state.begin(GenerationPhase::BatchRunning).is_err());
    /// }
    /// assert_eq!(state.current(), GenerationPhase::Idle);
    /// ```
    pub fn begin(&self, phase: GenerationPhase) -> Result<GenerationGuard> {
        let mut inner = lock(&self.inner);
        if inner.phase != GenerationPhase::Idle {
            return Err(AcervoError::Busy(inner.phase.to_string()).into());
        }
        inner.phase = phase;
        inner.progress = None;
        tracing::debug!(%phase, "Generation started");

        Ok(GenerationGuard {
            inner: Arc::clone(&self.inner),
            entered: phase,
        })
    }
}

/// Keeps the state in a non-idle phase until dropped
#[derive(Debug)]
pub struct GenerationGuard {
    inner: Arc<Mutex<Inner>>,
    entered: GenerationPhase,
}

impl GenerationGuard {
    /// Phase this guard holds
    pub fn phase(&self) -> GenerationPhase {
        self.entered
    }

    /// Publishes catalog progress to every observer of the state
    pub fn report(&self, progress: BatchProgress) {
        lock(&self.inner).progress = Some(progress);
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        inner.phase = GenerationPhase::Idle;
        inner.progress = None;
        tracing::debug!(phase = %self.entered, "Generation finished");
    }
}
