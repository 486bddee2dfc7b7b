//! Error taxonomy for the stage engine.
//!
//! ERROR HANDLING
//! ==============
//! Recoverable conditions (a highlight target vanishing mid-hover, a
//! hit-test through an unready surface) are *not* errors: they degrade to
//! cleared state or an empty candidate list. This enum covers the remaining
//! cases — fatal mount misconfiguration, authoritative lookups that failed,
//! and gesture-engine misuse, which signals a calling-order bug and is never
//! retried.

/// Errors surfaced to the host by stage operations.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The rendering surface or its host container was missing at mount
    /// time. Fatal to this mount attempt; the caller must fix its wiring.
    #[error("mount failed: {0}")]
    Mount(String),
    /// A referenced element id does not exist in the content document.
    /// Recoverable: treat as "target vanished" and clear state.
    #[error("element not found: {0}")]
    NotFound(String),
    /// A gesture-engine call arrived before any selection initialized it.
    #[error("gesture engine used before a selection was made")]
    NotInitialized,
    /// A gesture-engine call required a target but none is set.
    #[error("no gesture target is set")]
    NoTarget,
}
