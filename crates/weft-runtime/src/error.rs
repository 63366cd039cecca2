#![forbid(unsafe_code)]

//! Error types for the reactive runtime.
//!
//! None of these reach the code that mutates state. Render panics and
//! cascade overflows are recorded in the runtime's error log; only the
//! driving calls (`tick`, `settle`, `advance`) return them directly.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Failures surfaced by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("render function panicked: {message}")]
    RenderPanicked { message: String },

    #[error("derivation cascade still changing after {iterations} passes")]
    CascadeOverflow { iterations: usize },

    #[error("update flush already in progress")]
    ReentrantFlush,

    #[error("runtime clock cannot be advanced manually")]
    ClockNotControllable,
}

impl ReactiveError {
    #[must_use]
    pub fn render_panicked(message: impl Into<String>) -> Self {
        Self::RenderPanicked {
            message: message.into(),
        }
    }
}
