//! Scripted responses for nulled collaborators.
//!
//! A nulled collaborator answers from a [`ScriptedResponses`] instead of doing
//! real I/O. The script is either one repeatable response or an ordered queue
//! that is consumed call by call. Queued errors surface as failures on exactly
//! the call they were scripted for.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::core::sync::lock;

/// A deliberately injected failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptedFailure {
    pub message: String,
}

impl ScriptedFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One scripted outcome.
pub type Response<T> = Result<T, ScriptedFailure>;

/// Errors returned by [`ScriptedResponses::next`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The queue ran dry.
    #[error("no more responses configured for `{label}`")]
    Exhausted { label: String },
    /// The script held an error for this call.
    #[error(transparent)]
    Failed(#[from] ScriptedFailure),
}

#[derive(Debug)]
enum Script<T> {
    Always(Response<T>),
    Sequence(VecDeque<Response<T>>),
}

/// Canned responses consumed by a nulled collaborator.
#[derive(Debug)]
pub struct ScriptedResponses<T> {
    label: String,
    script: Mutex<Script<T>>,
}

impl<T: Clone> ScriptedResponses<T> {
    /// Every call yields the same response.
    pub fn always(label: impl Into<String>, response: Response<T>) -> Self {
        Self {
            label: label.into(),
            script: Mutex::new(Script::Always(response)),
        }
    }

    /// Each call yields the next queued response; calls past the end fail.
    pub fn sequence(
        label: impl Into<String>,
        responses: impl IntoIterator<Item = Response<T>>,
    ) -> Self {
        Self {
            label: label.into(),
            script: Mutex::new(Script::Sequence(responses.into_iter().collect())),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of queued responses left, or `None` for a repeatable response.
    pub fn remaining(&self) -> Option<usize> {
        match &*self.lock() {
            Script::Always(_) => None,
            Script::Sequence(queue) => Some(queue.len()),
        }
    }

    /// Consume the next response.
    pub fn next(&self) -> Result<T, ScriptError> {
        let response = match &mut *self.lock() {
            Script::Always(response) => response.clone(),
            Script::Sequence(queue) => queue.pop_front().ok_or_else(|| ScriptError::Exhausted {
                label: self.label.clone(),
            })?,
        };
        Ok(response?)
    }

    fn lock(&self) -> MutexGuard<'_, Script<T>> {
        lock(&self.script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_repeats_the_same_response() {
        let script = ScriptedResponses::always("clock", Ok(7));
        assert_eq!(script.next(), Ok(7));
        assert_eq!(script.next(), Ok(7));
        assert_eq!(script.next(), Ok(7));
        assert_eq!(script.remaining(), None);
    }

    #[test]
    fn sequence_pops_in_order_then_exhausts() {
        let script = ScriptedResponses::sequence("repository", [Ok("a"), Ok("b")]);
        assert_eq!(script.next(), Ok("a"));
        assert_eq!(script.remaining(), Some(1));
        assert_eq!(script.next(), Ok("b"));

        let err = script.next().expect_err("exhausted");
        assert_eq!(
            err.to_string(),
            "no more responses configured for `repository`"
        );
        // Stays exhausted; the queue is never refilled.
        assert!(matches!(script.next(), Err(ScriptError::Exhausted { .. })));
    }

    /// A scripted error fails exactly the call it was queued for.
    #[test]
    fn scripted_failure_surfaces_on_its_call() {
        let script = ScriptedResponses::sequence(
            "gateway",
            [
                Ok(1),
                Err(ScriptedFailure::new("connection reset")),
                Ok(3),
            ],
        );
        assert_eq!(script.next(), Ok(1));
        let err = script.next().expect_err("second call fails");
        assert_eq!(
            err,
            ScriptError::Failed(ScriptedFailure::new("connection reset"))
        );
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(script.next(), Ok(3));
    }

    #[test]
    fn always_failure_fails_every_call() {
        let script: ScriptedResponses<u8> =
            ScriptedResponses::always("gateway", Err(ScriptedFailure::new("down")));
        assert!(script.next().is_err());
        assert!(script.next().is_err());
    }

    #[test]
    fn empty_sequence_fails_first_call() {
        let script: ScriptedResponses<u8> = ScriptedResponses::sequence("empty", []);
        assert!(matches!(
            script.next(),
            Err(ScriptError::Exhausted { label }) if label == "empty"
        ));
    }
}
