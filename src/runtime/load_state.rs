//! Model of the script-loading state machine the generated code implements
//!
//! `Idle -> Requested -> Completed`. A request completes on whichever of
//! the success event, the failure event or the timer arrives first; every
//! later event is inert. The emitted JavaScript follows this model line for
//! line (see `script.rs`), which lets the completion rules be exercised
//! without a browser.

use std::time::Duration;

use thiserror::Error;

use crate::chunk::ChunkId;

/// Event delivered to a pending load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// The element's success event; `src` is the resolved address
    Load { src: Option<String> },

    /// The element's failure event carrying the DOM event type
    Error { event_type: String, src: Option<String> },

    /// The completion timer expired
    Timeout { src: Option<String> },
}

impl LoadEvent {
    /// Failure kind as reported on the error: `missing`, the event type, or `timeout`
    pub fn kind(&self) -> &str {
        match self {
            LoadEvent::Load { .. } => "missing",
            LoadEvent::Error { event_type, .. } => event_type.as_str(),
            LoadEvent::Timeout { .. } => "timeout",
        }
    }

    fn src(&self) -> Option<&str> {
        match self {
            LoadEvent::Load { src } | LoadEvent::Error { src, .. } | LoadEvent::Timeout { src } => {
                src.as_deref()
            }
        }
    }
}

/// Normalized chunk load failure handed to the reporter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ChunkLoadError {
    pub message: String,
    pub name: &'static str,
    pub kind: String,
    pub request: Option<String>,
}

impl ChunkLoadError {
    /// Allocated when the request starts, populated on failure
    fn allocate() -> Self {
        Self {
            message: String::new(),
            name: "Error",
            kind: String::new(),
            request: None,
        }
    }

    fn populate(&mut self, chunk_id: &ChunkId, event: &LoadEvent) {
        let request = event.src().map(str::to_string);
        self.message = format!(
            "Loading chunk {} failed.\n({}: {})",
            chunk_id,
            event.kind(),
            request.as_deref().unwrap_or("undefined")
        );
        self.name = "ChunkLoadError";
        self.kind = event.kind().to_string();
        self.request = request;
    }
}

/// Whether a load can still complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Completed,
}

/// One in-flight chunk request
#[derive(Debug)]
pub struct LoadAttempt {
    chunk_id: ChunkId,
    timeout: Duration,
    state: LoadState,
    error: ChunkLoadError,
}

impl LoadAttempt {
    /// Start a request: arm the timer and allocate the error up front
    pub fn arm(chunk_id: ChunkId, timeout: Duration) -> Self {
        Self {
            chunk_id,
            timeout,
            state: LoadState::Pending,
            error: ChunkLoadError::allocate(),
        }
    }

    pub fn chunk_id(&self) -> &ChunkId {
        &self.chunk_id
    }

    /// Delay after which the timer delivers [`LoadEvent::Timeout`]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Deliver an event
    ///
    /// Only the first call has an effect. It asks `loading_ended` for a
    /// reporter; `None` means the chunk arrived and there is nothing to
    /// report. Returns whether this call completed the load.
    pub fn complete<E, R>(&mut self, event: LoadEvent, loading_ended: E) -> bool
    where
        E: FnOnce() -> Option<R>,
        R: FnOnce(ChunkLoadError),
    {
        if self.state == LoadState::Completed {
            return false;
        }
        self.state = LoadState::Completed;

        if let Some(report) = loading_ended() {
            let mut error = std::mem::replace(&mut self.error, ChunkLoadError::allocate());
            error.populate(&self.chunk_id, &event);
            report(error);
        }
        true
    }
}
