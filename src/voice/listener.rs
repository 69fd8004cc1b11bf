//! Speech capture sessions
//!
//! Wraps a recognition capability into start/stop sessions with
//! callback-based delivery: at most one result callback, then exactly one
//! end callback, in that order. When no recognizer is available every
//! start is a silent no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{SpeechRecognizer, StopSignal};

/// Speech recognition capability as seen by the session
#[derive(Clone)]
pub enum Recognizer {
    /// Recognition is supported on this platform
    Available(Arc<dyn SpeechRecognizer>),
    /// No recognition support; voice input does nothing
    Unavailable,
}

/// Single-shot speech capture adapter
pub struct SpeechListener {
    recognizer: Recognizer,
    /// Id of the running session, 0 when idle
    active: Arc<AtomicU64>,
    next_id: u64,
    stop: Option<StopSignal>,
}

impl SpeechListener {
    /// Create a listener over the given capability
    #[must_use]
    pub fn new(recognizer: Recognizer) -> Self {
        Self {
            recognizer,
            active: Arc::new(AtomicU64::new(0)),
            next_id: 0,
            stop: None,
        }
    }

    /// Create a listener with no recognition capability
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(Recognizer::Unavailable)
    }

    /// Whether speech recognition is supported
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.recognizer, Recognizer::Available(_))
    }

    /// Whether a capture session is running
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.active.load(Ordering::SeqCst) != 0
    }

    /// Start a capture session
    ///
    /// Returns `false` without invoking any callback when recognition is
    /// unavailable or a session is already running. Must be called from
    /// within a Tokio runtime.
    pub fn start_listening<R, E>(&mut self, on_result: R, on_end: E) -> bool
    where
        R: FnOnce(String) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let Recognizer::Available(recognizer) = &self.recognizer else {
            tracing::debug!("speech recognition not supported");
            return false;
        };

        self.next_id += 1;
        let id = self.next_id;
        if self
            .active
            .compare_exchange(0, id, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::trace!("already listening, ignoring start");
            return false;
        }

        let stop = StopSignal::new();
        self.stop = Some(stop.clone());
        let recognizer = Arc::clone(recognizer);
        let active = Arc::clone(&self.active);

        tracing::debug!(session = id, "speech capture started");
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = stop.triggered() => Ok(None),
                result = recognizer.listen(stop.clone()) => result,
            };

            match result {
                Ok(Some(text)) if !stop.is_triggered() => on_result(text),
                Ok(_) => tracing::debug!(session = id, "capture ended without a result"),
                Err(e) => tracing::warn!(session = id, error = %e, "speech recognition failed"),
            }

            // A stop may already have cleared this session
            let _ = active.compare_exchange(id, 0, Ordering::SeqCst, Ordering::SeqCst);
            tracing::debug!(session = id, "speech capture ended");
            on_end();
        });

        true
    }

    /// Request early termination of the running session; no-op when idle
    pub fn stop_listening(&mut self) {
        if !self.is_listening() {
            return;
        }

        if let Some(stop) = self.stop.take() {
            stop.trigger();
        }
        self.active.store(0, Ordering::SeqCst);
        tracing::debug!("speech capture stop requested");
    }
}
