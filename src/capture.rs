//! Speech capture boundary.
//!
//! A recognition engine is driven through [`SpeechRecognizer`]. Instead of
//! registering callbacks, the engine pushes everything it observes into the
//! state loop through a [`CaptureSink`], tagged with the capture session id so
//! the reducer can drop events from a session that already ended.

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state_machine::Event;

/// Engine configuration for one capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub locale: String,
}

impl RecognitionConfig {
    pub fn continuous(locale: impl Into<String>) -> Self {
        Self {
            continuous: true,
            interim_results: true,
            locale: locale.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAlternative {
    pub transcript: String,
    pub confidence: f32,
}

/// One recognized segment. Engines may report several alternatives; only the
/// first is ever used.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub is_final: bool,
    pub alternatives: Vec<RecognitionAlternative>,
}

impl RecognitionResult {
    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self::single(true, transcript.into())
    }

    pub fn interim(transcript: impl Into<String>) -> Self {
        Self::single(false, transcript.into())
    }

    fn single(is_final: bool, transcript: String) -> Self {
        Self {
            is_final,
            alternatives: vec![RecognitionAlternative {
                transcript,
                confidence: 1.0,
            }],
        }
    }
}

/// Concatenates the best alternative of every final result from
/// `result_index` onwards. Interim results contribute nothing.
pub fn final_transcript(result_index: usize, results: &[RecognitionResult]) -> String {
    results
        .iter()
        .skip(result_index)
        .filter(|r| r.is_final)
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.as_str())
        .collect()
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("speech recognition is not supported")]
    NotSupported,
    #[error("failed to start speech recognition: {0}")]
    StartFailed(String),
}

impl CaptureError {
    /// Short machine-readable code, reported the same way engine errors are.
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::NotSupported => "not-supported",
            CaptureError::StartFailed(_) => "start-failed",
        }
    }
}

/// Where an engine reports results for one capture session.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    session_id: Uuid,
    tx: mpsc::Sender<Event>,
}

impl CaptureSink {
    pub fn new(session_id: Uuid, tx: mpsc::Sender<Event>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn results(&self, result_index: usize, results: Vec<RecognitionResult>) {
        self.deliver(Event::CaptureResult {
            session_id: self.session_id,
            result_index,
            results,
        })
        .await;
    }

    pub async fn ended(&self) {
        self.deliver(Event::CaptureEnded {
            session_id: self.session_id,
        })
        .await;
    }

    pub async fn error(&self, code: impl Into<String>, message: impl Into<String>) {
        self.deliver(Event::CaptureError {
            session_id: self.session_id,
            code: code.into(),
            message: message.into(),
        })
        .await;
    }

    async fn deliver(&self, event: Event) {
        if self.tx.send(event).await.is_err() {
            log::debug!(
                "Capture session {} reported after state loop closed",
                self.session_id
            );
        }
    }
}

/// Host speech recognition engine.
pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    /// Begin a continuous capture session. Results, the end of the session and
    /// engine errors go to `sink`.
    fn start(&self, config: RecognitionConfig, sink: CaptureSink) -> Result<(), CaptureError>;

    /// Ask the engine to halt. The session is over once the engine reports
    /// `ended` on the sink, not when this returns.
    fn stop(&self, session_id: Uuid);
}
