//! Effect runner for Live Translator
//!
//! Executes the effects produced by the state machine. Anything that waits on
//! I/O runs as a spawned task and reports back to the state loop as an event;
//! nothing here blocks the loop.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::capability::Capabilities;
use crate::capture::{CaptureError, CaptureSink, RecognitionConfig, SpeechRecognizer};
use crate::metrics::MetricsCollector;
use crate::state_machine::{Effect, Event};
use crate::synthesis::{SpeechSynthesizer, Utterance};
use crate::translation::Translator;

pub trait EffectRunner: Send + Sync + 'static {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>);

    /// What the host supports; probed once when the state loop starts.
    fn capabilities(&self) -> Capabilities;
}

/// Synthesis voice parameters applied to every utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub rate: f32,
    pub pitch: f32,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// Effect runner backed by a translation backend and optional host speech
/// engines.
pub struct SessionEffectRunner {
    translator: Arc<dyn Translator>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    voice: Voice,
    metrics: Arc<Mutex<MetricsCollector>>,
}

impl SessionEffectRunner {
    pub fn new(
        translator: Arc<dyn Translator>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        voice: Voice,
        metrics: Arc<Mutex<MetricsCollector>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            translator,
            recognizer,
            synthesizer,
            voice,
            metrics,
        })
    }

    fn report_capture_error(session_id: uuid::Uuid, err: CaptureError, tx: mpsc::Sender<Event>) {
        log::warn!("Capture session {} could not start: {}", session_id, err);
        let sink = CaptureSink::new(session_id, tx);
        tokio::spawn(async move {
            sink.error(err.code(), err.to_string()).await;
        });
    }
}

impl EffectRunner for SessionEffectRunner {
    fn capabilities(&self) -> Capabilities {
        Capabilities::probe(self.recognizer.as_deref(), self.synthesizer.as_deref())
    }

    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::StartTranslation {
                id,
                text,
                source_name,
                target_name,
            } => {
                let translator = self.translator.clone();
                let metrics = self.metrics.clone();

                tokio::spawn(async move {
                    metrics.lock().await.turn_started(id, text.chars().count());

                    let event = match translator.translate(&text, &source_name, &target_name).await {
                        Ok(translated) => {
                            metrics
                                .lock()
                                .await
                                .turn_succeeded(id, translated.chars().count());
                            Event::TranslateOk {
                                id,
                                text: translated,
                            }
                        }
                        Err(e) => {
                            log::error!("Translation for entry {} failed: {}", id, e);
                            metrics.lock().await.turn_failed(id, e.to_string());
                            Event::TranslateFail {
                                id,
                                err: e.to_string(),
                            }
                        }
                    };

                    if tx.send(event).await.is_err() {
                        log::debug!("State loop closed before entry {} resolved", id);
                    }
                });
            }

            Effect::Speak { text, locale } => {
                let Some(synthesizer) = &self.synthesizer else {
                    log::warn!("Speak requested without a synthesizer");
                    return;
                };
                let utterance = Utterance {
                    text,
                    locale,
                    rate: self.voice.rate,
                    pitch: self.voice.pitch,
                };
                log::debug!(
                    "Speaking {} chars in {}",
                    utterance.text.len(),
                    utterance.locale
                );
                if let Err(e) = synthesizer.speak(&utterance) {
                    log::warn!("Speech synthesis failed: {}", e);
                    let metrics = self.metrics.clone();
                    let message = e.to_string();
                    tokio::spawn(async move {
                        metrics.lock().await.record_error(
                            "synthesis".to_string(),
                            message.clone(),
                            None,
                        );
                        if tx.send(Event::SynthesisFailed { message }).await.is_err() {
                            log::debug!("State loop closed before synthesis failure was reported");
                        }
                    });
                }
            }

            Effect::StartCapture { session_id, locale } => {
                let Some(recognizer) = &self.recognizer else {
                    Self::report_capture_error(session_id, CaptureError::NotSupported, tx);
                    return;
                };
                let sink = CaptureSink::new(session_id, tx.clone());
                if let Err(e) = recognizer.start(RecognitionConfig::continuous(locale), sink) {
                    let metrics = self.metrics.clone();
                    let message = e.to_string();
                    tokio::spawn(async move {
                        metrics
                            .lock()
                            .await
                            .record_error("capture".to_string(), message, None);
                    });
                    Self::report_capture_error(session_id, e, tx);
                }
            }

            Effect::StopCapture { session_id } => match &self.recognizer {
                Some(recognizer) => recognizer.stop(session_id),
                None => {
                    // Nothing is running; confirm the end ourselves
                    let sink = CaptureSink::new(session_id, tx);
                    tokio::spawn(async move { sink.ended().await });
                }
            },

            Effect::EmitUi => {
                log::warn!("EmitUi reached the effect runner; it belongs to the state loop");
            }
        }
    }
}
