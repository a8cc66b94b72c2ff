//! Turn orchestration state machine.
//!
//! The whole conversation session is a single value owned by the state loop.
//! Every input (typed text, mic button, engine callbacks, translation results)
//! arrives as an [`Event`]; [`reduce`] returns the next session plus the
//! [`Effect`]s the effect runner must execute. Nothing else mutates a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capability::{Capabilities, SYNTHESIS_UNSUPPORTED};
use crate::capture::{final_transcript, RecognitionResult};
use crate::language;

/// Message stored on a failed entry and raised as a notification. The
/// underlying error is only logged.
pub const TRANSLATION_FAILED: &str = "Failed to translate text. Please check the logs for details.";

/// Which conversational party produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One turn in the transcript.
///
/// `is_translating` flips to false exactly once, and at that moment exactly one
/// of `translated_text` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub original_text: String,
    pub translated_text: Option<String>,
    pub is_translating: bool,
    pub error: Option<String>,
    pub side: Side,
    /// Locale the turn was spoken or typed in.
    pub source_locale: String,
    /// Locale the turn is translated into and spoken back in.
    pub target_locale: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Listening {
        session_id: Uuid,
        side: Side,
    },
    /// Stop was requested; waiting for the engine to report the end.
    Stopping {
        session_id: Uuid,
        side: Side,
    },
}

impl CaptureState {
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            CaptureState::Idle => None,
            CaptureState::Listening { session_id, .. } | CaptureState::Stopping { session_id, .. } => {
                Some(*session_id)
            }
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            CaptureState::Idle => None,
            CaptureState::Listening { side, .. } | CaptureState::Stopping { side, .. } => Some(*side),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, CaptureState::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Capability,
    Translation,
    Capture,
}

/// Session-level banner. A new one replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub source_language: String,
    pub target_language: String,
    pub capture: CaptureState,
    pub transcript: Vec<TranscriptEntry>,
    pub source_input: String,
    pub target_input: String,
    pub notification: Option<Notification>,
    pub capabilities: Capabilities,
    next_entry_id: u64,
}

impl Session {
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
            capture: CaptureState::Idle,
            transcript: Vec::new(),
            source_input: String::new(),
            target_input: String::new(),
            notification: None,
            capabilities: Capabilities::default(),
            next_entry_id: 1,
        }
    }

    /// Locale a side speaks in.
    pub fn locale_for(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_language,
            Side::Target => &self.target_language,
        }
    }

    /// (from, to) locales for a turn produced by `side`.
    pub fn route(&self, side: Side) -> (&str, &str) {
        match side {
            Side::Source => (&self.source_language, &self.target_language),
            Side::Target => (&self.target_language, &self.source_language),
        }
    }

    pub fn input(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_input,
            Side::Target => &self.target_input,
        }
    }

    pub fn entry(&self, id: EntryId) -> Option<&TranscriptEntry> {
        self.transcript.iter().find(|e| e.id == id)
    }

    fn input_mut(&mut self, side: Side) -> &mut String {
        match side {
            Side::Source => &mut self.source_input,
            Side::Target => &mut self.target_input,
        }
    }

    fn pending_entry_mut(&mut self, id: EntryId) -> Option<&mut TranscriptEntry> {
        self.transcript
            .iter_mut()
            .find(|e| e.id == id && e.is_translating)
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.notification = Some(Notification::new(kind, message));
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new("en-US", "es-ES")
    }
}

/// Events that drive the session.
#[derive(Debug, Clone)]
pub enum Event {
    /// Result of the startup capability probe
    CapabilitiesProbed(Capabilities),

    // Language selection
    SetSourceLanguage {
        code: String,
    },
    SetTargetLanguage {
        code: String,
    },
    SwapLanguages,

    // Text entry
    SetInputText {
        side: Side,
        text: String,
    },
    /// Submit the side's text-entry buffer
    SubmitInput {
        side: Side,
    },
    /// Submit an utterance directly
    SubmitTurn {
        side: Side,
        text: String,
    },

    // Capture controls
    /// Mic button: stop if anything is capturing, otherwise start on `side`
    ToggleCapture {
        side: Side,
    },
    StartCapture {
        side: Side,
    },
    StopCapture,

    // Capture engine events
    CaptureResult {
        session_id: Uuid,
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    CaptureEnded {
        session_id: Uuid,
    },
    CaptureError {
        session_id: Uuid,
        code: String,
        message: String,
    },

    // Translation events
    TranslateOk {
        id: EntryId,
        text: String,
    },
    TranslateFail {
        id: EntryId,
        err: String,
    },

    /// Speak a resolved entry again
    SpeakEntry {
        id: EntryId,
    },
    /// The synthesis engine could not be started
    SynthesisFailed {
        message: String,
    },
    DismissNotification,
    /// Shut the state loop down
    Exit,
}

/// Effects to be executed after a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartTranslation {
        id: EntryId,
        text: String,
        source_name: String,
        target_name: String,
    },
    Speak {
        text: String,
        locale: String,
    },
    StartCapture {
        session_id: Uuid,
        locale: String,
    },
    StopCapture {
        session_id: Uuid,
    },
    /// Publish a fresh UI snapshot
    EmitUi,
}

/// Reducer function: (session, event) -> (next_session, effects)
///
/// Rejected operations leave the session untouched and produce no effects.
/// When a turn is appended, `EmitUi` precedes `StartTranslation` so the
/// pending entry is visible before the request goes out.
pub fn reduce(session: &Session, event: Event) -> (Session, Vec<Effect>) {
    let mut next = session.clone();
    let mut effects = Vec::new();

    match event {
        Event::CapabilitiesProbed(caps) => {
            next.capabilities = caps;
            if let Some(message) = caps.unavailable_message() {
                next.notify(NotificationKind::Capability, message);
            }
            effects.push(Effect::EmitUi);
        }

        Event::SetSourceLanguage { code } => {
            if language::find_language(&code).is_none() {
                log::warn!("Ignoring unsupported source language {:?}", code);
                return (next, effects);
            }
            next.source_language = code;
            effects.push(Effect::EmitUi);
        }
        Event::SetTargetLanguage { code } => {
            if language::find_language(&code).is_none() {
                log::warn!("Ignoring unsupported target language {:?}", code);
                return (next, effects);
            }
            next.target_language = code;
            effects.push(Effect::EmitUi);
        }
        Event::SwapLanguages => {
            std::mem::swap(&mut next.source_language, &mut next.target_language);
            effects.push(Effect::EmitUi);
        }

        Event::SetInputText { side, text } => {
            *next.input_mut(side) = text;
            effects.push(Effect::EmitUi);
        }
        Event::SubmitInput { side } => {
            if next.capture.is_active() {
                log::warn!("Text submission on {} side rejected while capturing", side);
                return (next, effects);
            }
            let text = next.input(side).to_string();
            if submit_turn(&mut next, &text, side, &mut effects) {
                next.input_mut(side).clear();
            }
        }
        Event::SubmitTurn { side, text } => {
            submit_turn(&mut next, &text, side, &mut effects);
        }

        Event::ToggleCapture { side } => {
            if next.capture.is_active() {
                stop_capture(&mut next, &mut effects);
            } else {
                start_capture(&mut next, side, &mut effects);
            }
        }
        Event::StartCapture { side } => start_capture(&mut next, side, &mut effects),
        Event::StopCapture => stop_capture(&mut next, &mut effects),

        Event::CaptureResult {
            session_id,
            result_index,
            results,
        } => {
            let Some(side) = live_capture_side(&next, session_id) else {
                log::debug!("Dropping results from stale capture session {}", session_id);
                return (next, effects);
            };
            let segment = final_transcript(result_index, &results);
            if !segment.trim().is_empty() {
                submit_turn(&mut next, &segment, side, &mut effects);
            }
        }
        Event::CaptureEnded { session_id } => {
            if live_capture_side(&next, session_id).is_none() {
                return (next, effects);
            }
            log::info!("Capture session {} ended", session_id);
            next.capture = CaptureState::Idle;
            effects.push(Effect::EmitUi);
        }
        Event::CaptureError {
            session_id,
            code,
            message,
        } => {
            if live_capture_side(&next, session_id).is_none() {
                return (next, effects);
            }
            log::warn!(
                "Capture session {} failed: {} ({})",
                session_id,
                code,
                message
            );
            next.capture = CaptureState::Idle;
            next.notify(
                NotificationKind::Capture,
                format!("Speech recognition error: {}", code),
            );
            effects.push(Effect::EmitUi);
        }

        Event::TranslateOk { id, text } => {
            let Some(entry) = next.pending_entry_mut(id) else {
                log::debug!("Ignoring translation for unknown or resolved entry {}", id);
                return (next, effects);
            };
            entry.translated_text = Some(text.clone());
            entry.is_translating = false;
            let locale = entry.target_locale.clone();
            log::info!("Entry {} translated ({} chars)", id, text.len());
            effects.push(Effect::EmitUi);
            speak(&mut next, text, locale, &mut effects);
        }
        Event::TranslateFail { id, err } => {
            let Some(entry) = next.pending_entry_mut(id) else {
                log::debug!("Ignoring failure for unknown or resolved entry {}", id);
                return (next, effects);
            };
            entry.error = Some(TRANSLATION_FAILED.to_string());
            entry.is_translating = false;
            log::warn!("Entry {} failed to translate: {}", id, err);
            next.notify(NotificationKind::Translation, TRANSLATION_FAILED);
            effects.push(Effect::EmitUi);
        }

        Event::SpeakEntry { id } => {
            let Some((text, locale)) = next.entry(id).and_then(|e| {
                e.translated_text
                    .clone()
                    .map(|t| (t, e.target_locale.clone()))
            }) else {
                log::debug!("Entry {} has nothing to speak", id);
                return (next, effects);
            };
            speak(&mut next, text, locale, &mut effects);
        }
        Event::SynthesisFailed { message } => {
            log::warn!("Speech output failed: {}", message);
            next.notify(
                NotificationKind::Capability,
                format!("Text-to-speech failed: {}", message),
            );
            effects.push(Effect::EmitUi);
        }
        Event::DismissNotification => {
            if next.notification.take().is_some() {
                effects.push(Effect::EmitUi);
            }
        }

        // Handled at the edge by the state loop
        Event::Exit => {}
    }

    (next, effects)
}

/// Appends a pending entry and requests its translation. Returns false when
/// the turn was rejected.
fn submit_turn(next: &mut Session, text: &str, side: Side, effects: &mut Vec<Effect>) -> bool {
    let text = text.trim();
    if text.is_empty() {
        log::debug!("Ignoring empty {} turn", side);
        return false;
    }
    if let Some(capturing) = next.capture.side() {
        if capturing != side {
            log::warn!(
                "Turn on {} side rejected while capturing on {} side",
                side,
                capturing
            );
            return false;
        }
    }

    let (from, to) = next.route(side);
    let (from, to) = (from.to_string(), to.to_string());
    let id = EntryId(next.next_entry_id);
    next.next_entry_id += 1;

    log::info!("Turn {} submitted on {} side ({} -> {})", id, side, from, to);

    effects.push(Effect::EmitUi);
    effects.push(Effect::StartTranslation {
        id,
        text: text.to_string(),
        source_name: language::prompt_name(&from),
        target_name: language::prompt_name(&to),
    });

    next.transcript.push(TranscriptEntry {
        id,
        original_text: text.to_string(),
        translated_text: None,
        is_translating: true,
        error: None,
        side,
        source_locale: from,
        target_locale: to,
        created_at: Utc::now(),
    });
    true
}

fn start_capture(next: &mut Session, side: Side, effects: &mut Vec<Effect>) {
    if !next.capabilities.recognition {
        log::warn!("Capture requested but speech recognition is unavailable");
        next.notify(
            NotificationKind::Capability,
            crate::capability::RECOGNITION_UNSUPPORTED,
        );
        effects.push(Effect::EmitUi);
        return;
    }
    if next.capture.is_active() {
        log::warn!("Capture on {} side rejected: already {:?}", side, next.capture);
        return;
    }

    let session_id = Uuid::new_v4();
    let locale = next.locale_for(side).to_string();
    log::info!(
        "Capture session {} starting on {} side ({})",
        session_id,
        side,
        locale
    );
    next.capture = CaptureState::Listening { session_id, side };
    effects.push(Effect::StartCapture { session_id, locale });
    effects.push(Effect::EmitUi);
}

fn stop_capture(next: &mut Session, effects: &mut Vec<Effect>) {
    if let CaptureState::Listening { session_id, side } = next.capture {
        next.capture = CaptureState::Stopping { session_id, side };
        effects.push(Effect::StopCapture { session_id });
        effects.push(Effect::EmitUi);
    }
}

/// Side of the current capture session if `session_id` is still live.
fn live_capture_side(session: &Session, session_id: Uuid) -> Option<Side> {
    match session.capture.session_id() {
        Some(current) if current == session_id => session.capture.side(),
        _ => None,
    }
}

fn speak(next: &mut Session, text: String, locale: String, effects: &mut Vec<Effect>) {
    if next.capabilities.synthesis {
        effects.push(Effect::Speak { text, locale });
    } else {
        next.notify(NotificationKind::Capability, SYNTHESIS_UNSUPPORTED);
        effects.push(Effect::EmitUi);
    }
}
