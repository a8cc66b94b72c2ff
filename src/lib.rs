pub mod capability;
pub mod capture;
pub mod cli;
pub mod effects;
pub mod language;
pub mod metrics;
pub mod settings;
pub mod state_machine;
pub mod synthesis;
pub mod translation;

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use capability::Capabilities;
use effects::EffectRunner;
use state_machine::{
    reduce, CaptureState, Effect, Event, Notification, Session, Side, TranscriptEntry,
};
use translation::GeminiTranslator;

/// Snapshot of the session handed to whatever renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub source_language: String,
    pub target_language: String,
    pub capture: UiCapture,
    pub transcript: Vec<TranscriptEntry>,
    pub source_input: String,
    pub target_input: String,
    pub notification: Option<Notification>,
    pub capabilities: Capabilities,
}

/// Uses tagged union format: { "status": "idle" } or { "status": "listening", "side": "source" }
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UiCapture {
    Idle,
    Listening { side: Side },
    Stopping { side: Side },
}

/// Convert the internal session to a UiState for rendering
pub fn state_to_ui(session: &Session) -> UiState {
    let capture = match session.capture {
        CaptureState::Idle => UiCapture::Idle,
        CaptureState::Listening { side, .. } => UiCapture::Listening { side },
        CaptureState::Stopping { side, .. } => UiCapture::Stopping { side },
    };
    UiState {
        source_language: session.source_language.clone(),
        target_language: session.target_language.clone(),
        capture,
        transcript: session.transcript.clone(),
        source_input: session.source_input.clone(),
        target_input: session.target_input.clone(),
        notification: session.notification.clone(),
        capabilities: session.capabilities,
    }
}

fn emit_ui_state(ui: &watch::Sender<UiState>, session: &Session) {
    let ui_state = state_to_ui(session);
    log::debug!(
        "Emitting UI state: {} entries, capture {:?}",
        ui_state.transcript.len(),
        ui_state.capture
    );
    ui.send_replace(ui_state);
}

/// State loop manager - holds the event sender for dispatching events
#[derive(Clone)]
pub struct StateLoopHandle {
    tx: mpsc::Sender<Event>,
}

impl StateLoopHandle {
    /// Send an event to the state machine
    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

fn dispatch(
    effects: Vec<Effect>,
    session: &Session,
    ui: &watch::Sender<UiState>,
    tx: &mpsc::Sender<Event>,
    effect_runner: &Arc<dyn EffectRunner>,
) {
    for eff in effects {
        match eff {
            Effect::EmitUi => emit_ui_state(ui, session),
            other => effect_runner.spawn(other, tx.clone()),
        }
    }
}

/// Run the main state loop until `Event::Exit`, returning the final session.
pub async fn run_state_loop(
    session: Session,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    effect_runner: Arc<dyn EffectRunner>,
    ui: watch::Sender<UiState>,
) -> Session {
    let (mut session, effects) = reduce(
        &session,
        Event::CapabilitiesProbed(effect_runner.capabilities()),
    );
    dispatch(effects, &session, &ui, &tx, &effect_runner);
    log::info!("State loop started");

    while let Some(event) = rx.recv().await {
        log::debug!("Received event: {:?}", event);

        // Handle Exit at the edge
        if matches!(event, Event::Exit) {
            log::info!("Exit requested, shutting down state loop");
            break;
        }

        let old_discriminant = std::mem::discriminant(&session.capture);
        let (next, effects) = reduce(&session, event);
        if old_discriminant != std::mem::discriminant(&next.capture) {
            log::info!("Capture transition: {:?} -> {:?}", session.capture, next.capture);
        }

        session = next;
        dispatch(effects, &session, &ui, &tx, &effect_runner);
    }

    log::info!("State loop ended");
    session
}

/// A running session: the event sender, the UI snapshot stream and the loop
/// task (which yields the final session after `Event::Exit`).
pub struct SessionHandle {
    pub events: StateLoopHandle,
    pub ui: watch::Receiver<UiState>,
    pub task: JoinHandle<Session>,
}

/// Spawn the state loop for `session` on the current runtime.
pub fn start_session(session: Session, effect_runner: Arc<dyn EffectRunner>) -> SessionHandle {
    let (tx, rx) = mpsc::channel::<Event>(32);
    let (ui_tx, ui_rx) = watch::channel(state_to_ui(&session));

    let task = tokio::spawn(run_state_loop(session, rx, tx.clone(), effect_runner, ui_tx));

    SessionHandle {
        events: StateLoopHandle { tx },
        ui: ui_rx,
        task,
    }
}

// ============================================================================
// Application entry point
// ============================================================================

pub fn run() -> anyhow::Result<()> {
    let settings = settings::load_settings().with_env_overrides();

    // Missing credential is fatal: nothing starts without a backend
    let api_key = translation::api_key_from_env()?;
    let translator = GeminiTranslator::new(api_key, &settings.api_base_url, &settings.model)?;
    log::info!("Translating with {}", translator.model());

    // One thread of control; translation calls interleave at await points
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(cli::run_terminal(settings, Arc::new(translator)))
}
