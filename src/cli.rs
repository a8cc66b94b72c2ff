//! Terminal front end.
//!
//! Reads typed turns and slash commands from stdin, forwards them to the
//! state loop, and prints the transcript as UI snapshots arrive. There is no
//! speech recognition engine in a terminal, so only the text path and speech
//! output are live here.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{watch, Mutex};

use crate::capture::SpeechRecognizer;
use crate::effects::{SessionEffectRunner, Voice};
use crate::language::{self, SUPPORTED_LANGUAGES};
use crate::metrics::MetricsCollector;
use crate::settings::AppSettings;
use crate::state_machine::{EntryId, Event, Notification, Session, Side};
use crate::synthesis::{CommandSynthesizer, SpeechSynthesizer};
use crate::translation::Translator;
use crate::{start_session, UiCapture, UiState};

const HELP: &str = "\
Type a line to translate it from the source language.
  s: <text>          translate from the source language
  t: <text>          translate from the target language
  /source <code>     set the source language
  /target <code>     set the target language
  /swap              swap source and target languages
  /languages         list supported language codes
  /mic source|target start or stop speech capture
  /stop              stop speech capture
  /speak <id>        speak an entry's translation again
  /dismiss           dismiss the current notification
  /stats             show translation statistics
  /help              show this help
  /quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say { side: Side, text: String },
    Source(String),
    Target(String),
    Swap,
    Languages,
    Mic(Side),
    Stop,
    Speak(EntryId),
    Dismiss,
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("expected `source` or `target`, got {0:?}")]
    InvalidSide(String),
    #[error("expected an entry id, got {0:?}")]
    InvalidEntryId(String),
}

fn parse_side(arg: &str) -> Result<Side, CommandError> {
    match arg.to_ascii_lowercase().as_str() {
        "source" | "s" => Ok(Side::Source),
        "target" | "t" => Ok(Side::Target),
        _ => Err(CommandError::InvalidSide(arg.to_string())),
    }
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        let command = if let Some(text) = line.strip_prefix("t:") {
            Command::Say {
                side: Side::Target,
                text: text.trim().to_string(),
            }
        } else {
            let text = line.strip_prefix("s:").unwrap_or(line);
            Command::Say {
                side: Side::Source,
                text: text.trim().to_string(),
            }
        };
        return Ok(Some(command));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let required = |what: &'static str| {
        if arg.is_empty() {
            Err(CommandError::MissingArgument(what))
        } else {
            Ok(arg.to_string())
        }
    };

    let command = match name {
        "source" => Command::Source(required("source")?),
        "target" => Command::Target(required("target")?),
        "swap" => Command::Swap,
        "languages" => Command::Languages,
        "mic" => Command::Mic(parse_side(&required("mic")?)?),
        "stop" => Command::Stop,
        "speak" => {
            let arg = required("speak")?;
            let id = arg
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidEntryId(arg.clone()))?;
            Command::Speak(EntryId(id))
        }
        "dismiss" => Command::Dismiss,
        "stats" => Command::Stats,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Turns successive UI snapshots into transcript lines, printing each entry
/// once when it appears and once when it resolves.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    /// Entry id -> whether its resolution has been printed
    seen: HashMap<EntryId, bool>,
    languages: Option<(String, String)>,
    capture: Option<UiCapture>,
    notification: Option<Notification>,
}

impl TranscriptPrinter {
    pub fn render(&mut self, ui: &UiState) -> Vec<String> {
        let mut lines = Vec::new();

        let languages = (ui.source_language.clone(), ui.target_language.clone());
        if self.languages.as_ref() != Some(&languages) {
            lines.push(format!(
                "Languages: {} [{}] <-> {} [{}]",
                language::display_name(&languages.0),
                languages.0,
                language::display_name(&languages.1),
                languages.1
            ));
            self.languages = Some(languages);
        }

        if self.capture.is_some_and(|c| c != ui.capture) {
            lines.push(match ui.capture {
                UiCapture::Idle => "Microphone off".to_string(),
                UiCapture::Listening { side } => format!("Listening on {} side...", side),
                UiCapture::Stopping { .. } => "Stopping microphone...".to_string(),
            });
        }
        self.capture = Some(ui.capture);

        for entry in &ui.transcript {
            let resolved = !entry.is_translating;
            match self.seen.get(&entry.id) {
                Some(true) => continue,
                Some(false) if !resolved => continue,
                None => {
                    lines.push(format!(
                        "[{}] {} ({} -> {}): {}",
                        entry.id, entry.side, entry.source_locale, entry.target_locale, entry.original_text
                    ));
                }
                Some(false) => {}
            }
            if resolved {
                if let Some(text) = &entry.translated_text {
                    lines.push(format!("[{}]   => {}", entry.id, text));
                } else if let Some(err) = &entry.error {
                    lines.push(format!("[{}]   !! {}", entry.id, err));
                }
            }
            self.seen.insert(entry.id, resolved);
        }

        if ui.notification != self.notification {
            if let Some(n) = &ui.notification {
                lines.push(format!("! {} (/dismiss to clear)", n.message));
            }
            self.notification = ui.notification.clone();
        }

        lines
    }
}

/// Render every snapshot until the state loop drops its sender. The final
/// snapshot is still rendered after the sender is gone.
async fn print_snapshots(mut ui: watch::Receiver<UiState>, mut out: impl FnMut(String)) {
    let mut printer = TranscriptPrinter::default();
    loop {
        let lines = printer.render(&ui.borrow_and_update());
        lines.into_iter().for_each(&mut out);
        if ui.changed().await.is_err() {
            break;
        }
    }
}

fn print_languages() {
    for l in SUPPORTED_LANGUAGES {
        println!("  {:<6} {}", l.code, l.name);
    }
}

/// Recent turns listed by `/stats`.
const RECENT_TURNS: usize = 5;

fn stats_lines(metrics: &MetricsCollector) -> Vec<String> {
    let summary = metrics.get_summary();
    let mut lines = vec![format!(
        "Turns: {} total, {} translated, {} failed, {} in flight; avg {}ms",
        summary.total_turns,
        summary.successful_turns,
        summary.failed_turns,
        summary.in_flight_turns,
        summary.avg_translation_ms
    )];
    for turn in metrics.get_history().iter().take(RECENT_TURNS) {
        let outcome = match (&turn.error_message, turn.success) {
            (_, true) => format!(
                "{} -> {} chars",
                turn.original_length_chars, turn.translated_length_chars
            ),
            (Some(err), false) => format!("failed: {}", err),
            (None, false) => "failed".to_string(),
        };
        lines.push(format!(
            "  [{}] {}ms {}",
            turn.entry_id, turn.translation_duration_ms, outcome
        ));
    }
    if let Some(err) = summary.last_error {
        lines.push(format!("Last error ({}): {}", err.error_type, err.message));
    }
    lines
}

/// Run the interactive session until `/quit` or end of input.
pub async fn run_terminal(
    settings: AppSettings,
    translator: Arc<dyn Translator>,
) -> anyhow::Result<()> {
    let synthesizer =
        CommandSynthesizer::detect().map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>);
    let recognizer: Option<Arc<dyn SpeechRecognizer>> = None;
    let metrics = Arc::new(Mutex::new(MetricsCollector::new()));

    let runner = SessionEffectRunner::new(
        translator,
        recognizer,
        synthesizer,
        Voice {
            rate: settings.speech_rate,
            pitch: settings.speech_pitch,
        },
        metrics.clone(),
    );

    let session = Session::new(settings.source_language, settings.target_language);
    let handle = start_session(session, runner);
    let events = handle.events.clone();

    let printer_task = tokio::spawn(print_snapshots(handle.ui, |line| println!("{}", line)));

    println!("Live Translator. Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let outgoing = match command {
            Command::Say { side, text } => vec![
                Event::SetInputText { side, text },
                Event::SubmitInput { side },
            ],
            Command::Source(code) => vec![Event::SetSourceLanguage { code }],
            Command::Target(code) => vec![Event::SetTargetLanguage { code }],
            Command::Swap => vec![Event::SwapLanguages],
            Command::Mic(side) => vec![Event::ToggleCapture { side }],
            Command::Stop => vec![Event::StopCapture],
            Command::Speak(id) => vec![Event::SpeakEntry { id }],
            Command::Dismiss => vec![Event::DismissNotification],
            Command::Languages => {
                print_languages();
                continue;
            }
            Command::Stats => {
                for line in stats_lines(&*metrics.lock().await) {
                    println!("{}", line);
                }
                continue;
            }
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            Command::Quit => break,
        };

        for event in outgoing {
            events.send(event).await?;
        }
    }

    events.send(Event::Exit).await?;
    let session = handle.task.await?;
    // The loop dropped its UI sender; the printer drains the last snapshot and stops
    printer_task.await?;
    log::info!("Session ended with {} entries", session.transcript.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::state_machine::{reduce, Effect};
    use crate::state_to_ui;

    #[test]
    fn plain_text_is_a_source_turn() {
        assert_eq!(
            parse_command("Where is the station?").unwrap(),
            Some(Command::Say {
                side: Side::Source,
                text: "Where is the station?".into()
            })
        );
    }

    #[test]
    fn prefixes_pick_the_side() {
        assert_eq!(
            parse_command("t: ¿Dónde está?").unwrap(),
            Some(Command::Say {
                side: Side::Target,
                text: "¿Dónde está?".into()
            })
        );
        assert_eq!(
            parse_command("s:hi").unwrap(),
            Some(Command::Say {
                side: Side::Source,
                text: "hi".into()
            })
        );
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(
            parse_command("/source fr-FR").unwrap(),
            Some(Command::Source("fr-FR".into()))
        );
        assert_eq!(parse_command("/mic target").unwrap(), Some(Command::Mic(Side::Target)));
        assert_eq!(parse_command("/speak 3").unwrap(), Some(Command::Speak(EntryId(3))));
        assert_eq!(parse_command("/exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn bad_commands_are_reported() {
        assert_eq!(
            parse_command("/teleport"),
            Err(CommandError::Unknown("teleport".into()))
        );
        assert_eq!(
            parse_command("/target"),
            Err(CommandError::MissingArgument("target"))
        );
        assert_eq!(
            parse_command("/mic left"),
            Err(CommandError::InvalidSide("left".into()))
        );
        assert_eq!(
            parse_command("/speak x"),
            Err(CommandError::InvalidEntryId("x".into()))
        );
    }

    #[tokio::test]
    async fn last_snapshot_is_printed_after_loop_exits() {
        let (tx, rx) = watch::channel(state_to_ui(&Session::default()));
        let lines = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let collected = lines.clone();
        let task = tokio::spawn(print_snapshots(rx, move |line| {
            collected.lock().unwrap().push(line)
        }));

        let (session, _) = reduce(
            &Session::default(),
            Event::SubmitTurn {
                side: Side::Source,
                text: "Hello".into(),
            },
        );
        tx.send_replace(state_to_ui(&session));
        drop(tx);
        task.await.unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("[1] source (en-US -> es-ES): Hello")
        );
    }

    #[test]
    fn stats_list_recent_turns_newest_first() {
        let mut metrics = MetricsCollector::new();
        metrics.turn_started(EntryId(1), 5);
        metrics.turn_succeeded(EntryId(1), 4);
        metrics.turn_started(EntryId(2), 5);
        metrics.turn_failed(EntryId(2), "timeout".to_string());

        let lines = stats_lines(&metrics);
        assert!(lines[0].starts_with("Turns: 2 total, 1 translated, 1 failed, 0 in flight"));
        assert!(lines[1].starts_with("  [2] "));
        assert!(lines[1].ends_with("failed: timeout"));
        assert!(lines[2].starts_with("  [1] "));
        assert!(lines[2].ends_with("5 -> 4 chars"));
    }

    #[test]
    fn printer_shows_entries_once_and_resolutions_once() {
        let mut printer = TranscriptPrinter::default();
        let (session, _) = reduce(
            &Session::default(),
            Event::CapabilitiesProbed(Capabilities {
                recognition: false,
                synthesis: true,
            }),
        );
        let (session, _) = reduce(&session, Event::DismissNotification);
        let first = printer.render(&state_to_ui(&session));
        assert_eq!(first.len(), 1);
        assert!(first[0].starts_with("Languages:"));

        let (session, effects) = reduce(
            &session,
            Event::SubmitTurn {
                side: Side::Source,
                text: "Hello".into(),
            },
        );
        let id = effects
            .iter()
            .find_map(|e| match e {
                Effect::StartTranslation { id, .. } => Some(*id),
                _ => None,
            })
            .unwrap();
        let lines = printer.render(&state_to_ui(&session));
        assert_eq!(lines, vec!["[1] source (en-US -> es-ES): Hello".to_string()]);
        assert!(printer.render(&state_to_ui(&session)).is_empty());

        let (session, _) = reduce(
            &session,
            Event::TranslateOk {
                id,
                text: "Hola".into(),
            },
        );
        let lines = printer.render(&state_to_ui(&session));
        assert_eq!(lines, vec!["[1]   => Hola".to_string()]);
        assert!(printer.render(&state_to_ui(&session)).is_empty());
    }
}
