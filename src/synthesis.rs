//! Speech output boundary.
//!
//! Synthesis is fire-and-forget: `speak` hands the utterance to the engine and
//! returns. Overlapping utterances are the engine's problem.

use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Words per minute both espeak and `say` use at rate 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// espeak pitch at 1.0 (range 0-99).
const BASE_ESPEAK_PITCH: f32 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub locale: String,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("text-to-speech is not supported")]
    NotSupported,
    #[error("failed to launch speech synthesizer: {0}")]
    Launch(#[from] std::io::Error),
}

/// Host speech synthesis engine.
pub trait SpeechSynthesizer: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn speak(&self, utterance: &Utterance) -> Result<(), SynthesisError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Espeak,
    Say,
}

/// Speaks through a command-line synthesizer found on `PATH`
/// (`espeak-ng`, `espeak`, or macOS `say`). Text is fed over stdin.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    flavor: Flavor,
}

impl CommandSynthesizer {
    pub fn detect() -> Option<Self> {
        let candidates = [
            ("espeak-ng", Flavor::Espeak),
            ("espeak", Flavor::Espeak),
            ("say", Flavor::Say),
        ];
        let path = std::env::var_os("PATH")?;
        for (name, flavor) in candidates {
            for dir in std::env::split_paths(&path) {
                let program = dir.join(name);
                if program.is_file() {
                    log::info!("Speech synthesis via {}", program.display());
                    return Some(Self { program, flavor });
                }
            }
        }
        log::info!("No command-line speech synthesizer found on PATH");
        None
    }

    fn args(&self, utterance: &Utterance) -> Vec<String> {
        let wpm = (BASE_WORDS_PER_MINUTE * utterance.rate).round().max(1.0) as u32;
        match self.flavor {
            Flavor::Espeak => {
                let pitch = (BASE_ESPEAK_PITCH * utterance.pitch).round().clamp(0.0, 99.0) as u32;
                vec![
                    "-v".to_string(),
                    espeak_voice(&utterance.locale),
                    "-s".to_string(),
                    wpm.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "--stdin".to_string(),
                ]
            }
            // `say` picks its voice from the system settings; pitch has no flag.
            Flavor::Say => vec![
                "-r".to_string(),
                wpm.to_string(),
                "-f".to_string(),
                "-".to_string(),
            ],
        }
    }
}

/// espeak voices are keyed by the lowercase primary language subtag.
fn espeak_voice(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, utterance: &Utterance) -> Result<(), SynthesisError> {
        let mut child = Command::new(&self.program)
            .args(self.args(utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take();
        let text = utterance.text.clone();
        tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    log::warn!("Synthesizer stdin write failed: {}", e);
                }
                // Closing stdin tells the synthesizer the text is complete
                drop(stdin);
            }
            match child.wait().await {
                Ok(status) if !status.success() => {
                    log::warn!("Synthesizer exited with {}", status);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Synthesizer wait failed: {}", e),
            }
        });
        Ok(())
    }
}
