//! Host capability probe.

use serde::Serialize;

use crate::capture::SpeechRecognizer;
use crate::synthesis::SpeechSynthesizer;

pub const RECOGNITION_UNSUPPORTED: &str = "Speech recognition is not supported in this environment.";
pub const SYNTHESIS_UNSUPPORTED: &str = "Text-to-speech is not supported in this environment.";
const BOTH_UNSUPPORTED: &str =
    "Speech recognition and text-to-speech are not supported in this environment.";

/// What the host can do. The default is "nothing probed yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub recognition: bool,
    pub synthesis: bool,
}

impl Capabilities {
    pub fn probe(
        recognizer: Option<&dyn SpeechRecognizer>,
        synthesizer: Option<&dyn SpeechSynthesizer>,
    ) -> Self {
        let caps = Self {
            recognition: recognizer.is_some_and(|r| r.is_available()),
            synthesis: synthesizer.is_some_and(|s| s.is_available()),
        };
        log::info!(
            "Capabilities: recognition={}, synthesis={}",
            caps.recognition,
            caps.synthesis
        );
        caps
    }

    /// Notification text for whatever is missing, if anything.
    pub fn unavailable_message(&self) -> Option<&'static str> {
        match (self.recognition, self.synthesis) {
            (true, true) => None,
            (false, true) => Some(RECOGNITION_UNSUPPORTED),
            (true, false) => Some(SYNTHESIS_UNSUPPORTED),
            (false, false) => Some(BOTH_UNSUPPORTED),
        }
    }
}
