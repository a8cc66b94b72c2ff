//! Metrics collection for Live Translator
//!
//! Tracks translation latency, output size and error history per turn.
//! Several turns can be in flight at once, so in-progress turns are keyed by
//! entry id.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::state_machine::EntryId;

/// Maximum number of completed turns to retain in history
const MAX_TURN_HISTORY: usize = 50;

/// Maximum number of errors to retain in history
const MAX_ERROR_HISTORY: usize = 20;

/// Metrics for a resolved turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMetrics {
    pub entry_id: u64,
    /// Unix timestamp when the translation request went out (seconds)
    pub started_at: u64,
    /// Translation round trip in milliseconds
    pub translation_duration_ms: u64,
    /// Length of the submitted text in characters
    pub original_length_chars: u64,
    /// Length of the translated text in characters
    pub translated_length_chars: u64,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Summary statistics across all recorded turns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_turns: u64,
    pub successful_turns: u64,
    pub failed_turns: u64,
    /// Turns still waiting on the backend
    pub in_flight_turns: u64,
    /// Average translation round trip (ms) across successful turns in history
    pub avg_translation_ms: u64,
    pub last_error: Option<ErrorRecord>,
}

/// Record of an error that occurred during operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Unix timestamp when error occurred (seconds)
    pub timestamp: u64,
    /// Category of error (e.g., "translation", "capture", "synthesis")
    pub error_type: String,
    pub message: String,
    pub entry_id: Option<u64>,
}

struct TurnInProgress {
    started_at: Instant,
    started_at_unix: u64,
    original_length: usize,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl TurnInProgress {
    fn to_metrics(
        &self,
        entry_id: EntryId,
        translated_length: usize,
        error_message: Option<String>,
    ) -> TurnMetrics {
        TurnMetrics {
            entry_id: entry_id.0,
            started_at: self.started_at_unix,
            translation_duration_ms: self.started_at.elapsed().as_millis() as u64,
            original_length_chars: self.original_length as u64,
            translated_length_chars: translated_length as u64,
            success: error_message.is_none(),
            error_message,
        }
    }
}

/// Collects and stores metrics for translation turns
pub struct MetricsCollector {
    /// History of resolved turns (newest first)
    history: VecDeque<TurnMetrics>,
    /// History of errors (newest first)
    errors: VecDeque<ErrorRecord>,
    in_flight: HashMap<EntryId, TurnInProgress>,
    total_turns: u64,
    successful_turns: u64,
    failed_turns: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(MAX_TURN_HISTORY),
            errors: VecDeque::with_capacity(MAX_ERROR_HISTORY),
            in_flight: HashMap::new(),
            total_turns: 0,
            successful_turns: 0,
            failed_turns: 0,
        }
    }

    /// Start timing a translation request
    pub fn turn_started(&mut self, entry_id: EntryId, original_length: usize) {
        log::debug!("Metrics: turn {} started", entry_id);
        let previous = self.in_flight.insert(
            entry_id,
            TurnInProgress {
                started_at: Instant::now(),
                started_at_unix: unix_now(),
                original_length,
            },
        );
        if previous.is_some() {
            log::warn!("Metrics: turn {} restarted while in flight", entry_id);
        } else {
            self.total_turns += 1;
        }
    }

    pub fn turn_succeeded(&mut self, entry_id: EntryId, translated_length: usize) {
        let Some(turn) = self.in_flight.remove(&entry_id) else {
            log::debug!("Metrics: success for untracked turn {}", entry_id);
            return;
        };
        let metrics = turn.to_metrics(entry_id, translated_length, None);
        log::info!(
            "Metrics: turn {} translated in {}ms ({} -> {} chars)",
            entry_id,
            metrics.translation_duration_ms,
            metrics.original_length_chars,
            metrics.translated_length_chars
        );
        self.add_to_history(metrics);
        self.successful_turns += 1;
    }

    pub fn turn_failed(&mut self, entry_id: EntryId, error: String) {
        if let Some(turn) = self.in_flight.remove(&entry_id) {
            let metrics = turn.to_metrics(entry_id, 0, Some(error.clone()));
            log::warn!(
                "Metrics: turn {} failed after {}ms - {}",
                entry_id,
                metrics.translation_duration_ms,
                error
            );
            self.add_to_history(metrics);
            self.failed_turns += 1;
        }

        self.record_error("translation".to_string(), error, Some(entry_id));
    }

    /// Record an error (not necessarily tied to a turn)
    pub fn record_error(&mut self, error_type: String, message: String, entry_id: Option<EntryId>) {
        let error = ErrorRecord {
            timestamp: unix_now(),
            error_type,
            message,
            entry_id: entry_id.map(|id| id.0),
        };

        log::debug!("Metrics: recording error - {:?}", error);

        self.errors.push_front(error);
        while self.errors.len() > MAX_ERROR_HISTORY {
            self.errors.pop_back();
        }
    }

    pub fn get_summary(&self) -> MetricsSummary {
        let successful: Vec<_> = self.history.iter().filter(|t| t.success).collect();
        let count = successful.len() as u64;
        let avg_translation_ms = if count > 0 {
            successful
                .iter()
                .map(|t| t.translation_duration_ms)
                .sum::<u64>()
                / count
        } else {
            0
        };

        MetricsSummary {
            total_turns: self.total_turns,
            successful_turns: self.successful_turns,
            failed_turns: self.failed_turns,
            in_flight_turns: self.in_flight.len() as u64,
            avg_translation_ms,
            last_error: self.errors.front().cloned(),
        }
    }

    /// Resolved turns, newest first
    pub fn get_history(&self) -> Vec<TurnMetrics> {
        self.history.iter().cloned().collect()
    }

    /// Errors, newest first
    pub fn get_errors(&self) -> Vec<ErrorRecord> {
        self.errors.iter().cloned().collect()
    }

    fn add_to_history(&mut self, metrics: TurnMetrics) {
        self.history.push_front(metrics);
        while self.history.len() > MAX_TURN_HISTORY {
            self.history.pop_back();
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
