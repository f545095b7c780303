//! Context Analyzer: summarizes the recent window of a conversation.
//!
//! The analysis is measured against the timestamp of the incoming message,
//! never the wall clock, so the same history always yields the same context.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use studyhall_config::{AssistantConfig, DecisionConfig};
use studyhall_core::Message;

use crate::detectors::{self, SignalDetector};
use crate::types::{ConversationContext, Tone};

/// Weight of distinct-sender breadth in the participation level.
const BREADTH_WEIGHT: f32 = 0.6;
/// Weight of human message frequency in the participation level.
const FREQUENCY_WEIGHT: f32 = 0.4;
/// Distinct human senders at which breadth saturates.
const BREADTH_SATURATION: f32 = 4.0;

const ACADEMIC_TONE_SHARE: f32 = 0.5;
const INQUISITIVE_TONE_SHARE: f32 = 0.3;
const ACTIVE_MOMENTUM: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    detector: SignalDetector,
    assistant_sender_id: String,
    config: DecisionConfig,
}

impl ContextAnalyzer {
    pub fn new(assistant: &AssistantConfig, config: &DecisionConfig) -> Self {
        Self {
            detector: SignalDetector::new(assistant, config),
            assistant_sender_id: assistant.sender_id.clone(),
            config: config.clone(),
        }
    }

    /// Summarize `recent` (oldest first) as of `now`.
    ///
    /// Only the last `window_size` messages are considered.
    pub fn analyze(&self, recent: &[Message], now: DateTime<Utc>) -> ConversationContext {
        let window_size = self.config.window_size.max(1);
        let window = &recent[recent.len().saturating_sub(window_size)..];
        if window.is_empty() {
            return ConversationContext::empty();
        }

        let momentum = self.momentum(window, now, window_size);
        let humans: Vec<&Message> = window.iter().filter(|m| !self.is_assistant(m)).collect();

        let topics: BTreeSet<_> = window
            .iter()
            .flat_map(|m| detectors::subjects(&m.text.to_lowercase()))
            .collect();

        ConversationContext {
            topics,
            has_recent_assistant_turn: self.has_recent_assistant_turn(window),
            momentum,
            participation_level: participation(&humans, window_size),
            dominant_tone: self.dominant_tone(&humans, momentum),
            window_len: window.len(),
        }
    }

    fn is_assistant(&self, message: &Message) -> bool {
        message.is_from_assistant() || message.sender_id == self.assistant_sender_id
    }

    /// Whether the assistant spoke, or was addressed, within the last few turns.
    fn has_recent_assistant_turn(&self, window: &[Message]) -> bool {
        let turns = self.config.recent_turn_window;
        window[window.len().saturating_sub(turns)..]
            .iter()
            .any(|m| self.is_assistant(m) || self.detector.is_explicit_mention(&m.text))
    }

    fn momentum(&self, window: &[Message], now: DateTime<Utc>, window_size: usize) -> f32 {
        let horizon = i64::try_from(self.config.momentum_window_secs).unwrap_or(i64::MAX);
        let fresh = window
            .iter()
            .filter(|m| now.signed_duration_since(m.timestamp).num_seconds() <= horizon)
            .count();
        clamp_unit(fresh as f32 / window_size as f32)
    }

    fn dominant_tone(&self, humans: &[&Message], momentum: f32) -> Tone {
        if !humans.is_empty() {
            let total = humans.len() as f32;
            let (academic, questions) = humans.iter().fold((0usize, 0usize), |(a, q), m| {
                let lower = m.text.trim().to_lowercase();
                (
                    a + usize::from(detectors::academic(&lower).is_academic),
                    q + usize::from(detectors::question(&lower).is_question),
                )
            });

            if academic as f32 / total > ACADEMIC_TONE_SHARE {
                return Tone::Academic;
            }
            if questions as f32 / total > INQUISITIVE_TONE_SHARE {
                return Tone::Inquisitive;
            }
        }
        if momentum > ACTIVE_MOMENTUM {
            Tone::Active
        } else {
            Tone::Neutral
        }
    }
}

impl Default for ContextAnalyzer {
    fn default() -> Self {
        Self::new(&AssistantConfig::default(), &DecisionConfig::default())
    }
}

fn participation(humans: &[&Message], window_size: usize) -> f32 {
    let senders: HashSet<&str> = humans.iter().map(|m| m.sender_id.as_str()).collect();
    let breadth = (senders.len() as f32 / BREADTH_SATURATION).min(1.0);
    let frequency = humans.len() as f32 / window_size as f32;
    clamp_unit(BREADTH_WEIGHT * breadth + FREQUENCY_WEIGHT * frequency)
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
