//! Priority Calculator: how urgently should a reply be produced?
//!
//! Scoring is additive over the decision's signals. A recent assistant turn
//! dampens the total after every factor is counted, so nothing can override
//! the dampening.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use studyhall_config::PriorityConfig;

use crate::types::Decision;

const MENTION_WEIGHT: f32 = 0.8;
const ACADEMIC_WEIGHT: f32 = 0.6;
const QUESTION_WEIGHT: f32 = 0.5;
const URGENCY_STEP: f32 = 0.15;
const URGENCY_CAP: f32 = 0.3;
const LOW_PARTICIPATION_WEIGHT: f32 = 0.2;
const LONG_TECHNICAL_WEIGHT: f32 = 0.2;
const DAMPENING_FACTOR: f32 = 0.3;
const DAMPENED_CEILING: f32 = 0.5;

/// Enum bucket the job queue orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    Normal,
    High,
}

impl PriorityLevel {
    pub fn from_score(score: f32, config: &PriorityConfig) -> Self {
        if score >= config.high_threshold {
            PriorityLevel::High
        } else if score >= config.normal_threshold {
            PriorityLevel::Normal
        } else {
            PriorityLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Normal => "normal",
            PriorityLevel::High => "high",
        }
    }
}

impl std::fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the factor breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Flag(bool),
    Score(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    /// Within [0, 1]
    pub priority: f32,
    pub level: PriorityLevel,
    pub factors: BTreeMap<String, FactorValue>,
}

#[derive(Debug, Clone, Default)]
pub struct PriorityCalculator {
    config: PriorityConfig,
}

impl PriorityCalculator {
    pub fn new(config: PriorityConfig) -> Self {
        Self { config }
    }

    pub fn calculate(&self, decision: &Decision) -> PriorityScore {
        let signals = &decision.signals;
        let context = &decision.context;
        let mut factors = BTreeMap::new();
        let mut score = 0.0_f32;

        let mut flag = |name: &str, on: bool, weight: f32, score: &mut f32| {
            factors.insert(name.to_string(), FactorValue::Flag(on));
            if on {
                *score += weight;
            }
        };

        flag("explicit_mention", signals.explicit_mention, MENTION_WEIGHT, &mut score);
        flag("academic", signals.academic.is_academic, ACADEMIC_WEIGHT, &mut score);
        flag("question", signals.question.is_question, QUESTION_WEIGHT, &mut score);
        flag(
            "low_participation",
            context.participation_level < self.config.low_participation_threshold,
            LOW_PARTICIPATION_WEIGHT,
            &mut score,
        );

        let technical =
            signals.math || signals.code || signals.academic.indicators.len() >= 2;
        flag(
            "long_technical",
            signals.char_count > self.config.long_message_chars && technical,
            LONG_TECHNICAL_WEIGHT,
            &mut score,
        );

        let urgency = (URGENCY_STEP * signals.urgency as f32).min(URGENCY_CAP);
        factors.insert("urgency".to_string(), FactorValue::Score(urgency));
        score += urgency;

        factors.insert(
            "recent_assistant_turn".to_string(),
            FactorValue::Flag(context.has_recent_assistant_turn),
        );
        if context.has_recent_assistant_turn {
            score = (score * DAMPENING_FACTOR).min(DAMPENED_CEILING);
        }

        let priority = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };

        PriorityScore {
            priority,
            level: PriorityLevel::from_score(priority, &self.config),
            factors,
        }
    }
}
