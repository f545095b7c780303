//! Value types produced by the analyzer, the detectors and the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Subject areas recognized by the academic vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Math,
    Science,
    Programming,
    History,
    Literature,
    Language,
    Economics,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Science => "science",
            Subject::Programming => "programming",
            Subject::History => "history",
            Subject::Literature => "literature",
            Subject::Language => "language",
            Subject::Economics => "economics",
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The prevailing register of the recent conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Neutral,
    Academic,
    Inquisitive,
    Active,
}

/// Summary of recent conversation state. Recomputed for every decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub topics: BTreeSet<Subject>,
    pub has_recent_assistant_turn: bool,
    /// Always within [0, 1]
    pub momentum: f32,
    /// Always within [0, 1]
    pub participation_level: f32,
    pub dominant_tone: Tone,
    /// Messages the analysis looked at
    pub window_len: usize,
}

impl ConversationContext {
    /// Context for a conversation with no history.
    pub fn empty() -> Self {
        Self {
            topics: BTreeSet::new(),
            has_recent_assistant_turn: false,
            momentum: 0.0,
            participation_level: 0.0,
            dominant_tone: Tone::Neutral,
            window_len: 0,
        }
    }

    /// The first topic in taxonomy order, if any.
    pub fn primary_topic(&self) -> Option<Subject> {
        self.topics.iter().next().copied()
    }
}

/// The assistant's conversational stance for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMode {
    PersonalTutor,
    SupportiveAssistant,
    CollaborativeAssistant,
    CollaborativeTutor,
    FacilitatingTutor,
    ExpertConsultant,
    SelectiveExpert,
    Standard,
}

impl BehaviorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorMode::PersonalTutor => "personal_tutor",
            BehaviorMode::SupportiveAssistant => "supportive_assistant",
            BehaviorMode::CollaborativeAssistant => "collaborative_assistant",
            BehaviorMode::CollaborativeTutor => "collaborative_tutor",
            BehaviorMode::FacilitatingTutor => "facilitating_tutor",
            BehaviorMode::ExpertConsultant => "expert_consultant",
            BehaviorMode::SelectiveExpert => "selective_expert",
            BehaviorMode::Standard => "standard",
        }
    }
}

impl std::fmt::Display for BehaviorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of contribution the assistant would make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    DirectRequest,
    AcademicSupport,
    MathHelp,
    CodeHelp,
    QuestionAnswer,
    Conversational,
    Facilitation,
    ExpertConsultation,
    CollaborativeTutoring,
    None,
}

/// Which detector rule classified the message as a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Subject-specific phrasing ("solve", "what is … equal to")
    Domain,
    /// Interrogative opener and a trailing question mark
    Direct,
    /// Trailing question mark only
    Marked,
    /// "help me", "how do I", "stuck on"
    HelpSeeking,
    /// Interrogative opener without a question mark
    Implicit,
    /// "not sure", "confused"
    Uncertainty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSignal {
    pub is_question: bool,
    pub kind: Option<QuestionKind>,
    pub confidence: f32,
}

impl QuestionSignal {
    pub fn none() -> Self {
        Self {
            is_question: false,
            kind: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicSignal {
    pub is_academic: bool,
    pub subject: Option<Subject>,
    /// What matched, e.g. `subject:math`, `assignment:homework`, `verb:explain`
    pub indicators: Vec<String>,
}

/// Every detector's verdict on one message, computed once and shared by all
/// rule tables and the priority calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub explicit_mention: bool,
    pub question: QuestionSignal,
    pub academic: AcademicSignal,
    pub casual: bool,
    pub greeting_only: bool,
    pub trivial: bool,
    pub math: bool,
    pub code: bool,
    pub educational: bool,
    pub error_report: bool,
    /// Number of distinct urgency phrases
    pub urgency: usize,
    pub char_count: usize,
}

/// The engine's verdict on whether and how the assistant contributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub should_respond: bool,
    pub reason: String,
    /// Within [0, 1]; grows with the strength of the triggering signal
    pub confidence: f32,
    pub response_type: ResponseType,
    pub behavior_mode: BehaviorMode,
    pub context: ConversationContext,
    pub signals: Signals,
    pub participant_count: usize,
    /// Name of the rule that produced the verdict
    pub rule: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behavior_mode_serializes_snake_case() {
        let json = serde_json::to_string(&BehaviorMode::PersonalTutor).unwrap();
        assert_eq!(json, "\"personal_tutor\"");
        assert_eq!(BehaviorMode::ExpertConsultant.to_string(), "expert_consultant");
    }

    #[test]
    fn primary_topic_follows_taxonomy_order() {
        let mut ctx = ConversationContext::empty();
        ctx.topics.insert(Subject::History);
        ctx.topics.insert(Subject::Math);
        assert_eq!(ctx.primary_topic(), Some(Subject::Math));
    }
}
