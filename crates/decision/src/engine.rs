//! Decision Engine: should the assistant speak, and in which role?
//!
//! Detectors run once per message. Their output feeds one of two ordered
//! rule tables, picked by participant count:
//!
//! - **solo**: the learner is alone, so the assistant acts as a proactive
//!   tutor and answers anything substantive (fail-open).
//! - **group**: peers are talking, so the assistant only steps in on a
//!   clear signal and stays silent otherwise (fail-closed). Groups of
//!   `large_group_size` or more skip the facilitation rule and need an
//!   educational academic question instead.
//!
//! Within a table the first matching rule wins.

use studyhall_config::{AssistantConfig, DecisionConfig};
use studyhall_core::{Message, Thread};
use tracing::debug;

use crate::context::ContextAnalyzer;
use crate::detectors::SignalDetector;
use crate::types::{BehaviorMode, ConversationContext, Decision, ResponseType, Signals};

/// What a rule looks at.
struct RuleInput<'a> {
    signals: &'a Signals,
    participants: usize,
    config: &'a DecisionConfig,
}

enum Confidence {
    Fixed(f32),
    /// `base + weight * question confidence`
    ScaledByQuestion { base: f32, weight: f32 },
}

struct Outcome {
    respond: bool,
    response_type: ResponseType,
    behavior_mode: BehaviorMode,
    confidence: Confidence,
    reason: &'static str,
}

struct Rule {
    name: &'static str,
    applies: fn(&RuleInput<'_>) -> bool,
    outcome: Outcome,
}

const fn respond(
    response_type: ResponseType,
    behavior_mode: BehaviorMode,
    confidence: f32,
    reason: &'static str,
) -> Outcome {
    Outcome {
        respond: true,
        response_type,
        behavior_mode,
        confidence: Confidence::Fixed(confidence),
        reason,
    }
}

const fn silent(confidence: f32, reason: &'static str) -> Outcome {
    Outcome {
        respond: false,
        response_type: ResponseType::None,
        behavior_mode: BehaviorMode::Standard,
        confidence: Confidence::Fixed(confidence),
        reason,
    }
}

// ── Predicates ──────────────────────────────────────────────────────────

fn mentioned(input: &RuleInput<'_>) -> bool {
    input.signals.explicit_mention
}

fn trivial_or_greeting(input: &RuleInput<'_>) -> bool {
    input.signals.trivial || input.signals.greeting_only
}

fn math(input: &RuleInput<'_>) -> bool {
    input.signals.math
}

fn code(input: &RuleInput<'_>) -> bool {
    input.signals.code
}

fn academic(input: &RuleInput<'_>) -> bool {
    input.signals.academic.is_academic
}

fn question(input: &RuleInput<'_>) -> bool {
    input.signals.question.is_question
}

fn casual(input: &RuleInput<'_>) -> bool {
    input.signals.casual
}

fn always(_: &RuleInput<'_>) -> bool {
    true
}

fn small_group_academic_question(input: &RuleInput<'_>) -> bool {
    let s = input.signals;
    !large_group(input)
        && s.question.is_question
        && s.academic.is_academic
        && s.char_count >= input.config.min_academic_question_chars
}

fn technical_trouble(input: &RuleInput<'_>) -> bool {
    let s = input.signals;
    (s.math || s.code) && (s.question.is_question || s.error_report)
}

fn large_group(input: &RuleInput<'_>) -> bool {
    input.participants >= input.config.large_group_size
}

fn large_group_teaching_question(input: &RuleInput<'_>) -> bool {
    let s = input.signals;
    large_group(input) && s.academic.is_academic && s.educational && s.question.is_question
}

// ── Rule tables ─────────────────────────────────────────────────────────

static SOLO_RULES: &[Rule] = &[
    Rule {
        name: "solo_explicit_mention",
        applies: mentioned,
        outcome: respond(
            ResponseType::DirectRequest,
            BehaviorMode::PersonalTutor,
            0.95,
            "explicit mention of the assistant",
        ),
    },
    Rule {
        name: "solo_trivial",
        applies: trivial_or_greeting,
        outcome: silent(0.1, "message too short or only a greeting"),
    },
    Rule {
        name: "solo_math",
        applies: math,
        outcome: respond(
            ResponseType::MathHelp,
            BehaviorMode::PersonalTutor,
            0.85,
            "math content from a solo learner",
        ),
    },
    Rule {
        name: "solo_code",
        applies: code,
        outcome: respond(
            ResponseType::CodeHelp,
            BehaviorMode::PersonalTutor,
            0.85,
            "code content from a solo learner",
        ),
    },
    Rule {
        name: "solo_academic",
        applies: academic,
        outcome: respond(
            ResponseType::AcademicSupport,
            BehaviorMode::PersonalTutor,
            0.85,
            "academic content from a solo learner",
        ),
    },
    Rule {
        name: "solo_question",
        applies: question,
        outcome: Outcome {
            respond: true,
            response_type: ResponseType::QuestionAnswer,
            behavior_mode: BehaviorMode::SupportiveAssistant,
            confidence: Confidence::ScaledByQuestion {
                base: 0.5,
                weight: 0.2,
            },
            reason: "question from a solo learner",
        },
    },
    Rule {
        name: "solo_casual",
        applies: casual,
        outcome: silent(0.2, "personal or casual message"),
    },
    Rule {
        name: "solo_conversational",
        applies: always,
        outcome: respond(
            ResponseType::Conversational,
            BehaviorMode::Standard,
            0.5,
            "substantive message from a solo learner",
        ),
    },
];

static GROUP_RULES: &[Rule] = &[
    Rule {
        name: "group_explicit_mention",
        applies: mentioned,
        outcome: respond(
            ResponseType::DirectRequest,
            BehaviorMode::CollaborativeAssistant,
            0.95,
            "explicit mention of the assistant",
        ),
    },
    Rule {
        name: "group_casual",
        applies: casual,
        outcome: silent(0.2, "personal or casual group chatter"),
    },
    Rule {
        name: "small_group_academic_question",
        applies: small_group_academic_question,
        outcome: respond(
            ResponseType::Facilitation,
            BehaviorMode::FacilitatingTutor,
            0.85,
            "academic question in a group discussion",
        ),
    },
    Rule {
        name: "large_group_teaching_question",
        applies: large_group_teaching_question,
        outcome: respond(
            ResponseType::AcademicSupport,
            BehaviorMode::SelectiveExpert,
            0.75,
            "educational academic question in a large group",
        ),
    },
    Rule {
        name: "group_technical_trouble",
        applies: technical_trouble,
        outcome: respond(
            ResponseType::ExpertConsultation,
            BehaviorMode::ExpertConsultant,
            0.8,
            "math or code problem raised in the group",
        ),
    },
    Rule {
        name: "large_group_default",
        applies: large_group,
        outcome: silent(0.3, "large group without a strong academic signal"),
    },
    Rule {
        name: "small_group_academic",
        applies: academic,
        outcome: respond(
            ResponseType::CollaborativeTutoring,
            BehaviorMode::CollaborativeTutor,
            0.7,
            "academic content in a small group",
        ),
    },
    Rule {
        name: "group_default",
        applies: always,
        outcome: silent(0.3, "no signal strong enough to interrupt the group"),
    },
];

/// Rule-based classifier over detector signals and conversation context.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    detector: SignalDetector,
    analyzer: ContextAnalyzer,
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(assistant: &AssistantConfig, config: &DecisionConfig) -> Self {
        Self {
            detector: SignalDetector::new(assistant, config),
            analyzer: ContextAnalyzer::new(assistant, config),
            config: config.clone(),
        }
    }

    /// Decide whether the assistant should answer `message` posted in `thread`.
    ///
    /// `recent` is the conversation history, oldest first. The result depends
    /// only on the arguments.
    pub fn decide(&self, message: &Message, thread: &Thread, recent: &[Message]) -> Decision {
        let context = self.analyzer.analyze(recent, message.timestamp);
        self.decide_text(&message.text, thread.participant_count(), context)
    }

    /// Decide from raw text and an already computed context.
    pub fn decide_text(
        &self,
        text: &str,
        participants: usize,
        context: ConversationContext,
    ) -> Decision {
        let participants = participants.max(1);
        let signals = self.detector.detect(text);
        let table = if participants == 1 {
            SOLO_RULES
        } else {
            GROUP_RULES
        };

        let input = RuleInput {
            signals: &signals,
            participants,
            config: &self.config,
        };

        // Both tables end in a catch-all
        let rule = table
            .iter()
            .find(|rule| (rule.applies)(&input))
            .unwrap_or(&table[table.len() - 1]);

        let confidence = match rule.outcome.confidence {
            Confidence::Fixed(c) => c,
            Confidence::ScaledByQuestion { base, weight } => {
                base + weight * signals.question.confidence
            }
        }
        .clamp(0.0, 1.0);

        debug!(
            rule = rule.name,
            participants,
            respond = rule.outcome.respond,
            confidence,
            "Decision made"
        );

        Decision {
            should_respond: rule.outcome.respond,
            reason: rule.outcome.reason.to_string(),
            confidence,
            response_type: rule.outcome.response_type,
            behavior_mode: rule.outcome.behavior_mode,
            context,
            signals,
            participant_count: participants,
            rule: rule.name.to_string(),
        }
    }

    pub fn detector(&self) -> &SignalDetector {
        &self.detector
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(&AssistantConfig::default(), &DecisionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use studyhall_core::ConversationId;

    fn thread(participants: usize) -> Thread {
        Thread::new(
            ConversationId::from("thread-1"),
            (0..participants).map(|i| format!("user{i}")).collect(),
        )
    }

    fn message(text: &str) -> Message {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Message::user_at("user0", text, ts)
    }

    fn decide(text: &str, participants: usize) -> Decision {
        DecisionEngine::default().decide(&message(text), &thread(participants), &[])
    }

    #[test]
    fn explicit_mention_in_pair_responds_with_high_confidence() {
        let d = decide("AI, explain photosynthesis", 2);
        assert!(d.should_respond);
        assert!(d.reason.contains("explicit mention"));
        assert!(d.confidence >= 0.85);
        assert_eq!(d.behavior_mode, BehaviorMode::CollaborativeAssistant);
    }

    #[test]
    fn weekend_chatter_in_group_stays_silent() {
        let d = decide("how was your weekend?", 3);
        assert!(!d.should_respond);
        assert_eq!(d.response_type, ResponseType::None);
    }

    #[test]
    fn solo_chain_rule_question_gets_personal_tutor() {
        let d = decide("What is the chain rule?", 1);
        assert!(d.should_respond);
        assert_eq!(d.behavior_mode, BehaviorMode::PersonalTutor);
    }

    #[test]
    fn solo_plain_question_gets_supportive_assistant() {
        let d = decide("where should I start?", 1);
        assert!(d.should_respond);
        assert_eq!(d.behavior_mode, BehaviorMode::SupportiveAssistant);
        assert!(d.confidence <= 0.7);
    }

    #[test]
    fn solo_greeting_and_trivial_input_is_ignored() {
        assert!(!decide("hi!", 1).should_respond);
        assert!(!decide("ok", 1).should_respond);
    }

    #[test]
    fn solo_substantive_statement_still_gets_a_reply() {
        let d = decide("I finished reading the chapter on cells today", 1);
        assert!(d.should_respond);

        let d = decide("I keep going back and forth on this one", 1);
        assert!(d.should_respond);
        assert_eq!(d.response_type, ResponseType::Conversational);
    }

    #[test]
    fn solo_casual_without_study_signal_is_silent() {
        assert!(!decide("that party was amazing lol", 1).should_respond);
    }

    #[test]
    fn solo_casual_with_question_still_responds() {
        assert!(decide("how are you?", 1).should_respond);
    }

    #[test]
    fn solo_non_trivial_messages_respond_unless_purely_casual() {
        let samples = [
            "solve 3x + 4 = 10",
            "def f(x):\n    return x * 2",
            "can you check my essay thesis",
            "not sure where to begin",
            "the weather is strange today",
            "lol that movie",
            "my weekend was long",
            "weekend homework on fractions?",
        ];
        let engine = DecisionEngine::default();
        for text in samples {
            let d = engine.decide(&message(text), &thread(1), &[]);
            let s = &d.signals;
            if s.trivial || s.greeting_only {
                continue;
            }
            let study_signal =
                s.academic.is_academic || s.math || s.code || s.question.is_question;
            let expected = !(s.casual && !study_signal);
            assert_eq!(d.should_respond, expected, "{text}");
        }
    }

    #[test]
    fn group_mention_always_wins() {
        for text in [
            "hey ai how was your weekend?",
            "@assistant lol",
            "tutor, party at mine tonight",
            "ok ai",
        ] {
            for participants in 2..=8 {
                assert!(decide(text, participants).should_respond, "{text}/{participants}");
            }
        }
    }

    #[test]
    fn group_academic_question_gets_facilitating_tutor() {
        let d = decide("why does photosynthesis need sunlight?", 3);
        assert!(d.should_respond);
        assert_eq!(d.behavior_mode, BehaviorMode::FacilitatingTutor);
    }

    #[test]
    fn group_code_error_gets_expert_consultant() {
        let d = decide("my fn main() { broken } throws an error", 2);
        assert!(d.should_respond);
        assert_eq!(d.behavior_mode, BehaviorMode::ExpertConsultant);
    }

    #[test]
    fn large_group_needs_educational_academic_question() {
        // Academic but not a question: silent in a large group
        assert!(!decide("we covered the french revolution today", 5).should_respond);
        // Same statement is welcome in a small group
        let d = decide("we covered the french revolution today", 3);
        assert!(d.should_respond);
        assert_eq!(d.behavior_mode, BehaviorMode::CollaborativeTutor);
    }

    #[test]
    fn large_group_selective_expert() {
        let engine = DecisionEngine::default();
        let context = ConversationContext::empty();
        let d = engine.decide_text("can someone explain the french revolution", 5, context);
        assert!(d.should_respond);
        assert_eq!(d.behavior_mode, BehaviorMode::SelectiveExpert);
    }

    #[test]
    fn group_defaults_to_silence() {
        assert!(!decide("I'll be there in ten", 3).should_respond);
    }

    #[test]
    fn confidence_ranks_signal_strength() {
        let mention = decide("ai, what's next?", 1).confidence;
        let academic = decide("what is the chain rule?", 1).confidence;
        let implicit = decide("where should we start", 1).confidence;
        assert!(mention > academic);
        assert!(academic > implicit);
    }

    #[test]
    fn decide_is_deterministic() {
        let engine = DecisionEngine::default();
        let history = vec![
            message("we need to finish the lab report"),
            message("what does the enzyme do?"),
        ];
        let a = engine.decide(&message("is it a catalyst?"), &thread(2), &history);
        let b = engine.decide(&message("is it a catalyst?"), &thread(2), &history);
        assert_eq!(a, b);
    }
}
