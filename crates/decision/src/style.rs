//! Prompt styles per behavior mode.

use crate::types::{BehaviorMode, ConversationContext, ResponseType};

impl BehaviorMode {
    /// How the assistant should carry itself in this mode.
    pub fn style(&self) -> &'static str {
        match self {
            BehaviorMode::PersonalTutor => {
                "You are a patient one-on-one tutor. Teach step by step, check understanding \
                 with a short follow-up question, and adapt to the learner's pace."
            }
            BehaviorMode::SupportiveAssistant => {
                "You are a supportive study assistant. Answer the question clearly and \
                 encourage the learner to keep going."
            }
            BehaviorMode::CollaborativeAssistant => {
                "You were addressed directly in a group study chat. Answer the request \
                 concisely and leave room for the group to continue."
            }
            BehaviorMode::CollaborativeTutor => {
                "You are a tutor joining a small study group. Add one helpful insight that \
                 builds on what the group already said."
            }
            BehaviorMode::FacilitatingTutor => {
                "You facilitate a group discussion. Guide the group toward the answer with \
                 hints and questions rather than giving it away outright."
            }
            BehaviorMode::ExpertConsultant => {
                "You are a subject expert consulted by a study group about a concrete \
                 problem. Diagnose it precisely and show a worked fix."
            }
            BehaviorMode::SelectiveExpert => {
                "You speak rarely in a large study group. Give a brief, high-value \
                 explanation and then step back."
            }
            BehaviorMode::Standard => {
                "You are a friendly study companion. Reply naturally and briefly."
            }
        }
    }

    /// Upper bound for the reply length, as a share of the configured max tokens.
    pub fn length_share(&self) -> f32 {
        match self {
            BehaviorMode::PersonalTutor | BehaviorMode::ExpertConsultant => 1.0,
            BehaviorMode::SupportiveAssistant | BehaviorMode::CollaborativeTutor => 0.75,
            BehaviorMode::FacilitatingTutor | BehaviorMode::CollaborativeAssistant => 0.6,
            BehaviorMode::SelectiveExpert | BehaviorMode::Standard => 0.4,
        }
    }
}

/// Compose the system prompt for a reply.
pub fn system_prompt(
    assistant_name: &str,
    mode: BehaviorMode,
    response_type: ResponseType,
    context: &ConversationContext,
    learner_level: &str,
) -> String {
    let mut prompt = format!("Your name is {assistant_name}. {}", mode.style());

    match response_type {
        ResponseType::MathHelp => {
            prompt.push_str(" Show each algebraic step and state the final result clearly.")
        }
        ResponseType::CodeHelp => {
            prompt.push_str(" Use fenced code blocks and explain what each change does.")
        }
        _ => {}
    }

    if !context.topics.is_empty() {
        let topics: Vec<&str> = context.topics.iter().map(|t| t.as_str()).collect();
        prompt.push_str(&format!(" The conversation is about {}.", topics.join(", ")));
    }
    prompt.push_str(&format!(" Pitch the explanation at a {learner_level} level."));
    prompt
}
