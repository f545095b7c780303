//! Turns a job payload into a completion request.

use studyhall_core::{CompletionRequest, Message, PromptMessage, Role};
use studyhall_decision::system_prompt;
use studyhall_memory::DEFAULT_LEARNER_LEVEL;

use crate::job::JobPayload;

/// Replies never get less room than this.
const MIN_REPLY_TOKENS: u32 = 64;

/// Model parameters shared by every job of a queue.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub assistant_name: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub fn build_request(payload: &JobPayload, settings: &CompletionSettings) -> CompletionRequest {
    let decision = &payload.decision;
    let level = payload
        .learner_level
        .as_deref()
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LEARNER_LEVEL);

    let mut messages = vec![PromptMessage::system(system_prompt(
        &settings.assistant_name,
        decision.behavior_mode,
        decision.response_type,
        &decision.context,
        level,
    ))];

    let group = decision.participant_count > 1;
    let history = payload
        .recent_messages
        .iter()
        .filter(|m| !same_message(m, &payload.message));
    for message in history {
        messages.push(to_prompt(message, group));
    }
    messages.push(to_prompt(&payload.message, group));

    let share = decision.behavior_mode.length_share();
    let max_tokens = ((settings.max_tokens as f32 * share).round() as u32)
        .clamp(MIN_REPLY_TOKENS, settings.max_tokens.max(MIN_REPLY_TOKENS));

    CompletionRequest {
        model: settings.model.clone(),
        messages,
        temperature: settings.temperature,
        max_tokens: Some(max_tokens),
    }
}

fn same_message(a: &Message, b: &Message) -> bool {
    a.sender_id == b.sender_id && a.timestamp == b.timestamp && a.text == b.text
}

fn to_prompt(message: &Message, group: bool) -> PromptMessage {
    match message.role {
        Role::Assistant => PromptMessage::assistant(message.text.clone()),
        Role::System => PromptMessage::system(message.text.clone()),
        // Name speakers so the model can tell group members apart
        Role::User if group => {
            PromptMessage::user(format!("{}: {}", message.sender_id, message.text))
        }
        Role::User => PromptMessage::user(message.text.clone()),
    }
}
