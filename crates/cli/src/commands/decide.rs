//! `studyhall decide`: Explain the decision for a message.

use std::path::Path;

use studyhall_core::Message;
use studyhall_decision::{DecisionEngine, PriorityCalculator};

use super::{load_config, local_thread, read_history};

pub fn run(
    config_path: Option<&Path>,
    text: &str,
    participants: usize,
    history: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let engine = DecisionEngine::new(&config.assistant, &config.decision);
    let calculator = PriorityCalculator::new(config.priority.clone());

    let recent = match history {
        Some(path) => read_history(path)?,
        None => Vec::new(),
    };
    let thread = local_thread(participants);
    let message = Message::user("you", text);

    let decision = engine.decide(&message, &thread, &recent);
    let priority = decision
        .should_respond
        .then(|| calculator.calculate(&decision));

    let report = serde_json::json!({
        "decision": decision,
        "priority": priority,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
