pub mod ask;
pub mod config_cmd;
pub mod decide;

use std::path::Path;

use studyhall_config::AppConfig;
use studyhall_core::{ConversationId, Message, Thread};

/// Load from an explicit path, or the default location with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => AppConfig::load_from(p),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// A local thread with `participants` members; the sender is always first.
pub fn local_thread(participants: usize) -> Thread {
    let members = (0..participants.max(1))
        .map(|i| match i {
            0 => "you".to_string(),
            n => format!("peer-{n}"),
        })
        .collect();
    Thread::new(ConversationId::from("cli"), members)
}

/// Read a JSON array of messages.
pub fn read_history(path: &Path) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let messages = serde_json::from_str(&raw)
        .map_err(|e| format!("Invalid history in {}: {e}", path.display()))?;
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_thread_has_requested_size() {
        assert_eq!(local_thread(0).participant_count(), 1);
        assert_eq!(local_thread(3).participant_count(), 3);
        assert_eq!(local_thread(3).participants[0], "you");
    }

    #[test]
    fn history_round_trips_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let history = vec![Message::user("bob", "we're on chapter 3")];
        std::fs::write(&path, serde_json::to_string(&history).unwrap()).unwrap();

        let loaded = read_history(&path).unwrap();
        assert_eq!(loaded, history);
    }

    #[test]
    fn malformed_history_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        let err = read_history(&path).unwrap_err().to_string();
        assert!(err.contains("history.json"));
    }
}
