//! `studyhall ask`: One message through the whole pipeline.
//!
//! Uses the in-memory store and transport; the reply is printed as it would
//! be delivered to the thread's subscribers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use studyhall_channels::InMemoryTransport;
use studyhall_core::{Message, SubscriberId};
use studyhall_memory::InMemoryMessageStore;
use studyhall_queue::{JobQueue, JobStatus, ResponseOrchestrator, channel_for};

use super::{load_config, local_thread};

pub async fn run(
    config_path: Option<&Path>,
    text: &str,
    participants: usize,
    level: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    STUDYHALL_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add api_key to your config file:");
        eprintln!("    {}", config_file().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = studyhall_providers::build_provider(&config)?;
    let store = Arc::new(InMemoryMessageStore::new());
    let transport = Arc::new(InMemoryTransport::new());
    let queue = JobQueue::new(&config, provider, store, transport.clone());
    let orchestrator = ResponseOrchestrator::new(&config, queue.clone());

    let thread = local_thread(participants);
    let me = SubscriberId("you".into());
    let mut inbox = transport.connect(me.clone()).await;
    transport.subscribe(&channel_for(&thread), &me).await;

    let message = Message::user("you", text);
    let handled = orchestrator.handle_message(&message, &thread, &[], level)?;
    let Some(job_id) = handled.job_id else {
        println!(
            "(assistant stays silent: {}, confidence {:.2})",
            handled.decision.reason, handled.decision.confidence
        );
        return Ok(());
    };

    queue.start();
    eprint!("  Thinking...");
    let view = loop {
        match queue.get_status(&job_id) {
            Some(view) if view.status.is_terminal() => break view,
            Some(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            None => return Err(format!("Job {job_id} disappeared").into()),
        }
    };
    eprint!("\r              \r");
    queue.shutdown().await;

    match view.status {
        JobStatus::Completed => match inbox.try_recv() {
            Ok(delivered) => {
                let reply = delivered.payload["text"].as_str().unwrap_or_default();
                println!("{reply}");
            }
            Err(_) => {
                let reply = view.result.map(|r| r.text).unwrap_or_default();
                println!("{reply}");
            }
        },
        _ => {
            let error = view.error.unwrap_or_else(|| "unknown failure".into());
            return Err(error.into());
        }
    }
    Ok(())
}

fn config_file() -> std::path::PathBuf {
    studyhall_config::AppConfig::config_dir().join("config.toml")
}
