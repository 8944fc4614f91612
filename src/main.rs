// Operator CLI for the hirescrape relay.
//
// Commands:
//   hirescrape send <chatId> <text> [--background]
//   hirescrape extract <count>
//   hirescrape chats
//   hirescrape health
//
// The registry base URL comes from REGISTRY_URL (default
// http://localhost:3100), the chat site base from CHAT_URL_BASE.

use anyhow::{Context, Result, anyhow, bail};
use log::info;
use std::sync::Arc;
use std::time::Duration;

use hirescrape::{
    BatchExtractor, ChatEntry, ChromeAutomation, PageAutomation, RegistryClient, RelayConfig,
    SendMode, SendOrchestrator, WorkerRequest, WorkerResponse,
};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  hirescrape send <chatId> <text> [--background]");
    eprintln!("  hirescrape extract <count>");
    eprintln!("  hirescrape chats");
    eprintln!("  hirescrape health");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  REGISTRY_URL    registry base URL (default http://localhost:3100)");
    eprintln!("  CHAT_URL_BASE   job site base URL (default https://hh.ru)");
    eprintln!("  CHROMIUM_PATH   override browser executable discovery");
}

fn build_config() -> Result<RelayConfig> {
    let registry_url =
        std::env::var("REGISTRY_URL").unwrap_or_else(|_| "http://localhost:3100".to_string());
    let chat_url_base =
        std::env::var("CHAT_URL_BASE").unwrap_or_else(|_| "https://hh.ru".to_string());
    RelayConfig::builder()
        .registry_url(registry_url)
        .chat_url_base(chat_url_base)
        .build()
}

async fn check_registry(registry: &RegistryClient, base_url: &str) -> Result<()> {
    if !registry.health().await {
        bail!("Cannot reach registry at {base_url}; is the API server running?");
    }
    Ok(())
}

/// Drive a tab to the chat site and ask the worker for the visible
/// conversation list.
async fn list_chats(
    automation: &ChromeAutomation,
    config: &RelayConfig,
) -> Result<Vec<ChatEntry>> {
    let url = format!("{}/chat", config.chat_url_base());
    let tab = automation
        .create_tab(&url, true)
        .await
        .context("Failed to open the chat list tab")?;
    automation.wait_for_load(tab, config.tab_load_timeout()).await;
    automation
        .inject(tab)
        .await
        .context("Failed to inject the worker script")?;

    let response = automation
        .send_to_worker(tab, WorkerRequest::ListChats, config.worker_timeout())
        .await
        .context("Worker did not answer the chat list request")?;
    match response {
        WorkerResponse::ChatList { success: true, chats, .. } => Ok(chats),
        WorkerResponse::ChatList { error, .. } => Err(anyhow!(
            "Worker could not list chats: {}",
            error.unwrap_or_else(|| "no error detail".into())
        )),
        other => Err(anyhow!("Unexpected worker reply: {other:?}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = build_config()?;
    let registry = RegistryClient::new(config.registry_url())?;

    match args.first().map(String::as_str) {
        Some("send") => {
            let chat_id = args
                .get(1)
                .ok_or_else(|| anyhow!("send requires a chat id"))?;
            let text = args
                .get(2)
                .ok_or_else(|| anyhow!("send requires message text"))?;
            let mode = if args.iter().any(|a| a == "--background") {
                SendMode::BackgroundTab
            } else {
                SendMode::CurrentTab
            };

            let automation = Arc::new(
                ChromeAutomation::launch(config.headless())
                    .await
                    .context("Failed to launch browser")?,
            );
            // The CLI has no pre-existing operator tab, so current-tab mode
            // gets a fresh active tab to drive.
            if mode == SendMode::CurrentTab {
                automation
                    .create_tab("about:blank", true)
                    .await
                    .context("Failed to open a working tab")?;
            }

            let orchestrator = SendOrchestrator::new(automation.clone(), config.clone());
            let ack = orchestrator.enqueue_send(chat_id, text, mode).await?;
            info!("Send accepted: {}", ack.accepted);

            // Delivery is asynchronous: the queued task navigates and
            // injects, then the readiness watch completes the send. Hold the
            // browser open until the pending entry clears or the readiness
            // budget runs out.
            let deadline = std::time::Instant::now()
                + config.tab_load_timeout()
                + config.ready_timeout()
                + config.close_grace();
            // The pending entry appears once the task starts executing and
            // clears on delivery; require both transitions so an empty
            // snapshot between them is not mistaken for success.
            let mut seen_pending = false;
            loop {
                let queued = orchestrator.queue_len().await;
                let pending = orchestrator.pending_len();
                if pending > 0 {
                    seen_pending = true;
                }
                let settled = queued == 0 && seen_pending && pending == 0;
                if settled || std::time::Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            let delivered = seen_pending && orchestrator.pending_len() == 0;
            // Give a closing background tab its grace period.
            tokio::time::sleep(config.close_grace()).await;
            automation.shutdown().await;
            if delivered {
                println!("Message delivered to chat {chat_id}");
            } else {
                bail!("Delivery to chat {chat_id} did not complete; see logs");
            }
        }
        Some("extract") => {
            let count: usize = args
                .get(1)
                .ok_or_else(|| anyhow!("extract requires a count"))?
                .parse()
                .context("count must be a positive integer")?;

            check_registry(&registry, config.registry_url()).await?;
            let automation = Arc::new(
                ChromeAutomation::launch(config.headless())
                    .await
                    .context("Failed to launch browser")?,
            );
            let extractor = BatchExtractor::new(automation.clone(), registry, config.clone());
            let outcome = extractor.run_batch(count).await;
            automation.shutdown().await;
            let outcome = outcome?;

            println!("Extraction summary");
            println!("  requested: {}", outcome.requested);
            println!("  processed: {}", outcome.processed);
            println!("  succeeded: {}", outcome.succeeded);
            println!("  failed:    {}", outcome.failed);
            for sample in &outcome.error_samples {
                println!("  error: {} -> {}", sample.url, sample.error);
            }
        }
        Some("chats") => {
            let automation = Arc::new(
                ChromeAutomation::launch(config.headless())
                    .await
                    .context("Failed to launch browser")?,
            );
            let result = list_chats(automation.as_ref(), &config).await;
            automation.shutdown().await;
            let chats = result?;

            if chats.is_empty() {
                println!("No conversations visible");
            } else {
                for chat in chats {
                    let marker = if chat.is_active { "*" } else { " " };
                    println!("{marker} {}  {}  {}", chat.id, chat.name, chat.url);
                }
            }
        }
        Some("health") => {
            check_registry(&registry, config.registry_url()).await?;
            println!("Registry at {} is healthy", config.registry_url());
        }
        _ => {
            print_usage();
            std::process::exit(2);
        }
    }

    Ok(())
}
