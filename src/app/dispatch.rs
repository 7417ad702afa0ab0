use crate::cli::commands::{Cli, Commands, CommitmentCommands};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use replyguard::Config;
use replyguard::llm::{Provider, create_provider};
use replyguard::memory::{Commitment, MemoryStore, UserUtterance, open_store};
use replyguard::pipeline::{BridgePoller, LogNotifier, ManualReply};
use replyguard::transport::{HttpBridge, MessagingBridge};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::app::status::render_status;

fn connect_bridge(config: &Config) -> Result<Arc<dyn MessagingBridge>> {
    let bridge = HttpBridge::new(&config.bridge).context("Failed to configure messaging bridge")?;
    Ok(Arc::new(bridge))
}

fn model_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    config.require_api_key()?;
    Ok(Arc::from(create_provider(config)))
}

async fn build_poller(config: &Config) -> Result<BridgePoller> {
    let provider = model_provider(config)?;
    let bridge = connect_bridge(config)?;
    let store = open_store(config).await?;
    Ok(BridgePoller::new(
        config,
        config.load_policy(),
        bridge,
        store,
        provider,
        Arc::new(LogNotifier::new()),
    ))
}

async fn run(config: &Config) -> Result<()> {
    let poller = build_poller(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested; finishing the current batch");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(bridge = %config.bridge.url, model = %config.default_model, "starting replyguard");
    poller.run(shutdown_rx).await;
    Ok(())
}

async fn poll_once(config: &Config) -> Result<()> {
    let poller = build_poller(config).await?;
    let report = poller
        .poll_once()
        .await
        .context("Failed to fetch new messages from the bridge")?;
    println!(
        "received {}  sent {}  notified {}  suppressed {}  failed {}",
        report.received, report.sent, report.notified, report.suppressed, report.failed
    );
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let bridge = connect_bridge(config)?;
    let bridge_status = bridge.status().await;
    let store = open_store(config).await;
    let (store_ok, pending) = match &store {
        Ok(store) => (
            store.health_check().await,
            store.latest_pending_reply(None).await.ok().flatten(),
        ),
        Err(_) => (false, None),
    };
    println!(
        "{}",
        render_status(config, bridge_status.as_ref().ok(), store_ok, pending.as_ref())
    );
    if let Err(e) = bridge_status {
        println!("Bridge error: {e}");
    }
    Ok(())
}

/// Accepts RFC 3339 or a local `YYYY-MM-DD HH:MM` timestamp.
pub(crate) fn parse_when(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|ts| ts.with_timezone(&Utc))
                .with_context(|| format!("{input} does not exist in the local timezone"));
        }
    }
    bail!("unrecognized time '{input}', expected e.g. 2026-10-15 15:00")
}

async fn commitment(config: &Config, command: CommitmentCommands) -> Result<()> {
    let store = open_store(config).await?;
    match command {
        CommitmentCommands::Add {
            description,
            start,
            end,
            minutes,
            participants,
        } => {
            let start = parse_when(&start)?;
            let end = match end {
                Some(end) => parse_when(&end)?,
                None => Duration::try_minutes(minutes)
                    .and_then(|length| start.checked_add_signed(length))
                    .with_context(|| format!("--minutes {minutes} is out of range"))?,
            };
            let commitment = Commitment::new(description, start, end, participants)?;
            store.add_commitment(&commitment).await?;
            println!("Added commitment {}", commitment.id);
            Ok(())
        }
        CommitmentCommands::List => {
            let commitments = store.list_commitments().await?;
            if commitments.is_empty() {
                println!("No commitments.");
            }
            for c in commitments {
                let start = c.start.with_timezone(&Local);
                let end = c.end.with_timezone(&Local);
                print!(
                    "{}  {} to {}  {}",
                    c.id,
                    start.format("%a %Y-%m-%d %H:%M"),
                    end.format("%H:%M"),
                    c.description
                );
                if !c.participants.is_empty() {
                    print!(" (with {})", c.participants.join(", "));
                }
                println!();
            }
            Ok(())
        }
        CommitmentCommands::Remove { id } => {
            if store.remove_commitment(&id).await? {
                println!("Removed commitment {id}");
                Ok(())
            } else {
                bail!("no commitment with id {id}")
            }
        }
    }
}

async fn note(config: &Config, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        bail!("note text is empty");
    }
    let store = open_store(config).await?;
    store.append_utterance(&UserUtterance::new(text)).await?;
    println!("Noted.");
    Ok(())
}

async fn reply(config: &Config, text: &str, chat: Option<&str>) -> Result<()> {
    let provider = model_provider(config)?;
    let bridge = connect_bridge(config)?;
    if !bridge.is_ready().await {
        bail!("messaging bridge is not ready; pair WhatsApp first");
    }
    let store = open_store(config).await?;
    let outcome = ManualReply::new(config, bridge, store, provider)
        .reply(text, chat)
        .await?;
    println!(
        "Sent to {}: {}",
        outcome.pending.chat_name, outcome.sent_text
    );
    Ok(())
}

async fn history(
    config: &Config,
    chat: Option<String>,
    search: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let store: Arc<dyn MemoryStore> = open_store(config).await?;
    let limit = limit.unwrap_or(config.memory.history_limit).max(1);

    if let Some(chat) = chat {
        let chat = replyguard::transport::bridge::canonical_chat_id(&chat);
        for m in store.conversation_window(&chat, limit).await? {
            let who = if m.is_from_me { "Me" } else { m.sender_name.as_str() };
            println!("{}  {who}: {}", format_unix(m.timestamp), m.body);
        }
        return Ok(());
    }

    if let Some(query) = search {
        for m in store.search_messages(&query, limit).await? {
            println!("{}  [{}] {}: {}", format_unix(m.timestamp), m.chat_name, m.sender_name, m.body);
        }
        return Ok(());
    }

    let records = store.recent_dispatches(limit).await?;
    if records.is_empty() {
        println!("No dispatch history yet.");
    }
    for r in records {
        print!(
            "{}  {:<10}  {}  {}",
            r.recorded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            r.action,
            r.chat_id,
            r.reason
        );
        if let Some(text) = r.sent_text {
            print!("  -> {text}");
        }
        println!();
    }
    Ok(())
}

fn format_unix(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run => run(&config).await,
        Commands::PollOnce => poll_once(&config).await,
        Commands::Status => status(&config).await,
        Commands::Commitment { commitment_command } => {
            commitment(&config, commitment_command).await
        }
        Commands::Note { text } => note(&config, &text).await,
        Commands::Reply { text, chat } => reply(&config, &text, chat.as_deref()).await,
        Commands::History {
            chat,
            search,
            limit,
        } => history(&config, chat, search, limit).await,
    }
}
