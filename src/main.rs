use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use foresight::kernel::time::TICK_MS;
use foresight::{ContextSnapshot, Engine, EngineConfig, EngineEvent, Reactor};

/// One stdin line: a JSON snapshot, or a command.
enum Line {
    Snapshot(ContextSnapshot),
    Accept(Option<Uuid>),
    Dismiss(Option<Uuid>),
    Status,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<Line>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.starts_with('{') {
        let snapshot = serde_json::from_str(line).context("invalid snapshot json")?;
        return Ok(Some(Line::Snapshot(snapshot)));
    }
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let id = parts
        .next()
        .map(Uuid::parse_str)
        .transpose()
        .context("invalid session id")?;
    Ok(Some(match command {
        "accept" | "a" => Line::Accept(id),
        "dismiss" | "d" => Line::Dismiss(id),
        "status" => Line::Status,
        "quit" | "exit" => Line::Quit,
        other => anyhow::bail!("unknown command `{other}`"),
    }))
}

/// The explicit id, else the session currently on screen.
async fn pending_or(engine: &Engine, id: Option<Uuid>) -> Option<Uuid> {
    match id {
        Some(id) => Some(id),
        None => engine.current_suggestion().await.map(|p| p.session_id),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries suggestions.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("foresight=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };

    let engine = Engine::builder(config).build()?;
    let (tx, rx) = mpsc::channel(256);
    let mut reactor = Reactor::new(rx, engine.clone());
    let cancel = reactor.cancel_token();
    let driver = tokio::spawn(async move { reactor.run().await });

    // Print the pending suggestion whenever it changes.
    let watcher = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut shown: Option<Uuid> = None;
            let mut cadence = tokio::time::interval(Duration::from_millis(TICK_MS));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = cadence.tick() => {}
                }
                let pending = engine.current_suggestion().await;
                let id = pending.as_ref().map(|p| p.session_id);
                if id != shown {
                    if let Some(p) = pending {
                        println!(
                            "[{}] {} ({:.2}, {})",
                            p.session_id,
                            p.suggestion.description,
                            p.suggestion.confidence,
                            p.suggestion.source.as_str()
                        );
                    }
                    shown = id;
                }
            }
        })
    };

    tracing::info!("foresight running. Feed JSON snapshots on stdin; `accept`, `dismiss`, `status`, `quit`.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        let parsed = match parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("{e:#}");
                continue;
            }
        };

        let event = match parsed {
            Line::Snapshot(snapshot) => EngineEvent::Snapshot(snapshot),
            Line::Accept(id) => match pending_or(&engine, id).await {
                Some(id) => EngineEvent::accept(id),
                None => {
                    println!("nothing to decide");
                    continue;
                }
            },
            Line::Dismiss(id) => match pending_or(&engine, id).await {
                Some(id) => EngineEvent::dismiss(id),
                None => {
                    println!("nothing to decide");
                    continue;
                }
            },
            Line::Status => {
                let t = engine.telemetry().await;
                println!(
                    "cycles={} proposed={} accepted={} ignored={} timed_out={} acceptance={:.2}",
                    t.cycles.count,
                    t.cycles.proposed,
                    t.feedback.accepted,
                    t.feedback.ignored,
                    t.feedback.timed_out,
                    t.feedback.acceptance_rate
                );
                continue;
            }
            Line::Quit => break,
        };

        if tx.send(event).await.is_err() {
            break;
        }
    }

    let _ = tx.send(EngineEvent::Shutdown).await;
    let _ = driver.await;
    cancel.cancel();
    let _ = watcher.await;
    Ok(())
}
