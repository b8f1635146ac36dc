use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notifyd::cli::{Cli, Commands};
use notifyd::client::NotificationClient;
use notifyd::config::{self, Config};
use notifyd::delivery::{DeliveryOutcome, DeliveryService};
use notifyd::jobs;
use notifyd::models::notification::{
    CreateNotification, NotificationFilter, NotificationKind, NotificationStats,
};
use notifyd::notification::system::SystemEmitter;
use notifyd::outbox::Outbox;
use notifyd::store::NotificationStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "notifyd=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();
    let user = args.user.clone().or_else(|| cfg.user_id.clone());

    let result = match args.command {
        Some(Commands::Watch {
            refresh_secs,
            retry_secs,
            no_refresh,
        }) => {
            let user = require_user(user)?;
            run_watch(&cfg, user, refresh_secs, retry_secs, no_refresh).await
        }
        Some(Commands::List {
            project_id,
            kind,
            unread,
        }) => run_list(&cfg, require_user(user)?, project_id, kind, unread).await,
        Some(Commands::Send {
            to,
            project_id,
            kind,
            title,
            message,
            data,
        }) => {
            let user = require_user(user)?;
            run_send(&cfg, user, to, project_id, &kind, title, message, data).await
        }
        Some(Commands::Read { id }) => {
            let client = client_from(&cfg);
            let n = client.mark_as_read(&id).await?;
            println!("Marked read: {} ({})", n.id, n.title);
            Ok(())
        }
        Some(Commands::ReadAll { project_id }) => {
            run_read_all(&cfg, require_user(user)?, project_id).await
        }
        Some(Commands::Delete { id }) => {
            let client = client_from(&cfg);
            client.delete(&id).await?;
            println!("Deleted {id}.");
            Ok(())
        }
        Some(Commands::Retry) => run_retry(&cfg, require_user(user)?).await,
        Some(Commands::Stats { project_id }) => {
            run_stats(&cfg, require_user(user)?, project_id).await
        }
        Some(Commands::Outbox) => run_outbox(&cfg).await,
        None => {
            let user = require_user(user)?;
            run_watch(&cfg, user, None, None, false).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {e:?}");
    }
    result
}

fn require_user(user: Option<String>) -> anyhow::Result<String> {
    user.context("no acting user: set NOTIFYD_USER_ID or pass --user")
}

fn client_from(cfg: &Config) -> NotificationClient {
    NotificationClient::new(cfg.api_base.clone(), cfg.api_token.clone())
}

fn parse_kind(raw: &str) -> anyhow::Result<NotificationKind> {
    let kind = NotificationKind::from_wire(raw);
    if kind == NotificationKind::Unknown {
        anyhow::bail!("unknown notification kind: {raw}");
    }
    Ok(kind)
}

async fn run_watch(
    cfg: &Config,
    user: String,
    refresh_secs: Option<u64>,
    retry_secs: Option<u64>,
    no_refresh: bool,
) -> anyhow::Result<()> {
    let refresh_secs = refresh_secs.unwrap_or(cfg.refresh_secs);
    let retry_secs = retry_secs.unwrap_or(cfg.retry_secs);

    let client = Arc::new(client_from(cfg));
    let store = NotificationStore::new(client.clone(), &user);
    let outbox = Outbox::new(&cfg.outbox_path);
    let emitter = SystemEmitter::new(client.clone(), &user);

    let mut workers = Vec::new();
    if cfg.auto_refresh && !no_refresh {
        workers.push(jobs::refresh::spawn(
            store.clone(),
            NotificationFilter::for_user(&user),
            Duration::from_secs(refresh_secs),
        ));
        tracing::info!(period_secs = refresh_secs, "auto-refresh loop started");
    }
    workers.push(jobs::retry::spawn(
        client.clone(),
        outbox.clone(),
        emitter,
        Duration::from_secs(retry_secs),
        cfg.max_attempts,
    ));
    tracing::info!(
        period_secs = retry_secs,
        outbox = %cfg.outbox_path.display(),
        "retry worker started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    for worker in workers {
        worker.stop().await;
    }
    Ok(())
}

async fn run_list(
    cfg: &Config,
    user: String,
    project_id: Option<String>,
    kind: Option<String>,
    unread: bool,
) -> anyhow::Result<()> {
    let mut filter = NotificationFilter::for_user(user);
    if let Some(project) = project_id {
        filter = filter.in_project(project);
    }
    if let Some(raw) = kind {
        filter = filter.of_kind(parse_kind(&raw)?);
    }
    if unread {
        filter = filter.unread_only();
    }

    let list = client_from(cfg).list(&filter).await?;
    if list.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    println!(
        "{:<26} {:<6} {:<18} {:<32} CREATED",
        "ID", "READ", "KIND", "TITLE"
    );
    for n in &list {
        println!(
            "{:<26} {:<6} {:<18} {:<32} {}",
            n.id,
            if n.read { "yes" } else { "no" },
            n.kind.as_wire(),
            truncate(&n.title, 32),
            n.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_send(
    cfg: &Config,
    user: String,
    to: Option<String>,
    project_id: Option<String>,
    kind: &str,
    title: String,
    message: String,
    data: Option<String>,
) -> anyhow::Result<()> {
    let kind = parse_kind(kind)?;
    let target = to.unwrap_or(user);

    let mut cmd = CreateNotification::new(target, kind, title, message);
    if let Some(project) = project_id {
        cmd = cmd.with_project(project);
    }
    if let Some(raw) = data {
        let value: serde_json::Value =
            serde_json::from_str(&raw).context("invalid --data JSON")?;
        anyhow::ensure!(value.is_object(), "--data must be a JSON object");
        cmd = cmd.with_data(value);
    }

    let client = Arc::new(client_from(cfg));
    let store = NotificationStore::new(client, &cmd.user_id);
    let delivery = DeliveryService::new(store, Outbox::new(&cfg.outbox_path));

    match delivery.send(cmd).await? {
        DeliveryOutcome::Delivered(n) => println!("Delivered: {}", n.id),
        DeliveryOutcome::Queued => {
            println!("Delivery failed; request queued in {}", cfg.outbox_path.display());
        }
    }
    Ok(())
}

async fn run_read_all(
    cfg: &Config,
    user: String,
    project_id: Option<String>,
) -> anyhow::Result<()> {
    let client = Arc::new(client_from(cfg));
    let store = NotificationStore::new(client, &user);
    store.refresh(&NotificationFilter::for_user(&user)).await?;
    let marked = store.mark_all_as_read(project_id.as_deref()).await?;
    println!("Marked {marked} notification(s) read.");
    Ok(())
}

async fn run_retry(cfg: &Config, user: String) -> anyhow::Result<()> {
    let client = Arc::new(client_from(cfg));
    let outbox = Outbox::new(&cfg.outbox_path);
    let emitter = SystemEmitter::new(client.clone(), &user);

    let outcome = jobs::retry::drain_outbox(&client, &outbox, &emitter, cfg.max_attempts).await;
    println!(
        "Retry pass: {} delivered, {} still queued, {} escalated.",
        outcome.delivered.len(),
        outcome.still_failed,
        outcome.escalated
    );
    Ok(())
}

async fn run_stats(cfg: &Config, user: String, project_id: Option<String>) -> anyhow::Result<()> {
    let mut filter = NotificationFilter::for_user(user);
    if let Some(project) = project_id {
        filter = filter.in_project(project);
    }
    let list = client_from(cfg).list(&filter).await?;
    let stats = NotificationStats::compute(&list);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_outbox(cfg: &Config) -> anyhow::Result<()> {
    let entries = Outbox::new(&cfg.outbox_path).load().await?;
    if entries.is_empty() {
        println!("Outbox is empty.");
        return Ok(());
    }
    println!("{:<38} {:<9} {:<20} TITLE", "KEY", "ATTEMPTS", "QUEUED");
    for entry in &entries {
        println!(
            "{:<38} {:<9} {:<20} {}",
            entry.request.idempotency_key,
            entry.attempts,
            entry.queued_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&entry.request.title, 40)
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        s.to_owned()
    }
}
