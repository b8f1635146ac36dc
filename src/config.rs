#[derive(Debug, Clone)]
pub struct Config {
    /// Notification service root including the API prefix.
    pub api_base: String,
    /// Bearer token attached to every request when set.
    pub api_token: Option<String>,
    /// Acting user. Every list query is scoped to a user, so most commands
    /// need this (overridable with `--user`).
    pub user_id: Option<String>,
    /// Auto-refresh period in seconds. Default: 30.
    pub refresh_secs: u64,
    /// Outbox drain period in seconds. Default: 60.
    pub retry_secs: u64,
    /// Delivery attempts per queued entry before escalation. Default: 3.
    pub max_attempts: u32,
    /// Path of the failed-delivery outbox file.
    pub outbox_path: std::path::PathBuf,
    /// Whether `watch` runs the auto-refresh loop. Default: true.
    pub auto_refresh: bool,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let api_base = std::env::var("NOTIFYD_API_BASE")
        .unwrap_or_else(|_| "http://localhost:8080/api/v1".into());
    url::Url::parse(&api_base)
        .map_err(|e| anyhow::anyhow!("NOTIFYD_API_BASE is not a valid URL: {e}"))?;

    Ok(Config {
        api_base,
        api_token: std::env::var("NOTIFYD_API_TOKEN").ok(),
        user_id: std::env::var("NOTIFYD_USER_ID").ok(),
        refresh_secs: std::env::var("NOTIFYD_REFRESH_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        retry_secs: std::env::var("NOTIFYD_RETRY_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
        max_attempts: std::env::var("NOTIFYD_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3),
        outbox_path: std::env::var("NOTIFYD_OUTBOX_PATH")
            .unwrap_or_else(|_| "failed-notifications.json".into())
            .into(),
        auto_refresh: std::env::var("NOTIFYD_AUTO_REFRESH")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true),
    })
}
