use clap::{Parser, Subcommand};

/// notifyd — notification delivery relay for the Scrumboard suite
#[derive(Parser)]
#[command(name = "notifyd", version, about)]
pub struct Cli {
    /// Acting user id (overrides NOTIFYD_USER_ID)
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay daemon: auto-refresh plus periodic outbox drains
    Watch {
        /// Auto-refresh period in seconds
        #[arg(long)]
        refresh_secs: Option<u64>,
        /// Outbox drain period in seconds
        #[arg(long)]
        retry_secs: Option<u64>,
        /// Disable the auto-refresh loop (outbox drains still run)
        #[arg(long)]
        no_refresh: bool,
    },

    /// Fetch and print the notification list
    List {
        #[arg(long)]
        project_id: Option<String>,
        /// Filter by kind, e.g. task_assigned, system_error
        #[arg(long)]
        kind: Option<String>,
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Create a notification (queued for retry if delivery fails)
    Send {
        /// Target user; defaults to the acting user
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long, default_value = "project_updated")]
        kind: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        message: String,
        /// Structured payload as inline JSON, e.g. '{"taskId":"T-9"}'
        #[arg(long)]
        data: Option<String>,
    },

    /// Mark one notification as read
    Read { id: String },

    /// Mark every unread notification as read
    ReadAll {
        /// Limit to one project
        #[arg(long)]
        project_id: Option<String>,
    },

    /// Delete a notification
    Delete { id: String },

    /// Drain the failed-delivery outbox once
    Retry,

    /// Fetch the list and print derived statistics
    Stats {
        #[arg(long)]
        project_id: Option<String>,
    },

    /// Show queued failed deliveries
    Outbox,
}
