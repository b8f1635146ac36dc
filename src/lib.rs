//! notifyd — notification delivery relay for the Scrumboard suite.
//!
//! Keeps a user's notification list warm, queues creations the remote
//! notification service could not accept, and redelivers them with a
//! bounded retry ceiling, escalating permanent failures back to the user
//! as system notifications.

pub mod cli;
pub mod client;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod notification;
pub mod outbox;
pub mod store;
