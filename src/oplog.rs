use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Which half of the system emitted an event. This service only ever emits
/// `Backend`; the vocabulary matches the remote log endpoint's contract.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStack {
    Backend,
    Frontend,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Source package vocabulary accepted by the operator log endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogPackage {
    Cache,
    Controller,
    CronJob,
    Db,
    Domain,
    Handler,
    Repository,
    Route,
    Service,
    Config,
    Middleware,
    Utils,
}

#[derive(Debug, Serialize)]
struct LogEntry {
    stack: LogStack,
    level: LogLevel,
    package: LogPackage,
    message: String,
    meta: serde_json::Value,
    timestamp: DateTime<Utc>,
}

/// Remote endpoint settings. When absent, entries stay in the local log.
#[derive(Debug, Clone)]
pub struct OpLogTarget {
    pub endpoint: String,
    pub bearer_token: String,
}

/// Operator-facing log sink.
///
/// `emit` never blocks and never fails: entries go onto an unbounded channel
/// and a background worker ships them to the remote endpoint. A failed ship
/// falls back to the local tracing log, so losing the endpoint never loses
/// the event or backpressures a request.
#[derive(Debug, Clone)]
pub struct OperatorLog {
    tx: mpsc::UnboundedSender<LogEntry>,
}

impl OperatorLog {
    /// Spawn the shipping worker and return the shared handle.
    pub fn start(target: Option<OpLogTarget>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(ship_entries(rx, target));
        Self { tx }
    }

    /// Sink that drops every entry. Keeps tests quiet without a runtime
    /// worker.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn emit(
        &self,
        stack: LogStack,
        level: LogLevel,
        package: LogPackage,
        message: impl Into<String>,
        meta: serde_json::Value,
    ) {
        let entry = LogEntry {
            stack,
            level,
            package,
            message: message.into(),
            meta,
            timestamp: Utc::now(),
        };
        // A closed channel means the worker is gone (shutdown); dropping the
        // entry is the contract, not an error.
        let _ = self.tx.send(entry);
    }
}

async fn ship_entries(mut rx: mpsc::UnboundedReceiver<LogEntry>, target: Option<OpLogTarget>) {
    let client = match &target {
        Some(_) => reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .ok(),
        None => None,
    };

    while let Some(entry) = rx.recv().await {
        match (&target, &client) {
            (Some(target), Some(client)) => {
                let result = client
                    .post(&target.endpoint)
                    .bearer_auth(&target.bearer_token)
                    .json(&entry)
                    .send()
                    .await;

                match result {
                    Ok(resp) if resp.status().is_success() => {}
                    Ok(resp) => buffer_locally(&entry, format!("status {}", resp.status())),
                    Err(e) => buffer_locally(&entry, e.to_string()),
                }
            }
            _ => {
                // No remote target configured: the local log is the sink.
                tracing::debug!(
                    entry = %serde_json::to_string(&entry).unwrap_or_default(),
                    "operator log entry"
                );
            }
        }
    }
}

fn buffer_locally(entry: &LogEntry, reason: String) {
    tracing::warn!(
        reason = %reason,
        entry = %serde_json::to_string(entry).unwrap_or_default(),
        "operator log ship failed, entry kept in local log"
    );
}
