//! Notifier — sends one summary per run, out of band.
//!
//! Delivery is best-effort: a missing transport is a silent no-op and a failed
//! delivery is logged, never returned to the pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::pipeline::{Outcome, RunReport};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Used when no transport is configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _subject: &str, _body: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    text: &'a str,
}

/// Posts `{"subject", "text"}` as JSON to a webhook (Slack-compatible `text`).
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(15)).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload {
                subject,
                text: body,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {status}: {body}");
        }
        Ok(())
    }
}

/// Picks the transport from configuration. Never fails: a webhook client that
/// cannot be built degrades to the disabled notifier.
pub fn notifier_from_config(webhook_url: Option<&str>) -> Arc<dyn Notifier> {
    match webhook_url {
        Some(url) => match WebhookNotifier::new(url) {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                warn!("Webhook notifier unavailable ({e}); notifications disabled");
                Arc::new(DisabledNotifier)
            }
        },
        None => {
            debug!("No notification transport configured");
            Arc::new(DisabledNotifier)
        }
    }
}

/// Subject and body for a run, or `None` when nothing new was seen.
pub fn summarize(report: &RunReport) -> Option<(String, String)> {
    if report.new_postings.is_empty() {
        return None;
    }

    let subject = format!(
        "jobscout: {} new posting(s), {} application(s) generated",
        report.new_postings.len(),
        report.generated
    );

    let mut body = String::new();
    for entry in &report.new_postings {
        let score = entry
            .score
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "  -  ".to_string());
        let title = if entry.title.is_empty() {
            "(untitled)"
        } else {
            entry.title.as_str()
        };
        body.push_str(&format!("[{score}] {:<18} {title}", entry.outcome.label()));
        if entry.link.is_empty() {
            body.push_str(&format!(" (id {})", entry.id));
        } else {
            body.push_str(&format!(" <{}>", entry.link));
        }
        if let Outcome::Generated(path) = &entry.outcome {
            body.push_str(&format!("\n          -> {}", path.display()));
        }
        body.push('\n');
    }

    Some((subject, body))
}

/// Sends the run summary if there is one. Failures are logged only.
pub async fn notify_run(notifier: &dyn Notifier, report: &RunReport) {
    let Some((subject, body)) = summarize(report) else {
        info!("No new postings this run; skipping notification");
        return;
    };
    match notifier.send(&subject, &body).await {
        Ok(()) => debug!("Notification sent: {subject}"),
        Err(e) => warn!("Notification failed (run result unaffected): {e:#}"),
    }
}

/// Notifier that keeps every message, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        if self.fail {
            anyhow::bail!("webhook down");
        }
        Ok(())
    }
}
