//! Chat notification cards and the webhook sink that delivers them.
//!
//! Delivery is best-effort: callers log a `NotificationError` and move on.

use crate::{config::MonitorConfig, error::NotificationError, threshold::Breach};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const CARD_SUMMARY: &str =
    "Le système de surveillance a détecté que des seuils de performance ont été atteints.";
pub const CARD_ACTION_TITLE: &str = "Ouvrir le Tableau de Bord";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub title: String,
    pub value: String,
}

/// A titled card: subject, summary line, facts and one deep link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCard {
    pub subject:      String,
    pub summary:      String,
    pub facts:        Vec<Fact>,
    pub action_title: String,
    pub action_url:   String,
}

impl AlertCard {
    /// One fact per breach, in breach order.
    pub fn for_breaches(report_date: NaiveDate, breaches: &[Breach], dashboard_url: &str) -> Self {
        let facts = breaches
            .iter()
            .map(|b| {
                let (title, value) = b.fact();
                Fact { title, value }
            })
            .collect();

        Self {
            subject:      subject_for(report_date),
            summary:      CARD_SUMMARY.to_string(),
            facts,
            action_title: CARD_ACTION_TITLE.to_string(),
            action_url:   dashboard_url.to_string(),
        }
    }

    /// Teams incoming-webhook message carrying an adaptive card.
    pub fn to_payload(&self) -> Value {
        let facts: Vec<Value> = self
            .facts
            .iter()
            .map(|f| json!({ "title": f.title, "value": f.value }))
            .collect();

        json!({
            "type": "message",
            "attachments": [{
                "contentType": "application/vnd.microsoft.card.adaptive",
                "content": {
                    "type": "AdaptiveCard",
                    "version": "1.2",
                    "msteams": { "width": "Full" },
                    "body": [
                        {
                            "type": "TextBlock",
                            "text": self.subject,
                            "size": "Large",
                            "weight": "Bolder",
                            "wrap": true
                        },
                        {
                            "type": "TextBlock",
                            "text": self.summary,
                            "wrap": true
                        },
                        {
                            "type": "FactSet",
                            "facts": facts
                        }
                    ],
                    "actions": [{
                        "type": "Action.OpenUrl",
                        "title": self.action_title,
                        "url": self.action_url
                    }]
                }
            }]
        })
    }
}

pub fn subject_for(report_date: NaiveDate) -> String {
    format!("Alerte de Performance - {}", report_date.format("%d/%m/%Y"))
}

/// Anything that can carry an alert card somewhere.
pub trait NotificationSink {
    fn deliver(&self, card: &AlertCard) -> Result<(), NotificationError>;
}

/// Posts cards to a chat incoming-webhook URL.
pub struct WebhookSink {
    url:    String,
    client: reqwest::blocking::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { url: url.into(), client })
    }

    /// Fails with `MissingWebhook` when no URL is configured.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, NotificationError> {
        let url = config
            .webhook_url
            .as_deref()
            .ok_or(NotificationError::MissingWebhook)?;
        Self::new(url, Duration::from_secs(config.webhook_timeout_secs))
    }
}

impl NotificationSink for WebhookSink {
    fn deliver(&self, card: &AlertCard) -> Result<(), NotificationError> {
        log::info!("sending notification ({} facts) to webhook", card.facts.len());
        let response = self.client.post(&self.url).json(&card.to_payload()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected { status: status.as_u16() });
        }
        log::info!("notification accepted with status {}", status.as_u16());
        Ok(())
    }
}
