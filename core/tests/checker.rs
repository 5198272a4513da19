//! Threshold checker tests.
//!
//! Tests cover: the clean path, card contents and payload shape, and every
//! degraded path (no sink, failing sink, unloadable data).

use chrono::NaiveDateTime;
use opsmon_core::{
    checker::{CheckOutcome, Checker},
    config::MonitorConfig,
    error::NotificationError,
    loader::{ObservationRow, ObservationTable},
    notification::{AlertCard, NotificationSink, WebhookSink},
    provider::FixtureProvider,
    types::{Counters, EntityKind},
};
use std::cell::RefCell;

const THRESHOLD: f64 = 0.20;
const DASHBOARD: &str = "https://dashboard.example/";

#[derive(Default)]
struct RecordingSink {
    cards: RefCell<Vec<AlertCard>>,
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, card: &AlertCard) -> Result<(), NotificationError> {
        self.cards.borrow_mut().push(card.clone());
        Ok(())
    }
}

struct RejectingSink;

impl NotificationSink for RejectingSink {
    fn deliver(&self, _card: &AlertCard) -> Result<(), NotificationError> {
        Err(NotificationError::Rejected { status: 500 })
    }
}

fn row(entity: &str, when: &str, cash: f64, transfer: f64) -> ObservationRow {
    ObservationRow {
        entity:         entity.to_string(),
        accounted_at:   NaiveDateTime::parse_from_str(when, "%Y-%m-%d %H:%M:%S").unwrap(),
        cash_ratio:     Some(cash),
        transfer_ratio: Some(transfer),
        counters:       Counters::default(),
    }
}

fn provider_with_breaches() -> FixtureProvider {
    FixtureProvider::new()
        .with_table(ObservationTable::new(
            EntityKind::Agence,
            vec![
                row("101", "2024-03-01 00:00:00", 0.05, 0.05),
                row("101", "2024-03-02 08:30:00", 0.20, 0.35),
                row("102", "2024-03-02 00:00:00", 0.40, 0.10),
            ],
        ))
        .with_table(ObservationTable::new(
            EntityKind::Agi,
            vec![
                row("JDOE", "2024-03-02 00:00:00", 0.90, 0.90),
                row("MSMITH", "2024-03-02 00:00:00", 0.15, 0.60),
            ],
        ))
}

fn clean_provider() -> FixtureProvider {
    FixtureProvider::new()
        .with_table(ObservationTable::new(
            EntityKind::Agence,
            vec![row("101", "2024-03-02 00:00:00", 0.50, 0.50)],
        ))
        .with_table(ObservationTable::new(
            EntityKind::Agi,
            vec![row("JDOE", "2024-03-02 00:00:00", 0.21, 0.99)],
        ))
}

#[test]
fn clean_data_sends_nothing() {
    let provider = clean_provider();
    let sink = RecordingSink::default();
    let report = Checker::new(&provider, Some(&sink), THRESHOLD, DASHBOARD).run();

    assert_eq!(report.outcome, CheckOutcome::Clean);
    assert_eq!(report.breach_count(), 0);
    assert!(report.card.is_none());
    assert!(sink.cards.borrow().is_empty());
}

#[test]
fn breaches_produce_one_card_with_one_fact_each() {
    let provider = provider_with_breaches();
    let sink = RecordingSink::default();
    let report = Checker::new(&provider, Some(&sink), THRESHOLD, DASHBOARD).run();

    assert_eq!(report.outcome, CheckOutcome::Alerted);
    assert_eq!(report.breach_count(), 3);

    let cards = sink.cards.borrow();
    assert_eq!(cards.len(), 1, "exactly one card per run");
    let card = &cards[0];
    assert_eq!(card.subject, "Alerte de Performance - 02/03/2024");
    assert_eq!(card.action_url, DASHBOARD);

    let facts: Vec<(&str, &str)> = card
        .facts
        .iter()
        .map(|f| (f.title.as_str(), f.value.as_str()))
        .collect();
    assert_eq!(
        facts,
        vec![
            ("Agence 101", "Taux de caisse bas à 20.00%"),
            ("Agence 102", "Taux de virement bas à 10.00%"),
            ("AGI MSMITH", "Taux de caisse bas à 15.00%"),
        ]
    );
}

#[test]
fn payload_is_an_adaptive_card_message() {
    let provider = provider_with_breaches();
    let sink = RecordingSink::default();
    Checker::new(&provider, Some(&sink), THRESHOLD, DASHBOARD).run();

    let payload = sink.cards.borrow()[0].to_payload();
    assert_eq!(payload["type"], "message");

    let attachment = &payload["attachments"][0];
    assert_eq!(attachment["contentType"], "application/vnd.microsoft.card.adaptive");

    let content = &attachment["content"];
    assert_eq!(content["type"], "AdaptiveCard");
    assert_eq!(content["version"], "1.2");
    assert_eq!(content["body"][0]["text"], "Alerte de Performance - 02/03/2024");
    assert_eq!(content["body"][2]["type"], "FactSet");
    assert_eq!(content["body"][2]["facts"].as_array().unwrap().len(), 3);
    assert_eq!(content["body"][2]["facts"][0]["title"], "Agence 101");
    assert_eq!(content["actions"][0]["type"], "Action.OpenUrl");
    assert_eq!(content["actions"][0]["url"], DASHBOARD);
}

#[test]
fn missing_sink_disables_sending_without_failing() {
    let provider = provider_with_breaches();
    let report = Checker::new(&provider, None, THRESHOLD, DASHBOARD).run();

    assert_eq!(report.outcome, CheckOutcome::NotificationDisabled);
    assert!(report.card.is_some(), "the card is still built for the report");
}

#[test]
fn rejected_notification_is_reported_not_raised() {
    let provider = provider_with_breaches();
    let report = Checker::new(&provider, Some(&RejectingSink), THRESHOLD, DASHBOARD).run();

    match report.outcome {
        CheckOutcome::NotificationFailed { error } => assert!(error.contains("500"), "{error}"),
        other => panic!("expected NotificationFailed, got {other:?}"),
    }
}

#[test]
fn unloadable_sheet_aborts_before_sending() {
    // No AGI sheet at all.
    let provider = FixtureProvider::new().with_table(ObservationTable::new(
        EntityKind::Agence,
        vec![row("101", "2024-03-02 00:00:00", 0.01, 0.01)],
    ));
    let sink = RecordingSink::default();
    let report = Checker::new(&provider, Some(&sink), THRESHOLD, DASHBOARD).run();

    assert!(matches!(report.outcome, CheckOutcome::LoadFailed { .. }));
    assert!(sink.cards.borrow().is_empty(), "nothing is sent when a sheet fails to load");
}

#[test]
fn report_date_falls_back_to_operator_sheet() {
    let provider = FixtureProvider::new()
        .with_table(ObservationTable::empty(EntityKind::Agence))
        .with_table(ObservationTable::new(
            EntityKind::Agi,
            vec![row("JDOE", "2024-04-15 10:00:00", 0.10, 0.90)],
        ));
    let sink = RecordingSink::default();
    let report = Checker::new(&provider, Some(&sink), THRESHOLD, DASHBOARD).run();

    assert_eq!(report.outcome, CheckOutcome::Alerted);
    assert_eq!(sink.cards.borrow()[0].subject, "Alerte de Performance - 15/04/2024");
}

#[test]
fn webhook_sink_needs_a_configured_url() {
    let config = MonitorConfig::default_test();
    assert!(matches!(
        WebhookSink::from_config(&config),
        Err(NotificationError::MissingWebhook)
    ));
}
