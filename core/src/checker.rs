//! The batch threshold check: load, evaluate, notify.
//!
//! RULE: `Checker::run` never fails. Every error path is logged and
//! reported through `CheckOutcome`; alerting is advisory.

use crate::{
    error::MonitorResult,
    notification::{AlertCard, NotificationSink},
    provider::DataProvider,
    threshold::{evaluate_latest, Breach, Evaluation},
    types::EntityKind,
};
use chrono::{Local, NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Every ratio is above the threshold.
    Clean,
    /// Breaches found and the card was accepted by the sink.
    Alerted,
    /// Breaches found but no sink is configured.
    NotificationDisabled,
    NotificationFailed { error: String },
    LoadFailed { error: String },
}

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub started_at:  NaiveDateTime,
    pub report_date: Option<NaiveDate>,
    pub evaluations: Vec<(EntityKind, Evaluation)>,
    pub card:        Option<AlertCard>,
    pub outcome:     CheckOutcome,
}

impl CheckReport {
    pub fn breaches(&self) -> impl Iterator<Item = &Breach> {
        self.evaluations.iter().flat_map(|(_, e)| e.breaches.iter())
    }

    pub fn breach_count(&self) -> usize {
        self.breaches().count()
    }
}

pub struct Checker<'a> {
    provider:      &'a dyn DataProvider,
    sink:          Option<&'a dyn NotificationSink>,
    threshold:     f64,
    dashboard_url: String,
}

impl<'a> Checker<'a> {
    pub fn new(
        provider: &'a dyn DataProvider,
        sink: Option<&'a dyn NotificationSink>,
        threshold: f64,
        dashboard_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            sink,
            threshold,
            dashboard_url: dashboard_url.into(),
        }
    }

    /// Run one check to completion.
    pub fn run(&self) -> CheckReport {
        let started_at = Local::now().naive_local();
        log::info!("[{started_at}] starting threshold check (threshold {:.2})", self.threshold);

        let evaluations = match self.evaluate_all() {
            Ok(e) => e,
            Err(e) => {
                log::error!("threshold check aborted: {e}");
                return CheckReport {
                    started_at,
                    report_date: None,
                    evaluations: Vec::new(),
                    card: None,
                    outcome: CheckOutcome::LoadFailed { error: e.to_string() },
                };
            }
        };

        let report_date = report_date(&evaluations);
        let breaches: Vec<Breach> = evaluations
            .iter()
            .flat_map(|(_, e)| e.breaches.iter().cloned())
            .collect();

        let (card, outcome) = match (breaches.is_empty(), report_date) {
            (true, _) | (false, None) => {
                log::info!("no alerts to report; every threshold is respected");
                (None, CheckOutcome::Clean)
            }
            (false, Some(date)) => {
                log::warn!("{} alert(s) found for {}", breaches.len(), date);
                let card = AlertCard::for_breaches(date, &breaches, &self.dashboard_url);
                let outcome = self.notify(&card);
                (Some(card), outcome)
            }
        };

        CheckReport { started_at, report_date, evaluations, card, outcome }
    }

    fn evaluate_all(&self) -> MonitorResult<Vec<(EntityKind, Evaluation)>> {
        // Load every sheet before evaluating so a broken workbook sends nothing.
        let tables = EntityKind::ALL
            .iter()
            .map(|&kind| self.provider.table(kind))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tables
            .iter()
            .map(|t| {
                let evaluation = evaluate_latest(t, self.threshold);
                log::info!(
                    "{}: {} row(s) on {:?}, {} breach(es)",
                    t.kind,
                    evaluation.rows_checked,
                    evaluation.latest_date,
                    evaluation.breaches.len()
                );
                (t.kind, evaluation)
            })
            .collect())
    }

    fn notify(&self, card: &AlertCard) -> CheckOutcome {
        let Some(sink) = self.sink else {
            log::error!("no webhook configured; {} alert(s) not sent", card.facts.len());
            return CheckOutcome::NotificationDisabled;
        };
        match sink.deliver(card) {
            Ok(()) => CheckOutcome::Alerted,
            Err(e) => {
                log::error!("failed to send notification: {e}");
                CheckOutcome::NotificationFailed { error: e.to_string() }
            }
        }
    }
}

/// The branch sheet's latest date dates the report; the operator sheet is the fallback.
fn report_date(evaluations: &[(EntityKind, Evaluation)]) -> Option<NaiveDate> {
    let date_of = |kind: EntityKind| {
        evaluations
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, e)| e.latest_date)
    };
    date_of(EntityKind::Agence).or_else(|| date_of(EntityKind::Agi))
}
