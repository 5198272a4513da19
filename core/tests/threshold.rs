//! Threshold evaluation tests.
//!
//! Tests cover: the inclusive boundary, latest-date selection with
//! time-of-day components, ordering, and empty tables.

use chrono::{NaiveDate, NaiveDateTime};
use opsmon_core::{
    loader::{ObservationRow, ObservationTable},
    threshold::{evaluate_latest, Breach},
    types::{Counters, EntityKind, RatioKind},
};

const THRESHOLD: f64 = 0.20;

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn row(entity: &str, when: &str, cash: Option<f64>, transfer: Option<f64>) -> ObservationRow {
    ObservationRow {
        entity:         entity.to_string(),
        accounted_at:   at(when),
        cash_ratio:     cash,
        transfer_ratio: transfer,
        counters:       Counters::default(),
    }
}

/// Scenario A: a ratio exactly at the threshold is a breach.
#[test]
fn ratio_equal_to_threshold_is_a_breach() {
    let table = ObservationTable::new(
        EntityKind::Agence,
        vec![row("101", "2024-03-01 00:00:00", Some(0.20), Some(0.50))],
    );

    let evaluation = evaluate_latest(&table, THRESHOLD);
    assert_eq!(evaluation.breaches.len(), 1);
    let breach = &evaluation.breaches[0];
    assert_eq!(breach.ratio, RatioKind::Cash);
    assert_eq!(breach.entity, "101");
    assert_eq!(breach.value, 0.20);
}

/// Scenario B: just above the threshold is not a breach.
#[test]
fn ratio_above_threshold_is_clean() {
    let table = ObservationTable::new(
        EntityKind::Agence,
        vec![row("101", "2024-03-01 00:00:00", Some(0.21), Some(0.50))],
    );
    let evaluation = evaluate_latest(&table, THRESHOLD);
    assert!(evaluation.breaches.is_empty(), "0.21 must not breach 0.20");
    assert_eq!(evaluation.rows_checked, 1);
}

/// Only the latest calendar date counts, whatever its time of day.
#[test]
fn latest_date_filter_ignores_time_of_day() {
    let table = ObservationTable::new(
        EntityKind::Agi,
        vec![
            row("OLD", "2024-03-01 23:59:59", Some(0.01), Some(0.01)),
            row("MORNING", "2024-03-02 08:00:00", Some(0.10), Some(0.90)),
            row("EVENING", "2024-03-02 18:30:00", Some(0.90), Some(0.15)),
            row("MIDNIGHT", "2024-03-02 00:00:00", Some(0.90), Some(0.90)),
        ],
    );

    let evaluation = evaluate_latest(&table, THRESHOLD);
    assert_eq!(evaluation.latest_date, NaiveDate::from_ymd_opt(2024, 3, 2));
    assert_eq!(evaluation.rows_checked, 3, "all three rows of 2024-03-02 are checked");

    let flagged: Vec<(&str, RatioKind)> = evaluation
        .breaches
        .iter()
        .map(|b| (b.entity.as_str(), b.ratio))
        .collect();
    assert_eq!(
        flagged,
        vec![("MORNING", RatioKind::Cash), ("EVENING", RatioKind::Transfer)]
    );
}

#[test]
fn breaches_keep_row_order_with_cash_before_transfer() {
    let table = ObservationTable::new(
        EntityKind::Agence,
        vec![
            row("B", "2024-03-02 00:00:00", Some(0.05), Some(0.05)),
            row("A", "2024-03-02 00:00:00", Some(0.50), Some(0.00)),
        ],
    );
    let evaluation = evaluate_latest(&table, THRESHOLD);
    let order: Vec<(&str, RatioKind)> = evaluation
        .breaches
        .iter()
        .map(|b| (b.entity.as_str(), b.ratio))
        .collect();
    assert_eq!(
        order,
        vec![
            ("B", RatioKind::Cash),
            ("B", RatioKind::Transfer),
            ("A", RatioKind::Transfer),
        ]
    );
}

#[test]
fn empty_table_has_no_breaches() {
    let evaluation = evaluate_latest(&ObservationTable::empty(EntityKind::Agence), THRESHOLD);
    assert!(evaluation.breaches.is_empty());
    assert_eq!(evaluation.latest_date, None);
    assert_eq!(evaluation.rows_checked, 0);
}

#[test]
fn missing_ratio_is_never_a_breach() {
    let table = ObservationTable::new(
        EntityKind::Agence,
        vec![row("101", "2024-03-01 00:00:00", None, Some(0.80))],
    );
    assert!(evaluate_latest(&table, THRESHOLD).breaches.is_empty());
}

#[test]
fn breach_fact_names_entity_and_percentage() {
    let breach = Breach {
        entity_kind: EntityKind::Agi,
        entity:      "JDOE".into(),
        ratio:       RatioKind::Transfer,
        value:       0.1234,
    };
    let (title, value) = breach.fact();
    assert_eq!(title, "AGI JDOE");
    assert_eq!(value, "Taux de virement bas à 12.34%");
}
