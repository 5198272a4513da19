//! Dashboard aggregation tests.
//!
//! Tests cover: derived rates with zero denominators, the Total row built
//! from column sums, per-date chart means, and operator-view grouping.

use chrono::{NaiveDate, NaiveDateTime};
use opsmon_core::{
    aggregate::{
        chart_series, detail_table, display_columns, percent_rate, DerivedRates, TOTAL_LABEL,
    },
    loader::ObservationRow,
    types::{Counters, EntityKind},
};

fn counters(total: u64, small: u64, withdrawals: u64, deposits: u64, transfers: u64) -> Counters {
    Counters {
        total_ops:         total,
        small_ops:         small,
        small_withdrawals: withdrawals,
        small_deposits:    deposits,
        small_transfers:   transfers,
    }
}

fn row(entity: &str, when: &str, cash: Option<f64>, transfer: Option<f64>, c: Counters) -> ObservationRow {
    ObservationRow {
        entity:         entity.to_string(),
        accounted_at:   NaiveDateTime::parse_from_str(when, "%Y-%m-%d %H:%M:%S").unwrap(),
        cash_ratio:     cash,
        transfer_ratio: transfer,
        counters:       c,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn zero_denominator_rates_are_zero() {
    assert_eq!(percent_rate(5, 0), 0.0);
    assert_eq!(percent_rate(0, 0), 0.0);
    let rates = DerivedRates::from_counters(&Counters::default());
    assert_eq!(rates.small_amount_rate, 0.0);
    assert_eq!(rates.withdrawal_deposit_rate, 0.0);
}

#[test]
fn derived_rates_use_counter_ratios() {
    let rates = DerivedRates::from_counters(&counters(200, 50, 10, 15, 5));
    assert!(close(rates.small_amount_rate, 25.0));
    assert!(close(rates.withdrawal_deposit_rate, 50.0));
}

/// Group A: 5 of 10 small (50%). Group B: 2 of 2 (100%). The total is
/// 7 of 12 (58.33%), not the 75% mean of the two rates.
#[test]
fn total_row_rederives_rates_from_sums() {
    let rows = vec![
        row("101", "2024-03-01 00:00:00", Some(0.5), Some(0.5), counters(10, 5, 1, 1, 0)),
        row("101", "2024-03-02 00:00:00", Some(0.5), Some(0.5), counters(2, 2, 1, 1, 0)),
    ];
    let table = detail_table(&rows, EntityKind::Agence).unwrap();

    assert_eq!(table.rows.len(), 2);
    assert!(close(table.rows[0].rates.small_amount_rate, 50.0));
    assert!(close(table.rows[1].rates.small_amount_rate, 100.0));

    assert_eq!(table.total.counters.total_ops, 12);
    assert_eq!(table.total.counters.small_ops, 7);
    assert!(close(table.total.rates.small_amount_rate, 7.0 / 12.0 * 100.0));
    assert!(!close(table.total.rates.small_amount_rate, 75.0));
}

#[test]
fn branch_view_sums_every_entity_on_a_date() {
    let rows = vec![
        row("101", "2024-03-01 08:00:00", None, None, counters(10, 4, 1, 1, 1)),
        row("102", "2024-03-01 17:00:00", None, None, counters(30, 6, 2, 2, 1)),
    ];
    let table = detail_table(&rows, EntityKind::Agence).unwrap();

    assert_eq!(table.rows.len(), 1);
    let only = &table.rows[0];
    assert_eq!(only.date, date(2024, 3, 1));
    assert_eq!(only.entity, None);
    assert_eq!(only.counters, counters(40, 10, 3, 3, 2));
}

#[test]
fn operator_view_groups_by_date_and_entity() {
    let rows = vec![
        row("MSMITH", "2024-03-01 00:00:00", None, None, counters(4, 2, 1, 0, 0)),
        row("JDOE", "2024-03-01 00:00:00", None, None, counters(6, 3, 1, 1, 0)),
        row("JDOE", "2024-03-01 12:00:00", None, None, counters(4, 1, 0, 1, 0)),
    ];
    let table = detail_table(&rows, EntityKind::Agi).unwrap();

    let keys: Vec<(NaiveDate, Option<&str>)> = table
        .rows
        .iter()
        .map(|r| (r.date, r.entity.as_deref()))
        .collect();
    assert_eq!(
        keys,
        vec![(date(2024, 3, 1), Some("JDOE")), (date(2024, 3, 1), Some("MSMITH"))]
    );
    assert_eq!(table.rows[0].counters.total_ops, 10);
    assert_eq!(table.total.counters.total_ops, 14);
}

#[test]
fn no_rows_means_no_table() {
    let rows: Vec<ObservationRow> = Vec::new();
    assert!(detail_table(&rows, EntityKind::Agence).is_none());
    assert!(chart_series(&rows).is_empty());
}

/// Scenario D: with every entity selected, the chart shows the per-date mean.
#[test]
fn chart_averages_ratios_per_date() {
    let rows = vec![
        row("101", "2024-03-01 00:00:00", Some(0.10), Some(0.40), Counters::default()),
        row("102", "2024-03-01 09:00:00", Some(0.30), None, Counters::default()),
        row("101", "2024-03-02 00:00:00", None, None, Counters::default()),
    ];
    let series = chart_series(&rows);

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].date, date(2024, 3, 1));
    assert!(close(series[0].cash_ratio.unwrap(), 0.20));
    assert_eq!(series[0].transfer_ratio, Some(0.40), "missing values are left out of the mean");
    assert_eq!(series[1].date, date(2024, 3, 2));
    assert_eq!(series[1].cash_ratio, None);
}

#[test]
fn display_rows_format_dates_and_append_total() {
    let rows = vec![
        row("JDOE", "2024-03-05 00:00:00", None, None, counters(8, 4, 1, 1, 2)),
        row("JDOE", "2024-03-06 00:00:00", None, None, counters(2, 0, 0, 0, 0)),
    ];
    let display = detail_table(&rows, EntityKind::Agi).unwrap().display_rows();

    assert_eq!(display.len(), 3);
    assert_eq!(display[0].date, "05/03/2024");
    assert_eq!(display[0].agi.as_deref(), Some("JDOE"));
    assert!(close(display[0].small_amount_rate, 50.0));
    assert!(close(display[0].withdrawal_deposit_rate, 50.0));
    assert_eq!(display[1].withdrawal_deposit_rate, 0.0);

    let total = &display[2];
    assert_eq!(total.date, TOTAL_LABEL);
    assert_eq!(total.agi.as_deref(), Some(""));
    assert_eq!(total.total_ops, 10);
    assert_eq!(total.small_transfers, 2);
}

#[test]
fn branch_display_omits_operator_column() {
    let rows = vec![row("101", "2024-03-05 00:00:00", None, None, counters(1, 1, 1, 0, 0))];
    let display = detail_table(&rows, EntityKind::Agence).unwrap().display_rows();
    assert!(display.iter().all(|r| r.agi.is_none()));

    let json = serde_json::to_value(&display[0]).unwrap();
    assert!(json.get("AGI").is_none());
    assert_eq!(json["Nbre_trans"], 1);

    assert!(!display_columns(EntityKind::Agence).contains(&"AGI"));
    assert_eq!(display_columns(EntityKind::Agi)[1], "AGI");
}
