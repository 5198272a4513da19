//! Dashboard aggregation: chart series, detail rows and the Total rollup.
//!
//! RULES:
//!   - Grouping keys stay `NaiveDate` until `DetailTable::display_rows`.
//!   - Derived rates divide summed counters; a zero denominator yields 0.
//!   - The Total row re-derives its rates from column sums, never from
//!     an average of per-group rates.

use crate::{
    loader::ObservationRow,
    types::{Counters, EntityCode, EntityKind, RatioKind},
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub const TOTAL_LABEL: &str = "Total";
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// `numerator / denominator × 100`, or 0 when the denominator is 0.
pub fn percent_rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

/// The two percentage rates derived from raw counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedRates {
    /// small-amount ops / total ops × 100
    pub small_amount_rate:       f64,
    /// (small withdrawals + small deposits) / small-amount ops × 100
    pub withdrawal_deposit_rate: f64,
}

impl DerivedRates {
    pub fn from_counters(c: &Counters) -> Self {
        Self {
            small_amount_rate:       percent_rate(c.small_ops, c.total_ops),
            withdrawal_deposit_rate: percent_rate(c.small_withdrawals + c.small_deposits, c.small_ops),
        }
    }
}

// ── Chart series ─────────────────────────────────────────────────────────────

/// Mean of each ratio on one calendar date. `None` when no row carried a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date:           NaiveDate,
    pub cash_ratio:     Option<f64>,
    pub transfer_ratio: Option<f64>,
}

impl ChartPoint {
    pub fn ratio(&self, kind: RatioKind) -> Option<f64> {
        match kind {
            RatioKind::Cash     => self.cash_ratio,
            RatioKind::Transfer => self.transfer_ratio,
        }
    }
}

#[derive(Default)]
struct MeanAcc {
    sum:   f64,
    count: u32,
}

impl MeanAcc {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Group rows by calendar date and average both ratios, ascending by date.
pub fn chart_series<'a, I>(rows: I) -> Vec<ChartPoint>
where
    I: IntoIterator<Item = &'a ObservationRow>,
{
    let mut by_date: BTreeMap<NaiveDate, (MeanAcc, MeanAcc)> = BTreeMap::new();
    for row in rows {
        let (cash, transfer) = by_date.entry(row.date()).or_default();
        cash.push(row.cash_ratio);
        transfer.push(row.transfer_ratio);
    }

    by_date
        .into_iter()
        .map(|(date, (cash, transfer))| ChartPoint {
            date,
            cash_ratio:     cash.mean(),
            transfer_ratio: transfer.mean(),
        })
        .collect()
}

// ── Detail table ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub date:     NaiveDate,
    /// Set only in views that group by entity.
    pub entity:   Option<EntityCode>,
    pub counters: Counters,
    pub rates:    DerivedRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalRow {
    pub counters: Counters,
    pub rates:    DerivedRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailTable {
    pub kind:  EntityKind,
    pub rows:  Vec<DetailRow>,
    pub total: TotalRow,
}

/// Sum counters per date (or per date and entity for the operator view),
/// derive rates, and append the Total rollup. `None` when there are no rows.
pub fn detail_table<'a, I>(rows: I, kind: EntityKind) -> Option<DetailTable>
where
    I: IntoIterator<Item = &'a ObservationRow>,
{
    let mut groups: BTreeMap<(NaiveDate, Option<EntityCode>), Counters> = BTreeMap::new();
    for row in rows {
        let entity = kind.groups_by_entity().then(|| row.entity.clone());
        groups.entry((row.date(), entity)).or_default().add(&row.counters);
    }
    if groups.is_empty() {
        return None;
    }

    let mut total = Counters::default();
    let rows = groups
        .into_iter()
        .map(|((date, entity), counters)| {
            total.add(&counters);
            DetailRow {
                date,
                entity,
                rates: DerivedRates::from_counters(&counters),
                counters,
            }
        })
        .collect();

    Some(DetailTable {
        kind,
        rows,
        total: TotalRow {
            rates: DerivedRates::from_counters(&total),
            counters: total,
        },
    })
}

/// One presentation row, keyed by the dashboard's column headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "AGI", skip_serializing_if = "Option::is_none")]
    pub agi: Option<String>,
    #[serde(rename = "Nbre_trans")]
    pub total_ops: u64,
    #[serde(rename = "Nbre_trans_moins750k")]
    pub small_ops: u64,
    #[serde(rename = "Taux_trans_petit_montant")]
    pub small_amount_rate: f64,
    #[serde(rename = "Taux_trans_retrait_versement_moins_de_750k")]
    pub withdrawal_deposit_rate: f64,
    #[serde(rename = "Retrait_moins_de_750k")]
    pub small_withdrawals: u64,
    #[serde(rename = "Versement_moins_de_750k")]
    pub small_deposits: u64,
    #[serde(rename = "Virement_moins_de_05_M")]
    pub small_transfers: u64,
}

impl DisplayRow {
    fn new(date: String, agi: Option<String>, counters: &Counters, rates: &DerivedRates) -> Self {
        Self {
            date,
            agi,
            total_ops:               counters.total_ops,
            small_ops:               counters.small_ops,
            small_amount_rate:       rates.small_amount_rate,
            withdrawal_deposit_rate: rates.withdrawal_deposit_rate,
            small_withdrawals:       counters.small_withdrawals,
            small_deposits:          counters.small_deposits,
            small_transfers:         counters.small_transfers,
        }
    }
}

/// Column headers in display order for a view.
pub fn display_columns(kind: EntityKind) -> Vec<&'static str> {
    let mut columns = vec![
        "Date",
        "Nbre_trans",
        "Nbre_trans_moins750k",
        "Taux_trans_petit_montant",
        "Taux_trans_retrait_versement_moins_de_750k",
        "Retrait_moins_de_750k",
        "Versement_moins_de_750k",
        "Virement_moins_de_05_M",
    ];
    if kind.groups_by_entity() {
        columns.insert(1, "AGI");
    }
    columns
}

impl DetailTable {
    /// Group rows with dates formatted `DD/MM/YYYY`, then the Total row.
    pub fn display_rows(&self) -> Vec<DisplayRow> {
        let grouped = self.kind.groups_by_entity();
        let mut out: Vec<DisplayRow> = self
            .rows
            .iter()
            .map(|r| {
                DisplayRow::new(
                    r.date.format(DISPLAY_DATE_FORMAT).to_string(),
                    r.entity.clone(),
                    &r.counters,
                    &r.rates,
                )
            })
            .collect();

        out.push(DisplayRow::new(
            TOTAL_LABEL.to_string(),
            grouped.then(String::new),
            &self.total.counters,
            &self.total.rates,
        ));
        out
    }
}
