//! Threshold evaluation over the latest accounting date of a sheet.
//!
//! A breach is a row whose ratio is AT OR BELOW the threshold.
//! Only rows sharing the sheet's maximum calendar date are considered.

use crate::{
    loader::ObservationTable,
    types::{format_percent, EntityCode, EntityKind, RatioKind},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One ratio of one row that fell to or below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    pub entity_kind: EntityKind,
    pub entity:      EntityCode,
    pub ratio:       RatioKind,
    pub value:       f64,
}

impl Breach {
    /// `(title, value)` pair for an alert card, e.g.
    /// `("Agence 101", "Taux de caisse bas à 18.00%")`.
    pub fn fact(&self) -> (String, String) {
        (
            format!("{} {}", self.entity_kind.label(), self.entity),
            format!("{} à {}", self.ratio.low_description(), format_percent(self.value)),
        )
    }
}

/// Result of evaluating one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// `None` when the sheet has no rows.
    pub latest_date: Option<NaiveDate>,
    pub rows_checked: usize,
    pub breaches: Vec<Breach>,
}

pub fn is_breach(value: f64, threshold: f64) -> bool {
    value <= threshold
}

/// Evaluate both ratios of every row on the sheet's latest date.
///
/// Breaches keep workbook row order; within a row the cash ratio comes first.
pub fn evaluate_latest(table: &ObservationTable, threshold: f64) -> Evaluation {
    let Some(latest) = table.latest_date() else {
        return Evaluation::default();
    };

    let mut evaluation = Evaluation {
        latest_date: Some(latest),
        ..Evaluation::default()
    };

    for row in table.rows_on(latest) {
        evaluation.rows_checked += 1;
        for ratio in RatioKind::ALL {
            let Some(value) = row.ratio(ratio) else { continue };
            if is_breach(value, threshold) {
                log::debug!(
                    "{} {} {:?} ratio {:.4} <= {:.4}",
                    table.kind, row.entity, ratio, value, threshold
                );
                evaluation.breaches.push(Breach {
                    entity_kind: table.kind,
                    entity:      row.entity.clone(),
                    ratio,
                    value,
                });
            }
        }
    }

    evaluation
}
