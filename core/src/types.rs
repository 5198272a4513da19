//! Shared primitive types used across the checker and the dashboard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An entity identifier as it appears in the workbook (branch or operator code).
pub type EntityCode = String;

// ── Column names (after normalization) ───────────────────────────────────────

pub const DATE_COLUMN: &str = "Date comptable Hist";
pub const CASH_RATIO_COLUMN: &str = "taux_caisse";
pub const TRANSFER_RATIO_COLUMN: &str = "taux_vire";
pub const TOTAL_OPS_COLUMN: &str = "nbre_op";
pub const SMALL_OPS_COLUMN: &str = "nbre_op_mois750k";
pub const SMALL_WITHDRAWALS_COLUMN: &str = "retrait_moins de 750k";
pub const SMALL_DEPOSITS_COLUMN: &str = "versement_moins de 750k";
pub const SMALL_TRANSFERS_COLUMN: &str = "virement_moins de 05 M";

/// Which sheet of the workbook a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Branches.
    Agence,
    /// Individual operators.
    Agi,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Agence, EntityKind::Agi];

    pub fn sheet_name(self) -> &'static str {
        match self {
            EntityKind::Agence => "Agence",
            EntityKind::Agi    => "AGI",
        }
    }

    pub fn entity_column(self) -> &'static str {
        match self {
            EntityKind::Agence => "Code Agence Saisie",
            EntityKind::Agi    => "Code Utilisateur",
        }
    }

    pub fn label(self) -> &'static str {
        self.sheet_name()
    }

    /// The operator view keeps one detail row per operator per day;
    /// the branch view collapses all branches into one row per day.
    pub fn groups_by_entity(self) -> bool {
        matches!(self, EntityKind::Agi)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two monitored ratio columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    Cash,
    Transfer,
}

impl RatioKind {
    pub const ALL: [RatioKind; 2] = [RatioKind::Cash, RatioKind::Transfer];

    pub fn column(self) -> &'static str {
        match self {
            RatioKind::Cash     => CASH_RATIO_COLUMN,
            RatioKind::Transfer => TRANSFER_RATIO_COLUMN,
        }
    }

    /// Human description used in alert facts.
    pub fn low_description(self) -> &'static str {
        match self {
            RatioKind::Cash     => "Taux de caisse bas",
            RatioKind::Transfer => "Taux de virement bas",
        }
    }

    /// Series name used on the dashboard chart.
    pub fn series_name(self) -> &'static str {
        match self {
            RatioKind::Cash     => "Taux Caisse",
            RatioKind::Transfer => "Taux Virement",
        }
    }
}

/// Raw transaction counters carried by every observation row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total_ops:         u64,
    pub small_ops:         u64,
    pub small_withdrawals: u64,
    pub small_deposits:    u64,
    pub small_transfers:   u64,
}

impl Counters {
    pub fn add(&mut self, other: &Counters) {
        self.total_ops         += other.total_ops;
        self.small_ops         += other.small_ops;
        self.small_withdrawals += other.small_withdrawals;
        self.small_deposits    += other.small_deposits;
        self.small_transfers   += other.small_transfers;
    }
}

/// Format a fraction as a percentage with two decimals, e.g. `0.1834` → `18.34%`.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
