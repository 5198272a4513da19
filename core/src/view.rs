//! Dashboard view assembly: entity filter, date range, chart and table panels.

use crate::{
    aggregate::{chart_series, detail_table, display_columns, ChartPoint, DetailTable, DisplayRow},
    error::{AccessDenied, MonitorResult},
    loader::ObservationRow,
    provider::DataProvider,
    session::SessionContext,
    types::EntityKind,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Entity selector value meaning "every entity".
pub const ALL_SENTINEL: &str = "Tout";

pub const OVERVIEW_TITLE: &str = "Vue d'Ensemble Globale";
pub const INVERTED_RANGE_WARNING: &str = "Date de début > Date de fin.";
pub const NO_CHART_DATA: &str = "Aucune donnée à afficher pour le graphique.";
pub const NO_TABLE_DATA: &str = "Aucune donnée à afficher pour la sélection actuelle.";

// ── Entity filter ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityFilter {
    All,
    Code(String),
}

impl EntityFilter {
    /// Blank, `"Tout"` and `"All"` (any case) select every entity.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => EntityFilter::All,
            Some(s) if s.eq_ignore_ascii_case(ALL_SENTINEL) || s.eq_ignore_ascii_case("all") => {
                EntityFilter::All
            }
            Some(s) => EntityFilter::Code(s.to_string()),
        }
    }

    /// Codes compare case-insensitively.
    pub fn matches(&self, entity: &str) -> bool {
        match self {
            EntityFilter::All        => true,
            EntityFilter::Code(code) => entity.trim().to_uppercase() == code.to_uppercase(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            EntityFilter::All        => ALL_SENTINEL,
            EntityFilter::Code(code) => code,
        }
    }

    pub fn chart_title(&self) -> String {
        match self {
            EntityFilter::All        => OVERVIEW_TITLE.to_string(),
            EntityFilter::Code(code) => format!("Performance de : {code}"),
        }
    }
}

// ── Date range ───────────────────────────────────────────────────────────────

/// An inclusive calendar-date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end:   NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRange {
    pub range:   DateRange,
    pub warning: Option<String>,
}

impl DateRange {
    /// `None` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Resolve the user's request against the dates the data covers.
    /// Missing ends default to the available bounds; an inverted request
    /// falls back to the full available range with a warning.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        available: (NaiveDate, NaiveDate),
    ) -> ResolvedRange {
        let full = DateRange { start: available.0, end: available.1 };
        let start = start.unwrap_or(full.start);
        let end = end.unwrap_or(full.end);

        match DateRange::new(start, end) {
            Some(range) => ResolvedRange { range, warning: None },
            None => {
                log::warn!("inverted date range {start}..{end}; using {}..{}", full.start, full.end);
                ResolvedRange {
                    range:   full,
                    warning: Some(INVERTED_RANGE_WARNING.to_string()),
                }
            }
        }
    }
}

// ── View ─────────────────────────────────────────────────────────────────────

/// What the user asked to see.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub entity: Option<String>,
    pub start:  Option<NaiveDate>,
    pub end:    Option<NaiveDate>,
}

/// A panel either has data or an explicit no-data message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Panel<T> {
    Ready { data: T },
    NoData { message: String },
}

impl<T> Panel<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Panel::Ready { data } => Some(data),
            Panel::NoData { .. }  => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePanel {
    pub columns: Vec<&'static str>,
    pub rows:    Vec<DisplayRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub view:           EntityKind,
    pub filter:         String,
    pub title:          String,
    /// Selector choices; empty when the user is pinned to one operator.
    pub entity_options: Vec<String>,
    pub scope_notice:   Option<String>,
    pub range:          Option<DateRange>,
    pub warnings:       Vec<String>,
    pub chart:          Panel<Vec<ChartPoint>>,
    pub table:          Panel<TablePanel>,
    #[serde(skip)]
    pub detail:         Option<DetailTable>,
}

impl DashboardView {
    /// Recompute the whole view for the session's current state.
    pub fn build(
        session: &SessionContext,
        provider: &dyn DataProvider,
        query: &DashboardQuery,
    ) -> MonitorResult<Self> {
        session.require_login()?;
        let kind = session.view();

        let forced_scope = match kind {
            EntityKind::Agence => None,
            EntityKind::Agi => {
                let grant = session
                    .secondary()
                    .ok_or_else(|| AccessDenied::NotAllowedForAgi {
                        email: session.user_email().unwrap_or_default().to_string(),
                    })?;
                grant.forced_scope().map(str::to_string)
            }
        };

        let table = provider.table(kind)?;

        let (filter, entity_options, scope_notice) = match forced_scope {
            Some(scope) => (
                EntityFilter::Code(scope.clone()),
                Vec::new(),
                Some(format!("Vue filtrée pour AGI : {scope}")),
            ),
            None => {
                let mut options = vec![ALL_SENTINEL.to_string()];
                options.extend(table.entity_codes());
                (EntityFilter::parse(query.entity.as_deref()), options, None)
            }
        };

        let mut warnings = Vec::new();
        let range = table.date_bounds().map(|bounds| {
            let resolved = DateRange::resolve(query.start, query.end, bounds);
            warnings.extend(resolved.warning);
            resolved.range
        });

        let selected: Vec<&ObservationRow> = table
            .rows()
            .iter()
            .filter(|r| filter.matches(&r.entity))
            .filter(|r| range.map_or(true, |rg| rg.contains(r.date())))
            .collect();

        let series = chart_series(selected.iter().copied());
        let chart = if series.is_empty() {
            Panel::NoData { message: NO_CHART_DATA.to_string() }
        } else {
            Panel::Ready { data: series }
        };

        let detail = detail_table(selected.iter().copied(), kind);
        let table_panel = match &detail {
            Some(d) => Panel::Ready {
                data: TablePanel {
                    columns: display_columns(kind),
                    rows:    d.display_rows(),
                },
            },
            None => Panel::NoData { message: NO_TABLE_DATA.to_string() },
        };

        log::debug!(
            "view {} filter {} -> {} row(s)",
            kind,
            filter.label(),
            selected.len()
        );

        Ok(Self {
            view: kind,
            filter: filter.label().to_string(),
            title: filter.chart_title(),
            entity_options,
            scope_notice,
            range,
            warnings,
            chart,
            table: table_panel,
            detail,
        })
    }
}
