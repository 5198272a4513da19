//! Workbook loading and normalization.
//!
//! RULE: Only loader.rs talks to calamine.
//! Everything downstream sees `RawSheet` / `ObservationTable`, never workbook cells.

use crate::{
    error::LoadError,
    types::{
        Counters, EntityCode, EntityKind, RatioKind, CASH_RATIO_COLUMN, DATE_COLUMN,
        SMALL_DEPOSITS_COLUMN, SMALL_OPS_COLUMN, SMALL_TRANSFERS_COLUMN, SMALL_WITHDRAWALS_COLUMN,
        TOTAL_OPS_COLUMN, TRANSFER_RATIO_COLUMN,
    },
};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::path::Path;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

static EMPTY_CELL: Cell = Cell::Empty;

// ── Cells ────────────────────────────────────────────────────────────────────

/// A workbook cell reduced to the shapes the monitor cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(s: &str) -> Self {
        Cell::Text(s.to_string())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty   => true,
            Cell::Text(s) => s.trim().is_empty(),
            _             => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Cell::Empty        => String::new(),
            Cell::Text(s)      => s.clone(),
            Cell::Number(n)    => n.to_string(),
            Cell::DateTime(dt) => dt.to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty          => Cell::Empty,
            Data::String(s)      => Cell::Text(s.clone()),
            Data::Int(n)         => Cell::Number(*n as f64),
            Data::Float(f)       => Cell::Number(*f),
            Data::Bool(b)        => Cell::Text(b.to_string()),
            Data::DateTime(dt)   => match serial_to_datetime(dt.as_f64()) {
                Some(parsed) => Cell::DateTime(parsed),
                None         => Cell::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) => Cell::Text(s.clone()),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e)       => Cell::Text(format!("#ERR({e:?})")),
        }
    }
}

/// Convert a spreadsheet serial day number (1899-12-30 epoch) to a date-time.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(chrono::Duration::milliseconds(millis))
}

/// Parse a textual date, with or without a time-of-day component.
pub fn parse_date_text(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// ── Column names ─────────────────────────────────────────────────────────────

/// Strip doubled-underscore artifacts and surrounding whitespace from a header.
///
/// Idempotent: a run of underscores collapses to its parity on the first pass,
/// so a second pass finds nothing left to remove.
pub fn normalize_column_name(raw: &str) -> String {
    raw.replace("__", "").trim().to_string()
}

// ── Raw sheet ────────────────────────────────────────────────────────────────

/// A sheet with a normalized header row and untyped cells.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name:    String,
    pub columns: Vec<String>,
    pub rows:    Vec<Vec<Cell>>,
    /// 1-based workbook row number of the first data row.
    pub first_data_row: usize,
}

impl RawSheet {
    /// Build from a header row and data rows; header names are normalized here.
    pub fn new(name: &str, header: &[&str], rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name:    name.to_string(),
            columns: header.iter().map(|h| normalize_column_name(h)).collect(),
            rows,
            first_data_row: 2,
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    fn require_column(&self, column: &str) -> Result<usize, LoadError> {
        self.column_index(column).ok_or_else(|| LoadError::MissingColumn {
            sheet:  self.name.clone(),
            column: column.to_string(),
        })
    }
}

/// Read the named sheet of the workbook at `path`.
pub fn load_sheet(path: &Path, sheet: &str) -> Result<RawSheet, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound { path: path.display().to_string() });
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::Workbook {
        path:    path.display().to_string(),
        message: e.to_string(),
    })?;

    let names = workbook.sheet_names().to_vec();
    if !names.iter().any(|n| n == sheet) {
        return Err(LoadError::SheetNotFound {
            sheet:     sheet.to_string(),
            available: names.join(", "),
        });
    }

    let range = workbook.worksheet_range(sheet).map_err(|e| LoadError::Workbook {
        path:    path.display().to_string(),
        message: e.to_string(),
    })?;

    // Ranges start at the first used cell, not necessarily A1.
    let start_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut rows = range
        .rows()
        .enumerate()
        .map(|(i, r)| (i, r.iter().map(Cell::from).collect::<Vec<_>>()));

    let (header_offset, header) = rows
        .by_ref()
        .find(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
        .ok_or_else(|| LoadError::EmptySheet { sheet: sheet.to_string() })?;

    let columns = header
        .iter()
        .map(|c| normalize_column_name(&c.describe()))
        .collect();

    let data_rows = rows.map(|(_, cells)| cells).collect();

    log::debug!("loaded sheet '{}' from {}", sheet, path.display());

    Ok(RawSheet {
        name: sheet.to_string(),
        columns,
        rows: data_rows,
        first_data_row: start_row + header_offset + 2,
    })
}

// ── Observation table ────────────────────────────────────────────────────────

/// One entity on one accounting date.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub entity:         EntityCode,
    pub accounted_at:   NaiveDateTime,
    pub cash_ratio:     Option<f64>,
    pub transfer_ratio: Option<f64>,
    pub counters:       Counters,
}

impl ObservationRow {
    pub fn date(&self) -> NaiveDate {
        self.accounted_at.date()
    }

    pub fn ratio(&self, kind: RatioKind) -> Option<f64> {
        match kind {
            RatioKind::Cash     => self.cash_ratio,
            RatioKind::Transfer => self.transfer_ratio,
        }
    }
}

/// A typed, normalized sheet. Rows keep workbook order.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    pub kind: EntityKind,
    rows:     Vec<ObservationRow>,
}

struct ColumnMap {
    entity:            usize,
    date:              usize,
    cash_ratio:        usize,
    transfer_ratio:    usize,
    total_ops:         usize,
    small_ops:         usize,
    small_withdrawals: usize,
    small_deposits:    usize,
    small_transfers:   usize,
}

impl ObservationTable {
    pub fn new(kind: EntityKind, rows: Vec<ObservationRow>) -> Self {
        Self { kind, rows }
    }

    pub fn empty(kind: EntityKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Type the cells of `sheet` according to the layout of `kind`.
    pub fn from_sheet(sheet: &RawSheet, kind: EntityKind) -> Result<Self, LoadError> {
        let map = ColumnMap {
            entity:            sheet.require_column(kind.entity_column())?,
            date:              sheet.require_column(DATE_COLUMN)?,
            cash_ratio:        sheet.require_column(CASH_RATIO_COLUMN)?,
            transfer_ratio:    sheet.require_column(TRANSFER_RATIO_COLUMN)?,
            total_ops:         sheet.require_column(TOTAL_OPS_COLUMN)?,
            small_ops:         sheet.require_column(SMALL_OPS_COLUMN)?,
            small_withdrawals: sheet.require_column(SMALL_WITHDRAWALS_COLUMN)?,
            small_deposits:    sheet.require_column(SMALL_DEPOSITS_COLUMN)?,
            small_transfers:   sheet.require_column(SMALL_TRANSFERS_COLUMN)?,
        };

        let mut rows = Vec::with_capacity(sheet.rows.len());
        for (i, cells) in sheet.rows.iter().enumerate() {
            if cells.iter().all(Cell::is_empty) {
                continue;
            }
            let row_no = sheet.first_data_row + i;
            let reader = RowReader { sheet, cells, row_no };

            rows.push(ObservationRow {
                entity:         reader.entity(map.entity),
                accounted_at:   reader.date(map.date)?,
                cash_ratio:     reader.ratio(map.cash_ratio)?,
                transfer_ratio: reader.ratio(map.transfer_ratio)?,
                counters: Counters {
                    total_ops:         reader.counter(map.total_ops)?,
                    small_ops:         reader.counter(map.small_ops)?,
                    small_withdrawals: reader.counter(map.small_withdrawals)?,
                    small_deposits:    reader.counter(map.small_deposits)?,
                    small_transfers:   reader.counter(map.small_transfers)?,
                },
            });
        }

        Ok(Self { kind, rows })
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The most recent accounting date, time of day discarded.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(ObservationRow::date).max()
    }

    /// `(earliest, latest)` accounting dates present in the table.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(ObservationRow::date).min()?;
        let max = self.rows.iter().map(ObservationRow::date).max()?;
        Some((min, max))
    }

    /// Sorted, de-duplicated entity codes.
    pub fn entity_codes(&self) -> Vec<EntityCode> {
        self.rows
            .iter()
            .map(|r| r.entity.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn rows_on(&self, date: NaiveDate) -> impl Iterator<Item = &ObservationRow> {
        self.rows.iter().filter(move |r| r.date() == date)
    }
}

/// Load and type one sheet of the workbook.
pub fn load_table(path: &Path, kind: EntityKind) -> Result<ObservationTable, LoadError> {
    let sheet = load_sheet(path, kind.sheet_name())?;
    let table = ObservationTable::from_sheet(&sheet, kind)?;
    log::info!("sheet '{}': {} rows", kind.sheet_name(), table.len());
    Ok(table)
}

// ── Cell decoding ────────────────────────────────────────────────────────────

struct RowReader<'a> {
    sheet:  &'a RawSheet,
    cells:  &'a [Cell],
    row_no: usize,
}

impl RowReader<'_> {
    fn cell(&self, idx: usize) -> &Cell {
        self.cells.get(idx).unwrap_or(&EMPTY_CELL)
    }

    fn entity(&self, idx: usize) -> EntityCode {
        match self.cell(idx) {
            Cell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            other                               => other.describe().trim().to_string(),
        }
    }

    fn date(&self, idx: usize) -> Result<NaiveDateTime, LoadError> {
        let cell = self.cell(idx);
        let parsed = match cell {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Number(n)    => serial_to_datetime(*n),
            Cell::Text(s)      => parse_date_text(s),
            Cell::Empty        => None,
        };
        parsed.ok_or_else(|| LoadError::InvalidDate {
            sheet: self.sheet.name.clone(),
            row:   self.row_no,
            value: cell.describe(),
        })
    }

    fn number(&self, idx: usize) -> Result<Option<f64>, LoadError> {
        let cell = self.cell(idx);
        let value = match cell {
            Cell::Empty                          => return Ok(None),
            Cell::Text(s) if s.trim().is_empty() => return Ok(None),
            Cell::Number(n)                      => Some(*n),
            Cell::Text(s)                        => s.trim().replace(',', ".").parse::<f64>().ok(),
            Cell::DateTime(_)                    => None,
        };
        match value {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(self.invalid_number(idx, cell)),
        }
    }

    fn ratio(&self, idx: usize) -> Result<Option<f64>, LoadError> {
        self.number(idx)
    }

    fn counter(&self, idx: usize) -> Result<u64, LoadError> {
        match self.number(idx)? {
            None                => Ok(0),
            Some(v) if v >= 0.0 => Ok(v.round() as u64),
            Some(_)             => Err(self.invalid_number(idx, self.cell(idx))),
        }
    }

    fn invalid_number(&self, idx: usize, cell: &Cell) -> LoadError {
        LoadError::InvalidNumber {
            sheet:  self.sheet.name.clone(),
            row:    self.row_no,
            column: self.sheet.columns.get(idx).cloned().unwrap_or_default(),
            value:  cell.describe(),
        }
    }
}
