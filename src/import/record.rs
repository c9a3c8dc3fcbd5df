//! Raw schedule rows and their validation into typed records.
//!
//! A [`RawRecord`] is what the spreadsheet reader hands over: column names
//! mapped to cell values, in arbitrary order and letter case. [`validate`]
//! turns it into an [`ImportedRecord`] with explicit optional fields, or a
//! [`RecordRejected`] reason.

use std::collections::BTreeMap;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordRejected;

/// Column names accepted for the scheduled date/time.
pub const DATE_COLUMNS: &[&str] = &["DATE", "DATA_AGENDAMENTO", "SCHEDULED_AT"];
/// Column names accepted for the client.
pub const CLIENT_COLUMNS: &[&str] = &["CLIENT", "CLIENTE"];
/// Column names accepted for the service type.
pub const SERVICE_COLUMNS: &[&str] = &["SERVICE", "SERVIÇO", "SERVICO"];
/// Column names accepted for the order number.
pub const ORDER_NUMBER_COLUMNS: &[&str] = &["ORDER_NUMBER", "NUMERO_PEDIDO"];
/// Column names accepted for the customs regime (task sub-type).
pub const REGIME_COLUMNS: &[&str] = &["REGIME"];
/// Column names accepted for the cargo type.
pub const CARGO_TYPE_COLUMNS: &[&str] = &["CARGO_TYPE", "TIPO_CARGA"];

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

// Spreadsheet serial day 0, and the last day serials can express (9999-12-31).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
const SERIAL_MAX: f64 = 2_958_466.0;

/// One imported row: column name to cell value.
///
/// Keys are trimmed and upper-cased on insertion, so lookups are
/// case-insensitive and the map's ordering is stable regardless of the
/// order columns appeared in the source.
///
/// # Examples
///
/// ```
/// use dockboard::import::RawRecord;
/// use serde_json::json;
///
/// let row = RawRecord::from_iter([
///     (" client ", json!("Acme")),
///     ("Date", json!("2025-01-10 08:00")),
/// ]);
/// assert_eq!(row.get("CLIENT"), Some(&json!("Acme")));
/// assert_eq!(row.get("date"), Some(&json!("2025-01-10 08:00")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a cell, normalizing the column name.
    pub fn insert(&mut self, column: &str, value: Value) {
        self.fields.insert(normalize_column(column), value);
    }

    /// Looks up a cell by column name, case-insensitively.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(&normalize_column(column))
    }

    /// Returns the first non-empty cell among `columns`.
    pub fn first_of(&self, columns: &[&str]) -> Option<&Value> {
        columns
            .iter()
            .filter_map(|c| self.get(c))
            .find(|v| !is_blank(v))
    }

    /// Normalized fields in key order.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Returns `true` if the record has no cells.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for RawRecord {
    fn from(map: BTreeMap<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl From<RawRecord> for BTreeMap<String, Value> {
    fn from(record: RawRecord) -> Self {
        record.fields
    }
}

impl<K: AsRef<str>> FromIterator<(K, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.insert(column.as_ref(), value);
        }
        record
    }
}

fn normalize_column(column: &str) -> String {
    column.trim().to_uppercase()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        },
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// A validated schedule row with typed, explicit optional fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRecord {
    /// Visit instant.
    pub scheduled_at: DateTime<Utc>,
    /// `HH:MM` in the reference timezone.
    pub suggested_time: String,
    /// Client name.
    pub client: String,
    /// Service category, if the row has one.
    pub service_type: Option<String>,
    /// Order number, if the row has one.
    pub order_number: Option<String>,
    /// Customs regime, if the row has one.
    pub regime: Option<String>,
    /// Palletized cargo flag, if the row states a cargo type.
    pub is_palletized: Option<bool>,
}

/// Validates a raw row.
///
/// Naive date/time values are interpreted in `tz`.
///
/// # Errors
///
/// - [`RecordRejected::MissingDate`] if no date column has a value.
/// - [`RecordRejected::UnparseableDate`] if the date cannot be interpreted.
/// - [`RecordRejected::MissingClient`] if no client column has a value.
pub fn validate(raw: &RawRecord, tz: FixedOffset) -> Result<ImportedRecord, RecordRejected> {
    let date = raw.first_of(DATE_COLUMNS).ok_or(RecordRejected::MissingDate)?;
    let scheduled_at = parse_schedule_value(date, tz)?;

    let client = raw
        .first_of(CLIENT_COLUMNS)
        .and_then(cell_text)
        .ok_or(RecordRejected::MissingClient)?;

    Ok(ImportedRecord {
        scheduled_at,
        suggested_time: scheduled_at.with_timezone(&tz).format("%H:%M").to_string(),
        client,
        service_type: raw.first_of(SERVICE_COLUMNS).and_then(cell_text),
        order_number: raw.first_of(ORDER_NUMBER_COLUMNS).and_then(cell_text),
        regime: raw.first_of(REGIME_COLUMNS).and_then(cell_text),
        is_palletized: raw
            .first_of(CARGO_TYPE_COLUMNS)
            .map(is_palletized_cargo),
    })
}

fn is_palletized_cargo(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => cell_text(other).is_some_and(|text| {
            let text = text.to_lowercase();
            let negated = ["non", "não", "nao"]
                .iter()
                .any(|prefix| text.starts_with(prefix));
            !negated
                && (text.contains("pallet")
                    || text.contains("palet")
                    || text == "true"
                    || text == "yes")
        }),
    }
}

/// Parses a date cell into an instant.
pub fn parse_schedule_value(
    value: &Value,
    tz: FixedOffset,
) -> Result<DateTime<Utc>, RecordRejected> {
    match value {
        Value::Null => Err(RecordRejected::MissingDate),
        Value::String(s) => parse_schedule_text(s.trim(), tz),
        Value::Number(n) => n
            .as_f64()
            .and_then(|serial| from_serial_days(serial, tz))
            .ok_or_else(|| RecordRejected::UnparseableDate {
                value: n.to_string(),
            }),
        other => Err(RecordRejected::UnparseableDate {
            value: other.to_string(),
        }),
    }
}

fn parse_schedule_text(text: &str, tz: FixedOffset) -> Result<DateTime<Utc>, RecordRejected> {
    if text.is_empty() {
        return Err(RecordRejected::MissingDate);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        });

    naive
        .and_then(|naive| localize(naive, tz))
        .ok_or_else(|| RecordRejected::UnparseableDate {
            value: text.to_string(),
        })
}

fn from_serial_days(serial: f64, tz: FixedOffset) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial <= 0.0 || serial >= SERIAL_MAX {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?.and_time(NaiveTime::MIN);
    // Round to the minute: spreadsheet fractions rarely land on exact seconds.
    let minutes = (serial * 24.0 * 60.0).round() as i64;
    let naive = epoch.checked_add_signed(Duration::try_minutes(minutes)?)?;
    localize(naive, tz)
}

fn localize(naive: NaiveDateTime, tz: FixedOffset) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}
