//! SQL value representation shared by the source reader, the target
//! executor, data transfer and row validation.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Format used for DATETIME values on both sides.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// A single cell value.
///
/// SQLite stores values with one of five storage classes; MySQL adds proper
/// temporal types. `SqlValue` is the union of what both engines hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// 64-bit signed integer (SQLite INTEGER, MySQL integer types).
    Integer(i64),

    /// 64-bit floating point.
    Real(f64),

    /// Text data.
    Text(String),

    /// Binary data.
    Blob(Vec<u8>),

    /// Timestamp without time zone.
    DateTime(NaiveDateTime),
}

/// A row of values in column order.
pub type Row = Vec<SqlValue>;

impl SqlValue {
    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Convert an epoch-milliseconds integer into a DATETIME value.
    ///
    /// Non-integer values and out-of-range integers are returned unchanged.
    pub fn epoch_millis_to_datetime(self) -> SqlValue {
        match self {
            SqlValue::Integer(ms) => match DateTime::from_timestamp_millis(ms) {
                Some(ts) => SqlValue::DateTime(ts.naive_utc()),
                None => SqlValue::Integer(ms),
            },
            other => other,
        }
    }

    /// Engine-independent text form used when comparing rows.
    ///
    /// Returns `None` for NULL. Floats use the shortest round-trip form so that
    /// `2.0` and `2` compare equal, blobs are rendered as lowercase hex, and
    /// text that looks like a timestamp is re-rendered in the canonical
    /// DATETIME format.
    pub fn normalized(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(v) => Some(v.to_string()),
            SqlValue::Real(v) => Some(v.to_string()),
            SqlValue::Text(s) => Some(match parse_timestamp(s) {
                Some(ts) => format_datetime(&ts),
                None => s.clone(),
            }),
            SqlValue::Blob(b) => Some(b.iter().map(|byte| format!("{:02x}", byte)).collect()),
            SqlValue::DateTime(ts) => Some(format_datetime(ts)),
        }
    }
}

/// How values of a MySQL column are rendered for comparison.
///
/// MySQL stores temporal and fixed-point values at the precision the column
/// declares, so the source side has to be brought to the same precision
/// before the two renderings can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// No column-specific rendering.
    Plain,
    /// DATE: `YYYY-MM-DD`.
    Date,
    /// TIME: `HH:MM:SS`.
    Time,
    /// DATETIME / TIMESTAMP with `fsp` fractional-second digits.
    DateTime { fsp: u32 },
    /// DECIMAL / NUMERIC with `scale` fractional digits.
    Decimal { scale: usize },
}

impl ValueShape {
    /// Derive the shape from an `information_schema` COLUMN_TYPE such as
    /// `datetime(3)` or `decimal(10,2)`.
    pub fn from_column_type(column_type: &str) -> Self {
        let ty = column_type.trim().to_lowercase();
        let args: Vec<&str> = ty
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .map(|(inner, _)| inner.split(',').map(str::trim).collect())
            .unwrap_or_default();
        let arg = |i: usize| args.get(i).and_then(|a| a.parse::<u32>().ok());

        if ty.starts_with("datetime") || ty.starts_with("timestamp") {
            ValueShape::DateTime {
                fsp: arg(0).unwrap_or(0).min(6),
            }
        } else if ty == "date" {
            ValueShape::Date
        } else if ty.starts_with("time") {
            ValueShape::Time
        } else if ty.starts_with("decimal") || ty.starts_with("numeric") {
            ValueShape::Decimal {
                scale: arg(1).unwrap_or(0) as usize,
            }
        } else {
            ValueShape::Plain
        }
    }
}

impl SqlValue {
    /// Like [`SqlValue::normalized`], but rendered the way a column of the
    /// given shape stores the value.
    ///
    /// Values that do not fit the shape fall back to the plain rendering.
    pub fn normalized_as(&self, shape: ValueShape) -> Option<String> {
        let shaped = match (shape, self) {
            (_, SqlValue::Null) | (ValueShape::Plain, _) => None,
            (ValueShape::Date, value) => value
                .as_datetime()
                .map(|ts| ts.format(DATE_FORMAT).to_string()),
            (ValueShape::Time, SqlValue::DateTime(ts)) => Some(ts.format(TIME_FORMAT).to_string()),
            (ValueShape::Time, SqlValue::Text(s)) => {
                NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                    .ok()
                    .map(|t| t.format(TIME_FORMAT).to_string())
            }
            (ValueShape::Time, _) => None,
            (ValueShape::DateTime { fsp }, value) => value
                .as_datetime()
                .map(|ts| format_datetime(&round_to_fsp(ts, fsp))),
            (ValueShape::Decimal { scale }, SqlValue::Real(v)) => Some(format!("{:.*}", scale, v)),
            (ValueShape::Decimal { scale }, SqlValue::Integer(v)) => {
                format_decimal(&v.to_string(), scale)
            }
            (ValueShape::Decimal { scale }, SqlValue::Text(s)) => format_decimal(s, scale),
            (ValueShape::Decimal { .. }, _) => None,
        };
        shaped.or_else(|| self.normalized())
    }

    fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::DateTime(ts) => Some(*ts),
            SqlValue::Text(s) => parse_timestamp(s).or_else(|| {
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }),
            _ => None,
        }
    }
}

/// Round to `fsp` fractional-second digits, half up, as MySQL does on insert.
fn round_to_fsp(ts: NaiveDateTime, fsp: u32) -> NaiveDateTime {
    let unit = 10u32.pow(9 - fsp.min(6));
    let nanos = ts.and_utc().timestamp_subsec_nanos() % 1_000_000_000;
    let rounded = (nanos + unit / 2) / unit * unit;
    ts.checked_sub_signed(Duration::nanoseconds(i64::from(nanos)))
        .and_then(|base| base.checked_add_signed(Duration::nanoseconds(i64::from(rounded))))
        .unwrap_or(ts)
}

/// Render a decimal literal with exactly `scale` fractional digits.
///
/// Returns `None` when `s` is not a plain decimal literal.
fn format_decimal(s: &str, scale: usize) -> Option<String> {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.strip_prefix('+').unwrap_or(s)),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !is_digits(int) || !is_digits(frac) {
        return None;
    }
    if frac.len() > scale {
        return s.parse::<f64>().ok().map(|v| format!("{:.*}", scale, v));
    }

    let int = match int.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let mut out = format!("{}{}", sign, int);
    if scale > 0 {
        out.push('.');
        out.push_str(frac);
        out.extend(std::iter::repeat('0').take(scale - frac.len()));
    }
    Some(out)
}

fn format_datetime(ts: &NaiveDateTime) -> String {
    let base = ts.format(DATETIME_FORMAT).to_string();
    let micros = ts.and_utc().timestamp_subsec_micros();
    if micros == 0 {
        base
    } else {
        format!("{}.{:06}", base, micros)
    }
}

/// Parse the timestamp spellings SQLite applications commonly store as TEXT.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if !(19..=35).contains(&s.len()) || !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}
