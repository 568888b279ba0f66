//! Incremental export encoders (CSV, spreadsheet-friendly CSV, JSON).
//!
//! An [`Exporter`] turns one row at a time into a text chunk so callers can
//! stream arbitrarily large result sets: a preamble (header line or `[`),
//! one chunk per record, then an epilogue. Rows are JSON objects; the
//! caller's [`ExportColumns`] decide which fields appear, in which order,
//! and under which labels.

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};

/// UTF-8 byte-order mark, lets spreadsheet apps detect the encoding.
pub const UTF8_BOM: &str = "\u{feff}";

/// Requested export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    /// CSV with a byte-order mark, for spreadsheet applications.
    Xlsx,
    Json,
}

impl ExportFormat {
    /// Parse a format name (`csv`, `xlsx`/`excel`, `json`), case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" | "xls" | "excel" => Some(ExportFormat::Xlsx),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn exporter(self) -> &'static dyn Exporter {
        match self {
            ExportFormat::Csv => &CsvExporter,
            ExportFormat::Xlsx => &XlsxExporter,
            ExportFormat::Json => &JsonExporter,
        }
    }
}

/// One projected column: source field path and display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportColumn {
    pub field: String,
    pub label: String,
}

/// Ordered field → label projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportColumns(Vec<ExportColumn>);

impl ExportColumns {
    pub fn new<I, F, L>(columns: I) -> Self
    where
        I: IntoIterator<Item = (F, L)>,
        F: Into<String>,
        L: Into<String>,
    {
        Self(
            columns
                .into_iter()
                .map(|(field, label)| ExportColumn {
                    field: field.into(),
                    label: label.into(),
                })
                .collect(),
        )
    }

    /// Columns that use each field name as its own label.
    pub fn from_fields<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: AsRef<str>,
    {
        Self::new(
            fields
                .into_iter()
                .map(|f| (f.as_ref().to_string(), f.as_ref().to_string())),
        )
    }

    /// Read `columns[field]=Label` pairs (request order preserved) or a plain
    /// `columns=a,b` list. Returns `None` when the request names no columns.
    pub fn from_pairs(pairs: &[(String, String)]) -> Option<Self> {
        let mut columns: Vec<ExportColumn> = Vec::new();
        for (key, value) in pairs {
            if key == "columns" {
                for field in value.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                    push_unique(&mut columns, field, field);
                }
            } else if let Some(field) = key
                .strip_prefix("columns[")
                .and_then(|rest| rest.strip_suffix(']'))
            {
                let field = field.trim();
                if field.is_empty() {
                    continue;
                }
                let label = value.trim();
                push_unique(&mut columns, field, if label.is_empty() { field } else { label });
            }
        }
        (!columns.is_empty()).then_some(Self(columns))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportColumn> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn push_unique(columns: &mut Vec<ExportColumn>, field: &str, label: &str) {
    if let Some(existing) = columns.iter_mut().find(|c| c.field == field) {
        existing.label = label.to_string();
    } else {
        columns.push(ExportColumn {
            field: field.to_string(),
            label: label.to_string(),
        });
    }
}

/// Localized labels for boolean cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolLabels {
    pub truthy: String,
    pub falsy: String,
}

impl Default for BoolLabels {
    fn default() -> Self {
        Self {
            truthy: "Activo".to_string(),
            falsy: "Inactivo".to_string(),
        }
    }
}

impl BoolLabels {
    pub fn label(&self, value: bool) -> &str {
        if value {
            &self.truthy
        } else {
            &self.falsy
        }
    }
}

/// Format-specific row encoder.
pub trait Exporter: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    /// Text emitted before the first record.
    fn preamble(&self, columns: &ExportColumns) -> String;

    /// Text for the record at zero-based `index`.
    fn record(
        &self,
        index: usize,
        row: &Map<String, Value>,
        columns: &ExportColumns,
        labels: &BoolLabels,
    ) -> String;

    /// Text emitted after the last record.
    fn epilogue(&self) -> String {
        String::new()
    }
}

pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn preamble(&self, columns: &ExportColumns) -> String {
        csv_line(columns.iter().map(|c| c.label.clone()))
    }

    fn record(
        &self,
        _index: usize,
        row: &Map<String, Value>,
        columns: &ExportColumns,
        labels: &BoolLabels,
    ) -> String {
        csv_line(
            columns
                .iter()
                .map(|c| cell_text(lookup(row, &c.field), labels)),
        )
    }
}

/// Same records as [`CsvExporter`], prefixed with a UTF-8 BOM.
pub struct XlsxExporter;

impl Exporter for XlsxExporter {
    fn content_type(&self) -> &'static str {
        "application/vnd.ms-excel"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn preamble(&self, columns: &ExportColumns) -> String {
        format!("{UTF8_BOM}{}", CsvExporter.preamble(columns))
    }

    fn record(
        &self,
        index: usize,
        row: &Map<String, Value>,
        columns: &ExportColumns,
        labels: &BoolLabels,
    ) -> String {
        CsvExporter.record(index, row, columns, labels)
    }
}

/// Streams a JSON array of label-keyed objects.
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn preamble(&self, _columns: &ExportColumns) -> String {
        "[".to_string()
    }

    fn record(
        &self,
        index: usize,
        row: &Map<String, Value>,
        columns: &ExportColumns,
        labels: &BoolLabels,
    ) -> String {
        // Written by hand so keys keep the caller's column order.
        let mut out = String::new();
        if index > 0 {
            out.push(',');
        }
        out.push('{');
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&json_string(&column.label));
            out.push(':');
            match lookup(row, &column.field) {
                None | Some(Value::Null) => out.push_str("null"),
                Some(Value::Bool(b)) => out.push_str(&json_string(labels.label(*b))),
                Some(other) => out.push_str(&other.to_string()),
            }
        }
        out.push('}');
        out
    }

    fn epilogue(&self) -> String {
        "]".to_string()
    }
}

/// Encode a fallible row stream into text chunks.
///
/// The first error from `rows` is forwarded as-is; consumers should stop
/// reading after it.
pub fn encode_stream<S, E>(
    exporter: &'static dyn Exporter,
    columns: ExportColumns,
    labels: BoolLabels,
    rows: S,
) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Map<String, Value>, E>>,
{
    let head = exporter.preamble(&columns);
    let tail = exporter.epilogue();
    let body = rows.enumerate().map(move |(index, row)| {
        row.map(|row| exporter.record(index, &row, &columns, &labels))
    });
    stream::once(futures::future::ready(Ok(head)))
        .chain(body)
        .chain(stream::once(futures::future::ready(Ok(tail))))
}

/// Generated download name: `{base}_{YYYYMMDD_HHMMSS}.{ext}`.
pub fn export_filename(base: &str, format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}.{}",
        sanitize_stem(base),
        now.format("%Y%m%d_%H%M%S"),
        format.exporter().extension()
    )
}

/// Caller-supplied download name, stripped of path and quote characters and
/// forced to the format's extension.
pub fn requested_filename(requested: &str, format: ExportFormat) -> String {
    let ext = format.exporter().extension();
    let name = requested.rsplit(['/', '\\']).next().unwrap_or(requested);
    let stem = name
        .strip_suffix(&format!(".{ext}"))
        .unwrap_or(name);
    format!("{}.{ext}", sanitize_stem(stem))
}

fn sanitize_stem(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

/// Resolve `field` on a row: an exact key first, then a dotted path through
/// nested objects (`role.name`).
fn lookup<'a>(row: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(field) {
        return Some(value);
    }
    let mut parts = field.split('.');
    let mut current = row.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn cell_text(value: Option<&Value>, labels: &BoolLabels) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(b)) => labels.label(*b).to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_line(cells: impl Iterator<Item = String>) -> String {
    let mut line = cells.map(|c| csv_escape(&c)).collect::<Vec<_>>().join(",");
    line.push_str("\r\n");
    line
}

/// Quote a CSV cell when it contains a delimiter, quote, or line break.
fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn json_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}
