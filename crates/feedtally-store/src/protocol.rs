//! JSON wire protocol of the remote store web app.
//!
//! Every call is a `POST` of one [`Request`], tagged by `operation`:
//!
//! | Operation | Response |
//! |-----------|----------|
//! | `listFiles` | [`ListResponse`] |
//! | `getFilesBatch` | [`BatchResponse`] |
//! | `getPartnerDirectory` | [`DirectoryResponse`] |
//! | `upsertDailyRows` | [`UpsertResponse`] |
//!
//! Responses are parsed leniently: the web app emits timestamps either as
//! epoch milliseconds or ISO strings and feed ids either as numbers or
//! strings.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// A request body.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request<'a> {
    ListFiles {
        folder: &'a str,
        date: NaiveDate,
    },
    GetFilesBatch {
        folder: &'a str,
        date: NaiveDate,
        filenames: &'a [String],
    },
    GetPartnerDirectory {
        only_active: bool,
    },
    UpsertDailyRows {
        table: Table,
        date: NaiveDate,
        rows: &'a [serde_json::Value],
        clear_first: bool,
        root_folder: &'a str,
    },
}

impl Request<'_> {
    pub fn operation(&self) -> &'static str {
        match self {
            Request::ListFiles { .. } => "listFiles",
            Request::GetFilesBatch { .. } => "getFilesBatch",
            Request::GetPartnerDirectory { .. } => "getPartnerDirectory",
            Request::UpsertDailyRows { .. } => "upsertDailyRows",
        }
    }
}

/// Destination table of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    /// One row per (date, feed id).
    Partners,
    /// One row per date.
    Totals,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Table::Partners => write!(f, "partners"),
            Table::Totals => write!(f, "totals"),
        }
    }
}

/// Responses that carry the web app's `{ok, error}` envelope.
pub trait Envelope {
    fn ok(&self) -> bool;
    fn error(&self) -> Option<&str>;
}

macro_rules! envelope {
    ($ty:ty) => {
        impl Envelope for $ty {
            fn ok(&self) -> bool {
                self.ok
            }
            fn error(&self) -> Option<&str> {
                self.error.as_deref()
            }
        }
    };
}

// ---------------------------------------------------------------------------
// listFiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub ok: bool,
    #[serde(default)]
    pub files: Vec<ListedFile>,
    #[serde(default)]
    pub error: Option<String>,
}
envelope!(ListResponse);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedFile {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Epoch milliseconds; `0` when the listing omits it.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub last_updated: i64,
}

// ---------------------------------------------------------------------------
// getFilesBatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub ok: bool,
    #[serde(default)]
    pub files: Vec<BatchItem>,
    #[serde(default)]
    pub error: Option<String>,
}
envelope!(BatchResponse);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub content_base64: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// getPartnerDirectory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryResponse {
    pub ok: bool,
    #[serde(default)]
    pub rows: Vec<DirectoryRow>,
    #[serde(default)]
    pub error: Option<String>,
}
envelope!(DirectoryResponse);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRow {
    #[serde(default, deserialize_with = "lenient_feed_id")]
    pub feed_id: Option<u32>,
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(default)]
    pub active: Option<bool>,
}

// ---------------------------------------------------------------------------
// upsertDailyRows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    pub ok: bool,
    #[serde(default, alias = "spreadsheetUrl")]
    pub target_location: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
envelope!(UpsertResponse);

// ---------------------------------------------------------------------------
// Lenient field parsers
// ---------------------------------------------------------------------------

fn lenient_millis<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|dt| dt.timestamp_millis())
                })
                .unwrap_or(0)
        }
        _ => 0,
    })
}

fn lenient_feed_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
