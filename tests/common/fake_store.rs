//! Fake remote store for integration tests.
//!
//! Spins up a minimal `axum` server on a random port bound to 127.0.0.1 that
//! speaks the store's JSON-over-POST protocol on two routes:
//! - `POST /reader`: `listFiles`, `getFilesBatch`, `getPartnerDirectory`
//! - `POST /writer`: `upsertDailyRows`
//!
//! Every request body is recorded so tests can assert on chunking and
//! flags. Upserts are keyed like the real store: `(table, date, feedId)` for
//! partner rows and `(table, date)` for totals, with `clearFirst` wiping the
//! day's rows of that table first.
//!
//! Failure scripting:
//! - [`FakeStore::omit_from_batches`]: leave a name out of the next N batch
//!   responses that request it
//! - [`FakeStore::malformed_batches`]: answer the next N multi-name batch
//!   requests with an HTML page
//! - [`FakeStore::queue_status`]: answer the next request with a bare status
//! - [`FakeStore::reject_upsert_call`]: answer the k-th upsert with `ok: false`

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// `"reader"` or `"writer"`.
    pub endpoint: &'static str,
    pub body: Value,
}

impl RecordedRequest {
    pub fn operation(&self) -> &str {
        self.body["operation"].as_str().unwrap_or("")
    }

    pub fn filenames(&self) -> Vec<String> {
        self.body["filenames"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    name: String,
    bytes: Vec<u8>,
    last_updated: i64,
}

#[derive(Default)]
struct StoreState {
    /// date → files listed for that date.
    files: BTreeMap<String, Vec<StoredFile>>,
    partners: Vec<Value>,
    requests: Vec<RecordedRequest>,
    /// (table, date, key) → row.
    rows: BTreeMap<(String, String, String), Value>,

    omit: BTreeMap<String, u32>,
    malformed: u32,
    broken: BTreeSet<String>,
    statuses: VecDeque<u16>,
    listing_rejected: bool,
    directory_down: bool,
    rejected_upserts: BTreeSet<usize>,
    upsert_calls: usize,
}

type Shared = Arc<Mutex<StoreState>>;

/// Handle to the running fake store.
pub struct FakeStore {
    addr: SocketAddr,
    state: Shared,
}

impl FakeStore {
    /// Start the server on a random port. Returns once it is listening.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state: Shared = Arc::new(Mutex::new(StoreState::default()));

        let app = Router::new()
            .route("/reader", post(reader))
            .route("/writer", post(writer))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Ok(Self { addr, state })
    }

    pub fn reader_url(&self) -> String {
        format!("http://{}/reader", self.addr)
    }

    pub fn writer_url(&self) -> String {
        format!("http://{}/writer", self.addr)
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    pub async fn add_file(&self, date: &str, name: &str, bytes: &[u8], last_updated: i64) {
        let mut state = self.state.lock().await;
        state.files.entry(date.to_string()).or_default().push(StoredFile {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            last_updated,
        });
    }

    pub async fn add_text(&self, date: &str, name: &str, text: &str) {
        self.add_file(date, name, text.as_bytes(), 1_756_900_000_000).await;
    }

    pub async fn add_gzip(&self, date: &str, name: &str, text: &str) {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        let packed = enc.finish().unwrap();
        self.add_file(date, name, &packed, 1_756_900_000_000).await;
    }

    pub async fn add_partner(&self, feed_id: u32, partner: &str, code: &str, active: bool) {
        let mut state = self.state.lock().await;
        state.partners.push(json!({
            "feedId": feed_id.to_string(),
            "partner": partner,
            "code": code,
            "active": active,
        }));
    }

    // -----------------------------------------------------------------------
    // Failure scripting
    // -----------------------------------------------------------------------

    pub async fn omit_from_batches(&self, name: &str, times: u32) {
        self.state.lock().await.omit.insert(name.to_string(), times);
    }

    pub async fn malformed_batches(&self, times: u32) {
        self.state.lock().await.malformed = times;
    }

    /// The store always answers `ok: false` for this name.
    pub async fn break_file(&self, name: &str) {
        self.state.lock().await.broken.insert(name.to_string());
    }

    pub async fn queue_status(&self, status: u16) {
        self.state.lock().await.statuses.push_back(status);
    }

    pub async fn reject_listing(&self) {
        self.state.lock().await.listing_rejected = true;
    }

    pub async fn take_directory_down(&self) {
        self.state.lock().await.directory_down = true;
    }

    /// Answer the `index`-th upsert call (zero-based, counted across tables)
    /// with `ok: false`.
    pub async fn reject_upsert_call(&self, index: usize) {
        self.state.lock().await.rejected_upserts.insert(index);
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn requests_for(&self, operation: &str) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.operation() == operation)
            .collect()
    }

    /// Rows currently stored for `(table, date)`, ordered by key.
    pub async fn rows(&self, table: &str, date: &str) -> Vec<Value> {
        let state = self.state.lock().await;
        state
            .rows
            .iter()
            .filter(|((t, d, _), _)| t == table && d == date)
            .map(|(_, row)| row.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn reader(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().await;
    state.requests.push(RecordedRequest {
        endpoint: "reader",
        body: body.clone(),
    });
    if let Some(status) = state.statuses.pop_front() {
        return bare_status(status);
    }

    let date = body["date"].as_str().unwrap_or_default().to_string();
    match body["operation"].as_str() {
        Some("listFiles") => {
            if state.listing_rejected {
                return Json(json!({"ok": false, "error": "folder not found"})).into_response();
            }
            let files: Vec<Value> = state
                .files
                .get(&date)
                .map(|files| {
                    files
                        .iter()
                        .map(|f| json!({"name": f.name, "lastUpdated": f.last_updated}))
                        .collect()
                })
                .unwrap_or_default();
            Json(json!({"ok": true, "files": files})).into_response()
        }
        Some("getFilesBatch") => {
            let names: Vec<String> = body["filenames"]
                .as_array()
                .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default();
            if names.len() > 1 && state.malformed > 0 {
                state.malformed -= 1;
                return (StatusCode::OK, "<html><body>Service unavailable</body></html>").into_response();
            }
            let mut items = Vec::new();
            for name in names {
                if let Some(left) = state.omit.get_mut(&name) {
                    if *left > 0 {
                        *left -= 1;
                        continue;
                    }
                }
                if state.broken.contains(&name) {
                    items.push(json!({"name": name, "ok": false, "error": "cannot read"}));
                    continue;
                }
                let found = state
                    .files
                    .get(&date)
                    .and_then(|files| files.iter().rev().find(|f| f.name == name));
                match found {
                    Some(f) => items.push(json!({
                        "name": name,
                        "ok": true,
                        "contentBase64": STANDARD.encode(&f.bytes),
                        "mimeType": "text/plain",
                    })),
                    None => items.push(json!({"name": name, "ok": false, "error": "not found"})),
                }
            }
            Json(json!({"ok": true, "files": items})).into_response()
        }
        Some("getPartnerDirectory") => {
            if state.directory_down {
                return bare_status(500);
            }
            let only_active = body["onlyActive"].as_bool().unwrap_or(false);
            let rows: Vec<Value> = state
                .partners
                .iter()
                .filter(|p| !only_active || p["active"].as_bool().unwrap_or(true))
                .cloned()
                .collect();
            Json(json!({"ok": true, "rows": rows})).into_response()
        }
        other => Json(json!({"ok": false, "error": format!("unknown operation {other:?}")})).into_response(),
    }
}

async fn writer(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().await;
    state.requests.push(RecordedRequest {
        endpoint: "writer",
        body: body.clone(),
    });
    if let Some(status) = state.statuses.pop_front() {
        return bare_status(status);
    }
    if body["operation"].as_str() != Some("upsertDailyRows") {
        return Json(json!({"ok": false, "error": "writer only upserts"})).into_response();
    }

    let call = state.upsert_calls;
    state.upsert_calls += 1;
    if state.rejected_upserts.contains(&call) {
        return Json(json!({"ok": false, "error": "quota exceeded"})).into_response();
    }

    let table = body["table"].as_str().unwrap_or_default().to_string();
    let date = body["date"].as_str().unwrap_or_default().to_string();
    if body["clearFirst"].as_bool().unwrap_or(false) {
        state.rows.retain(|(t, d, _), _| !(t == &table && d == &date));
    }
    let rows = body["rows"].as_array().cloned().unwrap_or_default();
    for row in rows {
        let key = match row.get("feedId") {
            Some(id) => format!("{:0>10}", id),
            None => "day".to_string(),
        };
        state.rows.insert((table.clone(), date.clone(), key), row);
    }
    let root = body["rootFolder"].as_str().unwrap_or_default();
    Json(json!({
        "ok": true,
        "targetLocation": format!("fake://{root}/{date}"),
        "sheetName": date,
    }))
    .into_response()
}

fn bare_status(status: u16) -> Response {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, "busy").into_response()
}
