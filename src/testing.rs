//! In-process stand-in for the ingestion service, used by tests.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;

use crate::client::ingest_client::{Document, IngestClient};

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub endpoint: String,
    pub body: String,
}

#[derive(Default)]
struct FakeState {
    documents: Vec<Document>,
    fail_documents: bool,
    fail_queries: bool,
    fail_uploads: bool,
    queries: Vec<String>,
    uploads: Vec<RecordedUpload>,
    excluded: Vec<String>,
    status_name: String,
    status_script: VecDeque<String>,
    status_last: Option<String>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeIngest {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeIngest {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/api/getDocuments", get(documents))
            .route("/api/uploadFile", post(upload_file))
            .route("/api/uploadVideoAsync", post(upload_video))
            .route("/api/uploadVideo_status", get(status).post(exclude))
            .route("/api/query", get(query))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn client(&self) -> IngestClient {
        IngestClient::new(format!("http://{}/", self.addr), Duration::from_secs(5)).unwrap()
    }

    pub fn set_documents(&self, docs: Vec<Document>) {
        self.state.lock().unwrap().documents = docs;
    }

    pub fn fail_documents(&self) {
        self.state.lock().unwrap().fail_documents = true;
    }

    pub fn fail_queries(&self) {
        self.state.lock().unwrap().fail_queries = true;
    }

    pub fn fail_uploads(&self) {
        self.state.lock().unwrap().fail_uploads = true;
    }

    /// One value per status request; the last one repeats.
    pub fn script_status(&self, name: &str, values: &[&str]) {
        let mut s = self.state.lock().unwrap();
        s.status_name = name.to_string();
        s.status_script = values.iter().map(|v| v.to_string()).collect();
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn excluded(&self) -> Vec<String> {
        self.state.lock().unwrap().excluded.clone()
    }
}

impl Drop for FakeIngest {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn documents(State(state): State<Shared>) -> Response {
    let s = state.lock().unwrap();
    if s.fail_documents {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(s.documents.clone()).into_response()
}

async fn upload_file(State(state): State<Shared>, body: Bytes) -> Response {
    record_upload(&state, "/api/uploadFile", &body)
}

async fn upload_video(State(state): State<Shared>, body: Bytes) -> Response {
    record_upload(&state, "/api/uploadVideoAsync", &body)
}

fn record_upload(state: &Shared, endpoint: &str, body: &[u8]) -> Response {
    let mut s = state.lock().unwrap();
    if s.fail_uploads {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error: disk full").into_response();
    }
    s.uploads.push(RecordedUpload {
        endpoint: endpoint.to_string(),
        body: String::from_utf8_lossy(body).into_owned(),
    });
    "File inserted!".into_response()
}

async fn status(State(state): State<Shared>) -> Json<Value> {
    let mut s = state.lock().unwrap();
    if let Some(next) = s.status_script.pop_front() {
        s.status_last = Some(next);
    }

    let mut board = Map::new();
    if let Some(value) = &s.status_last {
        board.insert(format!("video:{}", s.status_name), Value::String(value.clone()));
    }
    board.insert("video:someone-else".into(), Value::String("12%".into()));
    Json(Value::Object(board))
}

async fn exclude(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    if body["progress"] != "Exclude" {
        return StatusCode::BAD_REQUEST;
    }
    let name = body["name"].as_str().unwrap_or_default().to_string();
    state.lock().unwrap().excluded.push(name);
    StatusCode::OK
}

async fn query(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock().unwrap();
    if s.fail_queries {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let text = params.get("text").cloned().unwrap_or_default();
    s.queries.push(text.clone());

    Json(json!({
        "text": format!("answer to: {text}"),
        "sources": [{
            "text": "snippet",
            "doc_id": "doc.pdf",
            "start": 0,
            "end": 7,
            "similarity": 0.87,
        }],
    }))
    .into_response()
}
