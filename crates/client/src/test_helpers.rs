//! # テスト用モックEnclave
//!
//! session, pipelineテストで共有する。`127.0.0.1:0` にaxumサーバーを立て、
//! 本物の鍵ペアでエンベロープを開封する。秘匿化の代わりに大文字化する。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use rand::SeedableRng;
use redactor_crypto::{EnclaveKeyPair, SecureEnvelope};
use redactor_types::{UploadRequest, UploadResponse};

use crate::session::{ClientConfig, RedactorClient};

/// モックの振る舞い設定。
pub struct MockEnclave {
    pub attestation_text: String,
    /// 設定時は /handshake がこのJSONをそのまま返す
    pub handshake_override: Option<serde_json::Value>,
    /// 最初のN回の /handshake を503で失敗させる
    pub handshake_failures: u32,
    /// /upload が空のfile_idを返す
    pub empty_file_id: bool,
}

impl Default for MockEnclave {
    fn default() -> Self {
        let zero = "00".repeat(48);
        Self {
            attestation_text: format!(
                "PCRs retrieved from enclave's attestation document: 0: {zero}, 1: {zero}, 2: {zero}\n"
            ),
            handshake_override: None,
            handshake_failures: 0,
            empty_file_id: false,
        }
    }
}

/// 起動済みモックへのハンドル。呼び出し回数を観測できる。
pub struct MockHandle {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockHandle {
    pub fn handshakes(&self) -> u32 {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> u32 {
        self.state.uploads.load(Ordering::SeqCst)
    }

    pub fn attestations(&self) -> u32 {
        self.state.attestations.load(Ordering::SeqCst)
    }
}

pub struct MockState {
    config: MockEnclave,
    handshakes: AtomicU32,
    uploads: AtomicU32,
    attestations: AtomicU32,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

/// テスト全体で共有する2048bit鍵ペア（生成が重いため1回だけ作る）。
pub fn shared_keypair() -> &'static EnclaveKeyPair {
    static KEYPAIR: OnceLock<EnclaveKeyPair> = OnceLock::new();
    KEYPAIR.get_or_init(|| {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xc11e);
        EnclaveKeyPair::generate(&mut rng, 2048).unwrap()
    })
}

pub fn client_for(handle: &MockHandle) -> RedactorClient {
    RedactorClient::new(&ClientConfig {
        base_url: handle.base_url.clone(),
        timeout: Duration::from_secs(10),
        ..Default::default()
    })
    .unwrap()
}

/// 何も待ち受けていないポートを返す。
pub async fn unused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "redactor-enclave" }))
}

async fn handle_attestation(State(state): State<Arc<MockState>>) -> String {
    state.attestations.fetch_add(1, Ordering::SeqCst);
    state.config.attestation_text.clone()
}

async fn handle_handshake(State(state): State<Arc<MockState>>) -> Response {
    let n = state.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
    if n <= state.config.handshake_failures {
        return (StatusCode::SERVICE_UNAVAILABLE, "starting up").into_response();
    }
    if let Some(body) = &state.config.handshake_override {
        return Json(body.clone()).into_response();
    }
    Json(serde_json::json!({
        "algorithm": "RSA-2048",
        "public_key": shared_keypair().public_key_pem().unwrap(),
    }))
    .into_response()
}

async fn handle_upload(
    State(state): State<Arc<MockState>>,
    Json(request): Json<UploadRequest>,
) -> Response {
    let n = state.uploads.fetch_add(1, Ordering::SeqCst) + 1;
    let opened = SecureEnvelope::from_upload_request(&request)
        .and_then(|envelope| envelope.open(shared_keypair()));
    let plaintext = match opened {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let file_id = if state.config.empty_file_id {
        String::new()
    } else {
        format!("mock-{n}")
    };
    let strategy = request.redaction_strategy.unwrap_or_default();
    let name = request.file_name.as_deref().unwrap_or("file");
    let redacted = String::from_utf8_lossy(&plaintext).to_uppercase();
    state
        .files
        .lock()
        .unwrap()
        .insert(file_id.clone(), redacted.into_bytes());

    Json(UploadResponse {
        filename: format!("{name}_{strategy}_redacted_{file_id}.txt"),
        file_id,
        message: "File uploaded and redacted successfully".into(),
    })
    .into_response()
}

async fn handle_download(
    State(state): State<Arc<MockState>>,
    Path(file_id): Path<String>,
) -> Response {
    match state.files.lock().unwrap().get(&file_id) {
        Some(content) => content.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

/// モックEnclaveを起動する。
pub async fn start_mock_enclave(config: MockEnclave) -> MockHandle {
    let state = Arc::new(MockState {
        config,
        handshakes: AtomicU32::new(0),
        uploads: AtomicU32::new(0),
        attestations: AtomicU32::new(0),
        files: Mutex::new(HashMap::new()),
    });

    let app = axum::Router::new()
        .route("/health", get(handle_health))
        .route("/attestation", get(handle_attestation))
        .route("/handshake", get(handle_handshake))
        .route("/upload", post(handle_upload))
        .route("/download/{file_id}", get(handle_download))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    MockHandle {
        base_url: format!("http://127.0.0.1:{port}"),
        state,
    }
}
