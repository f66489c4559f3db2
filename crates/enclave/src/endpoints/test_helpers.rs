//! # エンドポイントテスト用共通ヘルパー
//!
//! 共有鍵ペア・モック秘匿化サービス・テスト用サーバー起動。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use rand::SeedableRng;
use redactor_crypto::attestation::MeasurementSet;
use redactor_crypto::EnclaveKeyPair;
use redactor_types::RedactionStrategy;

use crate::config::EnclaveState;
use crate::error::EnclaveError;
use crate::redactor::Redactor;
use crate::runtime::mock::{debug_mode_pcrs, MockRuntime};
use crate::storage::FileStore;

/// テスト全体で共有する2048bit鍵ペア。
pub fn shared_keypair() -> Arc<EnclaveKeyPair> {
    static KEYPAIR: OnceLock<Arc<EnclaveKeyPair>> = OnceLock::new();
    KEYPAIR
        .get_or_init(|| {
            let mut rng = rand::rngs::StdRng::seed_from_u64(0xe9c1a7e);
            Arc::new(EnclaveKeyPair::generate(&mut rng, 2048).unwrap())
        })
        .clone()
}

/// "John Doe" を戦略ごとの置換文字列にするモック秘匿化サービス。
#[derive(Default)]
pub struct MockRedactor {
    /// trueなら常にBadGatewayを返す
    pub fail: bool,
    pub calls: Arc<AtomicU32>,
}

impl MockRedactor {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// 呼び出し回数のカウンタ（state構築後も観測できるよう共有する）
    pub fn counter(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }
}

#[async_trait::async_trait]
impl Redactor for MockRedactor {
    async fn redact(&self, text: &str, strategy: RedactionStrategy) -> Result<String, EnclaveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EnclaveError::BadGateway("presidio unavailable".into()));
        }
        let replacement = match strategy {
            RedactionStrategy::Replace => "<PERSON>",
            RedactionStrategy::Mask => "****",
            RedactionStrategy::Fake => "Alice Johnson",
            RedactionStrategy::Custom => "[REDACTED_NAME]",
        };
        Ok(text.replace("John Doe", replacement))
    }
}

pub fn test_state_with(redactor: MockRedactor, pcrs: MeasurementSet) -> Arc<EnclaveState> {
    Arc::new(EnclaveState::new(
        Box::new(MockRuntime::new(shared_keypair(), pcrs)),
        Box::new(redactor),
        FileStore::default(),
    ))
}

pub fn test_state() -> Arc<EnclaveState> {
    test_state_with(MockRedactor::default(), debug_mode_pcrs())
}

/// ルーター全体を `127.0.0.1:0` で起動し、ベースURLを返す。
pub async fn start_enclave(state: Arc<EnclaveState>) -> String {
    let app = super::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}
