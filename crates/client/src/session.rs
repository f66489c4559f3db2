//! # Enclave HTTPセッション
//!
//! Enclaveサーバーの各エンドポイントを1リクエストずつ呼び出す。
//! 再試行や検証の組み立ては [`crate::pipeline`] が担い、ここでは状態を持たない。
//!
//! | メソッド | エンドポイント |
//! |---------|--------------|
//! | [`RedactorClient::health`] | `GET /health` |
//! | [`RedactorClient::fetch_measurements`] | `GET /attestation` |
//! | [`RedactorClient::handshake`] | `GET /handshake` |
//! | [`RedactorClient::upload`] | `POST /upload` |
//! | [`RedactorClient::download`] / [`RedactorClient::download_by_id`] | `GET /download/{file_id}` |

use std::time::Duration;

use redactor_crypto::attestation::{verify, MeasurementSet, VerificationVerdict};
use redactor_crypto::{EnclavePublicKey, SecureEnvelope};
use redactor_types::{HandshakeResponse, HealthResponse, UploadResponse};
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// クライアントの接続設定。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// EnclaveのベースURL（例: `http://localhost:10003`）
    pub base_url: String,
    /// 1リクエストあたりのタイムアウト
    pub timeout: Duration,
    /// 自己署名証明書を受け入れる（開発環境用）
    pub accept_invalid_certs: bool,
    /// PCRダイジェスト長（バイト）の要求値。指定時は期待値・実測値の両方に適用する。
    pub digest_len: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:10003".to_string(),
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            digest_len: None,
        }
    }
}

/// Enclaveサーバーへのクライアント。
#[derive(Debug, Clone)]
pub struct RedactorClient {
    base_url: String,
    http: reqwest::Client,
    digest_len: Option<usize>,
}

impl RedactorClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ClientError::transport(format!("HTTPクライアントの構築に失敗: {e}")))?;
        if config.accept_invalid_certs {
            tracing::warn!("TLS証明書の検証を無効化しています（開発環境用）");
        }
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            digest_len: config.digest_len,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// 2xx以外をTransportエラーに変換する。
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Transport {
            status: Some(status.as_u16()),
            message: format!("Enclaveがエラーを返しました: HTTP {status} - {body}"),
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("HTTP送信失敗 ({url}): {e}")))?;
        Self::check_status(response).await
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ClientError> {
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::transport(format!("レスポンス読み取り失敗: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| ClientError::Protocol(format!("{what}のパースに失敗: {e}")))
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.get("/health").await?;
        Self::read_json(response, "ヘルスチェック応答").await
    }

    /// `GET /attestation` の応答テキストから実測PCRを取得する。
    pub async fn fetch_measurements(&self) -> Result<MeasurementSet, ClientError> {
        let response = self.get("/attestation").await?;
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::transport(format!("レスポンス読み取り失敗: {e}")))?;
        let measurements = MeasurementSet::parse_attestation_text(&text)?;
        if let Some(len) = self.digest_len {
            measurements.require_digest_len(len)?;
        }
        tracing::debug!(pcr_count = measurements.len(), "Attestationを取得しました");
        Ok(measurements)
    }

    /// 実測PCRを取得し、期待値と比較する。判定結果の扱いは呼び出し側が決める。
    pub async fn verify_attestation(
        &self,
        expected: &MeasurementSet,
    ) -> Result<VerificationVerdict, ClientError> {
        if let Some(len) = self.digest_len {
            expected.require_digest_len(len)?;
        }
        let actual = self.fetch_measurements().await?;
        let verdict = verify(expected, &actual);
        tracing::info!(
            status = %verdict.status,
            expected = expected.len(),
            actual = actual.len(),
            "PCR検証を実行しました"
        );
        Ok(verdict)
    }

    /// `GET /handshake` でEnclaveのエフェメラル公開鍵を取得する。
    ///
    /// 1回だけ試行し、状態は保持しない。
    pub async fn handshake(&self) -> Result<EnclavePublicKey, ClientError> {
        let response = self.get("/handshake").await?;
        let handshake: HandshakeResponse = Self::read_json(response, "ハンドシェイク応答").await?;
        let public_key = EnclavePublicKey::from_pem(&handshake.algorithm, &handshake.public_key)?;
        tracing::debug!(
            algorithm = public_key.algorithm(),
            bits = public_key.modulus_bits(),
            "Enclave公開鍵を受信しました"
        );
        Ok(public_key)
    }

    /// `POST /upload` でエンベロープを送信する。
    pub async fn upload(&self, envelope: &SecureEnvelope) -> Result<UploadResponse, ClientError> {
        let url = self.url("/upload");
        let response = self
            .http
            .post(&url)
            .json(&envelope.to_upload_request())
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("HTTP送信失敗 ({url}): {e}")))?;
        let response = Self::check_status(response).await?;
        let ack: UploadResponse = Self::read_json(response, "アップロード応答").await?;
        if ack.file_id.trim().is_empty() {
            return Err(ClientError::Protocol(
                "アップロード応答にfile_idが含まれていません".into(),
            ));
        }
        tracing::info!(file_id = %ack.file_id, filename = %ack.filename, "アップロード完了");
        Ok(ack)
    }

    /// アップロード応答が示す秘匿化結果を取得する。
    pub async fn download(&self, record: &UploadResponse) -> Result<Vec<u8>, ClientError> {
        self.download_by_id(&record.file_id).await
    }

    /// `GET /download/{file_id}` で秘匿化済みの内容を取得する。
    pub async fn download_by_id(&self, file_id: &str) -> Result<Vec<u8>, ClientError> {
        let file_id = file_id.trim();
        if file_id.is_empty() || file_id.contains(['/', '?', '#']) {
            return Err(ClientError::Protocol(format!("不正なfile_id: {file_id:?}")));
        }
        let response = self.get(&format!("/download/{file_id}")).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport(format!("レスポンス読み取り失敗: {e}")))?;
        tracing::debug!(file_id, len = bytes.len(), "ダウンロード完了");
        Ok(bytes.to_vec())
    }
}
