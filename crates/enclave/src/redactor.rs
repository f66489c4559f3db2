//! # 秘匿化サービスクライアント
//!
//! 復号済みテキストからPIIを除去する外部サービスの抽象インターフェースと、
//! Presidioサービス（`POST {PRESIDIO_URL}/redact`）による実装。

use std::time::Duration;

use redactor_types::{RedactRequest, RedactResponse, RedactionStrategy};

use crate::error::EnclaveError;

/// 秘匿化サービスの抽象インターフェース。
#[async_trait::async_trait]
pub trait Redactor: Send + Sync {
    /// `text` を `strategy` に従って秘匿化する。
    async fn redact(&self, text: &str, strategy: RedactionStrategy) -> Result<String, EnclaveError>;
}

/// Presidioサービスによる秘匿化。
pub struct PresidioRedactor {
    http: reqwest::Client,
    endpoint: String,
}

impl PresidioRedactor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EnclaveError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnclaveError::Internal(format!("HTTPクライアントの構築に失敗: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/redact", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl Redactor for PresidioRedactor {
    async fn redact(&self, text: &str, strategy: RedactionStrategy) -> Result<String, EnclaveError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&RedactRequest {
                text: text.to_string(),
                strategy,
            })
            .send()
            .await
            .map_err(|e| EnclaveError::BadGateway(format!("HTTP送信失敗: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EnclaveError::BadGateway(format!("レスポンス読み取り失敗: {e}")))?;
        if !status.is_success() {
            return Err(EnclaveError::BadGateway(format!(
                "秘匿化サービスがエラーを返しました: HTTP {status} - {body}"
            )));
        }

        let result: RedactResponse = serde_json::from_str(&body)
            .map_err(|e| EnclaveError::BadGateway(format!("レスポンスのパースに失敗: {e}")))?;
        tracing::debug!(
            strategy = %strategy,
            entities = result.entities_found.len(),
            "秘匿化完了"
        );
        Ok(result.redacted_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Json;

    /// モックPresidioを起動し、受け取った戦略名をタグとして返す
    async fn start_mock_presidio(fail: bool) -> String {
        let app = axum::Router::new().route(
            "/redact",
            post(move |Json(req): Json<serde_json::Value>| async move {
                if fail {
                    return Err((axum::http::StatusCode::INTERNAL_SERVER_ERROR, "model not loaded"));
                }
                let text = req["text"].as_str().unwrap_or_default();
                let strategy = req["strategy"].as_str().unwrap_or_default();
                Ok(Json(serde_json::json!({
                    "redacted_text": text.replace("John Doe", &format!("<{strategy}>")),
                    "strategy_used": strategy,
                    "entities_found": ["PERSON"],
                })))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        format!("http://127.0.0.1:{port}/")
    }

    #[tokio::test]
    async fn test_presidio_redact() {
        let url = start_mock_presidio(false).await;
        let redactor = PresidioRedactor::new(&url, Duration::from_secs(5)).unwrap();
        let redacted = redactor
            .redact("My name is John Doe", RedactionStrategy::Mask)
            .await
            .unwrap();
        assert_eq!(redacted, "My name is <mask>");
    }

    #[tokio::test]
    async fn test_presidio_error_is_bad_gateway() {
        let url = start_mock_presidio(true).await;
        let redactor = PresidioRedactor::new(&url, Duration::from_secs(5)).unwrap();
        let err = redactor
            .redact("John Doe", RedactionStrategy::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, EnclaveError::BadGateway(_)));
    }

    #[tokio::test]
    async fn test_presidio_unreachable_is_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let redactor =
            PresidioRedactor::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2))
                .unwrap();
        let err = redactor
            .redact("John Doe", RedactionStrategy::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, EnclaveError::BadGateway(_)));
    }
}
