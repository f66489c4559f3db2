//! # Enclave エラー型
//!
//! 全エンドポイントで共通のエラー型。HTTPステータスへの対応は
//! [`IntoResponse`](axum::response::IntoResponse) 実装で一元管理する。

use axum::http::StatusCode;
use redactor_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum EnclaveError {
    /// 不正なリクエスト（パース失敗、エンベロープ不備、復号失敗）
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 指定されたファイルが存在しない
    #[error("ファイルが見つかりません: {0}")]
    NotFound(String),
    /// 秘匿化サービスとの通信失敗
    #[error("秘匿化サービスとの通信に失敗: {0}")]
    BadGateway(String),
    /// 内部エラー（鍵のエクスポート失敗等）
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<CryptoError> for EnclaveError {
    /// 受信したエンベロープに起因する暗号エラーは全てクライアント側の問題として扱う。
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyGeneration(_) | CryptoError::KeyExport(_) => {
                EnclaveError::Internal(e.to_string())
            }
            _ => EnclaveError::BadRequest(e.to_string()),
        }
    }
}

impl axum::response::IntoResponse for EnclaveError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            EnclaveError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EnclaveError::NotFound(_) => StatusCode::NOT_FOUND,
            EnclaveError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            EnclaveError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (EnclaveError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (EnclaveError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (EnclaveError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
            (
                EnclaveError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_crypto_error_mapping() {
        assert!(matches!(
            EnclaveError::from(CryptoError::DecryptError),
            EnclaveError::BadRequest(_)
        ));
        assert!(matches!(
            EnclaveError::from(CryptoError::MalformedEnvelope("empty".into())),
            EnclaveError::BadRequest(_)
        ));
        assert!(matches!(
            EnclaveError::from(CryptoError::KeyExport("pem".into())),
            EnclaveError::Internal(_)
        ));
    }
}
