//! # クライアントエラー型
//!
//! 呼び出し側が再試行の可否を判断できるよう、失敗を種類ごとに分類する。
//! 再試行してよいのは [`ClientError::Transport`] のみ。

use redactor_crypto::attestation::{ParseError, VerificationVerdict};
use redactor_crypto::CryptoError;

/// クライアント操作のエラー。
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Attestation応答または期待値ファイルが想定形式でない
    #[error("Attestationデータの解析に失敗: {0}")]
    Parse(#[from] ParseError),
    /// 接続不能・タイムアウト・2xx以外のステータス
    #[error("通信エラー: {message}")]
    Transport {
        /// HTTPステータス（応答を受け取れた場合のみ）
        status: Option<u16>,
        message: String,
    },
    /// 公開鍵が不正、または未対応のアルゴリズム
    #[error("公開鍵の形式エラー: {0}")]
    KeyFormat(CryptoError),
    /// ラップ・封入・復号の失敗（改ざん検知を含む）
    #[error("暗号処理エラー: {0}")]
    Crypto(CryptoError),
    /// サーバー応答が不正・不完全
    #[error("プロトコルエラー: {0}")]
    Protocol(String),
    /// PCR検証がPASSにならなかった
    #[error("Attestation検証に失敗しました ({})", .0.status)]
    AttestationRejected(VerificationVerdict),
    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// 新しいハンドシェイクからやり直してよい失敗かどうか。
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// 応答で返ったHTTPステータス。
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        ClientError::Transport {
            status: None,
            message: message.into(),
        }
    }
}

impl From<CryptoError> for ClientError {
    fn from(e: CryptoError) -> Self {
        if e.is_key_format() {
            ClientError::KeyFormat(e)
        } else {
            ClientError::Crypto(e)
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
