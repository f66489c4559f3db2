//! # Redactor 共有型定義
//!
//! クライアントとEnclaveサーバーの間でやり取りされるJSON構造を
//! Rust構造体として提供する。
//!
//! ## エンコーディング規則
//! - Base64 (Standard): バイナリデータ（暗号文、ラップ済みセッション鍵）
//! - PEM (SPKI): Enclaveの公開鍵
//! - 16進数（小文字）: PCR測定値

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// /handshake が返す鍵アルゴリズム識別子。
pub const ALGORITHM_RSA_2048: &str = "RSA-2048";

/// /attestation レスポンス本文でPCR一覧の直前に置かれる行頭文字列。
pub const ATTESTATION_PCR_HEADER: &str = "PCRs retrieved from enclave's attestation document:";

// ---------------------------------------------------------------------------
// 秘匿化戦略
// ---------------------------------------------------------------------------

/// 秘匿化サービスに渡す置換方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionStrategy {
    /// エンティティ種別タグで置換（例: `<PERSON>`）
    #[default]
    Replace,
    /// アスタリスクで置換（例: `****`）
    Mask,
    /// それらしいダミーデータで置換
    Fake,
    /// 独自タグで置換（例: `[REDACTED_NAME]`）
    Custom,
}

impl RedactionStrategy {
    /// 全戦略の一覧。
    pub const ALL: [RedactionStrategy; 4] = [
        RedactionStrategy::Replace,
        RedactionStrategy::Mask,
        RedactionStrategy::Fake,
        RedactionStrategy::Custom,
    ];

    /// ワイヤ上の文字列表現。
    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionStrategy::Replace => "replace",
            RedactionStrategy::Mask => "mask",
            RedactionStrategy::Fake => "fake",
            RedactionStrategy::Custom => "custom",
        }
    }
}

impl fmt::Display for RedactionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知の秘匿化戦略名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知の秘匿化戦略: {}", self.0)
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for RedactionStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RedactionStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ハンドシェイク
// ---------------------------------------------------------------------------

/// GET /handshake レスポンス。
/// Enclaveが起動時に生成したエフェメラル公開鍵を返す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// 鍵アルゴリズム識別子（例: "RSA-2048"）
    pub algorithm: String,
    /// PEMエンコードされたSPKI公開鍵
    pub public_key: String,
}

// ---------------------------------------------------------------------------
// アップロード / ダウンロード
// ---------------------------------------------------------------------------

/// POST /upload リクエスト。SecureEnvelopeのワイヤ表現。
///
/// `file_name` と `redaction_strategy` は暗号化されずに送られる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Base64エンコードされた `nonce(12B) || ChaCha20-Poly1305暗号文 || tag(16B)`
    pub encrypted_data: String,
    /// Base64エンコードされたRSA-OAEP(SHA-256)ラップ済みセッション鍵
    pub encrypted_session_key: String,
    /// 論理ファイル名（拡張子なし）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// 秘匿化戦略（省略時は `replace`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redaction_strategy: Option<RedactionStrategy>,
}

/// POST /upload レスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// 秘匿化結果を取得するための不透明な識別子
    pub file_id: String,
    /// サーバー側で付与された保存ファイル名
    pub filename: String,
    /// 人間向けメッセージ
    pub message: String,
}

/// GET /health レスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

// ---------------------------------------------------------------------------
// 秘匿化サービス (Presidio互換)
// ---------------------------------------------------------------------------

/// POST {PRESIDIO_URL}/redact リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactRequest {
    pub text: String,
    pub strategy: RedactionStrategy,
}

/// POST {PRESIDIO_URL}/redact レスポンス。
/// `redacted_text` 以外のフィールドは参考情報として扱う。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactResponse {
    /// 秘匿化後のテキスト
    pub redacted_text: String,
    /// サービス側が実際に適用した戦略
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<String>,
    /// 検出されたエンティティ種別
    #[serde(default)]
    pub entities_found: Vec<String>,
}
