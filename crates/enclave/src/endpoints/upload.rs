//! # /upload エンドポイント
//!
//! ## 処理フロー
//! 1. リクエストをパースし、エンベロープの欠落・Base64不正を拒否
//! 2. RSA-OAEPでセッション鍵をアンラップし、ChaCha20-Poly1305で復号
//! 3. 秘匿化サービスでPIIを除去
//! 4. 結果をメモリ内ストアに保存し、file_idを返す（上限超過時は最古の結果を破棄）
//!
//! 平文はこのハンドラの外に出ない。ログにも出力しない。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use redactor_crypto::SecureEnvelope;
use redactor_types::{UploadRequest, UploadResponse};

use crate::config::EnclaveState;
use crate::error::EnclaveError;
use crate::storage::StoredFile;

/// ファイル名の最大長（文字数）
const MAX_FILE_NAME_LEN: usize = 128;

pub async fn handle_upload(
    State(state): State<Arc<EnclaveState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<UploadResponse>, EnclaveError> {
    let request: UploadRequest = serde_json::from_value(body)
        .map_err(|e| EnclaveError::BadRequest(format!("UploadRequestのパースに失敗: {e}")))?;

    let file_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(%file_id, "アップロードを受信しました");

    let envelope = SecureEnvelope::from_upload_request(&request)?;
    let plaintext = envelope.open(state.runtime.keypair()).map_err(|e| {
        tracing::warn!(%file_id, error = %e, "エンベロープの復号に失敗");
        EnclaveError::from(e)
    })?;
    let text = String::from_utf8(plaintext)
        .map_err(|_| EnclaveError::BadRequest("復号結果がUTF-8テキストではありません".into()))?;

    let strategy = envelope.redaction_strategy;
    let redacted = state.redactor.redact(&text, strategy).await.map_err(|e| {
        tracing::warn!(%file_id, error = %e, "秘匿化に失敗");
        e
    })?;

    let name = sanitize_file_name(envelope.file_name.as_deref());
    let filename = format!("{name}_{strategy}_redacted_{file_id}.txt");
    let evicted = state
        .store
        .store(
            &file_id,
            StoredFile {
                file_name: filename.clone(),
                content: redacted,
            },
        )
        .await;
    if let Some(evicted) = evicted {
        tracing::warn!(%evicted, "保持件数の上限に達したため古い秘匿化結果を破棄しました");
    }

    let stored = state.store.len().await;
    tracing::info!(
        %file_id,
        %strategy,
        stored,
        "秘匿化結果を保存しました"
    );
    Ok(Json(UploadResponse {
        file_id,
        filename,
        message: "File uploaded and redacted successfully".to_string(),
    }))
}

/// Content-Dispositionに載せられる文字だけを残す。空なら `file`。
fn sanitize_file_name(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .trim()
        .chars()
        .take(MAX_FILE_NAME_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name(Some("report")), "report");
        assert_eq!(sanitize_file_name(Some("q3-notes_v2")), "q3-notes_v2");
        assert_eq!(sanitize_file_name(Some("a\"b/c\r\n")), "a_b_c");
        assert_eq!(sanitize_file_name(Some("..")), "file");
        assert_eq!(sanitize_file_name(Some("   ")), "file");
        assert_eq!(sanitize_file_name(None), "file");
        assert_eq!(sanitize_file_name(Some(&"x".repeat(500))).len(), MAX_FILE_NAME_LEN);
    }
}
