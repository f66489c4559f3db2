//! # /download/{file_id} エンドポイント
//!
//! - `GET`: 秘匿化済みテキストを `text/plain` の添付ファイルとして返す
//! - `DELETE`: 秘匿化済みテキストをストアから消去する

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::EnclaveState;
use crate::error::EnclaveError;

pub async fn handle_download(
    State(state): State<Arc<EnclaveState>>,
    Path(file_id): Path<String>,
) -> Result<Response, EnclaveError> {
    let file = state
        .store
        .get(&file_id)
        .await
        .ok_or_else(|| EnclaveError::NotFound(file_id.clone()))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.file_name))
        .map_err(|e| EnclaveError::Internal(format!("Content-Dispositionの構築に失敗: {e}")))?;

    tracing::info!(%file_id, "秘匿化結果を返却します");
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    )
        .into_response())
}

pub async fn handle_delete(
    State(state): State<Arc<EnclaveState>>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, EnclaveError> {
    if !state.store.remove(&file_id).await {
        return Err(EnclaveError::NotFound(file_id));
    }
    tracing::info!(%file_id, "秘匿化結果を削除しました");
    Ok(StatusCode::NO_CONTENT)
}
