//! # /handshake エンドポイント
//!
//! 起動時に生成したエフェメラルRSA公開鍵をPEMで返す。
//! クライアントはこの鍵でセッション鍵をラップする。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use redactor_types::HandshakeResponse;

use crate::config::EnclaveState;
use crate::error::EnclaveError;

pub async fn handle_handshake(
    State(state): State<Arc<EnclaveState>>,
) -> Result<Json<HandshakeResponse>, EnclaveError> {
    let keypair = state.runtime.keypair();
    let public_key = keypair.public_key_pem()?;
    Ok(Json(HandshakeResponse {
        algorithm: keypair.public_key().algorithm().to_string(),
        public_key,
    }))
}
