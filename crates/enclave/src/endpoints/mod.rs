//! # Enclaveエンドポイント
//!
//! | メソッド | パス | ハンドラ |
//! |---------|------|---------|
//! | GET | `/health` | [`handle_health`] |
//! | GET | `/handshake` | [`handle_handshake`] |
//! | GET | `/attestation` | [`handle_attestation`] |
//! | POST | `/upload` | [`handle_upload`] |
//! | GET | `/download/{file_id}` | [`handle_download`] |
//! | DELETE | `/download/{file_id}` | [`handle_delete`] |

pub mod attestation;
pub mod download;
pub mod handshake;
pub mod health;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use redactor_crypto::{MAX_PLAINTEXT_LEN, NONCE_LEN, TAG_LEN};

use crate::config::EnclaveState;

pub use attestation::handle_attestation;
pub use download::{handle_delete, handle_download};
pub use handshake::handle_handshake;
pub use health::handle_health;
pub use upload::handle_upload;

/// /upload のリクエストボディ上限。最大平文をBase64化したサイズにJSONの余白を加える。
pub const MAX_UPLOAD_BODY_BYTES: usize = (MAX_PLAINTEXT_LEN + NONCE_LEN + TAG_LEN).div_ceil(3) * 4 + 64 * 1024;

/// 全エンドポイントを登録したルーターを構築する。
pub fn router(state: Arc<EnclaveState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/handshake", get(handle_handshake))
        .route("/attestation", get(handle_attestation))
        .route("/upload", post(handle_upload))
        .route("/download/{file_id}", get(handle_download).delete(handle_delete))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .with_state(state)
}
