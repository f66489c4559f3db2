//! # Redactor Enclaveサーバー
//!
//! 平文を受け取って秘匿化するEnclave側のエントリポイント。
//!
//! ## 起動シーケンス
//! 1. 環境変数から設定を読み込む
//! 2. エフェメラルRSA鍵ペアを生成（プロセス終了まで保持）
//! 3. 秘匿化サービスのクライアントを構築
//! 4. /health, /attestation, /handshake, /upload, /download の受付開始

mod config;
mod endpoints;
mod error;
mod redactor;
mod runtime;
mod storage;

use std::sync::Arc;

use config::{EnclaveConfig, EnclaveState};
use redactor::PresidioRedactor;
use runtime::mock::MockRuntime;
use runtime::EnclaveRuntime;
use storage::FileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = EnclaveConfig::from_env()?;

    tracing::info!(bits = config.rsa_key_bits, "鍵を生成中...");
    let runtime = MockRuntime::generate(
        &mut rand::rngs::OsRng,
        config.rsa_key_bits,
        config.mock_pcrs.clone(),
    )?;
    tracing::info!(runtime = runtime.runtime_type(), "鍵生成完了");

    let redactor = PresidioRedactor::new(&config.presidio_url, config.redactor_timeout)?;
    tracing::info!("秘匿化サービス: {}", config.presidio_url);

    let state = Arc::new(EnclaveState::new(
        Box::new(runtime),
        Box::new(redactor),
        FileStore::with_capacity(config.max_stored_files),
    ));
    let app = endpoints::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Enclaveサーバーを {} で起動します", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
