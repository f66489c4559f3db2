//! # /attestation エンドポイント
//!
//! ランタイムのPCR測定値を1行のテキストで返す。
//!
//! ```text
//! PCRs retrieved from enclave's attestation document: 0: <hex>, 1: <hex>, 2: <hex>
//! ```

use std::sync::Arc;

use axum::extract::State;
use redactor_crypto::attestation::MeasurementSet;
use redactor_types::ATTESTATION_PCR_HEADER;

use crate::config::EnclaveState;

/// PCR一覧を応答テキストに整形する。インデックス昇順。
pub fn render_attestation_text(pcrs: &MeasurementSet) -> String {
    let entries: Vec<String> = pcrs
        .iter()
        .map(|(index, digest)| format!("{index}: {digest}"))
        .collect();
    format!("{ATTESTATION_PCR_HEADER} {}\n", entries.join(", "))
}

pub async fn handle_attestation(State(state): State<Arc<EnclaveState>>) -> String {
    let pcrs = state.runtime.measurements();
    tracing::debug!(
        runtime = state.runtime.runtime_type(),
        pcr_count = pcrs.len(),
        "Attestationを返却します"
    );
    render_attestation_text(&pcrs)
}
