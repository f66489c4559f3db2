//! # ローカル開発用モックランタイム
//!
//! Enclaveハードウェアが利用できない開発環境で使用する。
//! メモリ内で鍵を生成し、固定のPCR値を返す。

use std::sync::Arc;

use rand::{CryptoRng, RngCore};
use redactor_crypto::attestation::{Digest, MeasurementSet, SHA384_DIGEST_LEN};
use redactor_crypto::{CryptoError, EnclaveKeyPair};

use super::EnclaveRuntime;

/// Nitro Enclaveのdebug-modeと同等のPCR（PCR0〜2が48バイトのゼロ）。
pub fn debug_mode_pcrs() -> MeasurementSet {
    (0..=2)
        .map(|index| (index, Digest::from_bytes(vec![0u8; SHA384_DIGEST_LEN])))
        .collect()
}

pub struct MockRuntime {
    keypair: Arc<EnclaveKeyPair>,
    pcrs: MeasurementSet,
}

impl MockRuntime {
    pub fn new(keypair: Arc<EnclaveKeyPair>, pcrs: MeasurementSet) -> Self {
        Self { keypair, pcrs }
    }

    /// 鍵ペアを生成してランタイムを構築する。`pcrs` 未指定時はdebug-modeのPCRを使う。
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        bits: usize,
        pcrs: Option<MeasurementSet>,
    ) -> Result<Self, CryptoError> {
        let keypair = EnclaveKeyPair::generate(rng, bits)?;
        Ok(Self::new(
            Arc::new(keypair),
            pcrs.unwrap_or_else(debug_mode_pcrs),
        ))
    }
}

impl EnclaveRuntime for MockRuntime {
    fn runtime_type(&self) -> &str {
        "mock"
    }

    fn keypair(&self) -> &EnclaveKeyPair {
        &self.keypair
    }

    fn measurements(&self) -> MeasurementSet {
        self.pcrs.clone()
    }
}
