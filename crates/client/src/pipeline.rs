//! # 秘匿化パイプライン
//!
//! 1回のアップロードを次の順で実行する:
//!
//! 1. Attestation検証（[`AttestationPolicy::Require`] の場合）
//! 2. ハンドシェイク（Enclaveのエフェメラル公開鍵取得）
//! 3. 新しいセッション鍵でペイロードを封入
//! 4. `/upload` へ送信
//!
//! 検証がPASSにならない限りハンドシェイクには進まない。
//! 再試行時は手順1からやり直し、前回の試行の公開鍵やセッション鍵は再利用しない。
//! セッション鍵とノンスは [`RedactionPipeline::with_rng`] で渡した乱数源から引く。

use std::path::Path;
use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use redactor_crypto::attestation::{MeasurementSet, VerificationVerdict};
use redactor_crypto::SecureEnvelope;
use redactor_types::{RedactionStrategy, UploadResponse};

use crate::error::ClientError;
use crate::retry::RetryPolicy;
use crate::session::RedactorClient;

/// ハンドシェイク前のAttestation検証をどう扱うか。
#[derive(Debug, Clone)]
pub enum AttestationPolicy {
    /// 期待PCRと一致した場合のみ進む
    Require(MeasurementSet),
    /// 検証しない（開発環境用）。実行時に警告を出す。
    Skip,
}

impl AttestationPolicy {
    /// 期待値ファイル（`{ "pcrs": { ... } }`）を読み込んで `Require` を作る。
    pub fn from_expected_file(path: &Path) -> Result<Self, ClientError> {
        let json = std::fs::read_to_string(path)?;
        let expected = MeasurementSet::from_expected_json(&json)?;
        tracing::info!(
            path = %path.display(),
            pcr_count = expected.len(),
            "期待PCRを読み込みました"
        );
        Ok(AttestationPolicy::Require(expected))
    }
}

/// 1回分の秘匿化依頼。
#[derive(Clone)]
pub struct RedactionJob {
    pub plaintext: Vec<u8>,
    pub file_name: Option<String>,
    pub strategy: RedactionStrategy,
}

impl std::fmt::Debug for RedactionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedactionJob")
            .field("plaintext_len", &self.plaintext.len())
            .field("file_name", &self.file_name)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// パイプラインの実行結果。
#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    /// Attestation検証の結果（`Skip` の場合は `None`）
    pub verdict: Option<VerificationVerdict>,
    pub upload: UploadResponse,
    /// 成功するまでに要した再試行回数
    pub retries: u32,
}

/// 秘匿化パイプライン。`R` はセッション鍵とノンスの乱数源（既定は `OsRng`）。
pub struct RedactionPipeline<R = OsRng> {
    client: RedactorClient,
    attestation: AttestationPolicy,
    retry: RetryPolicy,
    rng: Mutex<R>,
}

impl RedactionPipeline<OsRng> {
    pub fn new(client: RedactorClient, attestation: AttestationPolicy, retry: RetryPolicy) -> Self {
        Self {
            client,
            attestation,
            retry,
            rng: Mutex::new(OsRng),
        }
    }
}

impl<R: RngCore + CryptoRng> RedactionPipeline<R> {
    /// 乱数源を差し替える。
    pub fn with_rng<R2: RngCore + CryptoRng>(self, rng: R2) -> RedactionPipeline<R2> {
        RedactionPipeline {
            client: self.client,
            attestation: self.attestation,
            retry: self.retry,
            rng: Mutex::new(rng),
        }
    }

    pub fn client(&self) -> &RedactorClient {
        &self.client
    }

    /// ポリシーに従ってAttestationを検証する。
    ///
    /// `Require` で判定がPASS以外なら [`ClientError::AttestationRejected`] を返す。
    pub async fn attest(&self) -> Result<Option<VerificationVerdict>, ClientError> {
        match &self.attestation {
            AttestationPolicy::Require(expected) => {
                let verdict = self.client.verify_attestation(expected).await?;
                if !verdict.passed() {
                    tracing::error!(
                        status = %verdict.status,
                        mismatches = verdict.mismatches().count(),
                        missing = verdict.missing().count(),
                        "PCR検証に失敗したためハンドシェイクを中止します"
                    );
                    return Err(ClientError::AttestationRejected(verdict));
                }
                Ok(Some(verdict))
            }
            AttestationPolicy::Skip => {
                tracing::warn!("Attestation検証をスキップします（開発環境用）");
                Ok(None)
            }
        }
    }

    /// 検証・ハンドシェイク・封入・アップロードを再試行ポリシー付きで実行する。
    pub async fn run(&self, job: &RedactionJob) -> Result<RedactionOutcome, ClientError> {
        self.retry
            .run(move |attempt| self.run_once(job, attempt))
            .await
    }

    async fn run_once(&self, job: &RedactionJob, attempt: u32) -> Result<RedactionOutcome, ClientError> {
        tracing::debug!(attempt, ?job, "パイプラインを開始します");
        let verdict = self.attest().await?;
        let public_key = self.client.handshake().await?;
        let envelope = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            SecureEnvelope::seal(
                &mut *rng,
                &job.plaintext,
                &public_key,
                job.file_name.clone(),
                job.strategy,
            )?
        };
        let upload = self.client.upload(&envelope).await?;
        Ok(RedactionOutcome {
            verdict,
            upload,
            retries: attempt,
        })
    }
}
