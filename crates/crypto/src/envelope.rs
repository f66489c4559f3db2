//! # SecureEnvelope
//!
//! クライアント側の封入（`seal`）とEnclave側の開封（`open`）。
//!
//! ## 封入手順
//! 1. セッション鍵（32B）を注入された乱数源から生成
//! 2. Enclave公開鍵でRSA-OAEP(SHA-256)ラップ
//! 3. 乱数ノンスでChaCha20-Poly1305暗号化し、ノンスを前置
//! 4. ファイル名・秘匿化戦略は平文メタデータとして同梱
//!
//! どの段階で失敗しても部分的なエンベロープは返さない。

use base64::Engine;
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use redactor_types::{RedactionStrategy, UploadRequest, ALGORITHM_RSA_2048};

use crate::{
    aead_open, aead_seal, rsa_unwrap_session_key, rsa_wrap_session_key, CryptoError, SessionKey,
    MAX_PLAINTEXT_LEN, MIN_RSA_BITS, NONCE_LEN, TAG_LEN,
};

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

// ---------------------------------------------------------------------------
// Enclave公開鍵
// ---------------------------------------------------------------------------

/// /handshake で受け取ったEnclaveのエフェメラル公開鍵。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclavePublicKey {
    algorithm: String,
    key: RsaPublicKey,
}

impl EnclavePublicKey {
    /// アルゴリズム識別子とPEMから公開鍵を構築する。
    ///
    /// - アルゴリズムは `RSA` 系のみ受け付ける
    /// - PEMはSPKI（`BEGIN PUBLIC KEY`）またはPKCS#1（`BEGIN RSA PUBLIC KEY`）
    /// - モジュラス長は [`MIN_RSA_BITS`] 以上
    /// - 識別子に鍵長が含まれる場合（`RSA-2048`）、実際の鍵長と一致すること
    pub fn from_pem(algorithm: &str, pem: &str) -> Result<Self, CryptoError> {
        let declared_bits = parse_rsa_algorithm(algorithm)?;

        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        let bits = key.size() * 8;
        if bits < MIN_RSA_BITS {
            return Err(CryptoError::KeyTooWeak { bits });
        }
        if let Some(declared) = declared_bits {
            if declared != bits {
                return Err(CryptoError::InvalidPublicKey(format!(
                    "宣言された鍵長({declared}bit)と実際の鍵長({bits}bit)が一致しません"
                )));
            }
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            key,
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// モジュラス長（bit）
    pub fn modulus_bits(&self) -> usize {
        self.key.size() * 8
    }

    pub fn rsa_key(&self) -> &RsaPublicKey {
        &self.key
    }
}

/// `RSA` / `RSA-2048` / `rsa-oaep-4096` 形式の識別子を解釈し、宣言された鍵長を返す。
fn parse_rsa_algorithm(algorithm: &str) -> Result<Option<usize>, CryptoError> {
    let upper = algorithm.trim().to_ascii_uppercase();
    if !upper.starts_with("RSA") {
        return Err(CryptoError::UnsupportedAlgorithm(algorithm.to_string()));
    }
    let declared = upper
        .rsplit('-')
        .next()
        .and_then(|tail| tail.parse::<usize>().ok());
    Ok(declared)
}

/// 鍵長から /handshake に載せる識別子を決める。
fn rsa_algorithm_name(bits: usize) -> String {
    if bits == 2048 {
        ALGORITHM_RSA_2048.to_string()
    } else {
        format!("RSA-{bits}")
    }
}

// ---------------------------------------------------------------------------
// Enclave鍵ペア
// ---------------------------------------------------------------------------

/// Enclave側が保持するRSA鍵ペア。秘密鍵はプロセス外に出ない。
pub struct EnclaveKeyPair {
    private_key: RsaPrivateKey,
    public_key: EnclavePublicKey,
}

impl EnclaveKeyPair {
    /// 指定ビット長のRSA鍵ペアを生成する。
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, bits: usize) -> Result<Self, CryptoError> {
        if bits < MIN_RSA_BITS {
            return Err(CryptoError::KeyTooWeak { bits });
        }
        let private_key = RsaPrivateKey::new(rng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = EnclavePublicKey {
            algorithm: rsa_algorithm_name(bits),
            key: RsaPublicKey::from(&private_key),
        };
        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn public_key(&self) -> &EnclavePublicKey {
        &self.public_key
    }

    /// 公開鍵をSPKI PEM（LF改行）でエクスポートする。
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        self.public_key
            .key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyExport(e.to_string()))
    }

    pub fn unwrap_session_key(&self, wrapped: &[u8]) -> Result<SessionKey, CryptoError> {
        rsa_unwrap_session_key(&self.private_key, wrapped)
    }
}

impl std::fmt::Debug for EnclaveKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnclaveKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// エンベロープ
// ---------------------------------------------------------------------------

/// /upload に送る暗号化単位。2つの暗号文が揃って初めて意味を持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureEnvelope {
    /// RSA-OAEPでラップされたセッション鍵
    pub wrapped_session_key: Vec<u8>,
    /// `nonce || ChaCha20-Poly1305暗号文 || tag`
    pub sealed_payload: Vec<u8>,
    /// 論理ファイル名（平文）
    pub file_name: Option<String>,
    /// 秘匿化戦略（平文）
    pub redaction_strategy: RedactionStrategy,
}

impl SecureEnvelope {
    /// 平文をEnclave公開鍵宛てに封入する。
    ///
    /// セッション鍵はこの呼び出しの中で生成・使用され、戻る前にゼロ化される。
    pub fn seal<R: RngCore + CryptoRng>(
        rng: &mut R,
        plaintext: &[u8],
        recipient: &EnclavePublicKey,
        file_name: Option<String>,
        redaction_strategy: RedactionStrategy,
    ) -> Result<Self, CryptoError> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(CryptoError::PayloadTooLarge {
                len: plaintext.len(),
                max: MAX_PLAINTEXT_LEN,
            });
        }

        let session_key = SessionKey::generate(rng);
        let wrapped_session_key = rsa_wrap_session_key(rng, recipient.rsa_key(), &session_key)?;
        let sealed_payload = aead_seal(rng, &session_key, plaintext)?;

        Ok(Self {
            wrapped_session_key,
            sealed_payload,
            file_name,
            redaction_strategy,
        })
    }

    /// Enclave秘密鍵でセッション鍵を取り出し、ペイロードを復号する。
    pub fn open(&self, keypair: &EnclaveKeyPair) -> Result<Vec<u8>, CryptoError> {
        let session_key = keypair.unwrap_session_key(&self.wrapped_session_key)?;
        aead_open(&session_key, &self.sealed_payload)
    }

    /// ワイヤ表現（Base64）に変換する。
    pub fn to_upload_request(&self) -> UploadRequest {
        UploadRequest {
            encrypted_data: b64().encode(&self.sealed_payload),
            encrypted_session_key: b64().encode(&self.wrapped_session_key),
            file_name: self.file_name.clone(),
            redaction_strategy: Some(self.redaction_strategy),
        }
    }

    /// ワイヤ表現から復元する。片方でも暗号文が欠けていれば拒否する。
    pub fn from_upload_request(request: &UploadRequest) -> Result<Self, CryptoError> {
        if request.encrypted_data.trim().is_empty() {
            return Err(CryptoError::MalformedEnvelope("encrypted_dataが空です".into()));
        }
        if request.encrypted_session_key.trim().is_empty() {
            return Err(CryptoError::MalformedEnvelope(
                "encrypted_session_keyが空です".into(),
            ));
        }

        let sealed_payload = b64().decode(request.encrypted_data.trim()).map_err(|e| {
            CryptoError::MalformedEnvelope(format!("encrypted_dataのBase64デコードに失敗: {e}"))
        })?;
        let wrapped_session_key =
            b64().decode(request.encrypted_session_key.trim()).map_err(|e| {
                CryptoError::MalformedEnvelope(format!(
                    "encrypted_session_keyのBase64デコードに失敗: {e}"
                ))
            })?;

        if sealed_payload.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "encrypted_dataが短すぎます: {}バイト",
                sealed_payload.len()
            )));
        }

        Ok(Self {
            wrapped_session_key,
            sealed_payload,
            file_name: request.file_name.clone(),
            redaction_strategy: request.redaction_strategy.unwrap_or_default(),
        })
    }
}
