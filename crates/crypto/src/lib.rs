//! # Redactor 暗号処理
//!
//! クライアントからEnclaveへ機密テキストを届けるハイブリッド暗号化と、
//! PCR測定値によるAttestation検証を実装する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | セッション鍵ラップ | RSA-OAEP (SHA-256, MGF1-SHA-256), 2048bit以上 |
//! | 対称暗号 | ChaCha20-Poly1305 (256bit鍵, 96bitノンス, 128bitタグ) |
//! | セッション鍵 | 32バイト、呼び出しごとに新規生成、drop時にゼロ化 |
//!
//! 乱数源は全て呼び出し側から `&mut R`（`RngCore + CryptoRng`）として渡す。
//! 本番では `rand::rngs::OsRng`、テストではシード固定の `StdRng` を使う。

pub mod attestation;
pub mod envelope;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::{CryptoRng, RngCore};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub use envelope::{EnclaveKeyPair, EnclavePublicKey, SecureEnvelope};

/// セッション鍵長（バイト）
pub const SESSION_KEY_LEN: usize = 32;

/// ChaCha20-Poly1305のノンス長（バイト）
pub const NONCE_LEN: usize = 12;

/// Poly1305認証タグ長（バイト）
pub const TAG_LEN: usize = 16;

/// 受け付けるRSA公開鍵の最小モジュラス長（bit）
pub const MIN_RSA_BITS: usize = 2048;

/// 1回のAEAD呼び出しで扱う平文の上限（64MiB）
pub const MAX_PLAINTEXT_LEN: usize = 64 * 1024 * 1024;

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// 未対応の鍵アルゴリズム
    #[error("未対応の鍵アルゴリズム: {0}")]
    UnsupportedAlgorithm(String),
    /// 公開鍵のデコードに失敗
    #[error("公開鍵のデコードに失敗: {0}")]
    InvalidPublicKey(String),
    /// 公開鍵の鍵長が不足
    #[error("RSA鍵長が不足しています: {bits}bit (最小 {MIN_RSA_BITS}bit)")]
    KeyTooWeak { bits: usize },
    /// 鍵ペア生成に失敗
    #[error("鍵ペア生成に失敗: {0}")]
    KeyGeneration(String),
    /// 公開鍵のエクスポートに失敗
    #[error("公開鍵のエクスポートに失敗: {0}")]
    KeyExport(String),
    /// RSA-OAEPによるセッション鍵ラップに失敗
    #[error("セッション鍵のラップに失敗しました")]
    WrapFailed,
    /// RSA-OAEPによるセッション鍵アンラップに失敗
    #[error("セッション鍵のアンラップに失敗しました")]
    UnwrapFailed,
    /// アンラップ結果がセッション鍵長と一致しない
    #[error("セッション鍵長が不正です: {0}バイト")]
    InvalidSessionKeyLength(usize),
    /// ChaCha20-Poly1305暗号化エラー
    #[error("ChaCha20-Poly1305暗号化に失敗しました")]
    EncryptError,
    /// ChaCha20-Poly1305復号エラー（認証タグ不一致を含む）
    #[error("ChaCha20-Poly1305復号に失敗しました")]
    DecryptError,
    /// 全ゼロノンスの指定
    #[error("全ゼロのノンスは使用できません")]
    WeakNonce,
    /// 平文サイズ超過
    #[error("平文サイズが上限を超えています: {len}バイト (上限: {max}バイト)")]
    PayloadTooLarge { len: usize, max: usize },
    /// エンベロープの構造が不正（片方の暗号文の欠落、Base64不正、長さ不足）
    #[error("不正なエンベロープ: {0}")]
    MalformedEnvelope(String),
}

impl CryptoError {
    /// 鍵形式の問題（再試行しても解決しない契約違反）かどうか。
    pub fn is_key_format(&self) -> bool {
        matches!(
            self,
            CryptoError::UnsupportedAlgorithm(_)
                | CryptoError::InvalidPublicKey(_)
                | CryptoError::KeyTooWeak { .. }
        )
    }
}

/// 1回のアップロード専用の対称鍵。
///
/// シリアライズ不可。dropと同時にゼロ化される。
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// 暗号論的乱数源から新しいセッション鍵を生成する。
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; SESSION_KEY_LEN];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    /// アンラップ済みのバイト列からセッション鍵を復元する。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; SESSION_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSessionKeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// RSA-OAEP(SHA-256)でセッション鍵をラップする。
///
/// OAEPは確率的パディングのため、同じ鍵を2回ラップしても異なる暗号文になる。
pub fn rsa_wrap_session_key<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &RsaPublicKey,
    session_key: &SessionKey,
) -> Result<Vec<u8>, CryptoError> {
    public_key
        .encrypt(rng, Oaep::new::<Sha256>(), session_key.as_bytes())
        .map_err(|_| CryptoError::WrapFailed)
}

/// RSA-OAEP(SHA-256)でラップされたセッション鍵を取り出す。
pub fn rsa_unwrap_session_key(
    private_key: &RsaPrivateKey,
    wrapped: &[u8],
) -> Result<SessionKey, CryptoError> {
    let raw = Zeroizing::new(
        private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| CryptoError::UnwrapFailed)?,
    );
    SessionKey::from_bytes(&raw)
}

/// 乱数ノンスを生成してChaCha20-Poly1305で暗号化する。
///
/// 戻り値は `nonce(12B) || 暗号文 || tag(16B)`。
pub fn aead_seal<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &SessionKey,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::PayloadTooLarge {
            len: plaintext.len(),
            max: MAX_PLAINTEXT_LEN,
        });
    }

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let ciphertext = aead_seal_with_nonce(key, &nonce, plaintext)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// `aead_seal` の出力（ノンス前置）を復号する。
pub fn aead_open(key: &SessionKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::MalformedEnvelope(format!(
            "暗号文が短すぎます: {}バイト",
            sealed.len()
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce: &[u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| CryptoError::MalformedEnvelope("ノンス長が不正です".into()))?;
    aead_open_with_nonce(key, nonce, ciphertext)
}

/// 指定ノンスでChaCha20-Poly1305暗号化する。戻り値は `暗号文 || tag`。
///
/// 全ゼロのノンスは拒否する。
pub fn aead_seal_with_nonce(
    key: &SessionKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.iter().all(|&b| b == 0) {
        return Err(CryptoError::WeakNonce);
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::EncryptError)
}

/// 指定ノンスでChaCha20-Poly1305復号する。
/// 暗号文・タグ・ノンスのいずれかが改竄されていれば `DecryptError`。
pub fn aead_open_with_nonce(
    key: &SessionKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptError)
}
