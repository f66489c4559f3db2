//! # Redactor クライアント
//!
//! Enclave上の秘匿化サービスに機密テキストを安全に送り届ける。
//!
//! - [`session`]: エンドポイント単位のHTTP呼び出し（状態なし、再試行なし）
//! - [`pipeline`]: Attestation検証 → ハンドシェイク → 封入 → アップロード
//! - [`retry`]: 通信エラーのみを対象とする指数バックオフ
//! - [`error`]: 再試行可否を判断できるエラー分類

pub mod error;
pub mod pipeline;
pub mod retry;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::ClientError;
pub use pipeline::{AttestationPolicy, RedactionJob, RedactionOutcome, RedactionPipeline};
pub use retry::RetryPolicy;
pub use session::{ClientConfig, RedactorClient};
