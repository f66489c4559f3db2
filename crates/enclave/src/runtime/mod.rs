//! # Enclaveランタイム抽象化
//!
//! 鍵ペアの保持とPCR測定値の取得を抽象化するトレイト。
//!
//! 現在のランタイム実装:
//! - `mock`: ローカル開発・テスト用（メモリ内鍵生成、固定PCR）

pub mod mock;

use redactor_crypto::attestation::MeasurementSet;
use redactor_crypto::EnclaveKeyPair;

pub trait EnclaveRuntime: Send + Sync {
    /// ランタイム種別（ログ出力用）
    fn runtime_type(&self) -> &str;

    /// 起動時に生成したエフェメラルRSA鍵ペア。
    fn keypair(&self) -> &EnclaveKeyPair;

    /// 現在のPCR測定値。
    fn measurements(&self) -> MeasurementSet;
}
