//! # サブコマンド実装
//!
//! エラーや判定結果の表示はここで行う。ライブラリ側は型付きのエラーを返すだけ。

pub mod attest;
pub mod download;
pub mod expect;
pub mod redact;

use redactor_client::{ClientError, RedactorClient};
use redactor_crypto::attestation::VerificationVerdict;

use crate::GlobalArgs;

fn build_client(global: &GlobalArgs) -> anyhow::Result<RedactorClient> {
    Ok(RedactorClient::new(&global.client_config())?)
}

/// 判定結果を1インデックス1行で整形する。最終行は総括。
pub(crate) fn render_verdict(verdict: &VerificationVerdict) -> String {
    let mut out = String::new();
    for comparison in &verdict.comparisons {
        out.push_str(&comparison.to_string());
        out.push('\n');
    }
    out.push_str(&format!("Attestation: {}\n", verdict.status));
    out
}

/// クライアントエラーを利用者向けのエラーに変換する。
///
/// Attestation不一致の場合はインデックスごとの内訳を標準エラーに出す。
fn present(err: ClientError) -> anyhow::Error {
    match err {
        ClientError::AttestationRejected(verdict) => {
            eprint!("{}", render_verdict(&verdict));
            anyhow::anyhow!(
                "Enclaveの測定値が期待値と一致しないため送信を中止しました ({})",
                verdict.status
            )
        }
        other => anyhow::Error::new(other),
    }
}
