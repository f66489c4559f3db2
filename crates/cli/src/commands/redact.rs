//! # redact サブコマンド
//!
//! ファイルを読み込み、Attestation検証 → ハンドシェイク → 暗号化 → アップロードを
//! 1つのパイプラインとして実行する。`--output` または `--expect` 指定時は結果も
//! ダウンロードし、`--expect` があれば期待ファイルと照合する。

use std::path::Path;

use anyhow::Context;
use redactor_client::{AttestationPolicy, RedactionJob, RedactionPipeline};
use redactor_types::RedactionStrategy;

use super::{build_client, present, render_verdict};
use crate::GlobalArgs;

pub async fn run(
    global: &GlobalArgs,
    file: &Path,
    strategy: RedactionStrategy,
    expected_pcrs: Option<&Path>,
    output: Option<&Path>,
    expect: Option<&Path>,
) -> anyhow::Result<()> {
    let plaintext = std::fs::read(file)
        .with_context(|| format!("入力ファイルの読み込みに失敗: {}", file.display()))?;

    let attestation = match expected_pcrs {
        Some(path) => AttestationPolicy::Require(super::attest::load_expected(path)?),
        None => AttestationPolicy::Skip,
    };
    let pipeline = RedactionPipeline::new(build_client(global)?, attestation, global.retry_policy());

    let job = RedactionJob {
        plaintext,
        file_name: upload_name(file),
        strategy,
    };
    let outcome = pipeline.run(&job).await.map_err(present)?;

    if let Some(verdict) = &outcome.verdict {
        print!("{}", render_verdict(verdict));
    }
    println!("file_id: {}", outcome.upload.file_id);
    println!("filename: {}", outcome.upload.filename);
    if outcome.retries > 0 {
        println!("retries: {}", outcome.retries);
    }

    if output.is_none() && expect.is_none() {
        return Ok(());
    }
    let content = pipeline
        .client()
        .download(&outcome.upload)
        .await
        .map_err(present)?;
    if let Some(output) = output {
        super::download::write_output(Some(output), &content)?;
        println!("saved: {}", output.display());
    }
    if let Some(expect) = expect {
        super::expect::check_against_file(&content, expect)?;
    }
    Ok(())
}

/// アップロード時のファイル名（拡張子を除いたファイル名部分）。
fn upload_name(file: &Path) -> Option<String> {
    file.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
