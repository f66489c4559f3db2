//! # attest サブコマンド
//!
//! `GET /attestation` のPCRを期待値と比較し、インデックスごとの結果を表示する。
//! 判定がPASSでなければ非ゼロで終了する。

use std::path::Path;

use anyhow::Context;
use redactor_crypto::attestation::{MeasurementSet, VerificationVerdict};

use super::{build_client, present, render_verdict};
use crate::GlobalArgs;

pub async fn run(global: &GlobalArgs, expected_pcrs: &Path, json: bool) -> anyhow::Result<()> {
    let expected = load_expected(expected_pcrs)?;
    let client = build_client(global)?;
    let verdict = client
        .verify_attestation(&expected)
        .await
        .map_err(present)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print!("{}", render_verdict(&verdict));
    }
    ensure_passed(&verdict)
}

pub(crate) fn load_expected(path: &Path) -> anyhow::Result<MeasurementSet> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("期待PCRファイルの読み込みに失敗: {}", path.display()))?;
    MeasurementSet::from_expected_json(&json)
        .with_context(|| format!("期待PCRファイルの形式が不正です: {}", path.display()))
}

fn ensure_passed(verdict: &VerificationVerdict) -> anyhow::Result<()> {
    if verdict.passed() {
        Ok(())
    } else {
        anyhow::bail!("Attestation検証に失敗しました ({})", verdict.status)
    }
}
