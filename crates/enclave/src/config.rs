//! # Enclave設定・共有状態
//!
//! 環境変数からの設定読み込みとEnclaveサーバーの共有状態の定義。
//!
//! | 環境変数 | 既定値 | 内容 |
//! |---------|-------|------|
//! | `BIND_ADDR` | `0.0.0.0:10003` | 待ち受けアドレス |
//! | `PRESIDIO_URL` | `http://localhost:8001` | 秘匿化サービスのベースURL |
//! | `RSA_KEY_BITS` | `2048` | エフェメラル鍵のビット長（2048以上） |
//! | `MOCK_PCRS` | なし | モックランタイムのPCR（`0:<hex>,1:<hex>`） |
//! | `REDACTOR_TIMEOUT_SECS` | `30` | 秘匿化サービス呼び出しのタイムアウト |
//! | `MAX_STORED_FILES` | `1024` | 保持する秘匿化結果の上限件数（超過分は古い順に破棄） |

use std::time::Duration;

use anyhow::{bail, Context};
use redactor_crypto::attestation::MeasurementSet;
use redactor_crypto::MIN_RSA_BITS;

use crate::redactor::Redactor;
use crate::runtime::EnclaveRuntime;
use crate::storage::{FileStore, DEFAULT_MAX_STORED_FILES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclaveConfig {
    pub bind_addr: String,
    pub presidio_url: String,
    pub rsa_key_bits: usize,
    pub mock_pcrs: Option<MeasurementSet>,
    pub redactor_timeout: Duration,
    pub max_stored_files: usize,
}

impl EnclaveConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から設定を読み込む。
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:10003".to_string());
        let presidio_url =
            lookup("PRESIDIO_URL").unwrap_or_else(|| "http://localhost:8001".to_string());

        let rsa_key_bits = match lookup("RSA_KEY_BITS") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("RSA_KEY_BITSが不正です: {v}"))?,
            None => MIN_RSA_BITS,
        };
        if rsa_key_bits < MIN_RSA_BITS {
            bail!("RSA_KEY_BITSは{MIN_RSA_BITS}以上が必要です: {rsa_key_bits}");
        }

        let mock_pcrs = lookup("MOCK_PCRS")
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_mock_pcrs(&v))
            .transpose()?;

        let redactor_timeout = match lookup("REDACTOR_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse::<u64>()
                    .with_context(|| format!("REDACTOR_TIMEOUT_SECSが不正です: {v}"))?,
            ),
            None => Duration::from_secs(30),
        };

        let max_stored_files = match lookup("MAX_STORED_FILES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_STORED_FILESが不正です: {v}"))?,
            None => DEFAULT_MAX_STORED_FILES,
        };
        if max_stored_files == 0 {
            bail!("MAX_STORED_FILESは1以上が必要です");
        }

        Ok(Self {
            bind_addr,
            presidio_url,
            rsa_key_bits,
            mock_pcrs,
            redactor_timeout,
            max_stored_files,
        })
    }
}

/// `0:<hex>,1:<hex>` 形式のPCR指定を解釈する。
fn parse_mock_pcrs(value: &str) -> anyhow::Result<MeasurementSet> {
    let mut pairs = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((index, digest)) = entry.split_once(':') else {
            bail!("MOCK_PCRSの要素は <index>:<hex> 形式が必要です: {entry}");
        };
        pairs.push((index.trim(), digest.trim()));
    }
    MeasurementSet::from_hex_pairs(pairs).context("MOCK_PCRSのパースに失敗")
}

/// Enclaveサーバーの共有状態。
pub struct EnclaveState {
    /// ランタイム実装（鍵ペアとPCR）
    pub runtime: Box<dyn EnclaveRuntime>,
    /// 秘匿化サービス
    pub redactor: Box<dyn Redactor>,
    /// 秘匿化結果ストア
    pub store: FileStore,
}

impl EnclaveState {
    pub fn new(
        runtime: Box<dyn EnclaveRuntime>,
        redactor: Box<dyn Redactor>,
        store: FileStore,
    ) -> Self {
        Self {
            runtime,
            redactor,
            store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<EnclaveConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnclaveConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:10003");
        assert_eq!(config.presidio_url, "http://localhost:8001");
        assert_eq!(config.rsa_key_bits, 2048);
        assert_eq!(config.mock_pcrs, None);
        assert_eq!(config.redactor_timeout, Duration::from_secs(30));
        assert_eq!(config.max_stored_files, DEFAULT_MAX_STORED_FILES);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("PRESIDIO_URL", "http://presidio:8001"),
            ("RSA_KEY_BITS", "3072"),
            ("MOCK_PCRS", "0:aa11, 2:CC33"),
            ("REDACTOR_TIMEOUT_SECS", "5"),
            ("MAX_STORED_FILES", "16"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.rsa_key_bits, 3072);
        let pcrs = config.mock_pcrs.unwrap();
        assert_eq!(pcrs.len(), 2);
        assert_eq!(pcrs.get(2).unwrap().to_hex(), "cc33");
        assert_eq!(config.redactor_timeout, Duration::from_secs(5));
        assert_eq!(config.max_stored_files, 16);
    }

    #[test]
    fn test_rejects_bad_store_limit() {
        assert!(config_from(&[("MAX_STORED_FILES", "0")]).is_err());
        assert!(config_from(&[("MAX_STORED_FILES", "many")]).is_err());
    }

    #[test]
    fn test_rejects_weak_key_bits() {
        assert!(config_from(&[("RSA_KEY_BITS", "1024")]).is_err());
        assert!(config_from(&[("RSA_KEY_BITS", "lots")]).is_err());
    }

    #[test]
    fn test_rejects_malformed_mock_pcrs() {
        assert!(config_from(&[("MOCK_PCRS", "0=aa11")]).is_err());
        assert!(config_from(&[("MOCK_PCRS", "0:zz")]).is_err());
        assert!(config_from(&[("MOCK_PCRS", "x:aa11")]).is_err());
        assert_eq!(config_from(&[("MOCK_PCRS", "  ")]).unwrap().mock_pcrs, None);
    }
}
