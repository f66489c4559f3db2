//! # PCR測定値の検証
//!
//! Enclaveが期待どおりのコードで動作しているかを、PCR
//! (Platform Configuration Register) の測定値で確認する。
//!
//! - [`MeasurementSet`]: PCRインデックス → ダイジェストの不変マップ
//! - [`parser`]: /attestation の自由形式テキストから `MeasurementSet` を抽出するアダプタ
//! - [`verify`]: 期待値と実測値を比較し、インデックスごとの内訳付き判定を返す
//!
//! ## 期待値ファイル形式
//! ```json
//! { "pcrs": { "0": "<hex>", "1": "<hex>", "2": "<hex>" } }
//! ```

pub mod parser;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use parser::parse_attestation_text;

/// PCRインデックス。ワイヤ上では `"0"` のような文字列キーになる。
pub type PcrIndex = u32;

/// SHA-384ベースのPCR（AWS Nitro）のダイジェスト長（バイト）
pub const SHA384_DIGEST_LEN: usize = 48;

/// PCR測定値のパースエラー。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// 応答テキストにPCR一覧の導入句が含まれていない
    #[error("Attestationデータが含まれていません")]
    MarkerNotFound,
    /// PCRインデックスが非負整数として解釈できない
    #[error("PCRインデックスが不正です: {0:?}")]
    InvalidIndex(String),
    /// ダイジェストが16進数として不正、または空
    #[error("PCR{index}のダイジェストが不正です: {reason}")]
    InvalidDigest { index: String, reason: String },
    /// ダイジェスト長がアルゴリズムの規定と一致しない
    #[error("PCR{index}のダイジェスト長が不正です: {actual}バイト (期待値: {expected}バイト)")]
    DigestLength {
        index: PcrIndex,
        expected: usize,
        actual: usize,
    },
    /// 期待値ファイルのJSONが不正
    #[error("期待値ファイルのパースに失敗: {0}")]
    Json(String),
}

// ---------------------------------------------------------------------------
// ダイジェスト
// ---------------------------------------------------------------------------

/// デコード済みのPCRダイジェスト。表示は常に小文字16進数。
///
/// 比較はデコード後のバイト列で行うため、16進数の大文字・小文字の揺れは一致扱いになる。
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(Vec<u8>);

impl Digest {
    /// 16進数文字列からダイジェストを構築する。空文字列は拒否する。
    pub fn from_hex(value: &str) -> Result<Self, String> {
        if value.is_empty() {
            return Err("空のダイジェスト".into());
        }
        hex::decode(value)
            .map(Self)
            .map_err(|e| e.to_string())
    }

    /// 生のダイジェスト値から構築する（ランタイムが測定値を直接持つ場合）。
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl TryFrom<String> for Digest {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Digest::from_hex(value.trim())
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_hex()
    }
}

// ---------------------------------------------------------------------------
// 測定値セット
// ---------------------------------------------------------------------------

/// PCRインデックス → ダイジェストのマップ。
///
/// 反復順はインデックスの昇順。期待値セットは起動時に1回だけ読み込まれ、以後変更しない。
/// 実測値セットはAttestation取得ごとに作られ、比較後に破棄される。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementSet(BTreeMap<PcrIndex, Digest>);

impl MeasurementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(index, hex)` の組から構築する。
    pub fn from_hex_pairs<'a, I>(pairs: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::new();
        for (index, value) in pairs {
            let parsed_index = parse_index(index)?;
            let digest = Digest::from_hex(value).map_err(|reason| ParseError::InvalidDigest {
                index: index.to_string(),
                reason,
            })?;
            set.insert(parsed_index, digest);
        }
        Ok(set)
    }

    /// 期待値ファイル（`{ "pcrs": { ... } }`）のJSONを読み込む。
    pub fn from_expected_json(json: &str) -> Result<Self, ParseError> {
        let file: ExpectedMeasurements =
            serde_json::from_str(json).map_err(|e| ParseError::Json(e.to_string()))?;
        Ok(file.pcrs)
    }

    /// /attestation の応答テキストから実測値セットを抽出する。
    pub fn parse_attestation_text(text: &str) -> Result<Self, ParseError> {
        parser::parse_attestation_text(text)
    }

    /// 値を挿入する。同じインデックスが既にあれば上書きし、旧値を返す。
    pub fn insert(&mut self, index: PcrIndex, digest: Digest) -> Option<Digest> {
        self.0.insert(index, digest)
    }

    pub fn get(&self, index: PcrIndex) -> Option<&Digest> {
        self.0.get(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// インデックス昇順で反復する。
    pub fn iter(&self) -> impl Iterator<Item = (PcrIndex, &Digest)> {
        self.0.iter().map(|(index, digest)| (*index, digest))
    }

    /// 全ダイジェストが指定長であることを確認する（SHA-384なら48バイト）。
    pub fn require_digest_len(&self, expected: usize) -> Result<(), ParseError> {
        match self.iter().find(|(_, digest)| digest.len() != expected) {
            Some((index, digest)) => Err(ParseError::DigestLength {
                index,
                expected,
                actual: digest.len(),
            }),
            None => Ok(()),
        }
    }
}

impl FromIterator<(PcrIndex, Digest)> for MeasurementSet {
    fn from_iter<T: IntoIterator<Item = (PcrIndex, Digest)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 期待値ファイルのスキーマ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedMeasurements {
    pub pcrs: MeasurementSet,
}

/// `"0"`, `" 12 "`, `"PCR2"` をインデックスとして解釈する。
pub(crate) fn parse_index(raw: &str) -> Result<PcrIndex, ParseError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("PCR")
        .or_else(|| trimmed.strip_prefix("pcr"))
        .unwrap_or(trimmed);
    digits
        .parse::<PcrIndex>()
        .map_err(|_| ParseError::InvalidIndex(raw.to_string()))
}

// ---------------------------------------------------------------------------
// 検証
// ---------------------------------------------------------------------------

/// 判定の総括。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// 全ての期待インデックスが存在し一致した
    Pass,
    /// 1つ以上の不一致または欠落がある
    Fail,
    /// 期待値が空で、検証すべき基準がない（成功扱いにはしない）
    NoCriteria,
}

/// インデックス単位の比較結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PcrOutcome {
    Match,
    Mismatch { expected: Digest, actual: Digest },
    /// 期待値にあるが実測値にない
    Missing { expected: Digest },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PcrComparison {
    pub index: PcrIndex,
    pub outcome: PcrOutcome,
}

impl fmt::Display for PcrComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PcrOutcome::Match => write!(f, "PCR{}: MATCH", self.index),
            PcrOutcome::Mismatch { expected, actual } => write!(
                f,
                "PCR{}: MISMATCH (expected {expected}, actual {actual})",
                self.index
            ),
            PcrOutcome::Missing { expected } => {
                write!(f, "PCR{}: MISSING (expected {expected})", self.index)
            }
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerdictStatus::Pass => "PASS",
            VerdictStatus::Fail => "FAIL",
            VerdictStatus::NoCriteria => "NO CRITERIA",
        })
    }
}

/// 期待値と実測値の比較結果。1回の検証呼び出しの中でのみ使う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationVerdict {
    pub status: VerdictStatus,
    /// 期待インデックスの昇順に並んだ比較結果
    pub comparisons: Vec<PcrComparison>,
}

impl VerificationVerdict {
    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &PcrComparison> {
        self.comparisons
            .iter()
            .filter(|c| matches!(c.outcome, PcrOutcome::Mismatch { .. }))
    }

    pub fn missing(&self) -> impl Iterator<Item = &PcrComparison> {
        self.comparisons
            .iter()
            .filter(|c| matches!(c.outcome, PcrOutcome::Missing { .. }))
    }
}

/// 期待値セットと実測値セットを比較する。
///
/// 実測値にだけ存在するインデックスは判定に影響しない。
/// 期待値が空の場合は `NoCriteria` を返し、決して `Pass` にはしない。
pub fn verify(expected: &MeasurementSet, actual: &MeasurementSet) -> VerificationVerdict {
    if expected.is_empty() {
        return VerificationVerdict {
            status: VerdictStatus::NoCriteria,
            comparisons: Vec::new(),
        };
    }

    let comparisons: Vec<PcrComparison> = expected
        .iter()
        .map(|(index, expected_digest)| {
            let outcome = match actual.get(index) {
                Some(actual_digest) if actual_digest == expected_digest => PcrOutcome::Match,
                Some(actual_digest) => PcrOutcome::Mismatch {
                    expected: expected_digest.clone(),
                    actual: actual_digest.clone(),
                },
                None => PcrOutcome::Missing {
                    expected: expected_digest.clone(),
                },
            };
            PcrComparison { index, outcome }
        })
        .collect();

    let status = if comparisons
        .iter()
        .all(|c| c.outcome == PcrOutcome::Match)
    {
        VerdictStatus::Pass
    } else {
        VerdictStatus::Fail
    };

    VerificationVerdict {
        status,
        comparisons,
    }
}
