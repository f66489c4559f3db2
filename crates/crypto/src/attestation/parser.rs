//! # Attestation応答テキストのパーサ
//!
//! Enclaveの `/attestation` が返す自由形式テキストから [`MeasurementSet`] を取り出す。
//! 応答形式が変わった場合の修正箇所をこのモジュールに閉じ込める。
//!
//! 想定する行:
//! ```text
//! PCRs retrieved from enclave's attestation document: 0: aa11, 1: bb22
//! ```
//! HTTP/JSON経由でエスケープされた改行（`\\n`）や、辞書表記の引用符・波括弧が
//! 混入していても受け付ける。

use super::{parse_index, Digest, MeasurementSet, ParseError};

/// PCR一覧の導入句
pub const PCR_MARKER: &str = "attestation document:";

/// 区切り前後から除去する文字
const WRAPPING: &[char] = &['"', '\'', '`', '\\', '{', '}', '[', ']'];

/// 応答テキストから実測PCRを抽出する。
///
/// - 導入句がなければ [`ParseError::MarkerNotFound`]（空セットとは区別する）
/// - コロンを含まない区間は読み飛ばす
/// - 1件以上読んだ後にインデックスとして解釈できない区間が来たら、そこで一覧を終える
/// - 同じインデックスが複数回現れた場合は最後の値を採用する
pub fn parse_attestation_text(text: &str) -> Result<MeasurementSet, ParseError> {
    let start = text
        .find(PCR_MARKER)
        .map(|pos| pos + PCR_MARKER.len())
        .ok_or(ParseError::MarkerNotFound)?;

    let unfolded = text[start..]
        .replace("\\r\\n", " ")
        .replace("\\n", " ")
        .replace("\\r", " ");
    let line = unfolded
        .split(['\n', '\r'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c: char| c.is_whitespace() || WRAPPING.contains(&c));

    let mut set = MeasurementSet::new();
    for segment in line.split(',') {
        let Some((raw_index, raw_value)) = segment.split_once(':') else {
            continue;
        };
        let index_text = clean(raw_index);
        let value_text = clean(raw_value);

        // 一覧の後ろに続く本文やJSONの別キーに達したら打ち切る
        let index = match parse_index(index_text) {
            Ok(index) => index,
            Err(_) if !set.is_empty() => break,
            Err(e) => return Err(e),
        };
        let digest =
            Digest::from_hex(value_text).map_err(|reason| ParseError::InvalidDigest {
                index: index_text.to_string(),
                reason,
            })?;
        set.insert(index, digest);
    }
    Ok(set)
}

fn clean(field: &str) -> &str {
    field.trim_matches(|c: char| c.is_whitespace() || WRAPPING.contains(&c))
}
