//! # 秘匿化結果の照合
//!
//! ダウンロードした秘匿化結果を期待ファイルと単語単位で比較する。
//! 空白の違いは無視し、単語数が異なればその時点で不一致とする。

use std::fmt;
use std::path::Path;

use anyhow::Context;

/// 報告する不一致単語の最大件数
const MAX_REPORTED_MISMATCHES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordMismatch {
    /// 0始まりの単語位置
    pub position: usize,
    pub actual: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordComparison {
    Match { words: usize },
    CountMismatch { actual: usize, expected: usize },
    /// `mismatches` は先頭から最大 [`MAX_REPORTED_MISMATCHES`] 件、`total` は全件数
    WordMismatch {
        mismatches: Vec<WordMismatch>,
        total: usize,
    },
}

impl WordComparison {
    pub fn is_match(&self) -> bool {
        matches!(self, WordComparison::Match { .. })
    }
}

impl fmt::Display for WordComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordComparison::Match { words } => write!(f, "All {words} words match"),
            WordComparison::CountMismatch { actual, expected } => {
                write!(f, "Word count mismatch: {actual} vs {expected}")
            }
            WordComparison::WordMismatch { mismatches, total } => {
                write!(f, "Found {total} word mismatches:")?;
                for m in mismatches {
                    write!(f, "\n  Word {}: '{}' != '{}'", m.position, m.actual, m.expected)?;
                }
                if *total > mismatches.len() {
                    write!(f, "\n  ... and {} more", total - mismatches.len())?;
                }
                Ok(())
            }
        }
    }
}

pub fn compare_words(actual: &str, expected: &str) -> WordComparison {
    let actual_words: Vec<&str> = actual.split_whitespace().collect();
    let expected_words: Vec<&str> = expected.split_whitespace().collect();

    if actual_words.len() != expected_words.len() {
        return WordComparison::CountMismatch {
            actual: actual_words.len(),
            expected: expected_words.len(),
        };
    }

    let mut total = 0;
    let mut mismatches = Vec::new();
    for (position, (a, e)) in actual_words.iter().zip(&expected_words).enumerate() {
        if a != e {
            total += 1;
            if mismatches.len() < MAX_REPORTED_MISMATCHES {
                mismatches.push(WordMismatch {
                    position,
                    actual: a.to_string(),
                    expected: e.to_string(),
                });
            }
        }
    }

    if total == 0 {
        WordComparison::Match {
            words: actual_words.len(),
        }
    } else {
        WordComparison::WordMismatch { mismatches, total }
    }
}

/// 秘匿化結果を期待ファイルと照合し、結果を表示する。一致しなければエラー。
pub fn check_against_file(content: &[u8], expected_path: &Path) -> anyhow::Result<()> {
    let expected = std::fs::read_to_string(expected_path)
        .with_context(|| format!("期待ファイルの読み込みに失敗: {}", expected_path.display()))?;
    let actual = String::from_utf8_lossy(content);

    let comparison = compare_words(&actual, &expected);
    println!("{comparison}");
    if comparison.is_match() {
        Ok(())
    } else {
        anyhow::bail!(
            "秘匿化結果が期待ファイルと一致しません: {}",
            expected_path.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_ignores_whitespace_layout() {
        let result = compare_words("Call <PERSON>\ntomorrow.", "Call  <PERSON> tomorrow.\n");
        assert_eq!(result, WordComparison::Match { words: 3 });
        assert!(result.is_match());
    }

    #[test]
    fn test_word_count_mismatch() {
        let result = compare_words("Call <PERSON>", "Call John Doe");
        assert_eq!(
            result,
            WordComparison::CountMismatch {
                actual: 2,
                expected: 3
            }
        );
        assert_eq!(result.to_string(), "Word count mismatch: 2 vs 3");
    }

    #[test]
    fn test_reports_first_five_mismatches() {
        let actual = "a b c d e f g h";
        let expected = "A B C D E F G h";
        let result = compare_words(actual, expected);

        let WordComparison::WordMismatch { mismatches, total } = &result else {
            panic!("WordMismatchを期待: {result:?}");
        };
        assert_eq!(*total, 7);
        assert_eq!(mismatches.len(), MAX_REPORTED_MISMATCHES);
        assert_eq!(
            mismatches[0],
            WordMismatch {
                position: 0,
                actual: "a".into(),
                expected: "A".into()
            }
        );
        assert_eq!(mismatches[4].position, 4);

        let report = result.to_string();
        assert!(report.starts_with("Found 7 word mismatches:"));
        assert!(report.contains("Word 4: 'e' != 'E'"));
        assert!(!report.contains("Word 5:"));
        assert!(report.ends_with("... and 2 more"));
    }

    #[test]
    fn test_check_against_file() {
        let path = std::env::temp_dir().join(format!(
            "redactor-cli-{}-expected.txt",
            std::process::id()
        ));
        std::fs::write(&path, "Please call <PERSON> tomorrow.\n").unwrap();

        assert!(check_against_file(b"Please call <PERSON> tomorrow.", &path).is_ok());
        let err = check_against_file(b"Please call John Doe tomorrow.", &path).unwrap_err();
        assert!(err.to_string().contains("一致しません"));

        let _ = std::fs::remove_file(path);
        assert!(check_against_file(b"anything", Path::new("/nonexistent/expected.txt")).is_err());
    }
}
