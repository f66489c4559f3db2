//! # download サブコマンド

use std::io::Write;
use std::path::Path;

use anyhow::Context;

use super::{build_client, present};
use crate::GlobalArgs;

pub async fn run(
    global: &GlobalArgs,
    file_id: &str,
    output: Option<&Path>,
    expect: Option<&Path>,
) -> anyhow::Result<()> {
    let client = build_client(global)?;
    let content = client.download_by_id(file_id).await.map_err(present)?;
    // 照合のみ指定された場合は標準出力に内容を出さない
    if output.is_some() || expect.is_none() {
        write_output(output, &content)?;
    }
    if let Some(output) = output {
        println!("saved: {}", output.display());
    }
    match expect {
        Some(expect) => super::expect::check_against_file(&content, expect),
        None => Ok(()),
    }
}

/// 保存先が指定されていればファイルに、なければ標準出力に書き出す。
pub(crate) fn write_output(output: Option<&Path>, content: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("出力ファイルの書き込みに失敗: {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content)?;
            stdout.flush()?;
            Ok(())
        }
    }
}
