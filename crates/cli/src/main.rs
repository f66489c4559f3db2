//! # Redactor CLI
//!
//! Attested Enclaveに平文を暗号化して送り、秘匿化結果を受け取るコマンドラインツール。
//!
//! ```text
//! redactor-cli attest   --expected-pcrs pcrs.json
//! redactor-cli redact   notes.txt --strategy mask --expected-pcrs pcrs.json --output out.txt
//! redactor-cli download <file_id> --output out.txt --expect expected.txt
//! ```

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use redactor_client::{ClientConfig, RetryPolicy};
use redactor_types::RedactionStrategy;

#[derive(Parser, Debug)]
#[command(name = "redactor-cli")]
#[command(about = "Attested PII redaction client", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// 全サブコマンド共通の接続設定。
#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// EnclaveサーバーのベースURL
    #[arg(long, global = true, default_value = "http://localhost:10003")]
    url: String,

    /// 1リクエストあたりのタイムアウト（秒）
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    /// 自己署名TLS証明書を受け入れる
    #[arg(long, global = true)]
    insecure: bool,

    /// 通信失敗時の再試行回数（ハンドシェイクからやり直す）
    #[arg(long, global = true, default_value_t = 0)]
    retries: u32,

    /// PCRダイジェスト長（バイト）を強制する。Nitro（SHA-384）なら48。
    #[arg(long, global = true)]
    digest_len: Option<usize>,
}

impl GlobalArgs {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.insecure,
            digest_len: self.digest_len,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, RetryPolicy::default().base_delay)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Fetch the enclave's PCRs and compare them with the expected values")]
    Attest {
        /// 期待PCRファイル（`{ "pcrs": { "0": "<hex>", ... } }`）
        #[arg(long)]
        expected_pcrs: PathBuf,

        /// 判定結果をJSONで出力する
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Encrypt a text file, upload it to the enclave and redact it")]
    #[command(group(
        clap::ArgGroup::new("attestation")
            .required(true)
            .args(["expected_pcrs", "skip_attestation"])
    ))]
    Redact {
        /// 秘匿化するテキストファイル
        file: PathBuf,

        #[arg(long, default_value_t = RedactionStrategy::Replace)]
        strategy: RedactionStrategy,

        /// 期待PCRファイル。一致しない場合は送信しない。
        #[arg(long)]
        expected_pcrs: Option<PathBuf>,

        /// Attestation検証を行わない（開発環境用）
        #[arg(long)]
        skip_attestation: bool,

        /// 秘匿化結果の保存先。指定時のみダウンロードする。
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 秘匿化結果を単語単位で照合する期待ファイル
        #[arg(long)]
        expect: Option<PathBuf>,
    },
    #[command(about = "Download a redacted result by file_id")]
    Download {
        file_id: String,

        /// 保存先（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 秘匿化結果を単語単位で照合する期待ファイル
        #[arg(long)]
        expect: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(url = %cli.global.url, retries = cli.global.retries, "Enclaveに接続します");

    match cli.command {
        Commands::Attest {
            expected_pcrs,
            json,
        } => {
            commands::attest::run(&cli.global, &expected_pcrs, json).await?;
        }
        Commands::Redact {
            file,
            strategy,
            expected_pcrs,
            skip_attestation: _,
            output,
            expect,
        } => {
            commands::redact::run(
                &cli.global,
                &file,
                strategy,
                expected_pcrs.as_deref(),
                output.as_deref(),
                expect.as_deref(),
            )
            .await?;
        }
        Commands::Download {
            file_id,
            output,
            expect,
        } => {
            commands::download::run(
                &cli.global,
                &file_id,
                output.as_deref(),
                expect.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
