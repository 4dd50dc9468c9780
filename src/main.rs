//! フォレンジック解析クライアントのエントリポイント。

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;

mod app;
mod config;
mod controller;
mod events;
mod input;
mod jobs;
mod layout;
mod poller;
mod service;
mod shortcuts;
mod ui;
mod worker;

/// 解析ログの出力先。
const LOG_FILE: &str = "forensic_scan.log";

/// ファイルロギングを初期化し、書き込みガードを返す。
fn init_logging() -> Result<WorkerGuard> {
    // 画面描画と混ざらないよう、ログはカレントディレクトリのファイルへ書く。
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(".", LOG_FILE));
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
    tracing::info!("logging to {LOG_FILE}");
    Ok(guard)
}

#[tokio::main]
/// ログ初期化→端末切替→TUI実行→端末復元の順に進める。
async fn main() -> Result<()> {
    // ガードを保持している間だけログが書き出される。
    let _log_guard = init_logging()?;
    tracing::info!("forensic scan client starting");

    let mut terminal = ui::init_terminal()?;
    let res = app::run_app(&mut terminal).await;
    // 失敗時も端末は必ず元に戻す。
    ui::restore_terminal()?;

    if let Err(e) = &res {
        tracing::error!("app error: {e:#}");
    }
    tracing::info!("forensic scan client exiting");
    res
}
