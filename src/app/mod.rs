//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;

use crate::{
    config::Config,
    controller::ScanController,
    events::UiState,
    input::InputBoxState,
    jobs::{Phase, classification_tag, score_label},
    shortcuts::Shortcuts,
    ui::Tui,
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, handle_paste, is_ctrl_c};
use render::draw;

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 永続化された設定ファイルのパス。
    pub cfg_path: PathBuf,
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// ステータスやログなどUI固有の状態。
    pub ui: UiState,
    /// スキャンの状態機械。
    pub scan: ScanController,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,

    /// 設定画面で編集するサービスURL。
    pub base_url: String,
    /// 設定画面で編集するポーリング間隔（ミリ秒）。
    pub poll_interval_ms: String,
    /// 設定画面で編集する本物判定しきい値。
    pub threshold: String,

    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,

    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

impl App {
    /// 設定とWorkerチャネルからアプリ状態を組み立てる。
    pub fn new(
        cfg_path: PathBuf,
        cfg: Config,
        shortcuts: Shortcuts,
        worker_tx: mpsc::Sender<WorkerCmd>,
        worker_rx: mpsc::Receiver<WorkerEvent>,
    ) -> Self {
        let mut app = Self {
            cfg_path,
            scan: ScanController::new(cfg.scan.authentic_threshold),
            cfg,
            ui: UiState::new(),
            worker_tx,
            worker_rx,
            base_url: String::new(),
            poll_interval_ms: String::new(),
            threshold: String::new(),
            input_box: None,
            shortcuts,
        };
        reload_settings_buffers(&mut app);
        app
    }
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;

    // ショートカット設定を読み込む（無ければデフォルト）。
    let shortcuts = Shortcuts::load_or_default("shortcut.toml")?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(16);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 初期設定スナップショットでWorkerを起動する。
    tokio::spawn(worker::run(rx_cmd, tx_ev, cfg.clone()));

    let mut app = App::new(cfg_path, cfg, shortcuts, tx_cmd, rx_ev);
    app.ui
        .push_log(format!("service: {}", app.cfg.service.base_url));

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev);
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(k) if k.kind == KeyEventKind::Press => {
                    // どの画面でもCtrl+Cで終了できるようにする。
                    if is_ctrl_c(&k) || handle_key(&mut app, k).await? {
                        break;
                    }
                }
                Event::Paste(text) => handle_paste(&mut app, &text),
                _ => {}
            }
        }
    }

    shutdown(&mut app).await;
    Ok(())
}

/// 終了前に実行中のスキャンを止める。
async fn shutdown(app: &mut App) {
    // 画面を閉じた後にポーリングが残らないようにする。
    if matches!(app.scan.phase(), Phase::Uploading | Phase::Analyzing) {
        tracing::info!("cancelling active scan on exit");
        let _ = app.worker_tx.send(WorkerCmd::CancelAnalysis).await;
    }
}

/// WorkerイベントをUI状態と状態機械へ反映する。
pub fn handle_worker_event(app: &mut App, ev: WorkerEvent) {
    match ev {
        WorkerEvent::Submitted { scan_id, job_id } => {
            if app.scan.upload_succeeded(scan_id, job_id.clone()) {
                app.ui.push_log(format!("job {job_id} queued"));
                app.ui.status = "Analyzing...".into();
            }
        }
        WorkerEvent::SubmitFailed { scan_id, error } => {
            app.scan.upload_failed(scan_id, &error);
            if app.scan.notice().is_some() {
                app.ui.status = "Upload failed".into();
            }
        }
        WorkerEvent::Status { scan_id, report } => {
            app.scan.apply_status(scan_id, report);
            match app.scan.phase() {
                Phase::Complete => {
                    // 結果の要約をログに残す。
                    if let Some(r) = app.scan.result() {
                        let line = format!(
                            "result: {} {}",
                            score_label(r.authenticity_score),
                            classification_tag(&r.classification)
                        );
                        app.ui.push_log(&line);
                        app.ui.status = "Analysis complete".into();
                    }
                }
                Phase::Idle if app.scan.notice().is_some() => {
                    app.ui.status = "Analysis failed".into();
                }
                _ => {}
            }
        }
        WorkerEvent::PollAborted { scan_id, error } => {
            // 診断ログのみに残し、画面の状態は変えない。
            app.scan.poll_aborted(scan_id, &error);
        }
        WorkerEvent::Log(s) => {
            app.ui.push_log(s);
        }
        WorkerEvent::Error(s) => {
            // ステータスにエラーを表示する。
            app.ui.error = Some(s);
        }
    }
}

/// 設定画面用の編集バッファを設定値から再読み込みする。
pub fn reload_settings_buffers(app: &mut App) {
    app.base_url = app.cfg.service.base_url.clone();
    app.poll_interval_ms = app.cfg.service.poll_interval_ms.to_string();
    app.threshold = app.cfg.scan.authentic_threshold.to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fake::{completed, failed, sample_jpeg};

    /// Workerを起動せずにチャネルだけ持つアプリを作る。
    pub(super) fn test_app() -> (App, mpsc::Receiver<WorkerCmd>, mpsc::Sender<WorkerEvent>) {
        let (tx_cmd, rx_cmd) = mpsc::channel(16);
        let (tx_ev, rx_ev) = mpsc::channel(16);
        let cfg_path =
            std::env::temp_dir().join(format!("forensic-app-{}.toml", uuid::Uuid::new_v4()));
        let app = App::new(
            cfg_path,
            Config::default(),
            Shortcuts::default(),
            tx_cmd,
            rx_ev,
        );
        (app, rx_cmd, tx_ev)
    }

    #[test]
    fn test_worker_events_drive_controller_to_complete() {
        // 受理→完了のイベントで結果表示まで進む。
        let (mut app, _rx, _tx) = test_app();
        app.scan.select_file(sample_jpeg()).unwrap();
        let req = app.scan.start_analysis().unwrap();

        handle_worker_event(
            &mut app,
            WorkerEvent::Submitted {
                scan_id: req.scan_id,
                job_id: "abc123".into(),
            },
        );
        assert_eq!(app.scan.phase(), Phase::Analyzing);

        handle_worker_event(
            &mut app,
            WorkerEvent::Status {
                scan_id: req.scan_id,
                report: completed(42.0, "Deepfake"),
            },
        );
        assert_eq!(app.scan.phase(), Phase::Complete);
        assert_eq!(app.ui.status, "Analysis complete");
        assert!(app.ui.log.last().unwrap().ends_with("result: 42% DEEPFAKE"));
    }

    #[test]
    fn test_failed_job_sets_notice_and_status() {
        // 失敗ステータスは通知を出して待機へ戻る。
        let (mut app, _rx, _tx) = test_app();
        app.scan.select_file(sample_jpeg()).unwrap();
        let req = app.scan.start_analysis().unwrap();
        handle_worker_event(
            &mut app,
            WorkerEvent::Submitted {
                scan_id: req.scan_id,
                job_id: "j".into(),
            },
        );
        handle_worker_event(
            &mut app,
            WorkerEvent::Status {
                scan_id: req.scan_id,
                report: failed("Could not open video"),
            },
        );
        assert_eq!(app.scan.phase(), Phase::Idle);
        assert_eq!(app.ui.status, "Analysis failed");
        assert!(app.scan.notice().is_some());
    }

    #[test]
    fn test_poll_abort_does_not_notify_user() {
        // ポーリングの通信エラーは通知しない。
        let (mut app, _rx, _tx) = test_app();
        app.scan.select_file(sample_jpeg()).unwrap();
        let req = app.scan.start_analysis().unwrap();
        handle_worker_event(
            &mut app,
            WorkerEvent::Submitted {
                scan_id: req.scan_id,
                job_id: "j".into(),
            },
        );
        let status_before = app.ui.status.clone();
        handle_worker_event(
            &mut app,
            WorkerEvent::PollAborted {
                scan_id: req.scan_id,
                error: "connection reset".into(),
            },
        );
        assert_eq!(app.scan.phase(), Phase::Analyzing);
        assert!(app.scan.notice().is_none());
        assert_eq!(app.ui.status, status_before);
    }
}
