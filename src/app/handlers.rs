//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::{
    events::Screen,
    input::{InputBoxState, InputCallbackId},
    jobs::{Phase, SelectedFile},
    shortcuts,
    worker::WorkerCmd,
};

use super::{App, reload_settings_buffers};

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }

    // 通知は閉じるまで他の操作を受け付けない。
    if app.scan.notice().is_some() {
        if shortcuts::matches_shortcut(&k, &app.shortcuts.notice.dismiss) {
            app.scan.dismiss_notice();
        }
        return Ok(false);
    }

    // 画面ごとのハンドラへ委譲する。
    match app.ui.screen {
        Screen::Main => handle_main_key(app, k).await,
        Screen::Settings => handle_settings_key(app, k).await,
    }
}

/// ペーストされた文字列を入力ボックスへ流し込む。
pub fn handle_paste(app: &mut App, text: &str) {
    if let Some(input_state) = &mut app.input_box {
        input_state.insert_str(text);
        return;
    }
    // ドラッグ&ドロップされたパスはファイル選択として受け取る。
    if app.ui.screen == Screen::Main
        && app.scan.phase() == Phase::Idle
        && app.scan.notice().is_none()
    {
        let mut input_state = InputBoxState::new(
            "Media file path (MP4, JPG, PNG, WAV):",
            String::new(),
            InputCallbackId::SelectFile,
        );
        input_state.insert_str(text);
        app.input_box = Some(input_state);
    }
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// スキャン画面のキー処理。
async fn handle_main_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.main;

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.settings) {
        // 設定画面へ遷移し、編集バッファを更新する。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Settings;
        app.ui.status = "Settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.select_file) {
        if app.scan.phase() == Phase::Idle {
            // 現在のファイルパスを初期値にして入力ボックスを開く。
            let current = app
                .scan
                .file()
                .map(|f| f.path.display().to_string())
                .unwrap_or_default();
            app.input_box = Some(InputBoxState::new(
                "Media file path (MP4, JPG, PNG, WAV):",
                current,
                InputCallbackId::SelectFile,
            ));
        } else {
            app.ui.status = "Finish or reset the current scan first (n)".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.start) {
        request_start(app).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.new_scan) {
        request_reset(app).await?;
    }

    Ok(false)
}

/// 選択中のファイルでスキャンを開始する。
pub async fn request_start(app: &mut App) -> Result<()> {
    match app.scan.start_analysis() {
        Some(req) => {
            // アップロードをWorkerへ依頼する。
            app.ui.push_log(format!("uploading {}", req.file.name));
            app.worker_tx
                .send(WorkerCmd::StartAnalysis {
                    scan_id: req.scan_id,
                    file: req.file,
                })
                .await?;
            app.ui.status = "Uploading...".into();
        }
        None if app.scan.phase() == Phase::Idle => {
            app.ui.status = "Select a media file first (o)".into();
        }
        None => {}
    }
    Ok(())
}

/// 状態をすべてクリアし、実行中のスキャンがあれば止める。
pub async fn request_reset(app: &mut App) -> Result<()> {
    if let Some(scan_id) = app.scan.reset_analysis() {
        tracing::info!("reset cancels scan {scan_id}");
        app.worker_tx.send(WorkerCmd::CancelAnalysis).await?;
    }
    app.ui.error = None;
    app.ui.status = "Ready for a new forensic scan".into();
    Ok(())
}

/// 設定画面のキー処理。
async fn handle_settings_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.settings;

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 変更を破棄してメイン画面へ戻る。
        reload_settings_buffers(app);
        app.ui.error = None;
        app.ui.screen = Screen::Main;
    } else if shortcuts::matches_shortcut(&k, &sc.save) {
        save_settings(app).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.base_url) {
        app.input_box = Some(InputBoxState::new(
            "Service base URL:",
            app.base_url.clone(),
            InputCallbackId::SettingsBaseUrl,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.poll_interval) {
        app.input_box = Some(InputBoxState::new(
            "Poll interval (ms):",
            app.poll_interval_ms.clone(),
            InputCallbackId::SettingsPollInterval,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.threshold) {
        app.input_box = Some(InputBoxState::new(
            "Authentic threshold (0-100):",
            app.threshold.clone(),
            InputCallbackId::SettingsThreshold,
        ));
    }

    Ok(false)
}

/// 編集バッファを検証して保存し、Workerへ通知する。
async fn save_settings(app: &mut App) -> Result<()> {
    // 数値として解釈できなければ保存しない。
    let mut next = app.cfg.clone();
    next.service.base_url = app.base_url.trim().to_string();
    let parsed = app
        .poll_interval_ms
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("poll interval: {e}"))
        .and_then(|ms| {
            app.threshold
                .trim()
                .parse::<f64>()
                .map(|t| (ms, t))
                .map_err(|e| format!("threshold: {e}"))
        });
    let (ms, threshold) = match parsed {
        Ok(v) => v,
        Err(e) => {
            app.ui.error = Some(e);
            return Ok(());
        }
    };
    next.service.poll_interval_ms = ms;
    next.scan.authentic_threshold = threshold;
    if let Err(e) = next.validate() {
        app.ui.error = Some(e.to_string());
        return Ok(());
    }

    // 設定ファイルを保存し、状態機械とWorkerへ反映する。
    next.save(&app.cfg_path)?;
    app.scan.set_authentic_threshold(threshold);
    app.worker_tx
        .send(WorkerCmd::SaveSettings(next.clone()))
        .await?;
    app.cfg = next;
    app.ui.error = None;
    app.ui.screen = Screen::Main;
    app.ui.status = "Saved settings".into();
    Ok(())
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };
    let sc = &app.shortcuts.input_box;

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 入力ボックスを閉じる前に値とコールバック種別を保存する。
        let value = input_state.value.clone();
        let callback_id = input_state.callback_id.clone();
        app.input_box = None;
        apply_input_callback(app, callback_id, value);
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        app.input_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if shortcuts::matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if shortcuts::matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if shortcuts::matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if shortcuts::matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if shortcuts::matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if shortcuts::matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code
        && !k.modifiers.contains(KeyModifiers::CONTROL)
    {
        // コントロールキーでない場合のみ挿入する。
        input_state.insert_char(c);
    }

    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
fn apply_input_callback(app: &mut App, callback_id: InputCallbackId, value: String) {
    match callback_id {
        InputCallbackId::SelectFile => select_file(app, &value),
        InputCallbackId::SettingsBaseUrl => app.base_url = value,
        InputCallbackId::SettingsPollInterval => app.poll_interval_ms = value,
        InputCallbackId::SettingsThreshold => app.threshold = value,
    }
}

/// パスを検証して状態機械へファイルを渡す。
fn select_file(app: &mut App, raw: &str) {
    let selected = SelectedFile::from_path(raw).and_then(|f| {
        let name = f.name.clone();
        app.scan.select_file(f).map(|_| name)
    });
    match selected {
        Ok(name) => {
            app.ui.error = None;
            app.ui.push_log(format!("selected {name}"));
            app.ui.status = "Press Enter to initiate the deep scan".into();
        }
        Err(e) => {
            tracing::warn!("file selection rejected: {e}");
            app.ui.error = Some(e.to_string());
        }
    }
}
