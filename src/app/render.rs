//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
};

use crate::{
    controller::Notice,
    events::Screen,
    input,
    jobs::{AnalysisResult, Phase, classification_tag, score_label},
    layout,
    shortcuts::Shortcuts,
};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // メインレイアウト（Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());
    let body_layout = layout::create_body_layout(main_layout.body);

    // 左パネル：設定画面なら設定一覧、それ以外はスキャン表示。
    match app.ui.screen {
        Screen::Main => draw_scan_panel(f, app, body_layout.scan_panel),
        Screen::Settings => draw_settings_panel(f, app, body_layout.scan_panel),
    }

    // INFOパネルとして描画する。
    let info_panel = Paragraph::new(build_info_text(app))
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body_layout.info_panel);

    // HELPバー（画面ごとのショートカット）を描画する。
    let help_text = get_help_text(&app.ui.screen, &app.shortcuts);
    let help_bar = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバー（フェーズ・メッセージ・エラー）を描画する。
    f.render_widget(build_status_bar(app), main_layout.status_bar);

    // 通知が出ていれば最前面に重ねる。
    if let Some(notice) = app.scan.notice() {
        draw_notice(f, notice, &app.shortcuts);
    }

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

/// SCANパネルをフェーズに応じて描画する。
fn draw_scan_panel(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("SCAN");
    let inner = block.inner(area);
    f.render_widget(block, area);
    let scan_layout = layout::create_scan_layout(inner);

    let phase = app.scan.phase();
    let heading = match phase {
        Phase::Complete => "Forensic Scan Result",
        _ => "Start New Forensic Scan",
    };
    let heading = Paragraph::new(heading)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    f.render_widget(heading, scan_layout.heading);

    // 進捗ゲージ。待機と完了では空欄にする。
    if let Some((percent, label)) = progress(phase) {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Rgb(255, 140, 0)))
            .percent(percent)
            .label(label);
        f.render_widget(gauge, scan_layout.gauge);
    }

    let content = match (phase, app.scan.result()) {
        (Phase::Complete, Some(result)) => result_text(result, &app.shortcuts),
        _ => file_text(app),
    };
    let content = Paragraph::new(content).wrap(Wrap { trim: false });
    f.render_widget(content, scan_layout.content);
}

/// 送信中・解析中のゲージ値とラベル。
fn progress(phase: Phase) -> Option<(u16, &'static str)> {
    match phase {
        Phase::Uploading => Some((35, "UPLOADING")),
        Phase::Analyzing => Some((75, "SCANNING")),
        Phase::Idle | Phase::Complete => None,
    }
}

/// 待機中・実行中に表示するファイル情報。
fn file_text(app: &App) -> Text<'static> {
    let Some(file) = app.scan.file() else {
        return Text::from(vec![
            Line::from("Select Media").bold(),
            Line::from(""),
            Line::from(format!(
                "Press {} to choose a file (MP4, JPG, PNG, WAV), or paste its path.",
                format_keys(&app.shortcuts.main.select_file)
            )),
        ]);
    };

    let mut lines = vec![
        Line::from(file.name.clone()).bold(),
        Line::from(format!(
            "{} | {}",
            size_label(file.size_bytes),
            file.content_type
        )),
        Line::from(""),
    ];
    let hint = match app.scan.phase() {
        Phase::Idle => format!(
            "Press {} to initiate the deep scan.",
            format_keys(&app.shortcuts.main.start)
        ),
        Phase::Uploading => "Uploading media to the analysis service...".into(),
        Phase::Analyzing => "Running forensic analysis...".into(),
        Phase::Complete => String::new(),
    };
    lines.push(Line::from(hint));
    Text::from(lines)
}

/// 解析結果の表示テキスト。
fn result_text(result: &AnalysisResult, shortcuts: &Shortcuts) -> Text<'static> {
    // 本物判定は緑、それ以外は赤で強調する。
    let verdict_color = if result.classification.is_authentic() {
        Color::Green
    } else {
        Color::Red
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                score_label(result.authenticity_score),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  authenticity  "),
            Span::styled(
                classification_tag(&result.classification),
                Style::default()
                    .fg(verdict_color)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
    ];
    if !result.details.is_empty() {
        lines.push(Line::from(result.details.clone()));
        lines.push(Line::from(""));
    }
    if let Some(score) = result.fingerprint_score {
        lines.push(Line::from(format!("Fingerprint: {}", score_label(score))));
    }
    if let Some(kind) = &result.manipulation_type {
        lines.push(Line::from(format!("Manipulation: {kind}")));
    }
    if !result.artifacts.is_empty() {
        lines.push(Line::from(format!(
            "Artifacts: {}",
            result.artifacts.join(", ")
        )));
    }
    lines.push(Line::from(format!(
        "Received: {}",
        result.received_at.format("%Y-%m-%d %H:%M:%S")
    )));
    lines.push(Line::from(""));
    lines.push(
        Line::from(format!(
            "{}: New Forensic Scan",
            format_keys(&shortcuts.main.new_scan)
        ))
        .fg(Color::Gray),
    );
    Text::from(lines)
}

/// 設定画面の一覧を描画する。
fn draw_settings_panel(f: &mut Frame, app: &App, area: Rect) {
    let sc = &app.shortcuts.settings;
    let text = format!(
        "[{}] Service URL:     {}\n[{}] Poll interval:   {} ms\n[{}] Authentic above: {}\n\nRequest timeout: {} s",
        format_keys(&sc.base_url),
        app.base_url,
        format_keys(&sc.poll_interval),
        app.poll_interval_ms,
        format_keys(&sc.threshold),
        app.threshold,
        app.cfg.service.request_timeout_secs,
    );
    let panel = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("SETTINGS"))
        .wrap(Wrap { trim: false });
    f.render_widget(panel, area);
}

/// INFOパネルのテキストを構築する。
fn build_info_text(app: &App) -> String {
    let (name, size, kind) = match app.scan.file() {
        Some(file) => (
            file.name.clone(),
            size_label(file.size_bytes),
            file.content_type.clone(),
        ),
        None => ("-".into(), "-".into(), "-".into()),
    };
    let job_id = app
        .scan
        .job()
        .map(|j| j.job_id.clone())
        .unwrap_or_else(|| "-".into());

    format!(
        "File: {}\nSize: {}\nType: {}\nJob: {}\n\nService: {}\n\nLog:\n{}",
        name,
        size,
        kind,
        job_id,
        app.cfg.service.base_url,
        app.ui
            .log
            .iter()
            .rev()
            .take(8)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let screen_name = match app.ui.screen {
        Screen::Main => app.scan.phase().label(),
        Screen::Settings => "Settings",
    };

    // エラーの有無でステータス文字列を切り替える。
    let status_text = if let Some(err) = &app.ui.error {
        format!("[{}] ERROR: {}", screen_name, err)
    } else {
        format!("[{}] {}", screen_name, app.ui.status)
    };

    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は赤色で強調表示する。
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }

    status_bar
}

/// 通知ポップアップを描画する。
fn draw_notice(f: &mut Frame, notice: &Notice, shortcuts: &Shortcuts) {
    let popup_area = layout::centered_popup(f.area(), 60, 9);
    f.render_widget(Clear, popup_area);

    let text = format!(
        "{}\n\n{}: close",
        notice.message,
        format_keys(&shortcuts.notice.dismiss)
    );
    let popup = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(notice.title.clone())
                .style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(popup, popup_area);
}

/// 現在画面に応じたヘルプ文字列を返す。
fn get_help_text(screen: &Screen, shortcuts: &Shortcuts) -> String {
    match screen {
        Screen::Main => format!(
            "{}: select file | {}: start scan | {}: new scan | {}: settings | {}: quit",
            format_keys(&shortcuts.main.select_file),
            format_keys(&shortcuts.main.start),
            format_keys(&shortcuts.main.new_scan),
            format_keys(&shortcuts.main.settings),
            format_keys(&shortcuts.main.quit)
        ),
        Screen::Settings => format!(
            "{}: service url | {}: poll interval | {}: threshold | {}: save | {}: cancel",
            format_keys(&shortcuts.settings.base_url),
            format_keys(&shortcuts.settings.poll_interval),
            format_keys(&shortcuts.settings.threshold),
            format_keys(&shortcuts.settings.save),
            format_keys(&shortcuts.settings.cancel)
        ),
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}

/// バイト数を読みやすい単位に変換する。
fn size_label(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
