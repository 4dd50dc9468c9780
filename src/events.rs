//! 画面遷移用のUI状態と画面種別。

/// INFOパネルに保持するログの最大行数。
const LOG_CAPACITY: usize = 200;

/// TUIで現在表示中の画面。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// スキャン画面。
    Main,
    /// 設定編集画面。
    Settings,
}

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 現在の画面。
    pub screen: Screen,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
}

impl UiState {
    /// 初期状態を作る。
    pub fn new() -> Self {
        Self {
            screen: Screen::Main,
            log: vec![],
            status: "Ready".into(),
            error: None,
        }
    }

    /// 時刻付きでログを追加し、古い行を捨てる。
    pub fn push_log(&mut self, line: impl AsRef<str>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log.push(format!("{stamp} {}", line.as_ref()));
        if self.log.len() > LOG_CAPACITY {
            let overflow = self.log.len() - LOG_CAPACITY;
            self.log.drain(..overflow);
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}
