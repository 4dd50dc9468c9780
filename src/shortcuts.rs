//! ショートカット設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ショートカット設定の全体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortcuts {
    pub main: MainShortcuts,
    pub settings: SettingsShortcuts,
    pub notice: NoticeShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// スキャン画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainShortcuts {
    pub quit: Vec<String>,
    pub settings: Vec<String>,
    pub select_file: Vec<String>,
    pub start: Vec<String>,
    pub new_scan: Vec<String>,
}

/// 設定画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsShortcuts {
    pub cancel: Vec<String>,
    pub save: Vec<String>,
    pub base_url: Vec<String>,
    pub poll_interval: Vec<String>,
    pub threshold: Vec<String>,
}

/// 通知ポップアップのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeShortcuts {
    pub dismiss: Vec<String>,
}

/// InputBoxのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub clear_line: Vec<String>,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            // 既存ファイルを読み込んでパースする。
            let content = std::fs::read_to_string(path)?;
            let shortcuts: Shortcuts = toml::from_str(&content)?;
            Ok(shortcuts)
        } else {
            // 未作成の場合は既定値を利用する。
            Ok(Self::default())
        }
    }
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            main: MainShortcuts {
                quit: vec!["q".into()],
                settings: vec!["t".into()],
                select_file: vec!["o".into()],
                start: vec!["Enter".into(), "s".into()],
                new_scan: vec!["n".into()],
            },
            settings: SettingsShortcuts {
                cancel: vec!["Esc".into()],
                save: vec!["Enter".into()],
                base_url: vec!["u".into()],
                poll_interval: vec!["p".into()],
                threshold: vec!["a".into()],
            },
            notice: NoticeShortcuts {
                dismiss: vec!["Enter".into(), "Esc".into()],
            },
            input_box: InputBoxShortcuts {
                confirm: vec!["Enter".into()],
                cancel: vec!["Esc".into()],
                backspace: vec!["Backspace".into()],
                delete: vec!["Delete".into()],
                left: vec!["Left".into()],
                right: vec!["Right".into()],
                home: vec!["Home".into()],
                end: vec!["End".into()],
                clear_line: vec!["Ctrl+u".into()],
            },
        }
    }
}

/// KeyEventがいずれかのショートカット文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts.iter().any(|s| matches_single_shortcut(key, s))
}

/// KeyEventが単一のショートカット文字列と一致するか判定する。
fn matches_single_shortcut(key: &KeyEvent, shortcut: &str) -> bool {
    // "Ctrl+u" のような修飾キー付き表記を分解する。
    let (modifiers_str, key_str) = match shortcut.rsplit_once('+') {
        Some((mods, k)) if !k.is_empty() => (mods.split('+').collect::<Vec<_>>(), k),
        _ => (vec![], shortcut),
    };

    // 修飾キーを解析して期待値を作る。
    let mut expected_modifiers = KeyModifiers::empty();
    for modifier in modifiers_str {
        match modifier.to_ascii_lowercase().as_str() {
            "ctrl" => expected_modifiers |= KeyModifiers::CONTROL,
            "alt" => expected_modifiers |= KeyModifiers::ALT,
            "shift" => expected_modifiers |= KeyModifiers::SHIFT,
            _ => return false,
        }
    }

    // 大文字入力では端末がSHIFTを付けて送ることがあるため無視する。
    let actual = if let KeyCode::Char(c) = key.code
        && c.is_ascii_uppercase()
    {
        key.modifiers.difference(KeyModifiers::SHIFT)
    } else {
        key.modifiers
    };
    if actual != expected_modifiers {
        return false;
    }

    // キーコードの種別ごとに一致判定を行う。
    let code = match key_str.to_ascii_lowercase().as_str() {
        "enter" => KeyCode::Enter,
        "esc" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "delete" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        // 単一文字は Char として比較する（大文字小文字は区別する）。
        _ => {
            let mut chars = key_str.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return false,
            }
        }
    };
    key.code == code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_shortcut_simple_char() {
        // 単一文字の一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('o'), KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("o")]));
        assert!(!matches_shortcut(&key, &[String::from("n")]));
    }

    #[test]
    fn test_matches_shortcut_special_key() {
        // 特殊キーの一致判定を検証する（表記の大文字小文字は問わない）。
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::empty());
        assert!(matches_shortcut(&key, &[String::from("Enter")]));
        assert!(matches_shortcut(&key, &[String::from("enter")]));
        assert!(!matches_shortcut(&key, &[String::from("Esc")]));
    }

    #[test]
    fn test_matches_shortcut_with_modifier() {
        // 修飾キー付きの一致判定を検証する。
        let key = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert!(matches_shortcut(&key, &[String::from("Ctrl+u")]));
        assert!(!matches_shortcut(&key, &[String::from("u")]));
        assert!(!matches_shortcut(&key, &[String::from("Hyper+u")]));
    }

    #[test]
    fn test_matches_shortcut_uppercase_with_shift() {
        // SHIFT付きで届く大文字も一致させる。
        let key = KeyEvent::new(KeyCode::Char('N'), KeyModifiers::SHIFT);
        assert!(matches_shortcut(&key, &[String::from("N")]));
        assert!(!matches_shortcut(&key, &[String::from("n")]));
    }

    #[test]
    fn test_default_start_accepts_enter_and_s() {
        // 開始キーは複数割り当てられている。
        let sc = Shortcuts::default();
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::empty());
        let s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::empty());
        assert!(matches_shortcut(&enter, &sc.main.start));
        assert!(matches_shortcut(&s, &sc.main.start));
        assert!(!matches_shortcut(&s, &sc.main.new_scan));
    }

    #[test]
    fn test_shortcuts_toml_round_trip() {
        // TOMLへ書き出して読み戻しても同じ割り当てになる。
        let sc = Shortcuts::default();
        let s = toml::to_string_pretty(&sc).unwrap();
        let back: Shortcuts = toml::from_str(&s).unwrap();
        assert_eq!(back.main.select_file, sc.main.select_file);
        assert_eq!(back.input_box.clear_line, sc.input_box.clear_line);
    }
}
