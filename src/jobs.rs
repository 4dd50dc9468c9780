//! スキャン対象ファイル、ジョブ、解析結果のモデル。

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use uuid::Uuid;

/// 受け付けるメディア種別（MIMEのトップレベル）。
const ACCEPTED_MEDIA: [&str; 3] = ["image", "video", "audio"];

/// アップロード前に選択されたファイル。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    /// ローカルのファイルパス。
    pub path: PathBuf,
    /// 表示とmultipartに使うファイル名。
    pub name: String,
    /// ファイルサイズ（バイト）。
    pub size_bytes: u64,
    /// 拡張子から推定したMIMEタイプ。
    pub content_type: String,
}

impl SelectedFile {
    /// パスを検証してファイル情報を組み立てる。
    pub fn from_path(raw: &str) -> Result<Self> {
        // 前後の空白と引用符を取り除き、~ を展開する。
        let path = expand_home(raw.trim().trim_matches('"'));
        if path.as_os_str().is_empty() {
            return Err(anyhow!("no file path given"));
        }
        // 通常ファイルであることを確認する。
        let meta = std::fs::metadata(&path)
            .map_err(|e| anyhow!("cannot read {}: {e}", path.display()))?;
        if !meta.is_file() {
            return Err(anyhow!("{} is not a regular file", path.display()));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?;
        // MIMEタイプを推定し、不明ならバイナリ扱いにする。
        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        let file = Self {
            path,
            name,
            size_bytes: meta.len(),
            content_type,
        };
        file.ensure_supported_media()?;
        Ok(file)
    }

    /// 画像・動画・音声以外はサービス側で拒否されるため先に弾く。
    pub fn ensure_supported_media(&self) -> Result<()> {
        let top = self.content_type.split('/').next().unwrap_or_default();
        if ACCEPTED_MEDIA.contains(&top) {
            Ok(())
        } else {
            Err(anyhow!(
                "unsupported media type {} (upload MP4, JPG, PNG, or WAV)",
                self.content_type
            ))
        }
    }
}

/// 先頭の `~/` をホームディレクトリへ展開する。
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return Path::new(&home).join(rest);
    }
    PathBuf::from(raw)
}

/// クライアント側から見たスキャンの段階。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// 待機中（ファイル選択と開始が可能）。
    #[default]
    Idle,
    /// multipart送信中。
    Uploading,
    /// ステータスをポーリング中。
    Analyzing,
    /// 結果表示中。
    Complete,
}

impl Phase {
    /// ステータスバー用の短いラベル。
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Uploading => "Uploading",
            Phase::Analyzing => "Analyzing",
            Phase::Complete => "Complete",
        }
    }
}

/// サービスが受理した解析ジョブ。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisJob {
    /// クライアント側の相関ID（start_analysis毎に発行）。
    pub scan_id: Uuid,
    /// サービスが払い出した不透明なジョブID。
    pub job_id: String,
}

/// サービスの判定区分。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Authentic,
    Deepfake,
    Filtered,
    /// 区分が無い旧形式でスコアから導出した判定。
    Manipulated,
    /// 未知の区分文字列（そのまま表示する）。
    Unrecognized(String),
}

impl Classification {
    /// 大文字小文字を無視して区分文字列を解釈する。
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "authentic" | "real" => Classification::Authentic,
            "deepfake" | "fake" => Classification::Deepfake,
            "filtered" => Classification::Filtered,
            "manipulated" => Classification::Manipulated,
            _ => Classification::Unrecognized(raw.trim().to_string()),
        }
    }

    /// 区分が無い場合にスコアとしきい値から判定する。
    pub fn from_score(score: f64, authentic_threshold: f64) -> Self {
        if score > authentic_threshold {
            Classification::Authentic
        } else {
            Classification::Manipulated
        }
    }

    /// 本物判定かどうか（配色の切り替えに使う）。
    pub fn is_authentic(&self) -> bool {
        matches!(self, Classification::Authentic)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Authentic => f.write_str("Authentic"),
            Classification::Deepfake => f.write_str("Deepfake"),
            Classification::Filtered => f.write_str("Filtered"),
            Classification::Manipulated => f.write_str("Manipulated"),
            Classification::Unrecognized(s) => f.write_str(s),
        }
    }
}

/// 完了したジョブの解析結果。受信後は変更しない。
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    /// 真正性スコア（0〜100）。
    pub authenticity_score: f64,
    /// 判定区分。
    pub classification: Classification,
    /// フィンガープリントのスコア（サービスが返した場合のみ）。
    pub fingerprint_score: Option<f64>,
    /// 検出された改ざん種別。
    pub manipulation_type: Option<String>,
    /// 検出されたアーティファクト一覧。
    pub artifacts: Vec<String>,
    /// 詳細メッセージ。
    pub details: String,
    /// 受信時刻。
    pub received_at: DateTime<Local>,
}

/// スコアを "42%" 形式の表示文字列にする。
pub fn score_label(score: f64) -> String {
    // 整数値なら小数点以下を省き、それ以外は末尾の0を削る。
    if score.fract() == 0.0 {
        format!("{score:.0}%")
    } else {
        let s = format!("{score:.2}");
        format!("{}%", s.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// 判定区分を大文字のタグ表記にする。
pub fn classification_tag(classification: &Classification) -> String {
    classification.to_string().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_label_formats() {
        // 整数と小数のスコア表示を検証する。
        assert_eq!(score_label(42.0), "42%");
        assert_eq!(score_label(88.5), "88.5%");
        assert_eq!(score_label(15.25), "15.25%");
        assert_eq!(score_label(0.0), "0%");
    }

    #[test]
    fn test_classification_tag_is_uppercase() {
        assert_eq!(classification_tag(&Classification::Deepfake), "DEEPFAKE");
        assert_eq!(classification_tag(&Classification::Authentic), "AUTHENTIC");
        assert_eq!(
            classification_tag(&Classification::Unrecognized("Synthetic Voice".into())),
            "SYNTHETIC VOICE"
        );
    }

    #[test]
    fn test_classification_parse_is_case_insensitive() {
        assert_eq!(Classification::parse("DeepFake"), Classification::Deepfake);
        assert_eq!(Classification::parse(" filtered "), Classification::Filtered);
        assert_eq!(
            Classification::parse("Unknown"),
            Classification::Unrecognized("Unknown".into())
        );
    }

    #[test]
    fn test_classification_from_score_uses_strict_threshold() {
        // しきい値ちょうどは本物扱いにしない。
        assert_eq!(
            Classification::from_score(70.0, 70.0),
            Classification::Manipulated
        );
        assert_eq!(
            Classification::from_score(70.5, 70.0),
            Classification::Authentic
        );
    }

    #[test]
    fn test_from_path_rejects_missing_and_unsupported_files() {
        // 存在しないパスはエラーになる。
        assert!(SelectedFile::from_path("/definitely/not/here.jpg").is_err());
        assert!(SelectedFile::from_path("   ").is_err());

        // テキストファイルはメディアとして受け付けない。
        let dir = std::env::temp_dir();
        let txt = dir.join(format!("forensic-scan-{}.txt", Uuid::new_v4()));
        std::fs::write(&txt, b"hello").unwrap();
        let err = SelectedFile::from_path(txt.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("unsupported media type"));
        std::fs::remove_file(&txt).unwrap();
    }

    #[test]
    fn test_from_path_reads_name_size_and_mime() {
        let dir = std::env::temp_dir();
        let jpg = dir.join(format!("forensic-scan-{}.jpg", Uuid::new_v4()));
        std::fs::write(&jpg, vec![0u8; 2048]).unwrap();

        let file = SelectedFile::from_path(&format!("\"{}\"", jpg.display())).unwrap();
        assert_eq!(file.size_bytes, 2048);
        assert_eq!(file.content_type, "image/jpeg");
        assert!(file.name.ends_with(".jpg"));
        std::fs::remove_file(&jpg).unwrap();
    }
}
