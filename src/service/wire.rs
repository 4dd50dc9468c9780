//! Status payload schema.
//!
//! The service has shipped several shapes of the status body. The flat form is
//! canonical; `score`, `manipulations`, `details` and a nested `result` object
//! are accepted as legacy aliases.

use chrono::Local;
use serde::Deserialize;

use super::ServiceError;
use crate::jobs::{AnalysisResult, Classification};

/// Job status as reported by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// Any other value; polling continues.
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => JobStatus::Queued,
            "processing" | "running" => JobStatus::Processing,
            "completed" | "complete" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Other(raw.to_string()),
        }
    }

    /// Completed and failed end the polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Result fields as reported, before validation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportedResult {
    pub authenticity_score: Option<f64>,
    pub classification: Option<String>,
    pub fingerprint_score: Option<f64>,
    pub manipulation_type: Option<String>,
    pub artifacts: Vec<String>,
}

/// One normalised status response.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub status: JobStatus,
    pub message: Option<String>,
    pub result: ReportedResult,
}

/// Upload response body.
#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub job_id: String,
}

/// Error body in the FastAPI style (`{"detail": ...}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
    #[serde(default)]
    result: Option<ResultFields>,
    #[serde(flatten)]
    fields: ResultFields,
}

/// Result fields at either level. Legacy names are separate fields so a body
/// carrying both spellings still decodes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultFields {
    message: Option<String>,
    details: Option<String>,
    authenticity_score: Option<f64>,
    score: Option<f64>,
    classification: Option<String>,
    fingerprint_score: Option<f64>,
    manipulation_type: Option<String>,
    artifacts_detected: Option<Vec<String>>,
    manipulations: Option<Vec<String>>,
}

impl ResultFields {
    /// Fold legacy names into the canonical ones. The canonical name wins.
    fn canonical(self) -> Self {
        Self {
            message: self.message.or(self.details),
            details: None,
            authenticity_score: self.authenticity_score.or(self.score),
            score: None,
            classification: self.classification,
            fingerprint_score: self.fingerprint_score,
            manipulation_type: self.manipulation_type,
            artifacts_detected: self.artifacts_detected.or(self.manipulations),
            manipulations: None,
        }
    }

    /// Values present in `self` replace those in `base`.
    fn over(self, base: Self) -> Self {
        Self {
            message: self.message.or(base.message),
            details: None,
            authenticity_score: self.authenticity_score.or(base.authenticity_score),
            score: None,
            classification: self.classification.or(base.classification),
            fingerprint_score: self.fingerprint_score.or(base.fingerprint_score),
            manipulation_type: self.manipulation_type.or(base.manipulation_type),
            artifacts_detected: self.artifacts_detected.or(base.artifacts_detected),
            manipulations: None,
        }
    }
}

/// Decode a status body; nested `result` values win over flat ones.
pub fn parse_status(body: &[u8]) -> Result<StatusReport, ServiceError> {
    let p: StatusPayload =
        serde_json::from_slice(body).map_err(|e| ServiceError::Malformed(e.to_string()))?;

    let mut fields = p.fields.canonical();
    if let Some(nested) = p.result {
        fields = nested.canonical().over(fields);
    }

    Ok(StatusReport {
        status: JobStatus::parse(&p.status),
        message: fields.message,
        result: ReportedResult {
            authenticity_score: fields.authenticity_score,
            classification: fields.classification,
            fingerprint_score: fields.fingerprint_score,
            manipulation_type: fields.manipulation_type,
            artifacts: fields.artifacts_detected.unwrap_or_default(),
        },
    })
}

/// Extract a readable reason from an error response body.
pub(crate) fn error_detail(body: &[u8]) -> Option<String> {
    let b: ErrorBody = serde_json::from_slice(body).ok()?;
    match b.detail {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl StatusReport {
    /// Turn a completed report into a result, deriving the classification
    /// from the score when the service sent none.
    pub fn to_result(&self, authentic_threshold: f64) -> Result<AnalysisResult, String> {
        let r = &self.result;
        let score = r
            .authenticity_score
            .ok_or_else(|| "completed without an authenticity score".to_string())?;
        if !(0.0..=100.0).contains(&score) {
            return Err(format!("authenticity score {score} out of range"));
        }
        let classification = match r.classification.as_deref() {
            Some(c) if !c.trim().is_empty() => Classification::parse(c),
            _ => Classification::from_score(score, authentic_threshold),
        };
        Ok(AnalysisResult {
            authenticity_score: score,
            classification,
            fingerprint_score: r.fingerprint_score,
            manipulation_type: r.manipulation_type.clone(),
            artifacts: r.artifacts.clone(),
            details: self.message.clone().unwrap_or_default(),
            received_at: Local::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_completed_payload() {
        let body = br#"{
            "job_id": "abc123",
            "status": "completed",
            "filename": "face.jpg",
            "authenticity_score": 42,
            "classification": "Deepfake",
            "fingerprint_score": 0.87,
            "manipulation_type": "Generative Artifacts",
            "artifacts_detected": ["Spatial inconsistent noise"],
            "message": "Analysis complete."
        }"#;
        let report = parse_status(body).unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.result.authenticity_score, Some(42.0));
        assert_eq!(report.result.classification.as_deref(), Some("Deepfake"));
        assert_eq!(report.result.fingerprint_score, Some(0.87));
        assert_eq!(report.result.artifacts, vec!["Spatial inconsistent noise"]);
        assert_eq!(report.message.as_deref(), Some("Analysis complete."));
    }

    #[test]
    fn test_parse_nested_result_with_legacy_names() {
        let body = br#"{
            "status": "completed",
            "message": "outer",
            "result": {
                "score": 91.5,
                "classification": "Authentic",
                "manipulations": [],
                "details": "inner"
            }
        }"#;
        let report = parse_status(body).unwrap();
        assert_eq!(report.result.authenticity_score, Some(91.5));
        assert_eq!(report.result.classification.as_deref(), Some("Authentic"));
        assert!(report.result.artifacts.is_empty());
        assert_eq!(report.message.as_deref(), Some("inner"));
    }

    #[test]
    fn test_parse_accepts_canonical_and_legacy_names_together() {
        let body = br#"{"status": "completed", "authenticity_score": 42, "score": 40,
                        "classification": "Deepfake", "message": "m", "details": "d",
                        "artifacts_detected": ["warp"], "manipulations": ["blur"]}"#;
        let report = parse_status(body).unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.result.authenticity_score, Some(42.0));
        assert_eq!(report.message.as_deref(), Some("m"));
        assert_eq!(report.result.artifacts, vec!["warp"]);

        let nested = br#"{"status": "completed", "score": 10,
                          "result": {"score": 55, "authenticity_score": 61,
                                     "details": "inner", "message": "inner-canonical"}}"#;
        let report = parse_status(nested).unwrap();
        assert_eq!(report.result.authenticity_score, Some(61.0));
        assert_eq!(report.message.as_deref(), Some("inner-canonical"));
    }

    #[test]
    fn test_parse_legacy_only_flat_payload() {
        let body = br#"{"status": "completed", "score": 77.5, "details": "legacy",
                        "manipulations": ["Face swap"]}"#;
        let report = parse_status(body).unwrap();
        assert_eq!(report.result.authenticity_score, Some(77.5));
        assert_eq!(report.message.as_deref(), Some("legacy"));
        assert_eq!(report.result.artifacts, vec!["Face swap"]);
    }

    #[test]
    fn test_parse_tolerates_nulls_and_unknown_status() {
        let body = br#"{"status": "warming_up", "authenticity_score": null,
                        "artifacts_detected": null, "message": "queued"}"#;
        let report = parse_status(body).unwrap();
        assert_eq!(report.status, JobStatus::Other("warming_up".into()));
        assert!(!report.status.is_terminal());
        assert_eq!(report.result, ReportedResult::default());
    }

    #[test]
    fn test_parse_rejects_missing_status() {
        let err = parse_status(br#"{"authenticity_score": 10}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }

    #[test]
    fn test_to_result_derives_classification_from_score() {
        let body = br#"{"status": "completed", "authenticity_score": 88.5,
                        "manipulation_type": "None", "message": "ok"}"#;
        let result = parse_status(body).unwrap().to_result(70.0).unwrap();
        assert_eq!(result.classification, Classification::Authentic);
        assert_eq!(result.details, "ok");

        let body = br#"{"status": "completed", "authenticity_score": 30}"#;
        let result = parse_status(body).unwrap().to_result(70.0).unwrap();
        assert_eq!(result.classification, Classification::Manipulated);
    }

    #[test]
    fn test_to_result_requires_score_in_range() {
        let missing = parse_status(br#"{"status": "completed"}"#).unwrap();
        assert!(missing.to_result(70.0).is_err());

        let too_big = parse_status(br#"{"status": "completed", "score": 140}"#).unwrap();
        assert!(too_big.to_result(70.0).is_err());
    }

    #[test]
    fn test_error_detail_extraction() {
        assert_eq!(
            error_detail(br#"{"detail": "Invalid file type."}"#).as_deref(),
            Some("Invalid file type.")
        );
        assert_eq!(error_detail(b"Internal Server Error"), None);
        assert!(
            error_detail(br#"{"detail": [{"msg": "field required"}]}"#)
                .unwrap()
                .contains("field required")
        );
    }
}
