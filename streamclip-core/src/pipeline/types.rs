use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::PipelineError;

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayJobRequest {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobSuccess {
    pub file: PathBuf,
    pub total_time: f64,
}

/// Response body shared by `/process` and `/tiktok`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobReport {
    Success { file: String, total_time: f64 },
    Error { message: String },
}

impl From<&JobSuccess> for JobReport {
    fn from(success: &JobSuccess) -> Self {
        JobReport::Success {
            file: success.file.to_string_lossy().to_string(),
            total_time: success.total_time,
        }
    }
}

impl From<&PipelineError> for JobReport {
    fn from(error: &PipelineError) -> Self {
        JobReport::Error {
            message: error.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_tagged_by_status() {
        let success = JobReport::from(&JobSuccess {
            file: PathBuf::from("downloads/job1_futebol.mp4"),
            total_time: 1.5,
        });
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            serde_json::json!({
                "status": "success",
                "file": "downloads/job1_futebol.mp4",
                "total_time": 1.5
            })
        );

        let error = JobReport::from(&PipelineError::NoManifest {
            url: "https://example.com".into(),
        });
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "status": "error",
                "message": "No m3u8 links found after retries."
            })
        );
    }
}
