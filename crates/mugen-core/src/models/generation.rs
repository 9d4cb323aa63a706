use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::validation::validate_request_id;

/// Which generation flow a request targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    ImageToVideo,
    FirstAndLastFrameToVideo,
}

impl GenerationKind {
    /// Task name passed to the generation engine.
    pub fn engine_task(&self) -> &'static str {
        match self {
            GenerationKind::ImageToVideo => "i2v-A14B",
            GenerationKind::FirstAndLastFrameToVideo => "flf2v-A14B",
        }
    }
}

impl Display for GenerationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GenerationKind::ImageToVideo => write!(f, "image_to_video"),
            GenerationKind::FirstAndLastFrameToVideo => write!(f, "first_and_last_frame_to_video"),
        }
    }
}

impl FromStr for GenerationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_to_video" => Ok(GenerationKind::ImageToVideo),
            "first_and_last_frame_to_video" => Ok(GenerationKind::FirstAndLastFrameToVideo),
            _ => Err(anyhow::anyhow!("Invalid generation kind: {}", s)),
        }
    }
}

/// Decoded `data` envelope of an intake request.
///
/// Only `request_id` is required. `prompt` and `resolution` are picked up when
/// they are strings and ignored otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenerationRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl GenerationRequest {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| AppError::InvalidInput(format!("Field 'data' is not valid JSON: {}", e)))?;

        let object = value.as_object().ok_or_else(|| {
            AppError::InvalidInput("Field 'data' must be a JSON object".to_string())
        })?;

        let request_id = object
            .get("request_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::InvalidInput("Field 'data' must contain a string 'request_id'".to_string())
            })?
            .to_string();

        validate_request_id(&request_id)?;

        let optional_string = |key: &str| {
            object
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Ok(GenerationRequest {
            request_id,
            prompt: optional_string("prompt"),
            resolution: optional_string("resolution"),
        })
    }
}

/// Paths of the staged input images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

impl GenerationInputs {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.first.is_none() && self.last.is_none()
    }

    /// Whether the inputs are enough to run `kind`.
    pub fn satisfies(&self, kind: GenerationKind) -> bool {
        match kind {
            GenerationKind::ImageToVideo => self.image.is_some(),
            GenerationKind::FirstAndLastFrameToVideo => {
                self.first.is_some() && self.last.is_some()
            }
        }
    }
}

/// Body returned by the synchronous intake endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IntakeResponse {
    pub request_id: String,
    pub blob_path: String,
}
