//! Upload staging
//!
//! Reads the intake multipart form and writes the supplied images under the
//! uploads directory with names derived from the request id:
//! `{request_id}.{ext}`, `{request_id}_first.{ext}`, `{request_id}_last.{ext}`.
//! Existing files with the same name are overwritten.

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use bytes::Bytes;
use mugen_core::constants::{DATA_FIELD, FIRST_FRAME_FIELD, IMAGE_FIELD, LAST_FRAME_FIELD};
use mugen_core::models::{GenerationInputs, GenerationKind, GenerationRequest};
use mugen_core::validation::validate_file_extension;
use mugen_core::{AppError, Config};

use crate::error::multipart_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRole {
    Image,
    First,
    Last,
}

impl UploadRole {
    pub fn field(&self) -> &'static str {
        match self {
            UploadRole::Image => IMAGE_FIELD,
            UploadRole::First => FIRST_FRAME_FIELD,
            UploadRole::Last => LAST_FRAME_FIELD,
        }
    }

    fn file_name(&self, request_id: &str, extension: &str) -> String {
        match self {
            UploadRole::Image => format!("{}.{}", request_id, extension),
            UploadRole::First => format!("{}_first.{}", request_id, extension),
            UploadRole::Last => format!("{}_last.{}", request_id, extension),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    /// Validated extension, in the caller's case.
    pub extension: String,
    pub data: Bytes,
}

/// Decoded intake form, before anything touches the disk.
#[derive(Debug)]
pub struct IntakeForm {
    pub request: GenerationRequest,
    pub image: Option<UploadedFile>,
    pub first: Option<UploadedFile>,
    pub last: Option<UploadedFile>,
}

impl IntakeForm {
    /// Files relevant to `kind`. Frames must come as a pair; files meant for
    /// the other flow are ignored.
    pub fn uploads_for(
        &mut self,
        kind: GenerationKind,
    ) -> Result<Vec<(UploadRole, UploadedFile)>, AppError> {
        match kind {
            GenerationKind::ImageToVideo => Ok(self
                .image
                .take()
                .map(|file| vec![(UploadRole::Image, file)])
                .unwrap_or_default()),
            GenerationKind::FirstAndLastFrameToVideo => {
                match (self.first.take(), self.last.take()) {
                    (Some(first), Some(last)) => {
                        Ok(vec![(UploadRole::First, first), (UploadRole::Last, last)])
                    }
                    (None, None) => Ok(Vec::new()),
                    _ => Err(AppError::InvalidInput(
                        "Fields 'first' and 'last' must be supplied together".to_string(),
                    )),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadStager {
    uploads_dir: PathBuf,
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl UploadStager {
    pub fn new(
        uploads_dir: impl Into<PathBuf>,
        max_file_size: usize,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            max_file_size,
            allowed_extensions,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.uploads_dir(),
            config.max_upload_size_bytes(),
            config.allowed_extensions().to_vec(),
        )
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Read every field of the form. `data` is required; unknown fields are
    /// skipped.
    pub async fn read_form(&self, mut multipart: Multipart) -> Result<IntakeForm, AppError> {
        let mut data: Option<String> = None;
        let mut image = None;
        let mut first = None;
        let mut last = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            let slot = match name.as_str() {
                DATA_FIELD => {
                    if data.is_some() {
                        return Err(AppError::InvalidInput(
                            "Field 'data' was supplied more than once".to_string(),
                        ));
                    }
                    data = Some(field.text().await.map_err(multipart_error)?);
                    continue;
                }
                IMAGE_FIELD => &mut image,
                FIRST_FRAME_FIELD => &mut first,
                LAST_FRAME_FIELD => &mut last,
                other => {
                    tracing::debug!(field = %other, "Ignoring unknown multipart field");
                    continue;
                }
            };

            if slot.is_some() {
                return Err(AppError::InvalidInput(format!(
                    "Field '{}' was supplied more than once",
                    name
                )));
            }

            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            *slot = self.accept_file(&name, filename, bytes)?;
        }

        let data = data.ok_or_else(|| {
            AppError::InvalidInput("Missing required field 'data'".to_string())
        })?;

        Ok(IntakeForm {
            request: GenerationRequest::parse(&data)?,
            image,
            first,
            last,
        })
    }

    /// Validate one file part. An empty part without a filename counts as not
    /// supplied.
    fn accept_file(
        &self,
        field: &str,
        filename: String,
        data: Bytes,
    ) -> Result<Option<UploadedFile>, AppError> {
        if filename.is_empty() && data.is_empty() {
            return Ok(None);
        }

        if filename.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Field '{}' must be a file with a filename",
                field
            )));
        }

        let extension = validate_file_extension(&filename, &self.allowed_extensions)?.to_string();

        if data.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "File '{}' in field '{}' is empty",
                filename, field
            )));
        }

        if data.len() > self.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File '{}' exceeds the maximum allowed size of {} MB",
                filename,
                self.max_file_size / 1024 / 1024
            )));
        }

        Ok(Some(UploadedFile {
            filename,
            extension,
            data,
        }))
    }

    pub fn staged_path(&self, request_id: &str, role: UploadRole, extension: &str) -> PathBuf {
        self.uploads_dir.join(role.file_name(request_id, extension))
    }

    /// Write `uploads` to disk. If one write fails, files already written by
    /// this call are removed before the error is returned.
    pub async fn stage(
        &self,
        request_id: &str,
        uploads: Vec<(UploadRole, UploadedFile)>,
    ) -> Result<GenerationInputs, AppError> {
        let mut inputs = GenerationInputs::default();
        if uploads.is_empty() {
            return Ok(inputs);
        }

        tokio::fs::create_dir_all(&self.uploads_dir).await.map_err(|e| {
            AppError::Internal(format!(
                "Failed to create uploads directory {}: {}",
                self.uploads_dir.display(),
                e
            ))
        })?;

        let mut written: Vec<PathBuf> = Vec::with_capacity(uploads.len());

        for (role, file) in uploads {
            let path = self.staged_path(request_id, role, &file.extension);

            if let Err(e) = tokio::fs::write(&path, &file.data).await {
                self.rollback(&written).await;
                return Err(AppError::Internal(format!(
                    "Failed to write {}: {}",
                    path.display(),
                    e
                )));
            }

            tracing::debug!(
                request_id = %request_id,
                field = role.field(),
                original = %file.filename,
                path = %path.display(),
                size_bytes = file.data.len(),
                "Staged upload"
            );

            let staged = path.to_string_lossy().to_string();
            match role {
                UploadRole::Image => inputs.image = Some(staged),
                UploadRole::First => inputs.first = Some(staged),
                UploadRole::Last => inputs.last = Some(staged),
            }
            written.push(path);
        }

        Ok(inputs)
    }

    async fn rollback(&self, written: &[PathBuf]) {
        for path in written {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}
