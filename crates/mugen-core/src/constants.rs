//! Shared constants

/// Directory where staged input images are written.
pub const DEFAULT_UPLOADS_DIR: &str = "data/uploaded_images";

/// Directory where the generation engine drops finished videos.
pub const DEFAULT_VIDEOS_DIR: &str = "data/generated_videos";

/// Container name, also used as the fixed path segment of public blob URLs.
pub const DEFAULT_BLOB_CONTAINER: &str = "mugenverse";

/// Root of the filesystem-backed blob store.
pub const DEFAULT_LOCAL_BLOB_PATH: &str = "data/blob_store";

/// Extension of every generated artifact.
pub const VIDEO_EXTENSION: &str = "mp4";

pub const DEFAULT_RESOLUTION: &str = "1280*720";

pub const IMAGE_FIELD: &str = "image";
pub const FIRST_FRAME_FIELD: &str = "first";
pub const LAST_FRAME_FIELD: &str = "last";
pub const DATA_FIELD: &str = "data";

/// Body of the error returned when the artifact has not been produced yet.
pub const ARTIFACT_NOT_FOUND_MESSAGE: &str = "Video file not found";
