//! Route paths

pub const HEALTH_PATH: &str = "/health";
pub const OPENAPI_PATH: &str = "/api/openapi.json";
pub const DOCS_PATH: &str = "/docs";

pub const PROCESS_V1_IMAGE_TO_VIDEO: &str = "/process/v1/image_to_video";
pub const PROCESS_V2_IMAGE_TO_VIDEO: &str = "/process/v2/image_to_video";
pub const PROCESS_V1_FIRST_AND_LAST_FRAME_TO_VIDEO: &str =
    "/process/v1/first_and_last_frame_to_video";

pub const JOBS_PATH: &str = "/jobs";
pub const JOBS_IMAGE_TO_VIDEO: &str = "/jobs/image_to_video";
pub const JOBS_FIRST_AND_LAST_FRAME_TO_VIDEO: &str = "/jobs/first_and_last_frame_to_video";
pub const JOB_PATH: &str = "/jobs/{job_id}";
