//! Shared name validation for blob store backends.

use crate::traits::{BlobError, BlobResult};

/// Azure container naming: 3-63 characters, lowercase letters, digits and
/// hyphens, starting with a letter or digit, no consecutive hyphens.
pub fn validate_container_name(container: &str) -> BlobResult<()> {
    let len = container.len();
    let valid = (3..=63).contains(&len)
        && container
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !container.starts_with('-')
        && !container.ends_with('-')
        && !container.contains("--");

    if !valid {
        return Err(BlobError::InvalidName(format!(
            "Invalid container name '{}'",
            container
        )));
    }
    Ok(())
}

/// Blob names may be nested with `/` but must stay inside their container.
pub fn validate_blob_name(blob_name: &str) -> BlobResult<()> {
    if blob_name.is_empty()
        || blob_name.len() > 1024
        || blob_name.starts_with('/')
        || blob_name.contains('\\')
        || blob_name.split('/').any(|segment| segment == ".." || segment.is_empty())
    {
        return Err(BlobError::InvalidName(format!(
            "Invalid blob name '{}'",
            blob_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_names() {
        assert!(validate_container_name("mugenverse").is_ok());
        assert!(validate_container_name("videos-2024").is_ok());
        assert!(validate_container_name("ab").is_err());
        assert!(validate_container_name("Upper").is_err());
        assert!(validate_container_name("-lead").is_err());
        assert!(validate_container_name("double--dash").is_err());
        assert!(validate_container_name("../up").is_err());
    }

    #[test]
    fn test_blob_names() {
        assert!(validate_blob_name("data/generated_videos/abc.mp4").is_ok());
        assert!(validate_blob_name("clip.mp4").is_ok());
        assert!(validate_blob_name("").is_err());
        assert!(validate_blob_name("/abs.mp4").is_err());
        assert!(validate_blob_name("a/../b.mp4").is_err());
        assert!(validate_blob_name("a//b.mp4").is_err());
        assert!(validate_blob_name("win\\path.mp4").is_err());
    }
}
