//! Blob reference composition
//!
//! A reference is the string handed back to callers so they can fetch the
//! artifact: either the local path or a public URL of the form
//! `{base_url}/{container}/{video_path}?{sas_token}`. Nothing here checks that
//! the remote object exists.

/// Shape of the reference returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStyle {
    /// Public URL under the configured storage base URL.
    PublicUrl,
    /// Raw local artifact path.
    LocalPath,
}

#[derive(Debug, Clone)]
pub struct ReferenceComposer {
    base_url: Option<String>,
    container: String,
    sas_token: Option<String>,
}

impl ReferenceComposer {
    pub fn new(
        base_url: Option<String>,
        container: impl Into<String>,
        sas_token: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            container: container.into().trim_matches('/').to_string(),
            sas_token: sas_token
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn has_base_url(&self) -> bool {
        self.base_url.is_some()
    }

    /// Public URL for `video_path`, or `None` when no base URL is configured.
    pub fn public_url(&self, video_path: &str) -> Option<String> {
        let base = self.base_url.as_deref()?;
        let mut url = format!(
            "{}/{}/{}",
            base,
            self.container,
            video_path.trim_start_matches('/')
        );
        if let Some(token) = &self.sas_token {
            url.push('?');
            url.push_str(token);
        }
        Some(url)
    }

    /// Compose the reference for `video_path` in the requested style.
    ///
    /// A public URL without a configured base URL degrades to the local path.
    pub fn compose(&self, style: ReferenceStyle, video_path: &str) -> String {
        match style {
            ReferenceStyle::LocalPath => video_path.to_string(),
            ReferenceStyle::PublicUrl => self
                .public_url(video_path)
                .unwrap_or_else(|| video_path.to_string()),
        }
    }
}
