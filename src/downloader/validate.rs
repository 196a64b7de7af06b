//! Request validation

use super::TubeTap;
use crate::error::{Error, Result};
use crate::types::{DownloadRequest, JobSpec, Quality};
use regex::Regex;

/// Message for a request without a URL
pub(crate) const URL_REQUIRED: &str = "YouTube URL is required";
/// Message for a URL outside the host allow-list
pub(crate) const URL_INVALID: &str = "Invalid YouTube URL format";

/// Compile the allow-list into `^(https?://)?(www\.)?(host|...)/.+$`
pub(crate) fn url_pattern(hosts: &[String]) -> Result<Regex> {
    let alternatives = hosts
        .iter()
        .map(|h| regex::escape(h.trim()))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&format!(r"^(https?://)?(www\.)?({alternatives})/.+$")).map_err(|e| {
        Error::Config {
            message: format!("cannot build URL pattern: {e}"),
            key: Some("validation.allowed_hosts".into()),
        }
    })
}

impl TubeTap {
    /// Check a request and turn it into a runnable job
    ///
    /// The URL must be present and match the host allow-list. A missing or
    /// unrecognized quality selector falls back to the configured default.
    pub fn validate(&self, request: &DownloadRequest) -> Result<JobSpec> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Validation(URL_REQUIRED.into()))?;

        if !self.url_pattern.is_match(url) {
            tracing::debug!(url, "rejected URL outside the allow-list");
            return Err(Error::Validation(URL_INVALID.into()));
        }

        let fallback = self.config.worker.fallback_quality()?;
        let quality = match request.quality.as_deref() {
            Some(selector) => Quality::parse(selector, fallback)?,
            None => fallback,
        };

        Ok(JobSpec {
            url: url.to_string(),
            quality,
        })
    }
}
