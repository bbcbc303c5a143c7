//! Mapping from internal artifact locators to externally fetchable
//! endpoints.
//!
//! Workers record results using the internal `artifact://` scheme. Callers
//! only ever see stable API paths keyed by job id, so the storage backend
//! can change without breaking anyone who has already observed a resolved
//! endpoint.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::RawJobResult;
use crate::types::JobId;

/// Scheme prefix for internal artifact locators.
pub const ARTIFACT_SCHEME: &str = "artifact://";

/// Externally fetchable form of a completed job's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedResult {
    /// Stable endpoint path for the finished video.
    pub download_path: String,
    /// Stable endpoint path for the preview artifact, if one exists.
    pub preview_path: Option<String>,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
}

/// Resolve a raw result into stable external endpoints.
///
/// Deterministic and idempotent: resolving the same job's result twice
/// produces identical endpoints.
pub fn resolve(job_id: JobId, raw: &RawJobResult) -> ResolvedResult {
    ResolvedResult {
        download_path: format!("/api/v1/jobs/{job_id}/download"),
        preview_path: raw
            .preview_locator
            .as_ref()
            .map(|_| format!("/api/v1/jobs/{job_id}/preview")),
        duration_secs: raw.duration_secs,
        size_bytes: raw.size_bytes,
        width: raw.width,
        height: raw.height,
    }
}

/// Split an internal locator into its storage-relative path.
///
/// Returns `Internal` for locators that do not carry the `artifact://`
/// scheme; a malformed stored locator is an engine bug, not caller error.
pub fn parse_locator(locator: &str) -> Result<&str, CoreError> {
    let path = locator.strip_prefix(ARTIFACT_SCHEME).ok_or_else(|| {
        CoreError::Internal(format!("Locator has unexpected scheme: {locator}"))
    })?;

    if path.is_empty() {
        return Err(CoreError::Internal("Locator has empty path".to_string()));
    }
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
