//! Host version detection
//!
//! The selector needs a single number: the host's major version. Where that
//! number comes from is environment-specific, so it is obtained through a
//! [`VersionDetector`].

use std::fmt;

use crate::error::{PortError, Result};

/// Supplies the host's major version
pub trait VersionDetector: Send + Sync {
    fn detect_version(&self) -> Result<u32>;
}

/// Always reports the same version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticVersionDetector {
    version: u32,
}

impl StaticVersionDetector {
    pub fn new(version: u32) -> Self {
        Self { version }
    }
}

impl VersionDetector for StaticVersionDetector {
    fn detect_version(&self) -> Result<u32> {
        Ok(self.version)
    }
}

/// Detector backed by a closure
pub struct FnVersionDetector<F> {
    detect: F,
}

impl<F> FnVersionDetector<F>
where
    F: Fn() -> Result<u32> + Send + Sync,
{
    pub fn new(detect: F) -> Self {
        Self { detect }
    }
}

impl<F> VersionDetector for FnVersionDetector<F>
where
    F: Fn() -> Result<u32> + Send + Sync,
{
    fn detect_version(&self) -> Result<u32> {
        (self.detect)()
    }
}

impl<F> fmt::Debug for FnVersionDetector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnVersionDetector")
    }
}

/// Extract the major version from a version string such as `"13.345"` or
/// `"v12"`
pub fn parse_major_version(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let major = without_prefix.split('.').next().unwrap_or_default();

    major.parse::<u32>().map_err(|_| PortError::VersionDetection {
        reason: format!("'{}' is not a valid version string", raw),
    })
}
