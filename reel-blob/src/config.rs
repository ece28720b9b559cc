use std::str::FromStr;

use crate::{JobDescriptor, UploadError, UploadResult};

/// How upload jobs come into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Registration {
    /// The first chunk for an unknown id creates its job (Resumable.js behaviour)
    #[default]
    Lazy,
    /// Jobs must be registered through `begin` before chunks are accepted
    Explicit,
}

impl FromStr for Registration {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" => Ok(Self::Lazy),
            "explicit" => Ok(Self::Explicit),
            other => Err(UploadError::validation(format!(
                "Unknown registration mode: {other}"
            ))),
        }
    }
}

/// Configuration for upload coordination
#[derive(Debug, Clone, Default)]
pub struct UploadConfig {
    pub registration: Registration,

    /// Limits applied to every job descriptor
    pub upload_rules: UploadRules,
}

/// Limits on the shape of an upload job
#[derive(Debug, Clone)]
pub struct UploadRules {
    /// Longest display name, counted in characters
    pub max_display_name_len: usize,

    /// Upper bound to protect memory/state
    pub max_total_chunks: u32,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_display_name_len: 100,
            max_total_chunks: 10_000,
        }
    }
}

impl UploadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_upload_rules(mut self, rules: UploadRules) -> Self {
        self.upload_rules = rules;
        self
    }
}

impl UploadRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_display_name_len(mut self, len: usize) -> Self {
        self.max_display_name_len = len;
        self
    }

    pub fn with_max_total_chunks(mut self, max: u32) -> Self {
        self.max_total_chunks = max;
        self
    }

    /// Reject a descriptor that could not become a valid job
    pub fn check(&self, descriptor: &JobDescriptor) -> UploadResult<()> {
        if descriptor.display_name.chars().count() > self.max_display_name_len {
            return Err(UploadError::validation("File name too long."));
        }
        if descriptor.content_type.trim().is_empty() {
            return Err(UploadError::validation("Missing content type."));
        }
        if descriptor.total_chunks == 0 || descriptor.total_chunks > self.max_total_chunks {
            return Err(UploadError::validation(format!(
                "Total chunks must be between 1 and {}.",
                self.max_total_chunks
            )));
        }
        Ok(())
    }
}
