use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::RequestId;

/// A framework-level failure as shown to the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrafterError {
    pub message: String,
    #[serde(rename = "where")]
    pub location: String,
    pub details: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub traceback: Option<String>,
}

impl DrafterError {
    pub fn new(
        message: impl Into<String>,
        location: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            location: location.into(),
            details: details.into(),
            url: String::new(),
            traceback: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }
}

impl fmt::Display for DrafterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.message, self.location, self.details)
    }
}

impl std::error::Error for DrafterError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// Structured info/warning/error record produced by the audit helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub level: Level,
    pub message: String,
    #[serde(rename = "where")]
    pub location: String,
    pub details: String,
    #[serde(default)]
    pub traceback: Option<String>,
    #[serde(default)]
    pub request_id: Option<RequestId>,
}

impl From<&AuditRecord> for DrafterError {
    fn from(record: &AuditRecord) -> Self {
        Self {
            message: record.message.clone(),
            location: record.location.clone(),
            details: record.details.clone(),
            url: String::new(),
            traceback: record.traceback.clone(),
        }
    }
}
