// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Severity ladder for findings. Only `Error` findings end up in the
/// structured output; the rest are routed through the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Resolve a rule-supplied log level. `error`, absence, and anything
    /// unrecognized all keep the error behavior.
    #[must_use]
    pub fn resolve(level: Option<&str>) -> Self {
        match level.map(str::to_ascii_lowercase).as_deref() {
            Some("warning") => Self::Warning,
            Some("info") => Self::Info,
            Some("debug") => Self::Debug,
            _ => Self::Error,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One finding produced by a check: a stable id tag, classification tags, a
/// human-readable message, and context fields specific to the finding type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub id: String,
    pub tags: Vec<String>,
    #[serde(skip)]
    pub severity: Severity,
    pub message: String,
    #[serde(flatten)]
    pub details: BTreeMap<String, Value>,
}

impl Finding {
    #[must_use]
    pub fn new(id: &str, tags: &[&str], severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            tags: tags.iter().map(ToString::to_string).collect(),
            severity,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn error(id: &str, tags: &[&str], message: impl Into<String>) -> Self {
        Self::new(id, tags, Severity::Error, message)
    }

    #[must_use]
    pub fn warning(id: &str, tags: &[&str], message: impl Into<String>) -> Self {
        Self::new(id, tags, Severity::Warning, message)
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_are_flattened_into_the_record() {
        let finding = Finding::error("config-eq-check", &["config", "eq"], "mismatch")
            .with_detail("application", "keystone")
            .with_detail("expected_value", 3);
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["id"], "config-eq-check");
        assert_eq!(value["application"], "keystone");
        assert_eq!(value["expected_value"], 3);
        assert!(value.get("severity").is_none());
    }

    #[test]
    fn unrecognized_log_level_falls_back_to_error() {
        assert_eq!(Severity::resolve(Some("warning")), Severity::Warning);
        assert_eq!(Severity::resolve(Some("WARNING")), Severity::Warning);
        assert_eq!(Severity::resolve(Some("chatty")), Severity::Error);
        assert_eq!(Severity::resolve(None), Severity::Error);
    }
}
