// SPDX-License-Identifier: Apache-2.0

use crate::finding::{Finding, Severity};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Identity of one linting run, carried into the structured output header.
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    pub name: String,
    pub controller: String,
    pub model: String,
    pub rules: String,
}

/// Accumulates findings for one pass. Checks are pure and return findings;
/// the report routes them: error severity is collected into the structured
/// output, lower severities only reach the log sink at the matching level.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub controller: String,
    pub model: String,
    pub rules: String,
    pub errors: Vec<Finding>,
}

impl Report {
    #[must_use]
    pub fn new(run: RunInfo) -> Self {
        Self {
            name: run.name,
            controller: run.controller,
            model: run.model,
            rules: run.rules,
            errors: Vec::new(),
        }
    }

    pub fn record(&mut self, findings: Vec<Finding>) {
        for finding in findings {
            log_finding(&finding);
            if finding.severity == Severity::Error {
                self.errors.push(finding);
            }
        }
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Structured rendering: the complete record list as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn log_finding(finding: &Finding) {
    match finding.severity {
        Severity::Error => error!(id = %finding.id, "{}", finding.message),
        Severity::Warning => warn!(id = %finding.id, "{}", finding.message),
        Severity::Info => info!(id = %finding.id, "{}", finding.message),
        Severity::Debug => debug!(id = %finding.id, "{}", finding.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_error_findings_are_collected() {
        let mut report = Report::new(RunInfo::default());
        report.record(vec![
            Finding::error("a", &[], "broken"),
            Finding::warning("b", &[], "suspicious"),
        ]);
        assert!(report.has_errors());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].id, "a");
    }

    #[test]
    fn json_rendering_contains_the_run_header() {
        let mut report = Report::new(RunInfo {
            name: "site".to_string(),
            controller: "manual".to_string(),
            model: "manual".to_string(),
            rules: "lint-rules.yaml".to_string(),
        });
        report.record(vec![Finding::error("x", &["tag"], "msg")]);
        let rendered = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["name"], "site");
        assert_eq!(value["errors"][0]["id"], "x");
    }
}
