// SPDX-License-Identifier: Apache-2.0

use crate::az;
use crate::collector::{Report, RunInfo};
use crate::config_checks;
use crate::hyper_converged;
use crate::mandatory;
use crate::relations;
use crate::ruledoc::RuleDoc;
use crate::spaces;
use crate::subordinates;
use topolint_model::DeploymentModel;
use tracing::debug;

/// Knobs of one linting pass.
#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Explicit cloud type; inferred from the deployed charms when absent.
    pub cloud_type: Option<String>,
    /// Minimum number of distinct availability zones expected.
    pub min_azs: usize,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            cloud_type: None,
            min_azs: 3,
        }
    }
}

/// Run the full checker catalog, strictly sequentially, against one model
/// and one rule document. Pure: no state survives the pass.
#[must_use]
pub fn lint(
    model: &DeploymentModel,
    rules: &RuleDoc,
    options: &LintOptions,
    run: RunInfo,
) -> Report {
    let mut report = Report::new(run);
    let charms = model.charms();
    let cloud_type = mandatory::resolve_cloud_type(options.cloud_type.as_deref(), &charms);

    report.record(mandatory::check_charms(model, rules, cloud_type));
    report.record(config_checks::check_configuration(model, rules, cloud_type));
    report.record(subordinates::check_subordinates(model, rules));
    report.record(relations::check_relations(model, rules));
    if model.relation_pairs.is_empty() {
        report.record(az::check_azs(model, options.min_azs));
    } else {
        // Bundle snapshots carry no hardware, so AZ arithmetic would be
        // meaningless; space bindings are only checkable with relations.
        debug!("relations data found; checking spaces instead of AZ balance");
        report.record(spaces::check_spaces(model, rules));
    }
    report.record(hyper_converged::check_hyper_converged(model));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use topolint_ingest::build_model;

    const STATUS: &str = "
applications:
  ubuntu:
    charm: cs:ubuntu-19
    units:
      ubuntu/0:
        machine: '0'
machines:
  '0':
    hardware: availability-zone=az1
  '1':
    hardware: availability-zone=az2
  '2':
    hardware: availability-zone=az3
";

    #[test]
    fn a_clean_model_produces_no_error_findings() {
        let model = build_model(STATUS).unwrap();
        let rules = RuleDoc::from_value(json!({"known charms": ["ubuntu"]})).unwrap();
        let report = lint(&model, &rules, &LintOptions::default(), RunInfo::default());
        assert!(!report.has_errors(), "{:?}", report.errors);
    }

    #[test]
    fn checker_findings_accumulate_in_one_report() {
        let model = build_model(STATUS).unwrap();
        let rules = RuleDoc::from_value(json!({
            "known charms": [],
            "operations mandatory": ["ntp"],
            "config": {"ubuntu": {"hostname": {"isset": true}}},
        }))
        .unwrap();
        let report = lint(&model, &rules, &LintOptions::default(), RunInfo::default());
        let ids: Vec<&str> = report.errors.iter().map(|finding| finding.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["unrecognised-charm", "ops-charm-missing", "config-isset-check-true"]
        );
    }

    #[test]
    fn bundle_snapshots_skip_az_checks() {
        let bundle = "
applications:
  ubuntu:
    charm: cs:ubuntu-19
    to: ['0']
relations: []
machines:
  '0': {}
";
        let model = build_model(bundle).unwrap();
        let rules = RuleDoc::from_value(json!({"known charms": ["ubuntu"]})).unwrap();
        let report = lint(&model, &rules, &LintOptions::default(), RunInfo::default());
        assert!(!report.has_errors(), "{:?}", report.errors);
    }
}
