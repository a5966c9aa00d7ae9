// SPDX-License-Identifier: Apache-2.0

use crate::finding::Finding;
use crate::ruledoc::{RelationRuleSpec, RuleDoc};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use topolint_model::{machine_sort_key, DeploymentModel};
use tracing::{error, info, warn};

/// A relation rule that does not follow the expected shape. Reported and
/// skipped, never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRuleError(pub String);

impl Display for RelationRuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RelationRuleError: {}", self.0)
    }
}

impl std::error::Error for RelationRuleError {}

/// Relation rules against a named charm: endpoint pairs that must exist,
/// pairs that must not, and ubiquitous presence across every machine.
#[must_use]
pub fn check_relations(model: &DeploymentModel, rules: &RuleDoc) -> Vec<Finding> {
    let specs = rules.relation_rules();
    if specs.is_empty() {
        info!("No relation rules found. Skipping relation checks");
        return Vec::new();
    }

    let mut findings = Vec::new();
    for spec in &specs {
        match check_rule(model, spec) {
            Ok(mut rule_findings) => findings.append(&mut rule_findings),
            Err(rule_error) => error!("{rule_error}"),
        }
    }
    findings
}

fn check_rule(
    model: &DeploymentModel,
    spec: &RelationRuleSpec,
) -> Result<Vec<Finding>, RelationRuleError> {
    let mut findings = Vec::new();
    let apps_of_charm: BTreeSet<String> = model
        .apps_of_charm(&spec.charm)
        .into_iter()
        .map(str::to_string)
        .collect();

    findings.extend(ubiquitous_check(model, spec));
    findings.extend(relation_exist_check(model, spec, &apps_of_charm)?);
    findings.extend(relation_not_exist_check(model, spec)?);
    Ok(findings)
}

fn relation_exist_check(
    model: &DeploymentModel,
    spec: &RelationRuleSpec,
    apps_of_charm: &BTreeSet<String>,
) -> Result<Vec<Finding>, RelationRuleError> {
    let mut findings = Vec::new();
    for pair in &spec.check {
        if pair.is_empty() {
            continue;
        }
        if pair.len() != 2 {
            return Err(RelationRuleError(format!(
                "Relations rules has an unexpected format: expected 2 endpoints, got {}",
                pair.len()
            )));
        }
        let Some((app_0, endpoint_0)) = split_endpoint(model, &pair[0], &spec.charm)? else {
            continue;
        };
        let Some((app_1, endpoint_1)) = split_endpoint(model, &pair[1], &spec.charm)? else {
            continue;
        };

        // Orient the pair so one side is the rule's charm.
        let (endpoint, app_to_check, endpoint_to_check) =
            if app_0 == spec.charm || apps_of_charm.contains(&app_0) {
                (endpoint_0, app_1, endpoint_1)
            } else if app_1 == spec.charm || apps_of_charm.contains(&app_1) {
                (endpoint_1, app_0, endpoint_0)
            } else {
                warn!(
                    charm = %spec.charm,
                    "Relations rules has an unexpected format. \
                     It was not possible to find the charm on the rule"
                );
                continue;
            };

        let with_endpoint = apps_with_endpoint(model, &spec.charm, &app_to_check, &endpoint_to_check);
        let related = model.peers_of(apps_of_charm, &endpoint);
        let missing: Vec<&String> = with_endpoint
            .iter()
            .filter(|app| !related.contains(*app) && !spec.exception.contains(*app))
            .collect();
        if !missing.is_empty() {
            let endpoint_ref = format!("{}:{endpoint}", spec.charm);
            findings.push(
                Finding::error(
                    "missing-relations",
                    &["relation", "missing"],
                    format!("Endpoint '{endpoint_ref}' is missing relations with: {missing:?}"),
                )
                .with_detail("endpoint", endpoint_ref.as_str()),
            );
        }
    }
    Ok(findings)
}

fn relation_not_exist_check(
    model: &DeploymentModel,
    spec: &RelationRuleSpec,
) -> Result<Vec<Finding>, RelationRuleError> {
    let mut findings = Vec::new();
    for pair in &spec.not_exist {
        if pair.is_empty() {
            continue;
        }
        if pair.len() != 2 {
            return Err(RelationRuleError(format!(
                "Problem during relation not-exist check: expected 2 endpoints, got {}",
                pair.len()
            )));
        }
        let Some((app_0, endpoint_0)) = split_endpoint(model, &pair[0], &spec.charm)? else {
            continue;
        };
        let Some((app_1, _)) = split_endpoint(model, &pair[1], &spec.charm)? else {
            continue;
        };
        let related = model.peers_of(&BTreeSet::from([app_0]), &endpoint_0);
        if related.contains(&app_1) {
            findings.push(Finding::error(
                "relation-exist",
                &["relation", "exist"],
                format!("Relation(s) {pair:?} should not exist."),
            ));
        }
    }
    Ok(findings)
}

/// Machine-set minus machines hosting the charm, sorted with the machine
/// ordering key so listings are stable.
fn ubiquitous_check(model: &DeploymentModel, spec: &RelationRuleSpec) -> Vec<Finding> {
    if !spec.ubiquitous {
        return Vec::new();
    }
    let with_charm = model.machines_for_charm(&spec.charm);
    let mut missing: Vec<&String> = model
        .machines
        .keys()
        .filter(|machine| !with_charm.contains(*machine))
        .collect();
    missing.sort_by_key(|machine| machine_sort_key(machine));
    if missing.is_empty() {
        return Vec::new();
    }
    vec![Finding::error(
        "missing-machine",
        &["missing", "machine"],
        format!("Charm '{}' missing on machines: {missing:?}", spec.charm),
    )
    .with_detail("charm", spec.charm.as_str())]
}

/// Split "app:endpoint", degrading to a logged no-op when the reference
/// points outside the current topology. "*" stands for any application;
/// "juju-info" is implicit on every application and skips the endpoint
/// existence check.
fn split_endpoint(
    model: &DeploymentModel,
    app_endpoint: &str,
    charm: &str,
) -> Result<Option<(String, String)>, RelationRuleError> {
    let Some((app, endpoint)) = app_endpoint.split_once(':') else {
        return Err(RelationRuleError(format!(
            "Relations rules has an unexpected format: '{app_endpoint}' is not app:endpoint"
        )));
    };
    if app != "*" && app != charm {
        if !model.applications.contains_key(app) {
            warn!(application = %app, "not found on applications");
            return Ok(None);
        }
        if endpoint != "juju-info" && !model.has_endpoint(app, endpoint) {
            warn!(application = %app, endpoint = %endpoint, "endpoint not found on application");
            return Ok(None);
        }
    }
    Ok(Some((app.to_string(), endpoint.to_string())))
}

fn apps_with_endpoint(
    model: &DeploymentModel,
    charm: &str,
    app: &str,
    endpoint: &str,
) -> BTreeSet<String> {
    if app == "*" {
        let apps_of_charm = model.apps_of_charm(charm);
        return model
            .applications
            .values()
            .filter(|record| !apps_of_charm.contains(record.name.as_str()))
            .filter(|record| record.has_endpoint(endpoint))
            .map(|record| record.name.clone())
            .collect();
    }
    if model.has_endpoint(app, endpoint) || endpoint == "juju-info" {
        BTreeSet::from([app.to_string()])
    } else {
        BTreeSet::new()
    }
}
