// SPDX-License-Identifier: Apache-2.0

use crate::finding::{Finding, Severity};
use crate::mandatory::CloudType;
use crate::ruledoc::{ConfigOperator, ConfigRule, RuleDoc};
use regex::Regex;
use serde_json::Value;
use topolint_model::DeploymentModel;
use tracing::{debug, warn};

/// Evaluate the config assertions of the rule document against every
/// matching application. Missing option data is a logged skip, never a
/// pass or a fail.
#[must_use]
pub fn check_configuration(
    model: &DeploymentModel,
    rules: &RuleDoc,
    cloud_type: Option<CloudType>,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let generic = rules.config_rules("config");
    let typed = cloud_type
        .map(|cloud| rules.config_rules(&format!("{} config", cloud.as_str())))
        .unwrap_or_default();

    for (app_name, application) in &model.applications {
        let Some(charm) = application.charm_name() else {
            continue;
        };
        let mut charm_rules: Vec<&ConfigRule> = Vec::new();
        if let Some(rules) = generic.get(charm) {
            charm_rules.extend(rules);
        }
        if let Some(rules) = typed.get(charm) {
            charm_rules.extend(rules);
        }
        for rule in charm_rules {
            if !rule_targets_app(rule, charm, app_name) {
                debug!(
                    application = %app_name,
                    option = %rule.option,
                    "application name matches no suffix target; skipping check"
                );
                continue;
            }
            findings.extend(apply_rule(app_name, &application.options, rule));
        }
    }
    findings
}

/// When a rule lists suffixes, only `<charm>-<suffix>` names and the bare
/// charm name are checked.
fn rule_targets_app(rule: &ConfigRule, charm: &str, app_name: &str) -> bool {
    if rule.suffixes.is_empty() {
        return true;
    }
    app_name == charm
        || rule
            .suffixes
            .iter()
            .any(|suffix| app_name == format!("{charm}-{suffix}"))
}

fn apply_rule(
    app_name: &str,
    options: &std::collections::BTreeMap<String, Value>,
    rule: &ConfigRule,
) -> Option<Finding> {
    let actual = options.get(&rule.option);

    let finding = match rule.op {
        ConfigOperator::IsSet => isset_check(app_name, rule, actual)?,
        ConfigOperator::Eq | ConfigOperator::Neq | ConfigOperator::Gte => {
            let Some(actual) = actual else {
                warn!(
                    "Application {app_name} has no config for '{}', cannot determine if {} {}.",
                    rule.option,
                    rule.op.symbol(),
                    rule.operand
                );
                return None;
            };
            binary_check(app_name, rule, actual)?
        }
        ConfigOperator::Search => {
            let Some(actual) = actual else {
                warn!(
                    "Application {app_name} has no config for '{}', can't search the regex pattern {}.",
                    rule.option, rule.operand
                );
                return None;
            };
            search_check(app_name, rule, actual)?
        }
    };

    let severity = Severity::resolve(rule.log_level.as_deref());
    let finding = match &rule.custom_message {
        Some(message) => finding.with_message(message.clone()),
        None => finding,
    };
    Some(finding.with_severity(severity))
}

fn isset_check(app_name: &str, rule: &ConfigRule, actual: Option<&Value>) -> Option<Finding> {
    let expected_set = rule.operand.as_bool().unwrap_or(true);
    match (actual, expected_set) {
        (Some(value), true) => {
            debug!(
                "(PASS) Application {app_name} correctly has config for '{}': {value}.",
                rule.option
            );
            None
        }
        (Some(value), false) => Some(
            Finding::error(
                "config-isset-check-false",
                &["config", "isset"],
                format!(
                    "Application {app_name} has config for {}: {value}.",
                    rule.option
                ),
            )
            .with_detail("application", app_name)
            .with_detail("rule", rule.option.as_str())
            .with_detail("actual_value", value.clone()),
        ),
        (None, false) => {
            debug!(
                "(PASS) Application {app_name} correctly had no config for '{}'.",
                rule.option
            );
            None
        }
        (None, true) => Some(
            Finding::error(
                "config-isset-check-true",
                &["config", "isset"],
                format!("Application {app_name} has no config for {}.", rule.option),
            )
            .with_detail("application", app_name)
            .with_detail("rule", rule.option.as_str()),
        ),
    }
}

fn binary_check(app_name: &str, rule: &ConfigRule, actual: &Value) -> Option<Finding> {
    let expected = &rule.operand;
    let (passed, message) = match rule.op {
        ConfigOperator::Eq => (
            eq_values(expected, actual),
            format!(
                "Application {app_name} has incorrect setting for '{}': Expected {expected}, got {actual}",
                rule.option
            ),
        ),
        ConfigOperator::Neq => (
            expected != actual,
            format!(
                "Application {app_name} has incorrect setting for '{}': Should not be {expected}",
                rule.option
            ),
        ),
        ConfigOperator::Gte => {
            let (Some(current), Some(minimum)) = (as_number(actual), as_number(expected)) else {
                warn!(
                    "Application {app_name} has non-numeric config for '{}', cannot determine if >= {expected}.",
                    rule.option
                );
                return None;
            };
            (
                current >= minimum,
                format!(
                    "Application {app_name} has config for '{}' which is less than {expected}: {actual}",
                    rule.option
                ),
            )
        }
        _ => return None,
    };

    if passed {
        debug!(
            "Application {app_name} has a valid config for '{}': {expected} ({} {actual})",
            rule.option,
            rule.op.symbol()
        );
        return None;
    }
    Some(
        Finding::error(
            &format!("config-{}-check", rule.op.as_str()),
            &["config", rule.op.as_str()],
            message,
        )
        .with_detail("application", app_name)
        .with_detail("rule", rule.option.as_str())
        .with_detail("expected_value", expected.clone())
        .with_detail("actual_value", actual.clone()),
    )
}

fn search_check(app_name: &str, rule: &ConfigRule, actual: &Value) -> Option<Finding> {
    let pattern = value_text(&rule.operand);
    let regex = match Regex::new(&pattern) {
        Ok(regex) => regex,
        Err(error) => {
            warn!(
                "Application {app_name} has an invalid regex for '{}': {error}; skipping check.",
                rule.option
            );
            return None;
        }
    };
    if regex.is_match(&value_text(actual)) {
        debug!(
            "Application {app_name} has a valid config for '{}' (matches {pattern})",
            rule.option
        );
        return None;
    }
    Some(
        Finding::error(
            "config-search-check",
            &["config", "search"],
            format!(
                "Application {app_name} has config for '{}' which does not match {pattern}: {actual}",
                rule.option
            ),
        )
        .with_detail("application", app_name)
        .with_detail("rule", rule.option.as_str())
        .with_detail("expected_value", pattern.as_str())
        .with_detail("actual_value", actual.clone()),
    )
}

/// Equality honoring simple wildcards: the expected operand is first tried
/// as a full-match regular expression against the actual value's string
/// form; a non-compiling operand falls back to direct comparison.
fn eq_values(expected: &Value, actual: &Value) -> bool {
    let pattern = value_text(expected);
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(regex) => regex.is_match(&value_text(actual)),
        Err(_) => expected == actual,
    }
}

/// The string form used for regex matching: bare for strings, compact JSON
/// for everything else.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Normalize unit-suffixed numeric strings: k/m/g multiply by powers of
/// 1000, K/M/G by powers of 1024. Anything else passes through unchanged.
fn normalize_unit_suffix(value: &Value) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let Some(suffix) = text.chars().last() else {
        return value.clone();
    };
    let body = &text[..text.len() - suffix.len_utf8()];
    let Ok(base) = body.parse::<i64>() else {
        return value.clone();
    };
    let quotient: i64 = if suffix.is_lowercase() { 1000 } else { 1024 };
    let power = match suffix.to_ascii_lowercase() {
        'k' => 1,
        'm' => 2,
        'g' => 3,
        _ => return value.clone(),
    };
    Value::from(base * quotient.pow(power))
}

fn as_number(value: &Value) -> Option<f64> {
    normalize_unit_suffix(value).as_f64().or_else(|| {
        if let Value::String(text) = value {
            text.parse().ok()
        } else {
            None
        }
    })
}
