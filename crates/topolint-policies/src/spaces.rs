// SPDX-License-Identifier: Apache-2.0

use crate::finding::Finding;
use crate::ruledoc::{RuleDoc, SpaceChecks};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use topolint_model::{DeploymentModel, RelationPair};
use tracing::warn;

/// Sentinel space for endpoints whose application lives in another model;
/// cross-model space consistency cannot be verified locally.
const CROSS_MODEL_SPACE: &str = "XModel";

/// Default space assigned when an application declares no bindings at all.
const AMBIENT_SPACE: &str = "alpha";

/// A relation whose two endpoints resolve to different network spaces.
/// Endpoints are kept lexicographically ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceMismatch {
    pub endpoint1: String,
    pub space1: String,
    pub endpoint2: String,
    pub space2: String,
}

impl SpaceMismatch {
    #[must_use]
    pub fn new(endpoint1: &str, space1: &str, endpoint2: &str, space2: &str) -> Self {
        if endpoint2 < endpoint1 {
            Self {
                endpoint1: endpoint2.to_string(),
                space1: space2.to_string(),
                endpoint2: endpoint1.to_string(),
                space2: space1.to_string(),
            }
        } else {
            Self {
                endpoint1: endpoint1.to_string(),
                space1: space1.to_string(),
                endpoint2: endpoint2.to_string(),
                space2: space2.to_string(),
            }
        }
    }

    /// The same pair with applications replaced by their charm names, for
    /// matching against the enforce/ignore lists of the rule document.
    #[must_use]
    pub fn charm_endpoints(&self, model: &DeploymentModel) -> (String, String) {
        (
            charm_endpoint(model, &self.endpoint1),
            charm_endpoint(model, &self.endpoint2),
        )
    }
}

impl Display for SpaceMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SpaceMismatch({} (space {}) != {} (space {}))",
            self.endpoint1, self.space1, self.endpoint2, self.space2
        )
    }
}

fn charm_endpoint(model: &DeploymentModel, endpoint: &str) -> String {
    let (app, name) = endpoint.split_once(':').unwrap_or((endpoint, ""));
    let charm = model.app_to_charm(app).unwrap_or("");
    format!("{charm}:{name}")
}

/// Resolve every relation pair's endpoint spaces and flag mismatches.
/// Mismatches are warnings unless the pair or one of its endpoints is
/// enforced; ignored pairs and endpoints are suppressed entirely. Any
/// failure to evaluate one pair is logged and never aborts the rest.
#[must_use]
pub fn check_spaces(model: &DeploymentModel, rules: &RuleDoc) -> Vec<Finding> {
    let mut findings = Vec::new();
    let checks = rules.space_checks();
    let app_spaces = application_spaces(model);

    for pair in &model.relation_pairs {
        let Some(mismatch) = evaluate_pair(&app_spaces, pair) else {
            continue;
        };
        let (charm_ep1, charm_ep2) = mismatch.charm_endpoints(model);
        if pair_listed(&checks.ignore_relations, &charm_ep1, &charm_ep2)
            || checks.ignore_endpoints.iter().any(|endpoint| {
                endpoint == &charm_ep1 || endpoint == &charm_ep2
            })
        {
            continue;
        }
        let enforced = pair_listed(&checks.enforce_relations, &charm_ep1, &charm_ep2)
            || checks.enforce_endpoints.iter().any(|endpoint| {
                endpoint == &charm_ep1 || endpoint == &charm_ep2
            });
        let finding = Finding::warning(
            "space-binding-mismatch",
            &["space", "binding", "mismatch"],
            format!("Space binding mismatch: {mismatch}"),
        )
        .with_detail("endpoint1", mismatch.endpoint1.as_str())
        .with_detail("space1", mismatch.space1.as_str())
        .with_detail("endpoint2", mismatch.endpoint2.as_str())
        .with_detail("space2", mismatch.space2.as_str());
        if enforced {
            findings.push(finding.with_severity(crate::finding::Severity::Error));
        } else {
            findings.push(finding);
        }
    }
    findings
}

fn evaluate_pair(
    app_spaces: &BTreeMap<&str, BTreeMap<&str, &str>>,
    pair: &RelationPair,
) -> Option<SpaceMismatch> {
    let space1 = relation_space(app_spaces, &pair.left)?;
    let space2 = relation_space(app_spaces, &pair.right)?;
    if space1 == space2 || space1 == CROSS_MODEL_SPACE || space2 == CROSS_MODEL_SPACE {
        return None;
    }
    Some(SpaceMismatch::new(&pair.left, &space1, &pair.right, &space2))
}

/// Endpoint-to-space map per application, falling back to the default
/// binding. Applications declaring no bindings default everything to the
/// ambient space.
fn application_spaces(model: &DeploymentModel) -> BTreeMap<&str, BTreeMap<&str, &str>> {
    let mut out = BTreeMap::new();
    for (name, application) in &model.applications {
        let mut spaces: BTreeMap<&str, &str> = BTreeMap::new();
        if !application.bindings_declared {
            warn!(application = %name, "application is missing explicit bindings");
            warn!(application = %name, "setting default binding to {AMBIENT_SPACE}");
            spaces.insert("", AMBIENT_SPACE);
        } else {
            if !application.bindings.contains_key("") {
                warn!(application = %name, "application does not define explicit default binding");
            }
            for (endpoint, space) in &application.bindings {
                spaces.insert(endpoint.as_str(), space.as_str());
            }
        }
        out.insert(name.as_str(), spaces);
    }
    out
}

fn relation_space(
    app_spaces: &BTreeMap<&str, BTreeMap<&str, &str>>,
    endpoint: &str,
) -> Option<String> {
    let Some((app, service)) = endpoint.split_once(':') else {
        warn!(endpoint, "relation endpoint is not app:endpoint; skipping pair");
        return None;
    };
    let Some(spaces) = app_spaces.get(app) else {
        warn!(
            application = %app,
            "multi-model is not supported yet; please check if the application is from another model"
        );
        return Some(CROSS_MODEL_SPACE.to_string());
    };
    match spaces.get(service).or_else(|| spaces.get("")) {
        Some(space) => Some((*space).to_string()),
        None => {
            warn!(endpoint, "no binding nor default binding resolves this endpoint; skipping pair");
            None
        }
    }
}

fn pair_listed(pairs: &[Vec<String>], endpoint1: &str, endpoint2: &str) -> bool {
    pairs.iter().any(|pair| {
        pair.len() == 2
            && ((pair[0] == endpoint1 && pair[1] == endpoint2)
                || (pair[0] == endpoint2 && pair[1] == endpoint1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;
    use serde_json::json;
    use topolint_model::{Application, CharmName};

    fn bound_app(name: &str, charm: &str, bindings: &[(&str, &str)]) -> Application {
        Application {
            name: name.to_string(),
            charm: Some(CharmName::parse(charm).unwrap()),
            bindings: bindings
                .iter()
                .map(|(endpoint, space)| ((*endpoint).to_string(), (*space).to_string()))
                .collect(),
            bindings_declared: !bindings.is_empty(),
            ..Application::default()
        }
    }

    fn mismatch_model() -> DeploymentModel {
        let mut model = DeploymentModel::default();
        model.applications.insert(
            "prometheus-app".to_string(),
            bound_app(
                "prometheus-app",
                "cs:prometheus-11",
                &[("", "alpha"), ("target", "internal-space")],
            ),
        );
        model.applications.insert(
            "telegraf-app".to_string(),
            bound_app(
                "telegraf-app",
                "cs:telegraf-29",
                &[("", "alpha"), ("prometheus-client", "external-space")],
            ),
        );
        model.relation_pairs.push(RelationPair::new(
            "telegraf-app:prometheus-client",
            "prometheus-app:target",
        ));
        model
    }

    fn empty_rules() -> RuleDoc {
        RuleDoc::from_value(json!({})).unwrap()
    }

    #[test]
    fn matching_spaces_produce_no_finding() {
        let mut model = mismatch_model();
        if let Some(app) = model.applications.get_mut("telegraf-app") {
            app.bindings
                .insert("prometheus-client".to_string(), "internal-space".to_string());
        }
        assert!(check_spaces(&model, &empty_rules()).is_empty());
    }

    #[test]
    fn differing_spaces_produce_one_warning() {
        let model = mismatch_model();
        let findings = check_spaces(&model, &empty_rules());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(
            findings[0].message,
            "Space binding mismatch: SpaceMismatch(prometheus-app:target \
             (space internal-space) != telegraf-app:prometheus-client (space external-space))"
        );
    }

    #[test]
    fn enforced_endpoints_promote_the_mismatch_to_an_error() {
        let model = mismatch_model();
        for enforced in ["prometheus:target", "telegraf:prometheus-client"] {
            let rules = RuleDoc::from_value(json!({
                "space checks": {"enforce endpoints": [enforced]}
            }))
            .unwrap();
            let findings = check_spaces(&model, &rules);
            assert_eq!(findings.len(), 1, "endpoint {enforced}");
            assert_eq!(findings[0].severity, Severity::Error);
        }
    }

    #[test]
    fn enforced_relations_match_either_declaration_order() {
        let model = mismatch_model();
        for pair in [
            ["prometheus:target", "telegraf:prometheus-client"],
            ["telegraf:prometheus-client", "prometheus:target"],
        ] {
            let rules = RuleDoc::from_value(json!({
                "space checks": {"enforce relations": [pair]}
            }))
            .unwrap();
            let findings = check_spaces(&model, &rules);
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].severity, Severity::Error);
        }
    }

    #[test]
    fn ignored_pairs_and_endpoints_are_suppressed() {
        let model = mismatch_model();
        for rules in [
            json!({"space checks": {"ignore endpoints": ["prometheus:target"]}}),
            json!({"space checks": {"ignore relations": [["telegraf:prometheus-client", "prometheus:target"]]}}),
        ] {
            let rules = RuleDoc::from_value(rules).unwrap();
            assert!(check_spaces(&model, &rules).is_empty());
        }
    }

    #[test]
    fn cross_model_endpoints_are_excluded_from_mismatch_detection() {
        let mut model = mismatch_model();
        model.relation_pairs = vec![RelationPair::new(
            "prometheus-app:target",
            "remote-thing:data",
        )];
        assert!(check_spaces(&model, &empty_rules()).is_empty());
    }

    #[test]
    fn undeclared_bindings_default_to_the_ambient_space() {
        let mut model = DeploymentModel::default();
        model.applications.insert(
            "a".to_string(),
            bound_app("a", "cs:ubuntu-1", &[]),
        );
        model
            .applications
            .insert("b".to_string(), bound_app("b", "cs:ntp-1", &[("", "alpha")]));
        model
            .relation_pairs
            .push(RelationPair::new("a:juju-info", "b:juju-info"));
        assert!(check_spaces(&model, &empty_rules()).is_empty());
    }
}
