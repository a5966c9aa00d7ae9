// SPDX-License-Identifier: Apache-2.0

use crate::finding::Finding;
use crate::ruledoc::RuleDoc;
use std::collections::BTreeSet;
use topolint_model::DeploymentModel;
use tracing::warn;

/// Characteristic component sets used to infer the deployment family.
const OPENSTACK_REFERENCE_CHARMS: [&str; 6] = [
    "keystone",
    "nova-compute",
    "glance",
    "neutron-api",
    "cinder",
    "ceph-mon",
];

const KUBERNETES_REFERENCE_CHARMS: [&str; 4] = [
    "kubernetes-worker",
    "kubernetes-control-plane",
    "kubernetes-master",
    "etcd",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudType {
    OpenStack,
    Kubernetes,
}

impl CloudType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenStack => "openstack",
            Self::Kubernetes => "kubernetes",
        }
    }

    #[must_use]
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "openstack" => Some(Self::OpenStack),
            "kubernetes" => Some(Self::Kubernetes),
            _ => None,
        }
    }

    const fn reference_charms(self) -> &'static [&'static str] {
        match self {
            Self::OpenStack => &OPENSTACK_REFERENCE_CHARMS,
            Self::Kubernetes => &KUBERNETES_REFERENCE_CHARMS,
        }
    }
}

/// Infer the deployment family from the deployed charm set. A family is
/// inferred only when exactly one reference set has at least two matches
/// and every other set has fewer than two.
#[must_use]
pub fn infer_cloud_type(charms: &BTreeSet<&str>) -> Option<CloudType> {
    let candidates = [CloudType::OpenStack, CloudType::Kubernetes];
    let mut inferred = None;
    for candidate in candidates {
        let matches = candidate
            .reference_charms()
            .iter()
            .filter(|reference| charms.contains(**reference))
            .count();
        if matches >= 2 {
            if inferred.is_some() {
                return None;
            }
            inferred = Some(candidate);
        }
    }
    inferred
}

/// An explicitly supplied type is never overridden; an unrecognized
/// explicit type only logs a warning and leaves the type unknown.
#[must_use]
pub fn resolve_cloud_type(explicit: Option<&str>, charms: &BTreeSet<&str>) -> Option<CloudType> {
    match explicit {
        Some(raw) => {
            let resolved = CloudType::from_str(raw);
            if resolved.is_none() {
                warn!("Cloud type {raw} is unknown");
            }
            resolved
        }
        None => infer_cloud_type(charms),
    }
}

/// Charm presence checks: applications without a detectable charm, charms
/// outside the known list, and the mandatory lists for operations and for
/// the resolved cloud type.
#[must_use]
pub fn check_charms(
    model: &DeploymentModel,
    rules: &RuleDoc,
    cloud_type: Option<CloudType>,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (name, application) in &model.applications {
        if application.charm.is_none() {
            findings.push(
                Finding::error(
                    "charm-not-mapped",
                    &["charm", "mapped", "parsing"],
                    format!("Could not detect which charm is used for application {name}"),
                )
                .with_detail("application", name.as_str()),
            );
        }
    }

    let charms = model.charms();

    match rules.known_charms() {
        Some(known) => {
            for charm in &charms {
                if !known.contains(*charm) {
                    findings.push(
                        Finding::error(
                            "unrecognised-charm",
                            &["charm", "unrecognised"],
                            format!("Charm '{charm}' not recognised"),
                        )
                        .with_detail("charm", *charm),
                    );
                }
            }
        }
        None => warn!("rules carry no known charms list; skipping recognition check"),
    }

    for charm in rules.string_list("operations mandatory") {
        if !ops_charm_present(model, rules, &charms, &charm) {
            findings.push(
                Finding::error(
                    "ops-charm-missing",
                    &["missing", "ops", "charm", "mandatory", "principal"],
                    format!("Ops charm '{charm}' is missing"),
                )
                .with_detail("charm", charm.as_str()),
            );
        }
    }

    if let Some(cloud_type) = cloud_type {
        let type_name = cloud_type.as_str();
        for charm in rules.string_list(&format!("{type_name} mandatory")) {
            if !charms.contains(charm.as_str()) {
                findings.push(
                    Finding::error(
                        &format!("{type_name}-charm-missing"),
                        &["missing", type_name, "charm", "mandatory", "principal"],
                        format!("{type_name} charm '{charm}' is missing"),
                    )
                    .with_detail("charm", charm.as_str()),
                );
            }
        }
        for charm in rules.string_list(&format!("operations {type_name} mandatory")) {
            if !charms.contains(charm.as_str()) {
                findings.push(
                    Finding::error(
                        &format!("{type_name}-ops-charm-missing"),
                        &["missing", type_name, "ops", "charm", "mandatory", "principal"],
                        format!("{type_name} ops charm '{charm}' is missing"),
                    )
                    .with_detail("charm", charm.as_str()),
                );
            }
        }
    }

    findings
}

/// Presence for operations charms can be satisfied across model boundaries:
/// the charm counts as present when the `saas` rule list names it and a
/// discovered cross-model application name is a prefix of it. The remote
/// is not always called exactly as the charm (prometheus vs prometheus2).
fn ops_charm_present(
    model: &DeploymentModel,
    rules: &RuleDoc,
    charms: &BTreeSet<&str>,
    charm: &str,
) -> bool {
    if charms.contains(charm) {
        return true;
    }
    let saas = rules.saas();
    if !saas.contains(charm) {
        return false;
    }
    model
        .cmr_apps
        .iter()
        .any(|cmr_app| charm.starts_with(cmr_app.as_str()))
}
