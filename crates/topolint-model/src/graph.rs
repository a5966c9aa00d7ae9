// SPDX-License-Identifier: Apache-2.0

use crate::charm::CharmName;
use crate::machine::MachineKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A host capable of holding units. Containers are first-class machines with
/// a back-reference to their parent host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub hardware: Option<String>,
    pub kind: MachineKind,
    pub az: Option<String>,
    pub parent: Option<String>,
}

/// One running instance of an application, placed on a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub machine: String,
    /// Unit identifiers of subordinates colocated on the same machine.
    pub subordinates: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Application {
    pub name: String,
    /// Resolved charm; `None` when the snapshot record carried no charm
    /// reference at all (reported downstream, never a crash here).
    pub charm: Option<CharmName>,
    pub options: BTreeMap<String, Value>,
    /// Endpoint name to network space, with "" as the default-binding key.
    pub bindings: BTreeMap<String, String>,
    pub bindings_declared: bool,
    /// Declared relations per endpoint: endpoint name to peer applications.
    pub endpoint_peers: BTreeMap<String, BTreeSet<String>>,
    pub units: BTreeMap<String, Unit>,
    /// Principals this application is subordinate to.
    pub subordinate_to: BTreeSet<String>,
}

impl Application {
    #[must_use]
    pub fn is_subordinate(&self) -> bool {
        !self.subordinate_to.is_empty()
    }

    #[must_use]
    pub fn charm_name(&self) -> Option<&str> {
        self.charm.as_ref().map(CharmName::as_str)
    }

    #[must_use]
    pub fn has_endpoint(&self, endpoint: &str) -> bool {
        self.bindings.contains_key(endpoint) || self.endpoint_peers.contains_key(endpoint)
    }
}

/// Unordered pair of "application:endpoint" references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPair {
    pub left: String,
    pub right: String,
}

impl RelationPair {
    #[must_use]
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Order-independent endpoint equality.
    #[must_use]
    pub fn matches(&self, a: &str, b: &str) -> bool {
        (self.left == a && self.right == b) || (self.left == b && self.right == a)
    }

    /// The peer of `app_endpoint` if this pair involves it.
    #[must_use]
    pub fn peer_of(&self, app_endpoint: &str) -> Option<&str> {
        if self.left == app_endpoint {
            Some(&self.right)
        } else if self.right == app_endpoint {
            Some(&self.left)
        } else {
            None
        }
    }
}

/// Canonical deployment graph, built once per snapshot and immutable to all
/// checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeploymentModel {
    pub machines: BTreeMap<String, Machine>,
    pub applications: BTreeMap<String, Application>,
    /// Endpoint pairs, populated only by the exported-topology shape.
    pub relation_pairs: Vec<RelationPair>,
    /// Application to hosting machines, including subordinate placement.
    pub apps_to_machines: BTreeMap<String, BTreeSet<String>>,
    /// Applications known to be consumed or offered across model boundaries.
    pub cmr_apps: BTreeSet<String>,
}

impl DeploymentModel {
    /// Distinct resolved charm names deployed in the model.
    #[must_use]
    pub fn charms(&self) -> BTreeSet<&str> {
        self.applications
            .values()
            .filter_map(Application::charm_name)
            .collect()
    }

    #[must_use]
    pub fn app_to_charm(&self, app: &str) -> Option<&str> {
        self.applications.get(app).and_then(Application::charm_name)
    }

    #[must_use]
    pub fn charm_to_apps(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut out: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for app in self.applications.values() {
            if let Some(charm) = app.charm_name() {
                out.entry(charm).or_default().insert(app.name.as_str());
            }
        }
        out
    }

    #[must_use]
    pub fn apps_of_charm(&self, charm: &str) -> BTreeSet<&str> {
        self.applications
            .values()
            .filter(|app| app.charm_name() == Some(charm))
            .map(|app| app.name.as_str())
            .collect()
    }

    #[must_use]
    pub fn machines_to_apps(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut out: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (app, machines) in &self.apps_to_machines {
            for machine in machines {
                out.entry(machine.as_str()).or_default().insert(app.as_str());
            }
        }
        out
    }

    /// Machines hosting any application of the given charm.
    #[must_use]
    pub fn machines_for_charm(&self, charm: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for app in self.apps_of_charm(charm) {
            if let Some(machines) = self.apps_to_machines.get(app) {
                out.extend(machines.iter().cloned());
            }
        }
        out
    }

    /// Container machines hosted on the given machine.
    #[must_use]
    pub fn containers_on(&self, machine: &str) -> BTreeSet<&str> {
        self.machines
            .values()
            .filter(|candidate| candidate.parent.as_deref() == Some(machine))
            .map(|candidate| candidate.id.as_str())
            .collect()
    }

    /// Subordinate application names present per machine, derived from unit
    /// subordinate listings (live-status snapshots only).
    #[must_use]
    pub fn subs_on_machines(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut out: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for app in self.applications.values() {
            for unit in app.units.values() {
                let entry = out.entry(unit.machine.as_str()).or_default();
                for sub_unit in &unit.subordinates {
                    let sub_app = sub_unit.split('/').next().unwrap_or(sub_unit);
                    entry.insert(sub_app);
                }
            }
        }
        out
    }

    /// Principal application names per machine (applications with units).
    #[must_use]
    pub fn principals_on_machines(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut out: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for app in self.applications.values() {
            for unit in app.units.values() {
                out.entry(unit.machine.as_str())
                    .or_default()
                    .insert(app.name.as_str());
            }
        }
        out
    }

    /// Applications related to any of `apps` through `endpoint`. Prefers the
    /// relation pairs recorded by the exported-topology shape, falling back
    /// to the per-application endpoint peer lists of the live-status shape.
    #[must_use]
    pub fn peers_of(&self, apps: &BTreeSet<String>, endpoint: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if self.relation_pairs.is_empty() {
            for app in apps {
                if let Some(record) = self.applications.get(app) {
                    if let Some(peers) = record.endpoint_peers.get(endpoint) {
                        out.extend(peers.iter().cloned());
                    }
                }
            }
        } else {
            for app in apps {
                let app_endpoint = format!("{app}:{endpoint}");
                for pair in &self.relation_pairs {
                    if let Some(peer) = pair.peer_of(&app_endpoint) {
                        if let Some((peer_app, _)) = peer.split_once(':') {
                            out.insert(peer_app.to_string());
                        }
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn has_endpoint(&self, app: &str, endpoint: &str) -> bool {
        self.applications
            .get(app)
            .is_some_and(|record| record.has_endpoint(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::machine_kind;

    fn machine(id: &str, hardware: Option<&str>, parent: Option<&str>) -> Machine {
        Machine {
            id: id.to_string(),
            hardware: hardware.map(str::to_string),
            kind: machine_kind(id, hardware),
            az: hardware.and_then(crate::availability_zone).map(str::to_string),
            parent: parent.map(str::to_string),
        }
    }

    fn sample_model() -> DeploymentModel {
        let mut model = DeploymentModel::default();
        for (id, hw, parent) in [
            ("0", Some("availability-zone=az1"), None),
            ("1", Some("availability-zone=az2"), None),
            ("0/lxd/0", None, Some("0")),
        ] {
            model.machines.insert(id.to_string(), machine(id, hw, parent));
        }
        let mut keystone = Application {
            name: "keystone".to_string(),
            charm: Some(CharmName::parse("cs:keystone-312").unwrap()),
            ..Application::default()
        };
        keystone.units.insert(
            "keystone/0".to_string(),
            Unit {
                id: "keystone/0".to_string(),
                machine: "0".to_string(),
                subordinates: ["nrpe/0".to_string()].into(),
            },
        );
        model
            .apps_to_machines
            .insert("keystone".to_string(), ["0".to_string()].into());
        model
            .apps_to_machines
            .insert("nrpe".to_string(), ["0".to_string()].into());
        let nrpe = Application {
            name: "nrpe".to_string(),
            charm: Some(CharmName::parse("cs:nrpe-42").unwrap()),
            subordinate_to: ["keystone".to_string()].into(),
            ..Application::default()
        };
        model.applications.insert("keystone".to_string(), keystone);
        model.applications.insert("nrpe".to_string(), nrpe);
        model
    }

    #[test]
    fn charm_indexes_are_derived_from_applications() {
        let model = sample_model();
        assert_eq!(model.charms(), ["keystone", "nrpe"].into());
        assert_eq!(model.app_to_charm("keystone"), Some("keystone"));
        assert_eq!(model.machines_for_charm("keystone"), ["0".to_string()].into());
    }

    #[test]
    fn subordinates_are_mapped_per_machine() {
        let model = sample_model();
        let subs = model.subs_on_machines();
        assert_eq!(subs.get("0"), Some(&["nrpe"].into()));
        let principals = model.principals_on_machines();
        assert_eq!(principals.get("0"), Some(&["keystone"].into()));
    }

    #[test]
    fn containers_resolve_through_parent() {
        let model = sample_model();
        assert_eq!(model.containers_on("0"), ["0/lxd/0"].into());
        assert!(model.containers_on("1").is_empty());
    }

    #[test]
    fn relation_pair_equality_is_unordered() {
        let pair = RelationPair::new("a:x", "b:y");
        assert!(pair.matches("b:y", "a:x"));
        assert_eq!(pair.peer_of("a:x"), Some("b:y"));
        assert_eq!(pair.peer_of("c:z"), None);
    }
}
