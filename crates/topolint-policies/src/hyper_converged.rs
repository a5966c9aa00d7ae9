// SPDX-License-Identifier: Apache-2.0

use crate::finding::Finding;
use topolint_model::DeploymentModel;

// The fault manager fences unresponsive machines. Fencing a machine that
// carries both the compute and storage roles is expected; taking down the
// unrelated application logic colocated in its containers is not.
const FAULT_MANAGER: &str = "masakari";
const COMPUTE_CHARM: &str = "nova-compute";
const STORAGE_CHARM: &str = "ceph-osd";

/// Flag containers with unrelated workloads on machines that combine the
/// compute and storage roles while a fault manager is deployed. Without
/// the fault manager the check returns nothing.
#[must_use]
pub fn check_hyper_converged(model: &DeploymentModel) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !model.charms().contains(FAULT_MANAGER) {
        return findings;
    }

    let compute_machines = model.machines_for_charm(COMPUTE_CHARM);
    let storage_machines = model.machines_for_charm(STORAGE_CHARM);
    let machines_to_apps = model.machines_to_apps();

    for machine in compute_machines.intersection(&storage_machines) {
        for container in model.containers_on(machine) {
            let Some(apps) = machines_to_apps.get(container) else {
                continue;
            };
            let apps: Vec<&str> = apps.iter().copied().collect();
            findings.push(
                Finding::warning(
                    "hyper-converged-masakari",
                    &["hyper-converged", "masakari"],
                    format!(
                        "Deployment has masakari and the machine: '{machine}' \
                         has nova/osd and the lxd: '{container}' with the apps: {apps:?}"
                    ),
                )
                .with_detail("machine", machine.as_str())
                .with_detail("container", container)
                .with_detail("apps", apps.clone()),
            );
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use topolint_model::{machine_kind, Application, CharmName, Machine};

    fn machine(id: &str, parent: Option<&str>) -> Machine {
        Machine {
            id: id.to_string(),
            kind: machine_kind(id, None),
            hardware: None,
            az: None,
            parent: parent.map(str::to_string),
        }
    }

    fn model(with_masakari: bool) -> DeploymentModel {
        let mut model = DeploymentModel::default();
        for (id, parent) in [
            ("0", None),
            ("0/lxd/0", Some("0")),
            ("0/lxd/1", Some("0")),
        ] {
            model.machines.insert(id.to_string(), machine(id, parent));
        }
        let mut names = vec![
            ("nova-compute", vec!["0"]),
            ("ceph-osd", vec!["0"]),
            ("keystone", vec!["0/lxd/0"]),
            ("glance", vec!["0/lxd/1"]),
        ];
        if with_masakari {
            names.push(("masakari", vec!["0/lxd/0"]));
        }
        for (name, machines) in names {
            model.applications.insert(
                name.to_string(),
                Application {
                    name: name.to_string(),
                    charm: Some(CharmName::parse(name).unwrap()),
                    ..Application::default()
                },
            );
            model.apps_to_machines.insert(
                name.to_string(),
                machines.into_iter().map(str::to_string).collect(),
            );
        }
        model
    }

    #[test]
    fn colocated_containers_are_reported_per_machine_and_container() {
        let findings = check_hyper_converged(&model(true));
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].id, "hyper-converged-masakari");
        assert_eq!(findings[0].details["container"], "0/lxd/0");
        assert_eq!(
            findings[0].details["apps"],
            serde_json::json!(["keystone", "masakari"])
        );
        assert_eq!(findings[1].details["container"], "0/lxd/1");
        assert_eq!(findings[1].details["apps"], serde_json::json!(["glance"]));
    }

    #[test]
    fn absent_fault_manager_returns_an_empty_result() {
        assert!(check_hyper_converged(&model(false)).is_empty());
    }

    #[test]
    fn compute_only_machines_are_not_flagged() {
        let mut model = model(true);
        model
            .apps_to_machines
            .insert("ceph-osd".to_string(), BTreeSet::from(["1".to_string()]));
        assert!(check_hyper_converged(&model).is_empty());
    }
}
