// SPDX-License-Identifier: Apache-2.0

use crate::snapshot::{scalar_to_string, yaml_to_json, Snapshot};
use crate::IngestError;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use topolint_model::{
    machine_kind, Application, CharmName, DeploymentModel, Machine, RelationPair,
};
use tracing::warn;

/// Build the canonical model from an exported-topology (bundle) document.
/// Placement comes from `to:` targets; subordinate placement is inferred
/// through relation pairs, since subordinates carry no `to:` of their own.
pub(crate) fn build(snapshot: &Snapshot) -> Result<DeploymentModel, IngestError> {
    let mut model = DeploymentModel::default();

    if let Some(machines) = snapshot.machines() {
        for (key, _) in machines {
            if let Some(id) = scalar_to_string(key) {
                insert_machine(&mut model, &id);
            }
        }
    }

    let Some(applications) = snapshot.applications() else {
        return Err(IngestError("snapshot contains no applications".to_string()));
    };
    for (key, data) in applications {
        let Some(name) = scalar_to_string(key) else {
            continue;
        };
        let Some(data) = data.as_mapping() else {
            warn!(application = %name, "application record is not a mapping; skipping");
            continue;
        };
        let application = build_application(&name, data)?;
        for target in placement_targets(data) {
            // Unit-targeted entries such as "designate-bind/0" do not name a
            // machine and are left out of placement discovery.
            if target.contains('/') {
                continue;
            }
            insert_machine(&mut model, &target);
            model
                .apps_to_machines
                .entry(name.clone())
                .or_default()
                .insert(target);
        }
        model.applications.insert(name, application);
    }

    if let Some(relations) = snapshot.root().get("relations").and_then(Value::as_sequence) {
        for relation in relations {
            let Some(pair) = relation_endpoints(relation) else {
                warn!("relation entry is not a two-endpoint pair; skipping");
                continue;
            };
            model.relation_pairs.push(RelationPair::new(&pair.0, &pair.1));
        }
    }

    place_subordinates(&mut model);
    Ok(model)
}

fn insert_machine(model: &mut DeploymentModel, id: &str) {
    if model.machines.contains_key(id) {
        return;
    }
    let parent = id
        .split_once(':')
        .map(|(_, host)| host.to_string());
    model.machines.insert(
        id.to_string(),
        Machine {
            id: id.to_string(),
            kind: machine_kind(id, None),
            hardware: None,
            az: None,
            parent,
        },
    );
}

fn build_application(name: &str, data: &Mapping) -> Result<Application, IngestError> {
    let charm = match data.get("charm").and_then(Value::as_str) {
        Some(reference) => Some(
            CharmName::parse(reference).map_err(|error| IngestError(error.to_string()))?,
        ),
        None => None,
    };

    let mut application = Application {
        name: name.to_string(),
        charm,
        ..Application::default()
    };

    if let Some(options) = data.get("options").and_then(Value::as_mapping) {
        for (key, value) in options {
            if let Some(option) = scalar_to_string(key) {
                application.options.insert(option, yaml_to_json(value));
            }
        }
    }

    if let Some(bindings) = data.get("bindings").and_then(Value::as_mapping) {
        application.bindings_declared = !bindings.is_empty();
        for (key, value) in bindings {
            if let (Some(endpoint), Some(space)) = (scalar_to_string(key), value.as_str()) {
                application.bindings.insert(endpoint, space.to_string());
            }
        }
    }

    Ok(application)
}

fn placement_targets(data: &Mapping) -> Vec<String> {
    data.get("to")
        .and_then(Value::as_sequence)
        .map(|targets| targets.iter().filter_map(scalar_to_string).collect())
        .unwrap_or_default()
}

fn relation_endpoints(relation: &Value) -> Option<(String, String)> {
    let items = relation.as_sequence()?;
    if items.len() != 2 {
        return None;
    }
    Some((scalar_to_string(&items[0])?, scalar_to_string(&items[1])?))
}

/// Applications with no placement of their own are subordinates deployed
/// through relations; they inherit the machines of the peer they relate to.
fn place_subordinates(model: &mut DeploymentModel) {
    let subordinates: BTreeSet<String> = model
        .applications
        .keys()
        .filter(|name| !model.apps_to_machines.contains_key(*name))
        .cloned()
        .collect();

    for pair in &model.relation_pairs {
        let left = pair.left.split(':').next().unwrap_or(&pair.left);
        let right = pair.right.split(':').next().unwrap_or(&pair.right);
        let (sub, principal) = if subordinates.contains(left) {
            (left.to_string(), right.to_string())
        } else if subordinates.contains(right) {
            (right.to_string(), left.to_string())
        } else {
            continue;
        };
        let principal_machines = model
            .apps_to_machines
            .get(&principal)
            .cloned()
            .unwrap_or_default();
        if !principal_machines.is_empty() {
            model
                .apps_to_machines
                .entry(sub.clone())
                .or_default()
                .extend(principal_machines);
        }
        if let Some(record) = model.applications.get_mut(&sub) {
            record.subordinate_to.insert(principal);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::snapshot::Snapshot;

    const BUNDLE: &str = "
applications:
  ubuntu:
    charm: cs:ubuntu-19
    bindings:
      '': alpha
      juju-info: oam-space
    to:
      - '0'
      - lxd:1
  nrpe:
    charm: cs:nrpe-61
relations:
  - [ubuntu:juju-info, nrpe:general-info]
machines:
  '0': {}
  '1': {}
";

    #[test]
    fn bundle_shape_builds_the_canonical_graph() {
        let snapshot = Snapshot::from_yaml_str(BUNDLE).unwrap();
        let model = super::build(&snapshot).unwrap();

        assert!(model.machines.contains_key("lxd:1"));
        assert_eq!(model.machines["lxd:1"].parent.as_deref(), Some("1"));
        assert_eq!(
            model.apps_to_machines["ubuntu"],
            ["0".to_string(), "lxd:1".to_string()].into()
        );
        assert_eq!(model.relation_pairs.len(), 1);
    }

    #[test]
    fn subordinates_inherit_principal_placement_through_relations() {
        let snapshot = Snapshot::from_yaml_str(BUNDLE).unwrap();
        let model = super::build(&snapshot).unwrap();
        assert_eq!(model.apps_to_machines["nrpe"], model.apps_to_machines["ubuntu"]);
        assert!(model.applications["nrpe"].is_subordinate());
    }

    #[test]
    fn unit_targeted_placement_entries_are_ignored() {
        let snapshot = Snapshot::from_yaml_str(
            "
applications:
  designate:
    charm: cs:designate-12
    to: [designate-bind/0]
relations: []
machines: {}
",
        )
        .unwrap();
        let model = super::build(&snapshot).unwrap();
        assert!(!model.machines.contains_key("designate-bind/0"));
        assert!(!model.apps_to_machines.contains_key("designate"));
    }
}
