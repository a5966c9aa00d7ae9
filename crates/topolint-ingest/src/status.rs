// SPDX-License-Identifier: Apache-2.0

use crate::snapshot::{scalar_to_string, yaml_to_json, Snapshot};
use crate::IngestError;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use topolint_model::{
    availability_zone, machine_kind, Application, CharmName, DeploymentModel, Machine, Unit,
};
use tracing::warn;

/// Build the canonical model from a live-status document. Containers nested
/// under their host's `containers` map become first-class machines.
pub(crate) fn build(snapshot: &Snapshot) -> Result<DeploymentModel, IngestError> {
    let mut model = DeploymentModel::default();

    if let Some(machines) = snapshot.machines() {
        for (key, data) in machines {
            let Some(id) = scalar_to_string(key) else {
                continue;
            };
            let data = data.as_mapping();
            insert_machine(&mut model, &id, data, None);
            if let Some(containers) = data
                .and_then(|mapping| mapping.get("containers"))
                .and_then(Value::as_mapping)
            {
                for (container_key, container_data) in containers {
                    let Some(container_id) = scalar_to_string(container_key) else {
                        continue;
                    };
                    insert_machine(
                        &mut model,
                        &container_id,
                        container_data.as_mapping(),
                        Some(&id),
                    );
                }
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
        let mut machines: BTreeSet<String> = application
            .units
            .values()
            .map(|unit| unit.machine.clone())
            .collect();
        for unit in application.units.values() {
            for sub_unit in &unit.subordinates {
                let sub_app = sub_unit.split('/').next().unwrap_or(sub_unit);
                model
                    .apps_to_machines
                    .entry(sub_app.to_string())
                    .or_default()
                    .insert(unit.machine.clone());
            }
        }
        if !machines.is_empty() {
            model
                .apps_to_machines
                .entry(name.clone())
                .or_default()
                .append(&mut machines);
        }
        model.applications.insert(name, application);
    }

    for (name, application) in &model.applications {
        for unit in application.units.values() {
            if !model.machines.contains_key(&unit.machine) {
                warn!(
                    application = %name,
                    unit = %unit.id,
                    machine = %unit.machine,
                    "unit is placed on a machine absent from the snapshot"
                );
            }
        }
    }

    Ok(model)
}

fn insert_machine(
    model: &mut DeploymentModel,
    id: &str,
    data: Option<&Mapping>,
    parent: Option<&str>,
) {
    let hardware = data
        .and_then(|mapping| mapping.get("hardware"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let az = hardware
        .as_deref()
        .and_then(availability_zone)
        .map(str::to_string);
    model.machines.insert(
        id.to_string(),
        Machine {
            id: id.to_string(),
            kind: machine_kind(id, hardware.as_deref()),
            hardware,
            az,
            parent: parent.map(str::to_string),
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

    if let Some(bindings) = data.get("endpoint-bindings").and_then(Value::as_mapping) {
        application.bindings_declared = !bindings.is_empty();
        for (key, value) in bindings {
            if let (Some(endpoint), Some(space)) = (scalar_to_string(key), value.as_str()) {
                application.bindings.insert(endpoint, space.to_string());
            }
        }
    }

    if let Some(principals) = data.get("subordinate-to").and_then(Value::as_sequence) {
        for principal in principals {
            if let Some(principal) = scalar_to_string(principal) {
                application.subordinate_to.insert(principal);
            }
        }
    }

    if let Some(relations) = data.get("relations").and_then(Value::as_mapping) {
        for (key, peers) in relations {
            let Some(endpoint) = scalar_to_string(key) else {
                continue;
            };
            application
                .endpoint_peers
                .insert(endpoint, peer_names(peers));
        }
    }

    if let Some(units) = data.get("units").and_then(Value::as_mapping) {
        for (key, unit_data) in units {
            let Some(unit_id) = scalar_to_string(key) else {
                continue;
            };
            let Some(unit_data) = unit_data.as_mapping() else {
                warn!(application = %name, unit = %unit_id, "unit record is not a mapping; skipping");
                continue;
            };
            let Some(machine) = unit_data
                .get("machine")
                .and_then(|value| scalar_to_string(value))
            else {
                warn!(application = %name, unit = %unit_id, "unit has no machine; skipping");
                continue;
            };
            let subordinates = unit_data
                .get("subordinates")
                .and_then(Value::as_mapping)
                .map(|subs| {
                    subs.keys()
                        .filter_map(scalar_to_string)
                        .collect::<BTreeSet<_>>()
                })
                .unwrap_or_default();
            application.units.insert(
                unit_id.clone(),
                Unit {
                    id: unit_id,
                    machine,
                    subordinates,
                },
            );
        }
    }

    Ok(application)
}

/// Per-application relation values come in two schemas: a flat list of peer
/// names, or a list of records carrying `related-application`.
fn peer_names(peers: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    if let Some(items) = peers.as_sequence() {
        for item in items {
            match item {
                Value::Mapping(record) => {
                    if let Some(peer) = record.get("related-application").and_then(Value::as_str) {
                        out.insert(peer.to_string());
                    }
                }
                other => {
                    if let Some(peer) = scalar_to_string(other) {
                        out.insert(peer);
                    }
                }
            }
        }
    }
    out
}
