// SPDX-License-Identifier: Apache-2.0

use crate::finding::Finding;
use std::collections::BTreeMap;
use topolint_model::DeploymentModel;
use tracing::{error, warn};

/// Availability-zone distribution checks. Machines without AZ information
/// are logged once and excluded from all AZ arithmetic; they never count as
/// a violation of balance.
#[must_use]
pub fn check_azs(model: &DeploymentModel, min_azs: usize) -> Vec<Finding> {
    let mut findings = Vec::new();

    let machines_to_az = map_machines_to_az(model);
    let azs: BTreeMap<&str, usize> = machines_to_az
        .values()
        .map(|az| (az.as_str(), 0))
        .collect();
    let num_azs = azs.len();
    if num_azs < min_azs {
        findings.push(
            Finding::error(
                "AZ-invalid-number",
                &["AZ"],
                format!("Invalid number of AZs: '{num_azs}', expecting at least {min_azs}"),
            )
            .with_detail("num_azs", num_azs),
        );
        return findings;
    }

    for (app_name, application) in &model.applications {
        let num_units = application.units.len();
        if num_units <= 1 {
            continue;
        }
        let mut counter = azs.clone();
        for unit in application.units.values() {
            // Container placements count against the host machine.
            let host = unit.machine.split('/').next().unwrap_or(&unit.machine);
            let Some(az) = machines_to_az.get(host) else {
                error!(
                    application = %app_name,
                    machine = %host,
                    "cannot find machine in machine to AZ mapping data"
                );
                continue;
            };
            if let Some(count) = counter.get_mut(az.as_str()) {
                *count += 1;
            }
        }
        let max = counter.values().copied().max().unwrap_or(0);
        let min = counter.values().copied().min().unwrap_or(0);
        if max - min > 1 {
            let az_map = counter
                .iter()
                .map(|(az, count)| format!("{az}: {count}"))
                .collect::<Vec<_>>()
                .join(", ");
            findings.push(
                Finding::error(
                    "AZ-unbalance",
                    &["AZ"],
                    format!(
                        "Application '{app_name}' is unbalanced across AZs: {num_units} units, deployed as: {az_map}"
                    ),
                )
                .with_detail("application", app_name.as_str())
                .with_detail("num_units", num_units)
                .with_detail("az_map", az_map.as_str()),
            );
        }
    }
    findings
}

fn map_machines_to_az(model: &DeploymentModel) -> BTreeMap<&str, &String> {
    let mut out = BTreeMap::new();
    for (id, machine) in &model.machines {
        if machine.parent.is_some() {
            continue;
        }
        match (&machine.hardware, &machine.az) {
            (None, _) => {
                warn!(machine = %id, "machine has no hardware info; skipping");
            }
            (Some(_), None) => {
                warn!(
                    machine = %id,
                    "machine has no availability-zone info in hardware field; skipping"
                );
            }
            (Some(_), Some(az)) => {
                out.insert(id.as_str(), az);
            }
        }
    }
    out
}
