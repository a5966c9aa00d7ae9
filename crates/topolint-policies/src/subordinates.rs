// SPDX-License-Identifier: Apache-2.0

use crate::finding::Finding;
use crate::ruledoc::{Placement, RuleDoc, SubordinateRule};
use std::collections::{BTreeMap, BTreeSet};
use topolint_model::{machine_kind, DeploymentModel, MachineKind};

/// Placement checks for required subordinates: duplicates on one machine,
/// extraneous presence where a policy forbids it, and absence where a
/// policy requires it. Works off unit subordinate listings, so it only
/// bites on live-status snapshots, as the exported-topology shape carries
/// no units.
#[must_use]
pub fn check_subordinates(model: &DeploymentModel, rules: &RuleDoc) -> Vec<Finding> {
    let sub_rules = rules.subordinates();

    let mut missing: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut extraneous: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let duplicates = find_duplicates(model, &sub_rules);

    let subs_on_machines = model.subs_on_machines();
    let principals_on_machines = model.principals_on_machines();
    let all_or_nothing: BTreeSet<&str> = subs_on_machines
        .values()
        .flat_map(|subs| subs.iter().copied())
        .collect();

    for (sub_name, rule) in &sub_rules {
        let Some(placement) = &rule.placement else {
            continue;
        };
        for (machine, present_subs) in &subs_on_machines {
            let empty = BTreeSet::new();
            let principals = principals_on_machines.get(machine).unwrap_or(&empty);
            let kind = model
                .machines
                .get(*machine)
                .map(|record| record.kind)
                .unwrap_or_else(|| machine_kind(machine, None));

            match placement {
                Placement::On(required_on) => {
                    if !principals.contains(required_on.as_str()) {
                        continue;
                    }
                }
                Placement::AllExcept(not_on) => {
                    if principals.contains(not_on.as_str()) {
                        continue;
                    }
                }
                Placement::HostOnly => {
                    if kind == MachineKind::Container {
                        if present_subs.contains(sub_name.as_str()) {
                            extraneous
                                .entry(sub_name.as_str())
                                .or_default()
                                .extend(principals.iter().copied());
                        }
                        continue;
                    }
                }
                Placement::MetalOnly => {
                    if kind != MachineKind::Metal {
                        if present_subs.contains(sub_name.as_str()) {
                            extraneous
                                .entry(sub_name.as_str())
                                .or_default()
                                .extend(principals.iter().copied());
                        }
                        continue;
                    }
                }
                Placement::AllOrNothing => {
                    if !all_or_nothing.contains(sub_name.as_str()) {
                        continue;
                    }
                }
                Placement::ContainerAware => {
                    if !container_aware_found(model, rule, kind, present_subs, principals) {
                        missing
                            .entry(sub_name.as_str())
                            .or_default()
                            .extend(principals.iter().copied());
                    }
                    continue;
                }
                Placement::All => {}
            }

            // Required on this machine, possibly under an alias of the
            // same charm.
            let found = present_subs.contains(sub_name.as_str())
                || present_subs
                    .iter()
                    .any(|sub| model.app_to_charm(sub) == Some(sub_name.as_str()));
            if !found {
                missing
                    .entry(sub_name.as_str())
                    .or_default()
                    .extend(principals.iter().copied());
            }
        }
    }

    let mut findings = Vec::new();
    for (sub, principals) in missing {
        if principals.is_empty() {
            continue;
        }
        let principals = join_sorted(&principals);
        findings.push(
            Finding::error(
                "ops-subordinate-missing",
                &["missing", "ops", "charm", "mandatory", "subordinate"],
                format!("Subordinate '{sub}' is missing for application(s): '{principals}'"),
            )
            .with_detail("subordinate", sub)
            .with_detail("principals", principals.as_str()),
        );
    }
    for (sub, principals) in extraneous {
        if principals.is_empty() {
            continue;
        }
        let principals = join_sorted(&principals);
        findings.push(
            Finding::error(
                "subordinate-extraneous",
                &["extraneous", "charm", "subordinate"],
                format!("Application(s) '{principals}' has extraneous subordinate '{sub}'"),
            )
            .with_detail("subordinate", sub)
            .with_detail("principals", principals.as_str()),
        );
    }
    for (sub, machines) in duplicates {
        let machines = join_sorted(&machines);
        findings.push(
            Finding::error(
                "subordinate-duplicate",
                &["duplicate", "charm", "subordinate"],
                format!("Subordinate '{sub}' is duplicated on machines: '{machines}'"),
            )
            .with_detail("subordinate", sub)
            .with_detail("machines", machines.as_str()),
        );
    }
    findings
}

/// A subordinate landing twice on one machine via different principals
/// indicates it was double-related. Optional subordinates without a
/// placement rule still get this check; `allow-multiple` suppresses it.
fn find_duplicates<'model>(
    model: &'model DeploymentModel,
    sub_rules: &BTreeMap<String, SubordinateRule>,
) -> BTreeMap<&'model str, BTreeSet<&'model str>> {
    let mut seen: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut duplicates: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for application in model.applications.values() {
        for unit in application.units.values() {
            let machine = unit.machine.as_str();
            let on_machine = seen.entry(machine).or_default();
            for sub_unit in &unit.subordinates {
                let sub_app = sub_unit.split('/').next().unwrap_or(sub_unit);
                if on_machine.contains(sub_app) {
                    let allow_multiple = model
                        .app_to_charm(sub_app)
                        .and_then(|charm| sub_rules.get(charm))
                        .is_some_and(|rule| rule.allow_multiple);
                    if !allow_multiple {
                        duplicates.entry(sub_app).or_default().insert(machine);
                    }
                }
                on_machine.insert(sub_app);
            }
        }
    }
    duplicates
}

/// "container aware" matches the named variant of the subordinate charm to
/// the host variant: `<sub>-<suffix>` for the suffix set of the machine
/// kind, any application of the subordinate charm, or a listed exception
/// application on the machine.
fn container_aware_found(
    model: &DeploymentModel,
    rule: &SubordinateRule,
    kind: MachineKind,
    present_subs: &BTreeSet<&str>,
    principals: &BTreeSet<&str>,
) -> bool {
    let suffixes = if kind == MachineKind::Container {
        &rule.container_suffixes
    } else {
        &rule.host_suffixes
    };
    for suffix in suffixes {
        let looking_for = format!("{}-{suffix}", rule.name);
        if present_subs.contains(looking_for.as_str()) {
            return true;
        }
    }
    if present_subs
        .iter()
        .any(|sub| model.app_to_charm(sub) == Some(rule.name.as_str()))
    {
        return true;
    }
    rule.exceptions
        .iter()
        .any(|exception| principals.contains(exception.as_str()))
}

fn join_sorted(items: &BTreeSet<&str>) -> String {
    items.iter().copied().collect::<Vec<_>>().join(", ")
}
