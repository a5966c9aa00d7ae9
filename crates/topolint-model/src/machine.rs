// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// What kind of host a machine identifier refers to.
///
/// The kind is derived, not stored: container by identifier shape, virtual
/// machine by a "virtual" marker in the free-text hardware descriptor, bare
/// metal otherwise. Provisioner data does not reliably distinguish VMs, so
/// the hardware tag is a best-effort heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineKind {
    Metal,
    Virtual,
    Container,
}

impl MachineKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metal => "bare-metal",
            Self::Virtual => "virtual-machine",
            Self::Container => "container",
        }
    }
}

/// Container identifiers come in two shapes: "0/lxd/1" (status) and
/// "lxd:0" (bundle placement target).
#[must_use]
pub fn is_container(machine_id: &str) -> bool {
    machine_id.contains("lxd/") || machine_id.starts_with("lxd:")
}

#[must_use]
pub fn is_virtual(hardware: Option<&str>) -> bool {
    hardware.is_some_and(|descriptor| descriptor.contains("virtual"))
}

#[must_use]
pub fn machine_kind(machine_id: &str, hardware: Option<&str>) -> MachineKind {
    if is_container(machine_id) {
        MachineKind::Container
    } else if is_virtual(hardware) {
        MachineKind::Virtual
    } else {
        MachineKind::Metal
    }
}

/// Availability zone parsed from the free-text hardware descriptor.
/// Absence is a recoverable condition, not an error.
#[must_use]
pub fn availability_zone(hardware: &str) -> Option<&str> {
    hardware
        .split_whitespace()
        .find_map(|entry| entry.strip_prefix("availability-zone="))
}

/// Sort key ordering hosts before their containers, for stable listings of
/// machines in findings. Handles "1", "1/lxd/3" and "lxd:1".
#[must_use]
pub fn machine_sort_key(machine_id: &str) -> (u64, String, u64) {
    if let Some((marker, host)) = machine_id.split_once(':') {
        return (
            host.parse().unwrap_or(u64::MAX),
            marker.to_string(),
            0,
        );
    }
    let mut parts = machine_id.split('/');
    let host = parts
        .next()
        .and_then(|part| part.parse().ok())
        .unwrap_or(u64::MAX);
    let marker = parts.next().unwrap_or("").to_string();
    let index = parts.next().and_then(|part| part.parse().ok()).unwrap_or(0);
    (host, marker, index)
}
