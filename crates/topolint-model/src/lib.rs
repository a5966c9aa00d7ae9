// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Canonical deployment model.
//!
//! One snapshot, whatever its raw shape, is normalized into a
//! [`DeploymentModel`]: machines, applications, units, relation pairs and
//! cross-model application names. The model is read-only to every check.

mod charm;
mod graph;
mod machine;

pub use charm::{CharmName, InvalidCharmReference};
pub use graph::{Application, DeploymentModel, Machine, RelationPair, Unit};
pub use machine::{
    availability_zone, is_container, is_virtual, machine_kind, machine_sort_key, MachineKind,
};

pub const CRATE_NAME: &str = "topolint-model";
