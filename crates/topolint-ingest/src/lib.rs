// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Input normalization: three raw snapshot shapes in, one canonical
//! [`DeploymentModel`] out, plus the rule-document loader.
//!
//! Malformed per-application records degrade to a skipped entry with a
//! warning log; an invalid charm reference is a hard error. Rule sources
//! that cannot be read or parsed are fatal before any model building.

mod bundle;
mod cmr;
mod rules;
mod snapshot;
mod status;

use std::fmt::{Display, Formatter};

use topolint_model::DeploymentModel;

pub use rules::{load_rules, RuleLoadError};
pub use snapshot::{deep_merge, scalar_to_string, yaml_to_json, Snapshot, SnapshotShape};

pub const CRATE_NAME: &str = "topolint-ingest";

#[derive(Debug)]
pub struct IngestError(pub String);

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IngestError {}

/// Normalize a raw snapshot stream into the canonical deployment model.
pub fn build_model(yaml: &str) -> Result<DeploymentModel, IngestError> {
    let snapshot = Snapshot::from_yaml_str(yaml)?;
    build_model_from_snapshot(&snapshot)
}

pub fn build_model_from_snapshot(snapshot: &Snapshot) -> Result<DeploymentModel, IngestError> {
    let mut model = match snapshot.shape() {
        SnapshotShape::Bundle => bundle::build(snapshot)?,
        SnapshotShape::Status => status::build(snapshot)?,
    };
    model.cmr_apps = cmr::parse_cmr_apps(snapshot.root());
    Ok(model)
}
