// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Policy rule engine: a fixed catalog of independent check routines, each
//! consuming the deployment model and its slice of the rule document, plus
//! the finding collector and its renderings.

mod az;
mod collector;
mod config_checks;
mod engine;
mod finding;
mod hyper_converged;
mod mandatory;
mod relations;
mod ruledoc;
mod spaces;
mod subordinates;

pub use az::check_azs;
pub use collector::{Report, RunInfo};
pub use config_checks::check_configuration;
pub use engine::{lint, LintOptions};
pub use finding::{Finding, Severity};
pub use hyper_converged::check_hyper_converged;
pub use mandatory::{check_charms, infer_cloud_type, resolve_cloud_type, CloudType};
pub use relations::{check_relations, RelationRuleError};
pub use ruledoc::{
    ConfigOperator, ConfigRule, Placement, RelationRuleSpec, RuleDoc, RuleDocError, SpaceChecks,
    SubordinateRule,
};
pub use spaces::{check_spaces, SpaceMismatch};
pub use subordinates::check_subordinates;

pub const CRATE_NAME: &str = "topolint-policies";
