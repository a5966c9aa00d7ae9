//! End-to-end pass over an exported-topology snapshot: normalization,
//! space checks, and the hyper-convergence hazard.

use serde_json::json;
use topolint_ingest::build_model;
use topolint_policies::{lint, LintOptions, RuleDoc, RunInfo};

const BUNDLE: &str = "
applications:
  nova-compute:
    charm: cs:nova-compute-320
    bindings:
      '': internal-space
    to: ['0', '1']
  ceph-osd:
    charm: cs:ceph-osd-300
    bindings:
      '': internal-space
    to: ['0', '1']
  masakari:
    charm: cs:masakari-12
    bindings:
      '': internal-space
    to: ['lxd:0']
  keystone:
    charm: cs:keystone-312
    bindings:
      '': internal-space
      public: external-space
    to: ['lxd:1']
relations:
  - [keystone:public, nova-compute:identity-service]
machines:
  '0': {}
  '1': {}
"
;

fn rules() -> RuleDoc {
    RuleDoc::from_value(json!({
        "known charms": ["nova-compute", "ceph-osd", "masakari", "keystone"],
    }))
    .unwrap()
}

#[test]
fn bundle_pass_flags_space_mismatch_only_when_enforced() {
    let model = build_model(BUNDLE).unwrap();
    let report = lint(&model, &rules(), &LintOptions::default(), RunInfo::default());
    // The keystone public endpoint mismatch is a warning by default, and
    // the hyper-converged hazard is a warning as well: no errors.
    assert!(!report.has_errors(), "{:?}", report.errors);

    let enforcing = RuleDoc::from_value(json!({
        "known charms": ["nova-compute", "ceph-osd", "masakari", "keystone"],
        "space checks": {
            "enforce relations": [["keystone:public", "nova-compute:identity-service"]]
        }
    }))
    .unwrap();
    let report = lint(&model, &enforcing, &LintOptions::default(), RunInfo::default());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].id, "space-binding-mismatch");
}

#[test]
fn hyper_converged_hazard_is_computed_from_the_bundle_placement() {
    let model = build_model(BUNDLE).unwrap();
    let findings = topolint_policies::check_hyper_converged(&model);
    // Machines 0 and 1 carry both roles; each hosts one container.
    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].details["machine"], "0");
    assert_eq!(findings[0].details["container"], "lxd:0");
    assert_eq!(findings[0].details["apps"], json!(["masakari"]));
    assert_eq!(findings[1].details["machine"], "1");
    assert_eq!(findings[1].details["apps"], json!(["keystone"]));
}
