// SPDX-License-Identifier: Apache-2.0

use crate::snapshot::scalar_to_string;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;

// The three hint locations, one per producer of the snapshot shapes:
// export-bundle writes `saas`, the status serializer writes
// `application-endpoints`, remote sessions write `remote-applications`.
const CMR_KEYS: [&str; 3] = ["saas", "application-endpoints", "remote-applications"];

/// Discover applications consumed or offered across model boundaries.
/// Every hint location present is checked and deduplicated into one set;
/// entries without a URL still count (the offer side carries no URL by
/// design).
pub(crate) fn parse_cmr_apps(root: &Mapping) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for key in CMR_KEYS {
        let Some(entries) = root.get(key).and_then(Value::as_mapping) else {
            continue;
        };
        for name in entries.keys().filter_map(scalar_to_string) {
            // A log aggregator implies its storage backend lives in the
            // same remote model even when it is not offered directly.
            if name.starts_with("graylog") {
                out.insert("elasticsearch".to_string());
            }
            out.insert(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn each_hint_location_is_recognised() {
        for key in CMR_KEYS {
            let root = mapping(&format!("{key}:\n  prometheus:\n    url: admin/prod.prom\n"));
            assert_eq!(parse_cmr_apps(&root), ["prometheus".to_string()].into());
        }
    }

    #[test]
    fn hint_locations_are_deduplicated_into_one_set() {
        let root = mapping(
            "saas:\n  prometheus: {}\nremote-applications:\n  prometheus: {}\n  grafana:\n    url: a/b.c\n",
        );
        assert_eq!(
            parse_cmr_apps(&root),
            ["grafana".to_string(), "prometheus".to_string()].into()
        );
    }

    #[test]
    fn offer_side_entries_without_url_still_count() {
        let root = mapping("saas:\n  nagios: {}\n");
        assert_eq!(parse_cmr_apps(&root), ["nagios".to_string()].into());
    }

    #[test]
    fn graylog_implies_elasticsearch() {
        let root = mapping("saas:\n  graylog-prod:\n    url: admin/prod.graylog\n");
        assert_eq!(
            parse_cmr_apps(&root),
            ["graylog-prod".to_string(), "elasticsearch".to_string()].into()
        );
    }
}
