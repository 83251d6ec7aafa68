//! Property-based tests for the properties codec and naming rules.

use std::collections::BTreeMap;

use proptest::prelude::*;

use fleetconf::core::naming::{validate_file_name, validate_pid, validate_profile};
use fleetconf::core::paths::{pid_file_name, pid_for_file};
use fleetconf::core::properties;
use fleetconf::core::types::VersionName;

/// Keys and values drawn from a charset that exercises every escape.
fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._=:#!\\\\\t\n\r\u{e9}\u{4e2d}-]{0,16}"
}

fn settings() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(text(), text(), 0..8)
}

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-][a-zA-Z0-9._-]{0,15}"
}

proptest! {
    /// Serialized settings parse back to the same map.
    #[test]
    fn properties_survive_serialization(map in settings()) {
        let text = properties::serialize(&map);
        let parsed = properties::parse(&text).unwrap();
        prop_assert_eq!(parsed, map);
    }

    /// Serialization is deterministic and one line per entry.
    #[test]
    fn serialization_is_line_per_entry(map in settings()) {
        let text = properties::serialize(&map);
        prop_assert_eq!(text.lines().count(), map.len());
        prop_assert_eq!(properties::serialize(&map), text);
    }

    /// Comments and blank lines never produce entries.
    #[test]
    fn comments_are_ignored(comment in "[ -~]{0,30}") {
        let input = format!("# {}\n! {}\n\n   \n", comment, comment);
        prop_assert!(properties::parse(&input).unwrap().is_empty());
    }

    /// Any simple segment is a valid profile and pid, and maps to a pid file.
    #[test]
    fn simple_segments_are_valid_names(name in segment()) {
        prop_assert!(validate_profile(&name).is_ok());
        prop_assert!(validate_pid(&name).is_ok());
        let file = pid_file_name(&name);
        prop_assert!(validate_file_name(&file).is_ok());
        prop_assert_eq!(pid_for_file(&file), Some(name.as_str()));
    }

    /// Names with a separator or a parent reference never validate as segments.
    #[test]
    fn path_tricks_are_rejected(a in segment(), b in segment()) {
        let joined = format!("{}/{}", a, b);
        prop_assert!(validate_profile(&joined).is_err());
        prop_assert!(validate_pid(&joined).is_err());
        prop_assert!(validate_file_name(&joined).is_ok());
        let traversal = format!("{}/../{}", a, b);
        prop_assert!(validate_file_name(&traversal).is_err());
    }

    /// Version names containing `..` are never valid.
    #[test]
    fn version_names_reject_double_dots(a in segment(), b in segment()) {
        let name = format!("{}..{}", a, b);
        prop_assert!(VersionName::new(name).is_err());
    }
}
