//! ConfigStore loading across formats

use deploy_fs::{ConfigStore, Error, FlushConfig, NormalizedPath, OrderedMap, PermissionSpec, permission_rules};
use deploy_test_utils::TestTree;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sections {
    flush: FlushConfig,
    permissions: OrderedMap<PermissionSpec>,
}

#[rstest]
#[case::toml(
    "deploy.toml",
    "[flush]\npaths = [\"cache\"]\n\n[permissions]\n\"z\" = { mode = \"0700\" }\n\"a\" = { mode = 0o755, user = \"www-data\" }\n"
)]
#[case::json(
    "deploy.json",
    r#"{"flush": {"paths": ["cache"]}, "permissions": {"z": {"mode": "0700"}, "a": {"mode": "755", "owner": "www-data"}}}"#
)]
#[case::yaml(
    "deploy.yaml",
    "flush:\n  paths: [cache]\npermissions:\n  z:\n    mode: \"0700\"\n  a:\n    mode: \"0755\"\n    user: www-data\n"
)]
fn loads_sections_in_every_format(#[case] file: &str, #[case] content: &str) {
    let tree = TestTree::new();
    let path = NormalizedPath::new(tree.write(file, content));

    let sections: Sections = ConfigStore::new().load(&path).unwrap();

    assert_eq!(sections.flush.paths, vec!["cache"]);
    let rules = permission_rules(&sections.permissions);
    let paths: Vec<_> = rules.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["z", "a"]);
    assert_eq!(rules[0].mode, Some(0o700));
    assert_eq!(rules[1].mode, Some(0o755));
    assert_eq!(rules[1].owner.as_deref(), Some("www-data"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let tree = TestTree::new();
    let path = NormalizedPath::new(tree.path("deploy.toml"));

    let sections: Sections = ConfigStore::new().load_or_default(&path).unwrap();

    assert_eq!(sections.flush, FlushConfig::default());
    assert!(sections.permissions.is_empty());
}

#[test]
fn unknown_extension_is_rejected() {
    let tree = TestTree::new();
    let path = NormalizedPath::new(tree.write("deploy.ini", "x=1"));

    let err = ConfigStore::new().load::<Sections>(&path).unwrap_err();

    assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "ini"));
}

#[test]
fn invalid_mode_is_a_parse_error() {
    let tree = TestTree::new();
    let path = NormalizedPath::new(tree.write("deploy.toml", "[permissions]\nassets = { mode = \"rwx\" }\n"));

    let err = ConfigStore::new().load::<Sections>(&path).unwrap_err();

    assert!(matches!(err, Error::ConfigParse { ref format, .. } if format == "TOML"));
}
