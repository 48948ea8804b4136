//! End-to-end deployment workflows across the fs and process crates
//!
//! Exercises the flow a deploy script runs: load config -> switch
//! environment -> reconcile permissions -> dump the database.

use deploy_fs::{
    ConfigStore, DirectorySync, EnvironmentManager, EnvironmentsConfig, FlushConfig,
    NormalizedPath, OrderedMap, PermissionOutcome, PermissionSpec, SwitchStage, permission_rules,
    reconcile_permissions,
};
use deploy_process::{ConnectionConfig, Mysqldump, MysqldumpConfig, ProcessRunner};
use deploy_test_utils::TestTree;
use pretty_assertions::assert_eq;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeployFile {
    flush: FlushConfig,
    environments: EnvironmentsConfig,
    permissions: OrderedMap<PermissionSpec>,
    mysqldump: MysqldumpConfig,
    database: ConnectionConfig,
}

/// A small application checkout with two environments.
fn setup_app() -> TestTree {
    let tree = TestTree::new();
    tree.write("index.php", "<?php require 'protected/yiic';");
    tree.write("protected/yiic", "#!/usr/bin/env php");
    tree.write("protected/config/main.php", "<?php return [];");
    tree.write("protected/runtime/application.log", "old log");
    tree.write("protected/runtime/.gitignore", "*");
    tree.write("assets/3f2a/site.css", "body{}");

    tree.write("environments/dev/protected/config/main.php", "<?php return ['debug' => true];");
    tree.write("environments/dev/protected/config/dev-only.php", "<?php");
    tree.write("environments/prod/protected/config/main.php", "<?php return ['debug' => false];");
    tree.write("environments/prod/index.php", "<?php /* prod */");
    tree
}

fn load(tree: &TestTree, file: &str) -> DeployFile {
    ConfigStore::new()
        .load(&NormalizedPath::new(tree.path(file)))
        .unwrap()
}

fn manager(tree: &TestTree, config: &DeployFile) -> EnvironmentManager {
    EnvironmentManager::new(
        DirectorySync::new(tree.root()).with_exclusions(config.flush.exclusions()),
        config.environments.dir.clone(),
        config.flush.paths.clone(),
    )
}

#[test]
fn switching_environments_overlays_in_turn() {
    let tree = setup_app();
    tree.write("deploy.toml", "[flush]\nexclude = [\".gitignore\"]\n");
    let config = load(&tree, "deploy.toml");
    let mut manager = manager(&tree, &config);

    manager.change("dev", None).unwrap();
    assert_eq!(tree.read("protected/config/main.php"), "<?php return ['debug' => true];");
    tree.assert_file_exists("protected/runtime/.gitignore");
    tree.assert_file_not_exists("protected/runtime/application.log");
    tree.assert_empty_dir("assets");

    let report = manager.change("prod", None).unwrap();
    assert_eq!(report.id, "prod");
    assert_eq!(tree.read("protected/config/main.php"), "<?php return ['debug' => false];");
    assert_eq!(tree.read("index.php"), "<?php /* prod */");
    // Overlay only: files from the previous environment stay.
    tree.assert_file_exists("protected/config/dev-only.php");
    assert_eq!(manager.stage(), SwitchStage::Done);
}

#[test]
fn failed_switch_leaves_base_untouched() {
    let tree = setup_app();
    let config = DeployFile::default();
    let mut manager = manager(&tree, &config);

    assert!(manager.change("staging", None).is_err());
    tree.assert_file_exists("protected/runtime/application.log");
    tree.assert_file_exists("assets/3f2a/site.css");
}

#[test]
fn permission_report_serializes_for_scripts() {
    let tree = setup_app();
    tree.write(
        "deploy.json",
        r#"{ "permissions": { "protected/missing": { "mode": "0755" }, "assets": { "mode": 511 } } }"#,
    );
    let config = load(&tree, "deploy.json");
    let rules = permission_rules(&config.permissions);
    assert_eq!(rules[0].path, "protected/missing");
    assert_eq!(rules[1].mode, Some(0o777));

    let report = reconcile_permissions(&NormalizedPath::new(tree.root()), &rules);
    assert_eq!(report.entries[0].outcome, PermissionOutcome::NotFound);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["entries"][0]["outcome"], "not_found");
    assert!(json["entries"][0]["path"].as_str().unwrap().ends_with("protected/missing"));
}

#[cfg(unix)]
#[test]
fn full_deploy_with_permissions_and_dump() {
    let tree = setup_app();
    tree.chmod("protected/yiic", 0o644);
    tree.write(
        "bin/mysqldump",
        "#!/bin/sh\nfor db in \"$@\"; do :; done\necho \"-- dump of $db\"\n",
    );
    tree.chmod("bin/mysqldump", 0o755);
    tree.write(
        "deploy.yaml",
        &format!(
            r#"
flush:
  exclude: [".gitignore"]
permissions:
  protected/runtime: {{ mode: "0777" }}
  protected/yiic: {{ mode: "0755" }}
  assets: {{ mode: "0777" }}
mysqldump:
  bin_path: {}
  dump_path: protected/data
database:
  dsn: "mysql:host=127.0.0.1;dbname=shop"
  username: deploy
  password: secret
"#,
            tree.path("bin/mysqldump").display()
        ),
    );
    let config = load(&tree, "deploy.yaml");

    let rules = permission_rules(&config.permissions);
    let mut manager = manager(&tree, &config);
    let report = manager.change("prod", Some(&rules)).unwrap();

    let permissions = report.permissions.unwrap();
    assert_eq!(permissions.failures().count(), 0);
    assert_eq!(tree.mode("protected/yiic"), 0o755);
    assert_eq!(tree.mode("protected/runtime"), 0o777);
    assert_eq!(tree.mode("assets"), 0o777);

    let again = reconcile_permissions(&NormalizedPath::new(tree.root()), &rules);
    assert!(again.is_converged());

    let dump = Mysqldump::new(config.mysqldump, config.database, tree.root());
    let dumped = dump.run(&mut ProcessRunner::new()).unwrap();
    assert!(dumped.path.ends_with("protected/data/dump.sql"));
    assert_eq!(
        tree.read("protected/data/dump.sql"),
        "-- dump of shop\n"
    );
}
