//! Permission reconciliation against the real filesystem
#![cfg(unix)]

use deploy_fs::{
    Attribute, NormalizedPath, PermissionOutcome, PermissionRule, SystemPermissions,
    PermissionOps, reconcile_permissions,
};
use deploy_test_utils::TestTree;
use pretty_assertions::assert_eq;

#[test]
fn mode_is_changed_once_then_converged() {
    let tree = TestTree::new();
    tree.write("x", "");
    tree.chmod("x", 0o644);
    let base = NormalizedPath::new(tree.root());
    let rules = [PermissionRule::new("x").with_mode(0o755)];

    let first = reconcile_permissions(&base, &rules);
    assert_eq!(
        first.entries[0].outcome,
        PermissionOutcome::Changed {
            attribute: Attribute::Mode,
            old: "0644".into(),
            new: "0755".into(),
        }
    );
    assert_eq!(tree.mode("x"), 0o755);

    let second = reconcile_permissions(&base, &rules);
    assert!(second.is_converged());
    assert_eq!(second.changes().count(), 0);
}

#[test]
fn directory_modes_are_reconciled() {
    let tree = TestTree::new();
    tree.mkdir("protected/runtime");
    tree.chmod("protected/runtime", 0o700);
    let base = NormalizedPath::new(tree.root());

    reconcile_permissions(&base, &[PermissionRule::new("protected/runtime").with_mode(0o777)]);

    assert_eq!(tree.mode("protected/runtime"), 0o777);
}

#[test]
fn owning_user_matches_without_change() {
    let tree = TestTree::new();
    tree.write("x", "");
    let current = SystemPermissions.owner(&tree.path("x")).unwrap();
    let base = NormalizedPath::new(tree.root());

    let report = reconcile_permissions(
        &base,
        &[PermissionRule::new("x").with_owner(current.id.to_string())],
    );

    assert!(report.is_converged(), "{report:?}");
}

#[test]
fn unknown_owner_is_non_fatal() {
    let tree = TestTree::new();
    tree.write("a", "");
    tree.write("b", "");
    tree.chmod("b", 0o600);
    let base = NormalizedPath::new(tree.root());

    let report = reconcile_permissions(
        &base,
        &[
            PermissionRule::new("a").with_owner("no-such-user-for-deploy-tests"),
            PermissionRule::new("b").with_mode(0o640),
        ],
    );

    assert_eq!(report.failures().count(), 1);
    assert!(matches!(
        report.entries[0].outcome,
        PermissionOutcome::Failed {
            attribute: Attribute::Owner,
            ..
        }
    ));
    assert_eq!(tree.mode("b"), 0o640);
}

#[test]
fn missing_rule_path_reports_exactly_one_not_found() {
    let tree = TestTree::new();
    tree.write("present", "");
    tree.chmod("present", 0o644);
    let base = NormalizedPath::new(tree.root());

    let report = reconcile_permissions(
        &base,
        &[
            PermissionRule::new("absent").with_mode(0o777).with_owner("root"),
            PermissionRule::new("present").with_mode(0o644),
        ],
    );

    let not_found = report
        .entries
        .iter()
        .filter(|e| e.outcome == PermissionOutcome::NotFound)
        .count();
    assert_eq!(not_found, 1);
    assert_eq!(report.entries.len(), 2);
}
