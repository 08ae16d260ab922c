use stratum_core::{ContextSet, SubjectId};

use crate::config::Settings;
use crate::error::EngineError;
use crate::store::PermissionStore;

fn ctx(pairs: &[(&str, &str)]) -> ContextSet {
    ContextSet::from_pairs(pairs.iter().copied())
}

fn new_store() -> (PermissionStore, SubjectId) {
    let mut store = PermissionStore::new(Settings::default());
    let id = SubjectId::new();
    store.create_subject(id, "alice");
    (store, id)
}

#[test]
fn test_unknown_subject() {
    let mut store = PermissionStore::new(Settings::default());
    let id = SubjectId::new();
    let err = store.resolve(&id, &ContextSet::new()).unwrap_err();
    assert!(matches!(err, EngineError::SubjectNotFound { .. }));
}

#[test]
fn test_group_permission_inherited() {
    let (mut store, id) = new_store();
    store.create_group("admin").unwrap();
    store
        .set_group_permission("admin", "command.fly", true, &ContextSet::new())
        .unwrap();
    store.add_group_membership(&id, "admin").unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.fly"), Some(&true));
}

#[test]
fn test_parent_permissions_flow_down() {
    let (mut store, id) = new_store();
    store.create_group("member").unwrap();
    store.create_group("admin").unwrap();
    store.add_parent("admin", "member").unwrap();
    store
        .set_group_permission("member", "chat.use", true, &ContextSet::new())
        .unwrap();
    store.add_group_membership(&id, "admin").unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("chat.use"), Some(&true));
}

#[test]
fn test_specificity_beats_generality() {
    let (mut store, id) = new_store();
    store.create_group("member").unwrap();
    store.add_group_membership(&id, "member").unwrap();
    store
        .set_group_permission("member", "command.build", true, &ContextSet::new())
        .unwrap();
    store
        .set_group_permission("member", "command.build", false, &ctx(&[("world", "hub")]))
        .unwrap();

    let in_hub = store.resolve(&id, &ctx(&[("world", "hub")])).unwrap();
    assert_eq!(in_hub.get("command.build"), Some(&false));

    let elsewhere = store.resolve(&id, &ctx(&[("world", "arena")])).unwrap();
    assert_eq!(elsewhere.get("command.build"), Some(&true));
}

#[test]
fn test_two_dimensions_beat_one() {
    let (mut store, id) = new_store();
    store
        .set_subject_permission(&id, "command.fly", true, &ctx(&[("world", "hub")]))
        .unwrap();
    store
        .set_subject_permission(
            &id,
            "command.fly",
            false,
            &ctx(&[("world", "hub"), ("gamemode", "survival")]),
        )
        .unwrap();

    let survival = store
        .resolve(&id, &ctx(&[("world", "hub"), ("gamemode", "survival")]))
        .unwrap();
    assert_eq!(survival.get("command.fly"), Some(&false));

    let creative = store
        .resolve(&id, &ctx(&[("world", "hub"), ("gamemode", "creative")]))
        .unwrap();
    assert_eq!(creative.get("command.fly"), Some(&true));
}

#[test]
fn test_deny_precedence_at_equal_specificity() {
    let (mut store, id) = new_store();
    store.create_group("builder").unwrap();
    store.create_group("restricted").unwrap();
    store
        .set_group_permission("builder", "command.build", true, &ContextSet::new())
        .unwrap();
    store
        .set_group_permission("restricted", "command.build", false, &ContextSet::new())
        .unwrap();
    store.add_group_membership(&id, "builder").unwrap();
    store.add_group_membership(&id, "restricted").unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.build"), Some(&false));
}

#[test]
fn test_last_wins_when_deny_precedence_disabled() {
    let (mut store, id) = new_store();
    store.create_group("builder").unwrap();
    store.create_group("restricted").unwrap();
    store
        .set_group_permission("restricted", "command.build", false, &ContextSet::new())
        .unwrap();
    store
        .set_group_permission("builder", "command.build", true, &ContextSet::new())
        .unwrap();
    store.add_group_membership(&id, "restricted").unwrap();
    store.add_group_membership(&id, "builder").unwrap();
    store.set_deny_precedence(false);

    // Traversal order follows membership order, so builder is evaluated
    // last and wins.
    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.build"), Some(&true));
}

#[test]
fn test_subject_deny_beats_group_allow() {
    let (mut store, id) = new_store();
    store.create_group("admin").unwrap();
    store
        .set_group_permission("admin", "command.ban", true, &ContextSet::new())
        .unwrap();
    store.add_group_membership(&id, "admin").unwrap();
    store
        .set_subject_permission(&id, "command.ban", false, &ContextSet::new())
        .unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.ban"), Some(&false));
}

#[test]
fn test_unset_subject_override_reverts_to_group_value() {
    let (mut store, id) = new_store();
    store.create_group("admin").unwrap();
    store
        .set_group_permission("admin", "command.fly", true, &ContextSet::new())
        .unwrap();
    store.add_group_membership(&id, "admin").unwrap();
    store
        .set_subject_permission(&id, "command.fly", false, &ContextSet::new())
        .unwrap();

    let overridden = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(overridden.get("command.fly"), Some(&false));

    store.unset_subject_permission(&id, "command.fly").unwrap();

    let reverted = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(reverted.get("command.fly"), Some(&true));
    assert!(store.subject(&id).unwrap().permissions.is_empty());

    // Unsetting again is a no-op, not an error.
    store.unset_subject_permission(&id, "command.fly").unwrap();
    let unchanged = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(unchanged.get("command.fly"), Some(&true));
}

#[test]
fn test_virtual_group_nodes_emitted() {
    let (mut store, id) = new_store();
    store.create_group("member").unwrap();
    store.create_group("admin").unwrap();
    store.add_parent("admin", "member").unwrap();
    store.add_group_membership(&id, "admin").unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("group.admin"), Some(&true));
    assert_eq!(effective.get("group.member"), Some(&true));
}

#[test]
fn test_group_node_on_subject_implies_membership() {
    let (mut store, id) = new_store();
    store.create_group("vip").unwrap();
    store
        .set_group_permission("vip", "chat.color", true, &ContextSet::new())
        .unwrap();
    // No direct membership; the node alone pulls vip into the closure.
    store
        .set_subject_permission(&id, "group.vip", true, &ctx(&[("world", "event")]))
        .unwrap();

    let at_event = store.resolve(&id, &ctx(&[("world", "event")])).unwrap();
    assert_eq!(at_event.get("chat.color"), Some(&true));
    assert_eq!(at_event.get("group.vip"), Some(&true));

    let elsewhere = store.resolve(&id, &ctx(&[("world", "hub")])).unwrap();
    assert_eq!(elsewhere.get("chat.color"), None);
}

#[test]
fn test_cycle_terminates_with_each_group_once() {
    let mut store = PermissionStore::new(Settings::default());
    store.create_group("a").unwrap();
    store.create_group("b").unwrap();
    store.add_parent("a", "b").unwrap();
    store.add_parent("b", "a").unwrap();

    assert_eq!(store.traverse(["a"]), vec!["b", "a"]);
    assert_eq!(store.traverse(["b"]), vec!["a", "b"]);

    let id = SubjectId::new();
    store.create_subject(id, "carol");
    store.add_group_membership(&id, "a").unwrap();
    store
        .set_group_permission("b", "looped", true, &ContextSet::new())
        .unwrap();
    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("looped"), Some(&true));
}

#[test]
fn test_traversal_is_post_order() {
    let mut store = PermissionStore::new(Settings::default());
    for name in ["root", "mid", "leaf"] {
        store.create_group(name).unwrap();
    }
    store.add_parent("leaf", "mid").unwrap();
    store.add_parent("mid", "root").unwrap();
    assert_eq!(store.traverse(["leaf"]), vec!["root", "mid", "leaf"]);
}

#[test]
fn test_dangling_parent_skipped() {
    let (mut store, id) = new_store();
    store.create_group("member").unwrap();
    store.create_group("ghost").unwrap();
    store.add_parent("member", "ghost").unwrap();
    // Deleting cascades the parent edge; re-add a dangling reference via
    // snapshot to simulate stale data.
    let mut snapshot = store.snapshot();
    snapshot
        .groups
        .get_mut("member")
        .unwrap()
        .parents
        .push("ghost".to_string());
    snapshot.groups.remove("ghost");
    store.apply_snapshot(snapshot);
    store.add_group_membership(&id, "member").unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("group.member"), Some(&true));
    assert_eq!(effective.get("group.ghost"), None);
}

#[test]
fn test_wildcard_expansion() {
    let (mut store, id) = new_store();
    store.register_permissions(["command.fly", "command.gamemode", "chat.color"]);
    store
        .set_subject_permission(&id, "command.*", true, &ContextSet::new())
        .unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.fly"), Some(&true));
    assert_eq!(effective.get("command.gamemode"), Some(&true));
    assert_eq!(effective.get("chat.color"), None);
    assert!(!effective.contains_key("command.*"));
}

#[test]
fn test_wildcard_never_overwrites_concrete_node() {
    let (mut store, id) = new_store();
    store.register_permissions(["command.fly", "command.gamemode"]);
    store
        .set_subject_permission(&id, "command.*", true, &ContextSet::new())
        .unwrap();
    store
        .set_subject_permission(&id, "command.fly", false, &ContextSet::new())
        .unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.fly"), Some(&false));
    assert_eq!(effective.get("command.gamemode"), Some(&true));
}

#[test]
fn test_temp_grant_overrides_persistent_at_equal_specificity() {
    let (mut store, id) = new_store();
    store
        .set_subject_permission(&id, "command.fly", false, &ContextSet::new())
        .unwrap();
    store
        .add_temporary_grant(&id, "command.fly", true, 600, &ContextSet::new())
        .unwrap();

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.fly"), Some(&true));
}

#[test]
fn test_contextual_temp_grant_only_applies_in_context() {
    let (mut store, id) = new_store();
    store
        .add_temporary_grant(&id, "command.fly", true, 600, &ctx(&[("world", "hub")]))
        .unwrap();

    let in_hub = store.resolve(&id, &ctx(&[("world", "hub")])).unwrap();
    assert_eq!(in_hub.get("command.fly"), Some(&true));

    let elsewhere = store.resolve(&id, &ctx(&[("world", "arena")])).unwrap();
    assert_eq!(elsewhere.get("command.fly"), None);
}

#[test]
fn test_temp_grant_expires_lazily() {
    let (mut store, id) = new_store();
    store
        .add_temporary_grant(&id, "command.fly", true, 1, &ContextSet::new())
        .unwrap();
    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.fly"), Some(&true));

    std::thread::sleep(std::time::Duration::from_millis(1100));

    let effective = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(effective.get("command.fly"), None);
    assert!(store.subject(&id).unwrap().temp_grants.is_empty());
}

#[test]
fn test_cache_not_written_while_grant_active() {
    let (mut store, id) = new_store();
    store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(store.cache.len(), 1);

    store
        .add_temporary_grant(&id, "command.fly", true, 600, &ContextSet::new())
        .unwrap();
    store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(store.cache.len(), 0);

    store
        .remove_temporary_grant(&id, "command.fly", &ContextSet::new())
        .unwrap();
    store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(store.cache.len(), 1);
}

#[test]
fn test_cache_invalidated_by_subject_mutation() {
    let (mut store, id) = new_store();
    let before = store.resolve(&id, &ContextSet::new()).unwrap();
    assert!(before.is_empty());

    store
        .set_subject_permission(&id, "command.fly", true, &ContextSet::new())
        .unwrap();
    let after = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(after.get("command.fly"), Some(&true));
}

#[test]
fn test_cache_cleared_by_group_mutation() {
    let (mut store, id) = new_store();
    store.create_group("admin").unwrap();
    store.add_group_membership(&id, "admin").unwrap();
    let before = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(before.get("command.fly"), None);

    store
        .set_group_permission("admin", "command.fly", true, &ContextSet::new())
        .unwrap();
    let after = store.resolve(&id, &ContextSet::new()).unwrap();
    assert_eq!(after.get("command.fly"), Some(&true));
}

#[test]
fn test_equivalent_contexts_hit_the_same_entry() {
    let (mut store, id) = new_store();
    store.resolve(&id, &ctx(&[("world", "hub"), ("gamemode", "creative")])).unwrap();
    store.resolve(&id, &ctx(&[("gamemode", "creative"), ("world", "hub")])).unwrap();
    store.resolve(&id, &ctx(&[("World", "HUB"), ("gamemode", "creative")])).unwrap();
    assert_eq!(store.cache.len(), 1);
}

#[test]
fn test_later_declared_entry_wins_at_equal_specificity() {
    let (mut store, id) = new_store();
    // Two entries with one dimension each, both matching.
    store
        .set_subject_permission(&id, "command.fly", true, &ctx(&[("world", "hub")]))
        .unwrap();
    store
        .set_subject_permission(&id, "command.fly", false, &ctx(&[("gamemode", "creative")]))
        .unwrap();

    let effective = store
        .resolve(&id, &ctx(&[("world", "hub"), ("gamemode", "creative")]))
        .unwrap();
    assert_eq!(effective.get("command.fly"), Some(&false));
}
