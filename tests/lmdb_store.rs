//! LMDB store tests: holder records, state persistence, definitions

use flagperm::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tempfile::TempDir;

const USER: &str = "5f8d0d55b54764421b7156c9";
const ROLE: &str = "5f8d0d55b54764421b7156ca";
const DISCORD: &str = "98765432109876543";
const NOW: u64 = 1_700_000_000_000;

fn f(s: &str) -> Flag {
    parse_flag(s).unwrap()
}

fn flags(raw: &[&str]) -> Vec<Flag> {
    raw.iter().map(|s| f(s)).collect()
}

fn user() -> PermissionHolder {
    PermissionHolder::User(USER.into())
}

fn setup() -> (TempDir, LmdbStore) {
    let dir = TempDir::new().unwrap();
    let store = LmdbStore::open_path(dir.path().join("perms.mdb")).unwrap();
    (dir, store)
}

// ============================================================================
// Holder records
// ============================================================================

#[test]
fn unknown_holder_not_found() {
    let (_dir, store) = setup();
    assert!(matches!(store.get_permissions(&user()), Err(PermError::NotFound(_))));
    assert!(!store.holder_exists(&user()).unwrap());
}

#[test]
fn empty_record_is_not_missing() {
    let (_dir, store) = setup();
    store.set_permissions(&user(), &[]).unwrap();
    assert!(store.get_permissions(&user()).unwrap().is_empty());
    assert!(store.holder_exists(&user()).unwrap());
}

#[test]
fn grant_and_revoke() {
    let (_dir, store) = setup();
    assert_eq!(store.grant(&user(), &flags(&["a.b", "c.*", "a.b"])).unwrap(), 2);
    assert_eq!(store.grant(&user(), &flags(&["c.*", "d:30"])).unwrap(), 1);
    assert_eq!(store.get_permissions(&user()).unwrap(), flags(&["a.b", "c.*", "d:30"]));

    // revoke matches the canonical string, suffix included
    assert_eq!(store.revoke(&user(), &flags(&["d", "a.b"])).unwrap(), 1);
    assert_eq!(store.get_permissions(&user()).unwrap(), flags(&["c.*", "d:30"]));
    assert_eq!(store.revoke(&PermissionHolder::Role(ROLE.into()), &flags(&["x"])).unwrap(), 0);
}

#[test]
fn holder_types_are_separate_namespaces() {
    let (_dir, store) = setup();
    store.set_permissions(&PermissionHolder::User(USER.into()), &flags(&["u"])).unwrap();
    store.set_permissions(&PermissionHolder::Role(USER.into()), &flags(&["r"])).unwrap();
    assert_eq!(store.get_permissions(&PermissionHolder::User(USER.into())).unwrap(), flags(&["u"]));
    assert_eq!(store.get_permissions(&PermissionHolder::Role(USER.into())).unwrap(), flags(&["r"]));
}

#[test]
fn list_and_remove_holders() {
    let (_dir, store) = setup();
    let discord = PermissionHolder::DiscordUser(DISCORD.into());
    store.set_permissions(&user(), &flags(&["a"])).unwrap();
    store.set_permissions(&discord, &flags(&["b"])).unwrap();

    let mut holders = store.list_holders().unwrap();
    holders.sort_by_key(|h| h.key());
    assert_eq!(holders, [user(), discord.clone()]);

    assert!(store.remove_holder(&discord).unwrap());
    assert!(!store.remove_holder(&discord).unwrap());
    assert_eq!(store.list_holders().unwrap(), [user()]);
}

#[test]
fn batched_writes_commit_together() {
    let (_dir, store) = setup();
    let role = PermissionHolder::Role(ROLE.into());
    let result: Result<()> = store.transact(|tx| {
        tx.grant(&user(), &flags(&["a"]))?;
        tx.grant(&role, &flags(&["b"]))?;
        Err(PermError::Check("abort".into()))
    });
    assert!(result.is_err());
    assert!(!store.holder_exists(&user()).unwrap());

    store
        .transact(|tx| {
            tx.grant(&user(), &flags(&["a"]))?;
            tx.grant(&role, &flags(&["b"]))?;
            assert_eq!(tx.get_permissions(&role)?, Some(flags(&["b"])));
            Ok(())
        })
        .unwrap();
    assert!(store.holder_exists(&user()).unwrap() && store.holder_exists(&role).unwrap());
}

// ============================================================================
// State
// ============================================================================

#[test]
fn state_defaults_and_round_trips() {
    let (_dir, store) = setup();
    let key = user().key();
    assert_eq!(store.load(&key, "x:30").unwrap(), CooldownLimitState::default());

    let state = CooldownLimitState { last_invoked_at: Some(NOW), uses_consumed: 4 };
    store.save(&key, "x:30", &state).unwrap();
    assert_eq!(store.load(&key, "x:30").unwrap(), state);
    assert_eq!(store.load(&key, "x:31").unwrap(), CooldownLimitState::default());

    assert!(store.reset_state(&key, "x:30").unwrap());
    assert!(!store.reset_state(&key, "x:30").unwrap());
}

#[test]
fn update_saves_only_on_change() {
    let (_dir, store) = setup();
    let key = user().key();
    store
        .update(&key, "x", &mut |s: &mut CooldownLimitState| {
            s.uses_consumed = 9;
            false
        })
        .unwrap();
    assert_eq!(store.load(&key, "x").unwrap().uses_consumed, 0);

    store
        .update(&key, "x", &mut |s: &mut CooldownLimitState| {
            s.uses_consumed += 1;
            true
        })
        .unwrap();
    assert_eq!(store.load(&key, "x").unwrap().uses_consumed, 1);
}

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("perms.mdb");
    {
        let store = LmdbStore::open_path(&path).unwrap();
        store.set_permissions(&user(), &flags(&["x:0:1"])).unwrap();
        let engine = Engine::new(&store, &store);
        let req = CheckRequest::new(user(), flags(&["x"])).invoke();
        assert!(engine.check_at(&req, NOW).unwrap()[0].passed);
    }
    let store = LmdbStore::open_path(&path).unwrap();
    let engine = Engine::new(&store, &store);
    let req = CheckRequest::new(user(), flags(&["x"])).invoke();
    let r = &engine.check_at(&req, NOW).unwrap()[0];
    assert!(!r.passed && r.limit_exhausted);
}

#[test]
fn long_flags_keep_state() {
    let (_dir, store) = setup();
    let path = "a".repeat(600);
    let granted = format!("{path}:30:2");
    store.set_permissions(&user(), &flags(&[granted.as_str()])).unwrap();
    let engine = Engine::new(&store, &store);
    let req = CheckRequest::new(user(), flags(&[path.as_str()])).invoke();

    assert!(engine.check_at(&req, NOW).unwrap()[0].passed);
    let r = &engine.check_at(&req, NOW + 1_000).unwrap()[0];
    assert_eq!((r.passed, r.on_cooldown), (false, Some(true)));
    assert_eq!(
        store.load(&user().key(), &granted).unwrap(),
        CooldownLimitState { last_invoked_at: Some(NOW), uses_consumed: 1 }
    );
    assert!(store.reset_state(&user().key(), &granted).unwrap());
}

#[test]
fn invocation_at_epoch_zero_is_remembered() {
    let (_dir, store) = setup();
    store.set_permissions(&user(), &flags(&["x:30"])).unwrap();
    let engine = Engine::new(&store, &store);
    let req = CheckRequest::new(user(), flags(&["x"])).invoke();

    assert!(engine.check_at(&req, 0).unwrap()[0].passed);
    assert_eq!(store.load(&user().key(), "x:30").unwrap().last_invoked_at, Some(0));
    let r = &engine.check_at(&req, 1_000).unwrap()[0];
    assert_eq!((r.passed, r.cooldown_expires), (false, Some(30_000)));
}

// ============================================================================
// Engine over LMDB
// ============================================================================

#[test]
fn cooldown_through_engine() {
    let (_dir, store) = setup();
    store.set_permissions(&user(), &flags(&["mod.ban.*:30:5"])).unwrap();
    let engine = Engine::new(store.clone(), store.clone());
    let req = CheckRequest::new(user(), flags(&["mod.ban.user"])).invoke();

    assert!(engine.check_at(&req, NOW).unwrap()[0].passed);
    let r = &engine.check_at(&req, NOW + 10_000).unwrap()[0];
    assert_eq!((r.passed, r.on_cooldown, r.cooldown_expires), (false, Some(true), Some(NOW + 30_000)));

    let state = store.load(&user().key(), "mod.ban.*:30:5").unwrap();
    assert_eq!(state, CooldownLimitState { last_invoked_at: Some(NOW), uses_consumed: 1 });
}

#[test]
fn concurrent_invocations_against_lmdb() {
    const THREADS: usize = 12;
    const LIMIT: usize = 4;
    let (_dir, store) = setup();
    store.set_permissions(&user(), &flags(&["x:0:4"])).unwrap();
    let engine = Engine::new(store.clone(), store.clone());
    let req = CheckRequest::new(user(), flags(&["x"])).invoke();
    let passes = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                if engine.check_at(&req, NOW).unwrap()[0].passed {
                    passes.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(passes.load(Ordering::SeqCst), LIMIT);
    assert_eq!(store.load(&user().key(), "x:0:4").unwrap().uses_consumed, LIMIT as u64);
}

// ============================================================================
// Definitions
// ============================================================================

#[test]
fn permission_definitions() {
    let (_dir, store) = setup();
    let ban = PermissionDef::new(parse_strict_flag("mod.ban").unwrap(), "Ban", "Ban a member");
    let kick = PermissionDef::new(parse_strict_flag("mod.kick").unwrap(), "Kick", "");
    store.define_permission(&kick).unwrap();
    store.define_permission(&ban).unwrap();

    assert_eq!(store.get_permission(&ban.key).unwrap(), Some(ban.clone()));
    assert_eq!(store.list_permissions().unwrap(), [ban.clone(), kick.clone()]);
    assert_eq!(ban.flag(), f("mod.ban"));

    assert!(store.remove_permission(&kick.key).unwrap());
    assert_eq!(store.get_permission(&kick.key).unwrap(), None);

    store.clear_all().unwrap();
    assert!(store.list_permissions().unwrap().is_empty());
}

#[test]
fn open_from_config() {
    let dir = TempDir::new().unwrap();
    let cfg = StoreConfig { map_size: 1 << 24, ..StoreConfig::at(dir.path().join("cfg.mdb")) };
    let store = LmdbStore::open(&cfg).unwrap();
    store.set_permissions(&user(), &flags(&["a"])).unwrap();
    assert_eq!(store.get_permissions(&user()).unwrap(), flags(&["a"]));
}
