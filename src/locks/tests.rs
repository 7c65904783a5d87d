//! Tests for the lock manager.

use super::*;
use crate::config::Config;
use crate::context::StoreContext;
use crate::error::BatonError;
use crate::events::{EventAction, EventLog};
use chrono::{Duration, Utc};
use std::sync::{Arc, Barrier};
use tempfile::TempDir;

fn create_test_manager() -> (TempDir, StoreContext, LockManager) {
    let temp_dir = TempDir::new().unwrap();
    let ctx = StoreContext::at(temp_dir.path());
    ctx.create_layout().unwrap();
    let manager = LockManager::new(&ctx, Config::default());
    (temp_dir, ctx, manager)
}

/// Rewrite a held lock so that it expired `ago` in the past.
fn backdate(manager: &LockManager, path: &str, ago: Duration) {
    let store = manager.store();
    let guard = store.lock_key(path).unwrap();
    let mut lock = store.read(path).unwrap().unwrap();
    lock.acquired_at = Utc::now() - ago - Duration::seconds(lock.ttl_secs as i64);
    lock.expires_at = Utc::now() - ago;
    store.write(&guard, &lock).unwrap();
}

fn granted(outcome: AcquireOutcome) -> (Lock, GrantKind) {
    match outcome {
        AcquireOutcome::Granted { lock, kind } => (lock, kind),
        AcquireOutcome::Denied(d) => panic!("expected grant, got denial: {}", d),
    }
}

fn actions(ctx: &StoreContext) -> Vec<EventAction> {
    EventLog::new(ctx)
        .read_all()
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect()
}

// ============================================================================
// acquire
// ============================================================================

#[test]
fn test_acquire_free_path() {
    let (_temp_dir, _ctx, manager) = create_test_manager();

    let (lock, kind) = granted(manager.acquire("src/lib.rs", "a", "T-1", Some(60)).unwrap());

    assert_eq!(kind, GrantKind::New);
    assert_eq!(lock.file_path, "src/lib.rs");
    assert_eq!(lock.owner_agent_id, "a");
    assert_eq!(lock.task_id, "T-1");
    assert_eq!(lock.ttl_secs, 60);
    assert_eq!(lock.status, LockStatus::Active);
    assert_eq!(manager.store().read("src/lib.rs").unwrap(), Some(lock));
}

#[test]
fn test_acquire_uses_default_ttl() {
    let (_temp_dir, _ctx, manager) = create_test_manager();

    let (lock, _) = granted(manager.acquire("a.rs", "a", "T-1", None).unwrap());

    assert_eq!(lock.ttl_secs, Config::default().default_ttl_secs);
}

#[test]
fn test_acquire_normalizes_path() {
    let (_temp_dir, _ctx, manager) = create_test_manager();

    granted(manager.acquire("./src\\lib.rs", "a", "T-1", None).unwrap());
    let outcome = manager.acquire("src/lib.rs", "b", "T-2", None).unwrap();

    assert!(!outcome.is_granted());
}

#[test]
fn test_acquire_held_by_other_is_denied() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "agent-a", "T-1", None).unwrap());

    match manager.acquire("a.rs", "agent-b", "T-2", None).unwrap() {
        AcquireOutcome::Denied(denied) => {
            assert_eq!(denied.file_path, "a.rs");
            assert_eq!(denied.holder_agent_id, "agent-a");
            assert_eq!(denied.holder_task_id, "T-1");
        }
        other => panic!("expected denial, got {:?}", other),
    }
}

#[test]
fn test_acquire_same_agent_other_task_is_denied() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "agent-a", "T-1", None).unwrap());

    let outcome = manager.acquire("a.rs", "agent-a", "T-2", None).unwrap();

    assert!(matches!(outcome, AcquireOutcome::Denied(ref d) if d.holder_task_id == "T-1"));
}

#[test]
fn test_reentrant_acquire_extends_ttl_without_duplicating() {
    let (_temp_dir, ctx, manager) = create_test_manager();
    let (first, _) = granted(manager.acquire("a.rs", "a", "T-1", Some(30)).unwrap());

    std::thread::sleep(std::time::Duration::from_millis(20));
    let (second, kind) = granted(manager.acquire("a.rs", "a", "T-1", Some(600)).unwrap());

    assert_eq!(kind, GrantKind::Reentrant);
    assert_eq!(second.acquired_at, first.acquired_at);
    assert!(second.expires_at > first.expires_at);
    assert_eq!(second.ttl_secs, 600);
    assert_eq!(manager.store().list().unwrap().len(), 1);

    // One release frees it: re-entry is not counted.
    assert!(matches!(
        manager.release("a.rs", "a").unwrap(),
        ReleaseOutcome::Released(_)
    ));
    assert!(manager.store().read("a.rs").unwrap().is_none());
    assert!(actions(&ctx).contains(&EventAction::Reacquire));
}

#[test]
fn test_acquire_rejects_invalid_input() {
    let (_temp_dir, _ctx, manager) = create_test_manager();

    assert!(matches!(
        manager.acquire("src/", "a", "T-1", None),
        Err(BatonError::UserError(_))
    ));
    assert!(matches!(
        manager.acquire("a.rs", "", "T-1", None),
        Err(BatonError::UserError(_))
    ));
    assert!(matches!(
        manager.acquire("a.rs", "a", " ", None),
        Err(BatonError::UserError(_))
    ));
    assert!(matches!(
        manager.acquire("a.rs", "a", "T-1", Some(0)),
        Err(BatonError::UserError(_))
    ));
    assert!(manager.store().list().unwrap().is_empty());
}

#[test]
fn test_acquire_clamps_ttl_to_max() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = StoreContext::at(temp_dir.path());
    let config = Config {
        default_ttl_secs: 10,
        max_ttl_secs: 100,
        ..Default::default()
    };
    let manager = LockManager::new(&ctx, config);

    let (lock, _) = granted(manager.acquire("a.rs", "a", "T", Some(10_000)).unwrap());

    assert_eq!(lock.ttl_secs, 100);
}

#[test]
fn test_huge_ttl_never_yields_an_expired_grant() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = StoreContext::at(temp_dir.path());
    let config = Config {
        max_ttl_secs: crate::config::MAX_DURATION_SECS,
        ..Default::default()
    };
    let manager = LockManager::new(&ctx, config);

    let (lock, _) = granted(manager.acquire("a.rs", "a", "T", Some(u64::MAX)).unwrap());

    assert_eq!(lock.ttl_secs, crate::config::MAX_DURATION_SECS);
    assert!(!lock.is_expired());
    assert!(!manager.acquire("a.rs", "b", "T", None).unwrap().is_granted());
}

#[test]
fn test_out_of_range_ttl_is_rejected_without_locking() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = StoreContext::at(temp_dir.path());
    // Unvalidated config with no usable ceiling.
    let config = Config {
        max_ttl_secs: u64::MAX,
        ..Default::default()
    };
    let manager = LockManager::new(&ctx, config);

    let err = manager.acquire("a.rs", "a", "T", Some(u64::MAX)).unwrap_err();

    assert!(matches!(err, BatonError::UserError(_)));
    assert!(manager.store().read("a.rs").unwrap().is_none());
}

#[test]
fn test_lock_expiry_saturates_instead_of_wrapping() {
    let now = Utc::now();
    let lock = Lock::new("a.rs", "a", "T", Duration::days(1_000_000_000), now);

    assert_eq!(lock.expires_at, chrono::DateTime::<Utc>::MAX_UTC);
    assert!(!lock.is_expired_at(now));
}

#[test]
fn test_concurrent_acquire_exactly_one_wins() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    let agents = 16;
    let barrier = Arc::new(Barrier::new(agents));

    let handles: Vec<_> = (0..agents)
        .map(|i| {
            let manager = manager.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                manager
                    .acquire("contended.rs", &format!("agent-{}", i), "T", Some(60))
                    .unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = outcomes.iter().filter_map(|o| o.lock()).collect();

    assert_eq!(winners.len(), 1);
    let stored = manager.store().read("contended.rs").unwrap().unwrap();
    assert_eq!(&stored, winners[0]);
    for outcome in &outcomes {
        if let AcquireOutcome::Denied(d) = outcome {
            assert_eq!(d.holder_agent_id, stored.owner_agent_id);
        }
    }
}

#[test]
fn test_concurrent_acquire_distinct_paths_all_win() {
    let (_temp_dir, _ctx, manager) = create_test_manager();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                manager
                    .acquire(&format!("file-{}.rs", i), &format!("agent-{}", i), "T", None)
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_granted());
    }
    assert_eq!(manager.store().list().unwrap().len(), 8);
}

// ============================================================================
// expiry and reclamation
// ============================================================================

#[test]
fn test_expired_lock_reclaimed_by_other_agent() {
    let (_temp_dir, ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "old", "T-1", Some(1)).unwrap());

    std::thread::sleep(std::time::Duration::from_millis(2_100));
    let (lock, kind) = granted(manager.acquire("a.rs", "new", "T-2", Some(60)).unwrap());

    assert_eq!(lock.owner_agent_id, "new");
    match kind {
        GrantKind::Reclaimed { previous } => {
            assert_eq!(previous.owner_agent_id, "old");
            assert_eq!(previous.status, LockStatus::Expired);
        }
        other => panic!("expected reclaim, got {:?}", other),
    }

    let events = EventLog::new(&ctx).read_all().unwrap();
    let reclaim_idx = events
        .iter()
        .position(|e| e.action == EventAction::Reclaim)
        .expect("reclaim recorded");
    assert_eq!(events[reclaim_idx].details["previous_owner"], "old");
    assert_eq!(events[reclaim_idx].details["reason"], "acquire");
    // Reclaim is recorded before the new grant.
    let grant_idx = events
        .iter()
        .rposition(|e| e.action == EventAction::Acquire)
        .unwrap();
    assert!(reclaim_idx < grant_idx);
    assert_eq!(events[grant_idx].actor, "new");
}

#[test]
fn test_long_ttl_lock_is_not_reclaimed() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "a", "T", Some(3_600)).unwrap());

    std::thread::sleep(std::time::Duration::from_millis(50));

    assert!(!manager.acquire("a.rs", "b", "T", None).unwrap().is_granted());
}

#[test]
fn test_expired_lock_same_owner_is_reclaimed_fresh() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    let (first, _) = granted(manager.acquire("a.rs", "a", "T", Some(60)).unwrap());
    backdate(&manager, "a.rs", Duration::seconds(5));

    let (second, kind) = granted(manager.acquire("a.rs", "a", "T", Some(60)).unwrap());

    assert!(matches!(kind, GrantKind::Reclaimed { .. }));
    assert!(second.acquired_at > first.acquired_at);
}

#[test]
fn test_sweep_expired_removes_only_stale() {
    let (_temp_dir, ctx, manager) = create_test_manager();
    granted(manager.acquire("stale-1.rs", "a", "T", None).unwrap());
    granted(manager.acquire("stale-2.rs", "b", "T", None).unwrap());
    granted(manager.acquire("live.rs", "c", "T", None).unwrap());
    backdate(&manager, "stale-1.rs", Duration::seconds(10));
    backdate(&manager, "stale-2.rs", Duration::minutes(10));

    assert_eq!(manager.sweep_expired("janitor").unwrap(), 2);

    let remaining: Vec<_> = manager
        .store()
        .list()
        .unwrap()
        .into_iter()
        .map(|l| l.file_path)
        .collect();
    assert_eq!(remaining, vec!["live.rs"]);

    let events = EventLog::new(&ctx).read_all().unwrap();
    let reclaims: Vec<_> = events
        .iter()
        .filter(|e| e.action == EventAction::Reclaim)
        .collect();
    assert_eq!(reclaims.len(), 2);
    assert!(reclaims.iter().all(|e| e.details["reason"] == "sweep"));
    assert_eq!(manager.sweep_expired("janitor").unwrap(), 0);
}

#[test]
fn test_sweep_concurrent_with_acquire_traffic() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    for i in 0..10 {
        granted(manager.acquire(&format!("s{}.rs", i), "old", "T", None).unwrap());
        backdate(&manager, &format!("s{}.rs", i), Duration::seconds(30));
    }

    let sweeper = {
        let manager = manager.clone();
        std::thread::spawn(move || manager.sweep_expired("janitor").unwrap())
    };
    let acquirer = {
        let manager = manager.clone();
        std::thread::spawn(move || {
            (0..10)
                .filter(|i| {
                    manager
                        .acquire(&format!("s{}.rs", i), "new", "T", Some(600))
                        .unwrap()
                        .is_granted()
                })
                .count()
        })
    };

    let swept = sweeper.join().unwrap();
    let acquired = acquirer.join().unwrap();

    // Every stale lock is reclaimed exactly once: by sweep or by acquire.
    assert_eq!(acquired, 10);
    assert!(swept <= 10);
    let locks = manager.store().list().unwrap();
    assert_eq!(locks.len(), 10);
    assert!(locks.iter().all(|l| l.owner_agent_id == "new"));
}

// ============================================================================
// release
// ============================================================================

#[test]
fn test_release_by_owner() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "a", "T", None).unwrap());

    match manager.release("a.rs", "a").unwrap() {
        ReleaseOutcome::Released(lock) => assert_eq!(lock.status, LockStatus::Released),
        other => panic!("expected release, got {:?}", other),
    }
    assert!(manager.store().read("a.rs").unwrap().is_none());
}

#[test]
fn test_release_is_idempotent() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "a", "T", None).unwrap());
    manager.release("a.rs", "a").unwrap();
    let before = manager.store().list().unwrap();

    let outcome = manager.release("a.rs", "a").unwrap();

    assert_eq!(outcome, ReleaseOutcome::AlreadyFree);
    assert!(outcome.is_success());
    assert_eq!(manager.store().list().unwrap(), before);
    assert_eq!(
        manager.release("never-locked.rs", "a").unwrap(),
        ReleaseOutcome::AlreadyFree
    );
}

#[test]
fn test_release_by_non_owner_refused() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "a", "T", None).unwrap());

    let outcome = manager.release("a.rs", "intruder").unwrap();

    assert!(matches!(outcome, ReleaseOutcome::NotOwner(ref d) if d.holder_agent_id == "a"));
    assert!(!outcome.is_success());
    assert!(manager.store().read("a.rs").unwrap().is_some());
}

#[test]
fn test_release_expired_lock_of_other_leaves_it() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "a", "T", None).unwrap());
    backdate(&manager, "a.rs", Duration::seconds(5));

    assert_eq!(
        manager.release("a.rs", "b").unwrap(),
        ReleaseOutcome::AlreadyFree
    );
    assert!(manager.store().read("a.rs").unwrap().is_some());
}

#[test]
fn test_release_all_only_touches_callers_locks() {
    let (_temp_dir, ctx, manager) = create_test_manager();
    for path in ["a.rs", "b.rs", "c.rs"] {
        granted(manager.acquire(path, "mine", "T", None).unwrap());
    }
    granted(manager.acquire("d.rs", "theirs", "T", None).unwrap());
    backdate(&manager, "c.rs", Duration::seconds(5));

    let released = manager.release_all("mine").unwrap();

    let released_paths: Vec<_> = released.iter().map(|l| l.file_path.as_str()).collect();
    assert_eq!(released_paths, vec!["a.rs", "b.rs", "c.rs"]);
    let remaining = manager.store().list().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].owner_agent_id, "theirs");
    assert!(actions(&ctx).contains(&EventAction::ReleaseAll));
    assert!(manager.release_all("mine").unwrap().is_empty());
}

// ============================================================================
// renew
// ============================================================================

#[test]
fn test_renew_extends_expiry() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    let (lock, _) = granted(manager.acquire("a.rs", "a", "T", Some(10)).unwrap());

    match manager.renew("a.rs", "a", Some(3_600)).unwrap() {
        RenewOutcome::Renewed(renewed) => {
            assert!(renewed.expires_at > lock.expires_at);
            assert_eq!(renewed.acquired_at, lock.acquired_at);
            assert_eq!(renewed.ttl_secs, 3_600);
        }
        other => panic!("expected renewal, got {:?}", other),
    }
    assert_eq!(
        manager.store().read("a.rs").unwrap().unwrap().ttl_secs,
        3_600
    );
}

#[test]
fn test_renew_by_non_owner_refused() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    let (lock, _) = granted(manager.acquire("a.rs", "a", "T", Some(10)).unwrap());

    let outcome = manager.renew("a.rs", "b", Some(3_600)).unwrap();

    assert!(matches!(outcome, RenewOutcome::NotOwner(_)));
    assert_eq!(manager.store().read("a.rs").unwrap(), Some(lock));
}

#[test]
fn test_renew_missing_or_expired_is_not_found() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    assert_eq!(manager.renew("a.rs", "a", None).unwrap(), RenewOutcome::NotFound);

    granted(manager.acquire("a.rs", "a", "T", None).unwrap());
    backdate(&manager, "a.rs", Duration::seconds(5));

    assert_eq!(manager.renew("a.rs", "a", None).unwrap(), RenewOutcome::NotFound);
}

// ============================================================================
// acquire_batch
// ============================================================================

#[test]
fn test_batch_all_granted_in_sorted_order() {
    let (_temp_dir, _ctx, manager) = create_test_manager();

    let outcome = manager
        .acquire_batch(&["c.rs", "a.rs", "b.rs", "a.rs"], "a", "T", None)
        .unwrap();

    match outcome {
        BatchOutcome::AllGranted(locks) => {
            let paths: Vec<_> = locks.iter().map(|l| l.file_path.as_str()).collect();
            assert_eq!(paths, vec!["a.rs", "b.rs", "c.rs"]);
        }
        other => panic!("expected grant, got {:?}", other),
    }
    assert_eq!(manager.store().list().unwrap().len(), 3);
}

#[test]
fn test_batch_partial_denial_rolls_back() {
    let (_temp_dir, ctx, manager) = create_test_manager();
    granted(manager.acquire("b.rs", "other", "T-9", None).unwrap());

    let outcome = manager
        .acquire_batch(&["a.rs", "b.rs", "c.rs"], "me", "T-1", None)
        .unwrap();

    match &outcome {
        BatchOutcome::PartialDenial {
            denied,
            granted_paths_already_released,
        } => {
            assert_eq!(denied.len(), 1);
            assert_eq!(denied[0].file_path, "b.rs");
            assert_eq!(denied[0].holder_agent_id, "other");
            assert_eq!(granted_paths_already_released, &vec!["a.rs", "c.rs"]);
        }
        other => panic!("expected partial denial, got {:?}", other),
    }
    assert_eq!(outcome.denied_paths(), vec!["b.rs"]);

    let held_by_me: Vec<_> = manager
        .store()
        .list()
        .unwrap()
        .into_iter()
        .filter(|l| l.owner_agent_id == "me")
        .collect();
    assert!(held_by_me.is_empty());
    assert_eq!(
        manager.store().read("b.rs").unwrap().unwrap().owner_agent_id,
        "other"
    );
    assert!(actions(&ctx).contains(&EventAction::BatchRollback));
}

#[test]
fn test_batch_rollback_keeps_previously_held_locks() {
    let (_temp_dir, _ctx, manager) = create_test_manager();
    granted(manager.acquire("a.rs", "me", "T-1", None).unwrap());
    granted(manager.acquire("b.rs", "other", "T-9", None).unwrap());

    let outcome = manager
        .acquire_batch(&["a.rs", "b.rs", "c.rs"], "me", "T-1", None)
        .unwrap();

    match outcome {
        BatchOutcome::PartialDenial {
            granted_paths_already_released,
            ..
        } => assert_eq!(granted_paths_already_released, vec!["c.rs"]),
        other => panic!("expected partial denial, got {:?}", other),
    }
    assert_eq!(
        manager.store().read("a.rs").unwrap().unwrap().owner_agent_id,
        "me"
    );
    assert!(manager.store().read("c.rs").unwrap().is_none());
}

#[test]
fn test_batch_invalid_path_touches_nothing() {
    let (_temp_dir, _ctx, manager) = create_test_manager();

    let result = manager.acquire_batch(&["a.rs", "dir/"], "me", "T", None);

    assert!(matches!(result, Err(BatonError::UserError(_))));
    assert!(manager.store().list().unwrap().is_empty());

    let empty: [&str; 0] = [];
    assert!(manager.acquire_batch(&empty, "me", "T", None).is_err());
}

#[test]
fn test_lock_display_and_age() {
    let now = Utc::now();
    let lock = Lock::new("a.rs", "a", "T", Duration::seconds(90), now - Duration::minutes(5));

    assert_eq!(lock.age_string(now), "5m 0s");
    assert!(lock.is_expired_at(now));
    assert_eq!(lock.effective_status(now), LockStatus::Expired);
    assert_eq!(lock.remaining_at(now), Duration::zero());
    assert!(lock.to_string().contains("STALE"));
}
